// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! Call-recording dataplane doubles for tests.

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bgp::Nlri;
use net::{Encapsulation, Mac, MplsLabel, Prefix};

use crate::caps::{CapabilityFlags, DriverCapabilities};
use crate::config::DriverConfig;
use crate::driver::DriverBackend;
use crate::errors::DataplaneError;
use crate::instance::{InstanceSpec, VpnInstanceDataplane};
use crate::kernel::KernelVersion;

/// One recorded call against a driver or one of its instances.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DataplaneCall {
    Init,
    ResetState,
    Cleanup,
    NewInstance {
        instance_id: u32,
    },
    Plug {
        instance_id: u32,
        mac: Mac,
        ip: Prefix,
        port: String,
        label: MplsLabel,
    },
    Unplug {
        instance_id: u32,
        mac: Mac,
        ip: Prefix,
        port: String,
        label: MplsLabel,
        last_endpoint: bool,
    },
    Setup {
        instance_id: u32,
        prefix: Prefix,
        remote_pe: IpAddr,
        label: MplsLabel,
        encaps: BTreeSet<Encapsulation>,
        lb_order: u32,
    },
    Remove {
        instance_id: u32,
        prefix: Prefix,
        remote_pe: IpAddr,
        label: MplsLabel,
        lb_order: u32,
    },
    InstanceCleanup {
        instance_id: u32,
    },
}

/// Shared call journal. Cloned handles all point at the same log.
#[derive(Clone, Debug, Default)]
pub struct Journal {
    calls: Arc<Mutex<Vec<DataplaneCall>>>,
}

impl Journal {
    fn push(&self, call: DataplaneCall) {
        self.calls.lock().expect("lock poisoned").push(call);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<DataplaneCall> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    /// Number of `reset_state` invocations seen.
    #[must_use]
    pub fn resets(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == DataplaneCall::ResetState)
            .count()
    }

    /// The setup/remove calls only, in order.
    #[must_use]
    pub fn forwarding_calls(&self) -> Vec<DataplaneCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, DataplaneCall::Setup { .. } | DataplaneCall::Remove { .. }))
            .collect()
    }
}

/// Backend double that records every call and can be told to fail.
pub struct RecordingBackend {
    caps: DriverCapabilities,
    required_kernel: Option<KernelVersion>,
    journal: Journal,
    fail_reset: AtomicBool,
    fail_forwarding: Arc<AtomicBool>,
}

impl RecordingBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::with_encaps([Encapsulation::Default])
    }

    #[must_use]
    pub fn with_encaps<I: IntoIterator<Item = Encapsulation>>(encaps: I) -> Self {
        Self {
            caps: DriverCapabilities::new(encaps, CapabilityFlags::empty()),
            required_kernel: None,
            journal: Journal::default(),
            fail_reset: AtomicBool::new(false),
            fail_forwarding: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn with_required_kernel(mut self, version: KernelVersion) -> Self {
        self.required_kernel = Some(version);
        self
    }

    /// Make the next (and every further) `reset_state` fail.
    pub fn fail_reset(&self) {
        self.fail_reset.store(true, Ordering::Relaxed);
    }

    /// Toggle failure of setup/remove calls on all instances.
    pub fn set_fail_forwarding(&self, fail: bool) {
        self.fail_forwarding.store(fail, Ordering::Relaxed);
    }

    /// Handle on the shared call journal.
    #[must_use]
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn capabilities(&self) -> &DriverCapabilities {
        &self.caps
    }

    fn required_kernel(&self) -> Option<KernelVersion> {
        self.required_kernel
    }

    fn init(&self, _config: &DriverConfig) -> Result<(), DataplaneError> {
        self.journal.push(DataplaneCall::Init);
        Ok(())
    }

    fn reset_state(&self) -> Result<(), DataplaneError> {
        self.journal.push(DataplaneCall::ResetState);
        if self.fail_reset.load(Ordering::Relaxed) {
            return Err(DataplaneError::Backend("injected reset failure".to_owned()));
        }
        Ok(())
    }

    fn cleanup(&self) {
        self.journal.push(DataplaneCall::Cleanup);
    }

    fn new_instance(
        &self,
        spec: InstanceSpec,
    ) -> Result<Box<dyn VpnInstanceDataplane>, DataplaneError> {
        self.journal.push(DataplaneCall::NewInstance {
            instance_id: spec.instance_id,
        });
        Ok(Box::new(RecordingInstance {
            instance_id: spec.instance_id,
            journal: self.journal.clone(),
            fail_forwarding: self.fail_forwarding.clone(),
        }))
    }
}

/// Instance double writing into the backend's journal.
pub struct RecordingInstance {
    instance_id: u32,
    journal: Journal,
    fail_forwarding: Arc<AtomicBool>,
}

impl RecordingInstance {
    fn forwarding_result(&self) -> Result<(), DataplaneError> {
        if self.fail_forwarding.load(Ordering::Relaxed) {
            return Err(DataplaneError::Backend(
                "injected forwarding failure".to_owned(),
            ));
        }
        Ok(())
    }
}

impl VpnInstanceDataplane for RecordingInstance {
    fn plug_local_endpoint(
        &self,
        mac: Mac,
        ip: Prefix,
        port: &str,
        label: MplsLabel,
    ) -> Result<(), DataplaneError> {
        self.journal.push(DataplaneCall::Plug {
            instance_id: self.instance_id,
            mac,
            ip,
            port: port.to_owned(),
            label,
        });
        Ok(())
    }

    fn unplug_local_endpoint(
        &self,
        mac: Mac,
        ip: Prefix,
        port: &str,
        label: MplsLabel,
        last_endpoint: bool,
    ) -> Result<(), DataplaneError> {
        self.journal.push(DataplaneCall::Unplug {
            instance_id: self.instance_id,
            mac,
            ip,
            port: port.to_owned(),
            label,
            last_endpoint,
        });
        Ok(())
    }

    fn setup_remote_endpoint(
        &self,
        prefix: Prefix,
        remote_pe: IpAddr,
        label: MplsLabel,
        _nlri: &Nlri,
        encaps: &BTreeSet<Encapsulation>,
        lb_order: u32,
    ) -> Result<(), DataplaneError> {
        self.journal.push(DataplaneCall::Setup {
            instance_id: self.instance_id,
            prefix,
            remote_pe,
            label,
            encaps: encaps.clone(),
            lb_order,
        });
        self.forwarding_result()
    }

    fn remove_remote_endpoint(
        &self,
        prefix: Prefix,
        remote_pe: IpAddr,
        label: MplsLabel,
        _nlri: &Nlri,
        _encaps: &BTreeSet<Encapsulation>,
        lb_order: u32,
    ) -> Result<(), DataplaneError> {
        self.journal.push(DataplaneCall::Remove {
            instance_id: self.instance_id,
            prefix,
            remote_pe,
            label,
            lb_order,
        });
        self.forwarding_result()
    }

    fn cleanup(&self) -> Result<(), DataplaneError> {
        self.journal.push(DataplaneCall::InstanceCleanup {
            instance_id: self.instance_id,
        });
        Ok(())
    }
}
