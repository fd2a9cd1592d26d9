// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! No-op driver
//!
//! Programs nothing. Useful as the backend for control-plane-only
//! deployments and as a template for real backends.

use std::collections::BTreeSet;
use std::net::IpAddr;

use bgp::Nlri;
use net::{Encapsulation, Mac, MplsLabel, Prefix};
use tracing::{debug, info};

use crate::caps::{CapabilityFlags, DriverCapabilities};
use crate::config::DriverConfig;
use crate::driver::DriverBackend;
use crate::errors::DataplaneError;
use crate::instance::{InstanceSpec, VpnInstanceDataplane};

pub struct DummyBackend {
    caps: DriverCapabilities,
}

impl DummyBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            caps: DriverCapabilities::new([Encapsulation::Default], CapabilityFlags::empty()),
        }
    }

    #[must_use]
    pub fn with_capabilities(caps: DriverCapabilities) -> Self {
        Self { caps }
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "dummy"
    }

    fn capabilities(&self) -> &DriverCapabilities {
        &self.caps
    }

    fn init(&self, _config: &DriverConfig) -> Result<(), DataplaneError> {
        info!("dummy driver initialized");
        Ok(())
    }

    fn reset_state(&self) -> Result<(), DataplaneError> {
        info!("dummy driver state reset");
        Ok(())
    }

    fn cleanup(&self) {
        info!("dummy driver cleaned up");
    }

    fn new_instance(
        &self,
        spec: InstanceSpec,
    ) -> Result<Box<dyn VpnInstanceDataplane>, DataplaneError> {
        Ok(Box::new(DummyInstance { spec }))
    }
}

pub struct DummyInstance {
    spec: InstanceSpec,
}

impl VpnInstanceDataplane for DummyInstance {
    fn plug_local_endpoint(
        &self,
        mac: Mac,
        ip: Prefix,
        port: &str,
        label: MplsLabel,
    ) -> Result<(), DataplaneError> {
        debug!(
            "instance {}: plug {mac} {ip} port {port} label {label}",
            self.spec.instance_id
        );
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
        debug!(
            "instance {}: unplug {mac} {ip} port {port} label {label} (last: {last_endpoint})",
            self.spec.instance_id
        );
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
        debug!(
            "instance {}: setup {prefix} via {remote_pe} label {label} encaps {encaps:?} lb {lb_order}",
            self.spec.instance_id
        );
        Ok(())
    }

    fn remove_remote_endpoint(
        &self,
        prefix: Prefix,
        remote_pe: IpAddr,
        label: MplsLabel,
        _nlri: &Nlri,
        encaps: &BTreeSet<Encapsulation>,
        lb_order: u32,
    ) -> Result<(), DataplaneError> {
        debug!(
            "instance {}: remove {prefix} via {remote_pe} label {label} encaps {encaps:?} lb {lb_order}",
            self.spec.instance_id
        );
        Ok(())
    }

    fn cleanup(&self) -> Result<(), DataplaneError> {
        debug!("instance {}: cleanup", self.spec.instance_id);
        Ok(())
    }
}
