// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! Generic driver shell: host-level setup, capability exposure, instance
//! factory and the one-shot recovery reset.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cmd::CommandRunner;
use net::Encapsulation;
use tracing::{debug, error, info, warn};

use crate::caps::DriverCapabilities;
use crate::config::{DriverConfig, LOCAL_ADDRESS_KEY};
use crate::errors::DataplaneError;
use crate::instance::{InstanceSpec, VpnInstanceDataplane};
use crate::kernel::{KernelVersion, probe_kernel_version};

/// How a [`Driver`] is constructed.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum DriverMode {
    /// Normal operation: backend one-time initialization runs.
    #[default]
    Full,
    /// Inspection-only: skip backend initialization. Used by cleanup
    /// tooling that wants to look at the dataplane without touching it.
    InspectOnly,
}

/// The backend-specific half of a driver.
///
/// Implementations own the actual kernel/forwarding mechanics for one
/// encapsulation technology. Everything here is invoked through the
/// generic [`Driver`] shell, which owns the lifecycle invariants.
pub trait DriverBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> &DriverCapabilities;

    /// Minimum kernel version this backend needs, if any.
    fn required_kernel(&self) -> Option<KernelVersion> {
        None
    }

    /// One-time initialization. Must be idempotent and safe against a
    /// dataplane left dirty by a crashed predecessor, and must NOT clear
    /// leftover forwarding state; that is deferred to
    /// [`reset_state`](Self::reset_state).
    fn init(&self, config: &DriverConfig) -> Result<(), DataplaneError>;

    /// Remove all forwarding state this driver class owns that it did not
    /// just create. Recovery after an unclean restart.
    fn reset_state(&self) -> Result<(), DataplaneError>;

    /// Release process-wide backend resources.
    fn cleanup(&self);

    /// Build the forwarding context for one tenant instance.
    fn new_instance(
        &self,
        spec: InstanceSpec,
    ) -> Result<Box<dyn VpnInstanceDataplane>, DataplaneError>;
}

/// Process-wide driver object, one per encapsulation technology.
///
/// Explicitly constructed and explicitly owned: instance engines hold it
/// by `Arc`, there is no global registry, and tests can build as many
/// isolated drivers as they like.
pub struct Driver {
    backend: Box<dyn DriverBackend>,
    config: DriverConfig,
    local_address: Option<Ipv4Addr>,
    /// True until the first instance is created. Guarded by its own lock,
    /// independent of any per-instance lock, so concurrent instance
    /// creation still resets at most once.
    first_init: Mutex<bool>,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("backend", &self.backend.name())
            .field("local_address", &self.local_address)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Driver {
    /// Construct a driver over a backend.
    ///
    /// Validates the optional `dataplane_local_address` (fatal if
    /// malformed), probes the running kernel when the backend declares a
    /// minimum (warning only), and runs backend initialization unless
    /// `mode` is [`DriverMode::InspectOnly`].
    pub fn new(
        backend: Box<dyn DriverBackend>,
        runner: &dyn CommandRunner,
        config: DriverConfig,
        mode: DriverMode,
    ) -> Result<Arc<Driver>, DataplaneError> {
        let local_address = match config.get(LOCAL_ADDRESS_KEY) {
            Some(value) => {
                let address = value
                    .parse::<Ipv4Addr>()
                    .map_err(|_| DataplaneError::BadLocalAddress(value.to_owned()))?;
                info!("{}: will use {address} as local address", backend.name());
                Some(address)
            }
            None => {
                info!(
                    "{}: will use the BGP address as dataplane local address",
                    backend.name()
                );
                None
            }
        };

        if let Some(required) = backend.required_kernel() {
            match probe_kernel_version(runner) {
                Ok(running) if running < required => {
                    warn!(
                        "{} requires at least kernel {required} (you are running {running})",
                        backend.name()
                    );
                }
                Ok(running) => {
                    debug!("{}: running kernel {running}", backend.name());
                }
                Err(e) => {
                    warn!(
                        "{}: could not determine the running kernel version: {e}",
                        backend.name()
                    );
                }
            }
        }

        if mode == DriverMode::Full {
            backend.init(&config)?;
        }

        Ok(Arc::new(Driver {
            backend,
            config,
            local_address,
            first_init: Mutex::new(true),
        }))
    }

    fn first_init_latch(&self) -> MutexGuard<'_, bool> {
        self.first_init
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Create the dataplane handle for a new tenant instance.
    ///
    /// On the very first call over this driver's lifetime the backend's
    /// `reset_state` runs first; its failure is logged and absorbed, since
    /// a clean kernel state is best-effort, not a precondition for
    /// serving instances.
    pub fn create_instance(
        &self,
        spec: InstanceSpec,
    ) -> Result<Box<dyn VpnInstanceDataplane>, DataplaneError> {
        {
            let mut first = self.first_init_latch();
            if *first {
                info!(
                    "{}: first instance init, resetting dataplane state",
                    self.backend.name()
                );
                if let Err(e) = self.backend.reset_state() {
                    error!("{}: failed to reset dataplane state: {e}", self.backend.name());
                }
                *first = false;
            } else {
                debug!("{}: not resetting dataplane state", self.backend.name());
            }
        }
        debug!(
            "{}: creating instance {} ('{}')",
            self.backend.name(),
            spec.instance_id,
            spec.external_id
        );
        self.backend.new_instance(spec)
    }

    /// Release process-wide driver resources. Does not imply a state
    /// reset.
    pub fn cleanup(&self) {
        self.backend.cleanup();
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.backend.name()
    }

    #[must_use]
    pub fn local_address(&self) -> Option<Ipv4Addr> {
        self.local_address
    }

    #[must_use]
    pub fn capabilities(&self) -> &DriverCapabilities {
        self.backend.capabilities()
    }

    /// The driver class's static encapsulation set, used by engines for
    /// negotiation.
    #[must_use]
    pub fn supported_encaps(&self) -> &BTreeSet<Encapsulation> {
        self.backend.capabilities().encaps()
    }

    #[must_use]
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{DataplaneCall, RecordingBackend};
    use cmd::testing::CannedRunner;
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    fn spec(instance_id: u32) -> InstanceSpec {
        InstanceSpec {
            instance_id,
            external_id: format!("tenant-{instance_id}"),
            gateway_ip: Ipv4Addr::new(10, 0, 0, 1),
            mask: 24,
            instance_label: None,
        }
    }

    #[test]
    fn valid_local_address_is_kept_verbatim() {
        let runner = CannedRunner::new();
        let config: DriverConfig = [(LOCAL_ADDRESS_KEY, "192.0.2.7")].into_iter().collect();
        let driver = Driver::new(
            Box::new(RecordingBackend::new()),
            &runner,
            config,
            DriverMode::Full,
        )
        .expect("valid address must construct");
        assert_eq!(driver.local_address(), Some(Ipv4Addr::new(192, 0, 2, 7)));
    }

    #[test]
    fn malformed_local_address_is_fatal() {
        let runner = CannedRunner::new();
        for bad in ["10.0.0", "2001:db8::1", "localhost", ""] {
            let config: DriverConfig = [(LOCAL_ADDRESS_KEY, bad)].into_iter().collect();
            let err = Driver::new(
                Box::new(RecordingBackend::new()),
                &runner,
                config,
                DriverMode::Full,
            )
            .expect_err("malformed address must fail construction");
            assert_eq!(err, DataplaneError::BadLocalAddress(bad.to_owned()));
        }
    }

    #[test]
    fn missing_local_address_falls_back() {
        let runner = CannedRunner::new();
        let driver = Driver::new(
            Box::new(RecordingBackend::new()),
            &runner,
            DriverConfig::new(),
            DriverMode::Full,
        )
        .expect("absent address is fine");
        assert_eq!(driver.local_address(), None);
    }

    #[test]
    fn reset_state_runs_exactly_once_across_creates() {
        let runner = CannedRunner::new();
        let backend = RecordingBackend::new();
        let journal = backend.journal();
        let driver = Driver::new(Box::new(backend), &runner, DriverConfig::new(), DriverMode::Full)
            .expect("construct");

        assert_eq!(journal.resets(), 0, "no instance requested yet");
        for i in 1..=3 {
            driver.create_instance(spec(i)).expect("create");
        }
        assert_eq!(journal.resets(), 1, "reset must run exactly once");
    }

    #[test]
    fn no_reset_when_nothing_is_provisioned() {
        let runner = CannedRunner::new();
        let backend = RecordingBackend::new();
        let journal = backend.journal();
        let driver = Driver::new(Box::new(backend), &runner, DriverConfig::new(), DriverMode::Full)
            .expect("construct");
        driver.cleanup();
        assert_eq!(journal.resets(), 0);
        assert!(journal.calls().contains(&DataplaneCall::Cleanup));
    }

    #[test]
    fn reset_failure_is_absorbed() {
        let runner = CannedRunner::new();
        let backend = RecordingBackend::new();
        backend.fail_reset();
        let journal = backend.journal();
        let driver = Driver::new(Box::new(backend), &runner, DriverConfig::new(), DriverMode::Full)
            .expect("construct");
        driver
            .create_instance(spec(1))
            .expect("instance creation must survive a failed reset");
        assert_eq!(journal.resets(), 1);
    }

    #[test]
    fn inspect_only_skips_backend_init() {
        let runner = CannedRunner::new();
        let backend = RecordingBackend::new();
        let journal = backend.journal();
        Driver::new(
            Box::new(backend),
            &runner,
            DriverConfig::new(),
            DriverMode::InspectOnly,
        )
        .expect("construct");
        assert!(!journal.calls().contains(&DataplaneCall::Init));
    }

    #[traced_test]
    #[test]
    fn old_kernel_is_a_warning_not_an_error() {
        let runner = CannedRunner::new();
        runner.expect_stdout(&["3.2.0-rc1"]);
        let backend = RecordingBackend::new().with_required_kernel(KernelVersion::new(4, 4, 0));
        Driver::new(Box::new(backend), &runner, DriverConfig::new(), DriverMode::Full)
            .expect("old kernel must not fail startup");
        assert_eq!(runner.calls(), vec!["uname -r".to_owned()]);
        assert!(logs_contain("requires at least kernel 4.4.0"));
    }

    #[traced_test]
    #[test]
    fn unreadable_kernel_version_is_a_warning() {
        let runner = CannedRunner::new();
        runner.expect_stdout(&["not-a-version"]);
        let backend = RecordingBackend::new().with_required_kernel(KernelVersion::new(4, 4, 0));
        Driver::new(Box::new(backend), &runner, DriverConfig::new(), DriverMode::Full)
            .expect("probe failure must not fail startup");
        assert!(logs_contain("could not determine the running kernel version"));
    }
}
