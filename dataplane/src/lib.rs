// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! Dataplane driver lifecycle and the per-instance forwarding handle.
//!
//! One [`Driver`] exists per encapsulation technology for the whole
//! process. It owns host-level configuration, performs the one-shot
//! recovery reset, and is the factory for [`VpnInstanceDataplane`]
//! handles, one per provisioned tenant instance.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

mod caps;
mod config;
mod driver;
mod dummy;
mod errors;
mod instance;
mod kernel;

pub use caps::{CapabilityFlags, DriverCapabilities};
pub use config::{DriverConfig, LOCAL_ADDRESS_KEY};
pub use driver::{Driver, DriverBackend, DriverMode};
pub use dummy::{DummyBackend, DummyInstance};
pub use errors::DataplaneError;
pub use instance::{InstanceSpec, VpnInstanceDataplane};
pub use kernel::{KernelVersion, probe_kernel_version};

#[cfg(any(test, feature = "testing"))]
pub mod testing;
