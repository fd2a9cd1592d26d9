// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! Per-tenant VPN instances: best-route tracking and dataplane
//! synchronization.
//!
//! A [`Vrf`] reconciles the BGP-learned routing state of one tenant
//! forwarding instance with the live forwarding state behind its
//! dataplane handle. The [`VpnManager`] owns the process-wide drivers and
//! the live instance set.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

mod errors;
mod manager;
mod vrf;

pub use errors::VpnError;
pub use manager::{InstanceConfig, VpnManager};
pub use vrf::{Vrf, VrfParams, VrfParamsBuilder, VrfParamsBuilderError};
