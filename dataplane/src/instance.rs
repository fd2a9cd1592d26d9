// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! Per-instance forwarding handle

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};

use bgp::Nlri;
use net::{Encapsulation, Mac, MplsLabel, Prefix};

use crate::errors::DataplaneError;

/// Everything a backend needs to materialize the forwarding context of
/// one tenant instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceSpec {
    /// Process-local numeric identifier, unique per driver.
    pub instance_id: u32,
    /// Caller-supplied stable identifier (e.g. the tenant network id).
    pub external_id: String,
    pub gateway_ip: Ipv4Addr,
    pub mask: u8,
    pub instance_label: Option<MplsLabel>,
}

/// The narrow mutation surface the route-tracking engine drives.
///
/// Implementations are backend-specific but must honor a uniform
/// contract: plugging the same endpoint twice must not duplicate state,
/// and removing forwarding state that is not installed is a no-op, not an
/// error. All operations may block (shell-outs, kernel syscalls); the
/// caller invokes them only inside its own per-instance critical section.
pub trait VpnInstanceDataplane: Send + Sync {
    /// Attach a local interface to this instance's forwarding context.
    fn plug_local_endpoint(
        &self,
        mac: Mac,
        ip: Prefix,
        port: &str,
        label: MplsLabel,
    ) -> Result<(), DataplaneError>;

    /// Detach a local interface. When `last_endpoint` is true the backend
    /// may release per-instance shared resources (bridge, namespace).
    fn unplug_local_endpoint(
        &self,
        mac: Mac,
        ip: Prefix,
        port: &str,
        label: MplsLabel,
        last_endpoint: bool,
    ) -> Result<(), DataplaneError>;

    /// Install or update forwarding state: traffic to `prefix` tunnels to
    /// `remote_pe` with `label`, using one of `encaps`. `lb_order`
    /// selects among equal-cost paths and must be 0 without ECMP support.
    fn setup_remote_endpoint(
        &self,
        prefix: Prefix,
        remote_pe: IpAddr,
        label: MplsLabel,
        nlri: &Nlri,
        encaps: &BTreeSet<Encapsulation>,
        lb_order: u32,
    ) -> Result<(), DataplaneError>;

    /// Inverse of [`setup_remote_endpoint`](Self::setup_remote_endpoint).
    fn remove_remote_endpoint(
        &self,
        prefix: Prefix,
        remote_pe: IpAddr,
        label: MplsLabel,
        nlri: &Nlri,
        encaps: &BTreeSet<Encapsulation>,
        lb_order: u32,
    ) -> Result<(), DataplaneError>;

    /// Release everything this instance holds; called once when the
    /// tenant instance is torn down.
    fn cleanup(&self) -> Result<(), DataplaneError>;
}
