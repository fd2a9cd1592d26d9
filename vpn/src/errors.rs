// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! VPN engine error type

use bgp::{InvalidRd, NlriFamily, SpeakerError};
use dataplane::DataplaneError;
use net::{Encapsulation, Mac, Prefix};

/// Errors raised by instance engines and the manager.
#[derive(Clone, Debug, thiserror::Error)]
pub enum VpnError {
    /// Protocol-contract violation: the route-target scoping upstream
    /// delivered a family this instance cannot track. A bug, not a
    /// transient condition.
    #[error("instance {instance} should not receive routes of family {family}")]
    UnexpectedNlri { instance: u32, family: NlriFamily },

    #[error("route for {0} carries no label")]
    MissingLabel(Prefix),

    #[error("unknown local endpoint {mac} {ip}")]
    UnknownEndpoint { mac: Mac, ip: Prefix },

    #[error("no instance with external id '{0}'")]
    NoSuchInstance(String),

    #[error("an instance with external id '{0}' already exists")]
    InstanceExists(String),

    #[error("no driver registered for encapsulation {0}")]
    NoDriver(Encapsulation),

    #[error("invalid instance configuration: {0}")]
    InvalidInstanceConfig(String),

    #[error(transparent)]
    Rd(#[from] InvalidRd),

    #[error(transparent)]
    Speaker(#[from] SpeakerError),

    #[error(transparent)]
    Dataplane(#[from] DataplaneError),
}
