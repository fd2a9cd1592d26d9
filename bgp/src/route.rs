// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! Decoded route entries and the events the speaker delivers

use std::fmt::{Display, Formatter};
use std::net::IpAddr;

use crate::attrs::PathAttributes;
use crate::nlri::Nlri;
use crate::rt::RouteTarget;

/// A decoded route: reachability information plus the attributes and
/// route-target communities attached to it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RouteEntry {
    pub nlri: Nlri,
    pub route_targets: Vec<RouteTarget>,
    pub attrs: PathAttributes,
}

impl Display for RouteEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} nh {}", self.nlri, self.attrs.next_hop)
    }
}

/// A route delivered by the speaker's route-target-scoped subscription.
///
/// Withdrawals carry the same entry shape; only the NLRI and origin peer
/// are meaningful for matching the candidate to retract.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RouteEvent {
    Advertise { peer: IpAddr, entry: RouteEntry },
    Withdraw { peer: IpAddr, entry: RouteEntry },
}

impl RouteEvent {
    #[must_use]
    pub fn peer(&self) -> IpAddr {
        match self {
            RouteEvent::Advertise { peer, .. } | RouteEvent::Withdraw { peer, .. } => *peer,
        }
    }

    #[must_use]
    pub fn entry(&self) -> &RouteEntry {
        match self {
            RouteEvent::Advertise { entry, .. } | RouteEvent::Withdraw { entry, .. } => entry,
        }
    }
}

/// A candidate route for a tracked key: the entry plus the peer it was
/// learned from. At most one candidate per (key, peer) is retained.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Candidate {
    pub peer: IpAddr,
    pub entry: RouteEntry,
}
