// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! Tunnel encapsulation types

use strum::{Display, EnumString};

/// A tunneling technology used to carry forwarded traffic between
/// dataplane endpoints.
///
/// Remote peers advertise the encapsulations they accept as a BGP path
/// attribute; drivers declare the ones they can program. A route is only
/// reflected into the dataplane when the two sets intersect.
///
/// `Default` is the wildcard a peer advertises when it did not state any
/// explicit encapsulation; it matches everything during negotiation.
#[derive(Copy, Clone, Debug, Display, EnumString, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[strum(serialize_all = "kebab-case")]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Encapsulation {
    Default,
    Gre,
    Mpls,
    MplsGre,
    MplsUdp,
    Vxlan,
}

impl Encapsulation {
    /// Whether this encapsulation satisfies a peer that advertised `other`.
    #[must_use]
    pub fn matches(self, other: Encapsulation) -> bool {
        self == other || self == Encapsulation::Default || other == Encapsulation::Default
    }
}
