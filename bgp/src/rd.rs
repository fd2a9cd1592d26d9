// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! Route distinguisher values

use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;

/// A route distinguisher, the per-instance disambiguator prepended to VPN
/// prefixes so overlapping tenant address space stays distinct in BGP.
///
/// Only the two common encodings are modeled: type 0 (two-octet ASN plus
/// four-octet assigned number) and type 1 (IPv4 address plus two-octet
/// assigned number). Locally synthesized routes use the type 1 form built
/// from the BGP-facing address and the instance id.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum RouteDistinguisher {
    As2 { asn: u16, assigned: u32 },
    Ipv4 { address: Ipv4Addr, assigned: u16 },
}

/// Errors that can occur when building a [`RouteDistinguisher`]
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum InvalidRd {
    #[error("instance id {0} does not fit the 16-bit assigned-number field")]
    InstanceIdTooLarge(u32),
}

impl RouteDistinguisher {
    /// The type 1 RD identifying a local forwarding instance:
    /// (local BGP address, instance id).
    pub fn for_instance(address: Ipv4Addr, instance_id: u32) -> Result<Self, InvalidRd> {
        let assigned =
            u16::try_from(instance_id).map_err(|_| InvalidRd::InstanceIdTooLarge(instance_id))?;
        Ok(RouteDistinguisher::Ipv4 { address, assigned })
    }
}

impl Display for RouteDistinguisher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteDistinguisher::As2 { asn, assigned } => write!(f, "{asn}:{assigned}"),
            RouteDistinguisher::Ipv4 { address, assigned } => write!(f, "{address}:{assigned}"),
        }
    }
}
