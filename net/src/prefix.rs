// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! IP prefix value type

use std::fmt::{Display, Formatter};
use std::net::IpAddr;
use std::str::FromStr;

use ipnet::{IpNet, Ipv4Net, Ipv6Net, PrefixLenError};

/// An IPv4 or IPv6 destination prefix.
///
/// Thin wrapper over [`ipnet::IpNet`] that normalizes the network address
/// on construction, so two spellings of the same prefix compare equal and
/// hash identically. Tracked-route keys are of this type.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(transparent)]
pub struct Prefix(IpNet);

impl Prefix {
    /// Build a prefix from an address and a prefix length.
    ///
    /// # Errors
    ///
    /// Fails if `len` exceeds the maximum for the address family.
    pub fn new(addr: IpAddr, len: u8) -> Result<Prefix, InvalidPrefix> {
        let net = match addr {
            IpAddr::V4(a) => IpNet::V4(Ipv4Net::new(a, len)?),
            IpAddr::V6(a) => IpNet::V6(Ipv6Net::new(a, len)?),
        };
        Ok(Prefix(net.trunc()))
    }

    /// The host prefix (/32 or /128) for an address.
    #[must_use]
    pub fn host(addr: IpAddr) -> Prefix {
        Prefix(IpNet::from(addr))
    }

    #[must_use]
    pub fn address(&self) -> IpAddr {
        self.0.addr()
    }

    #[must_use]
    pub fn length(&self) -> u8 {
        self.0.prefix_len()
    }

    #[must_use]
    pub fn is_host(&self) -> bool {
        self.0.prefix_len() == self.0.max_prefix_len()
    }
}

/// Errors that can occur when building a [`Prefix`]
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum InvalidPrefix {
    #[error("prefix length out of range")]
    BadLength(#[from] PrefixLenError),
    #[error("malformed prefix '{0}'")]
    Malformed(String),
}

impl FromStr for Prefix {
    type Err = InvalidPrefix;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // accept both "a.b.c.d/len" and a bare host address
        if let Ok(net) = s.parse::<IpNet>() {
            return Ok(Prefix(net.trunc()));
        }
        s.parse::<IpAddr>()
            .map(Prefix::host)
            .map_err(|_| InvalidPrefix::Malformed(s.to_owned()))
    }
}

impl Display for Prefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<IpNet> for Prefix {
    fn from(net: IpNet) -> Prefix {
        Prefix(net.trunc())
    }
}
