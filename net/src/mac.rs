// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! Ethernet MAC address value type

use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A 48-bit Ethernet MAC address.
///
/// Constructed from raw octets or parsed from the usual colon-separated
/// form. No unicast/multicast distinction is enforced here; vif endpoints
/// are always given to us as plain addresses.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
#[repr(transparent)]
pub struct Mac([u8; 6]);

impl Mac {
    #[must_use]
    pub fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    #[must_use]
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

/// Errors that can occur when parsing a [`Mac`]
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum InvalidMac {
    #[error("invalid mac address '{0}'")]
    Malformed(String),
}

impl FromStr for Mac {
    type Err = InvalidMac;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut count = 0;
        for part in s.split(':') {
            if count == 6 || part.len() != 2 {
                return Err(InvalidMac::Malformed(s.to_owned()));
            }
            octets[count] = u8::from_str_radix(part, 16)
                .map_err(|_| InvalidMac::Malformed(s.to_owned()))?;
            count += 1;
        }
        if count != 6 {
            return Err(InvalidMac::Malformed(s.to_owned()));
        }
        Ok(Mac(octets))
    }
}

impl Display for Mac {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl From<Mac> for String {
    fn from(mac: Mac) -> String {
        mac.to_string()
    }
}

impl TryFrom<String> for Mac {
    type Error = InvalidMac;

    fn try_from(s: String) -> Result<Mac, Self::Error> {
        s.parse()
    }
}

impl From<[u8; 6]> for Mac {
    fn from(octets: [u8; 6]) -> Mac {
        Mac(octets)
    }
}
