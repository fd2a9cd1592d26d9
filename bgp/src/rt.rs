// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! Route target values

use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A route target community, `asn:number`.
///
/// Instances export their local routes tagged with their export targets
/// and subscribe to the feed scoped by their import targets.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RouteTarget {
    pub asn: u16,
    pub number: u32,
}

impl RouteTarget {
    #[must_use]
    pub fn new(asn: u16, number: u32) -> Self {
        Self { asn, number }
    }
}

/// Errors that can occur when parsing a [`RouteTarget`]
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum InvalidRouteTarget {
    #[error("malformed route target '{0}', expected 'asn:number'")]
    Malformed(String),
}

impl FromStr for RouteTarget {
    type Err = InvalidRouteTarget;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (asn, number) = s
            .split_once(':')
            .ok_or_else(|| InvalidRouteTarget::Malformed(s.to_owned()))?;
        let asn = asn
            .trim()
            .parse::<u16>()
            .map_err(|_| InvalidRouteTarget::Malformed(s.to_owned()))?;
        let number = number
            .trim()
            .parse::<u32>()
            .map_err(|_| InvalidRouteTarget::Malformed(s.to_owned()))?;
        Ok(RouteTarget { asn, number })
    }
}

impl Display for RouteTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.asn, self.number)
    }
}
