// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! Path attributes, to the depth best-path selection needs

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};

use net::Encapsulation;

/// Local preference assumed when a route carries none.
pub const DEFAULT_LOCAL_PREF: u32 = 100;

/// The slice of a route's path attributes this agent cares about: the
/// next hop to tunnel to, what the best-path order compares, and the
/// encapsulations the advertising peer accepts.
///
/// Everything else a real update carries stays opaque in the speaker.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PathAttributes {
    pub next_hop: IpAddr,
    pub local_pref: u32,
    pub as_path_len: u32,
    /// Router id of the route's originator, when reflected.
    pub originator: Option<Ipv4Addr>,
    /// Encapsulations advertised by the peer (tunnel extended community).
    pub encaps: BTreeSet<Encapsulation>,
}

impl PathAttributes {
    #[must_use]
    pub fn new(next_hop: IpAddr) -> Self {
        Self {
            next_hop,
            local_pref: DEFAULT_LOCAL_PREF,
            as_path_len: 0,
            originator: None,
            encaps: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_local_pref(mut self, local_pref: u32) -> Self {
        self.local_pref = local_pref;
        self
    }

    #[must_use]
    pub fn with_as_path_len(mut self, as_path_len: u32) -> Self {
        self.as_path_len = as_path_len;
        self
    }

    #[must_use]
    pub fn with_originator(mut self, originator: Ipv4Addr) -> Self {
        self.originator = Some(originator);
        self
    }

    #[must_use]
    pub fn with_encaps<I: IntoIterator<Item = Encapsulation>>(mut self, encaps: I) -> Self {
        self.encaps = encaps.into_iter().collect();
        self
    }
}
