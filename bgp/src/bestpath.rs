// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! Best-path selection order

use std::cmp::Ordering;

use crate::route::Candidate;

/// A total order over candidate routes for one tracked key.
///
/// `compare` returns `Ordering::Greater` when `a` is preferred over `b`.
/// Implementations must be total and deterministic: the engine picks the
/// maximum of the candidate set and expects the same answer for the same
/// set regardless of insertion order.
pub trait RouteOrdering: Send + Sync {
    fn compare(&self, a: &Candidate, b: &Candidate) -> Ordering;
}

/// The default selection rule: higher local-pref wins, then shorter AS
/// path, then the lowest originator router id, then the lowest peer
/// address as the final deterministic tie-break.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardOrder;

impl RouteOrdering for StandardOrder {
    fn compare(&self, a: &Candidate, b: &Candidate) -> Ordering {
        a.entry
            .attrs
            .local_pref
            .cmp(&b.entry.attrs.local_pref)
            .then_with(|| {
                b.entry
                    .attrs
                    .as_path_len
                    .cmp(&a.entry.attrs.as_path_len)
            })
            // lower originator and peer are preferred, so compare reversed
            .then_with(|| {
                b.entry
                    .attrs
                    .originator
                    .unwrap_or(std::net::Ipv4Addr::BROADCAST)
                    .cmp(&a.entry.attrs.originator.unwrap_or(std::net::Ipv4Addr::BROADCAST))
            })
            .then_with(|| b.peer.cmp(&a.peer))
    }
}
