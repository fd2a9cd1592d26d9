// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! Driver capability descriptor

use std::collections::BTreeSet;

use bitflags::bitflags;
use net::Encapsulation;

bitflags! {
    /// Optional dataplane features a driver class may support.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
    pub struct CapabilityFlags: u8 {
        /// New forwarding state can be installed before the old one is
        /// torn down when the best route moves.
        const MAKE_BEFORE_BREAK = 0b01;
        /// Multiple equal-cost remote endpoints per prefix.
        const ECMP = 0b10;
    }
}

/// Static per-driver-class metadata: the encapsulations the driver can
/// program plus its feature flags. Read-only after startup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DriverCapabilities {
    encaps: BTreeSet<Encapsulation>,
    flags: CapabilityFlags,
}

impl DriverCapabilities {
    #[must_use]
    pub fn new<I: IntoIterator<Item = Encapsulation>>(encaps: I, flags: CapabilityFlags) -> Self {
        Self {
            encaps: encaps.into_iter().collect(),
            flags,
        }
    }

    #[must_use]
    pub fn encaps(&self) -> &BTreeSet<Encapsulation> {
        &self.encaps
    }

    #[must_use]
    pub fn supports_ecmp(&self) -> bool {
        self.flags.contains(CapabilityFlags::ECMP)
    }

    #[must_use]
    pub fn supports_make_before_break(&self) -> bool {
        self.flags.contains(CapabilityFlags::MAKE_BEFORE_BREAK)
    }

    /// Intersect the driver's encapsulation set with the set a remote
    /// peer advertised.
    ///
    /// A peer that advertised nothing is treated as advertising the
    /// default (wildcard) encapsulation; `Default` on either side matches
    /// anything. An empty result means the route cannot be forwarded by
    /// this driver.
    #[must_use]
    pub fn negotiate(&self, advertised: &BTreeSet<Encapsulation>) -> BTreeSet<Encapsulation> {
        if advertised.is_empty() {
            return if self.encaps.is_empty() {
                BTreeSet::new()
            } else {
                BTreeSet::from([Encapsulation::Default])
            };
        }
        advertised
            .iter()
            .copied()
            .filter(|theirs| self.encaps.iter().any(|mine| mine.matches(*theirs)))
            .collect()
    }
}
