// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! Route-target number pool
//!
//! Tenant networks get a route-target number out of operator-configured
//! ranges; specific numbers can also be reserved outside the ranges. The
//! pool is plain in-memory state: persistence belongs to the surrounding
//! orchestration system.

use std::collections::BTreeMap;
use std::fmt::Write;

use tracing::{debug, error, warn};

use crate::rt::RouteTarget;

/// Smallest allocatable route-target number.
pub const MIN_RT_NUMBER: u32 = 1;
/// Largest allocatable route-target number.
pub const MAX_RT_NUMBER: u32 = 65535;

/// Errors that can occur when configuring or using the pool.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum RtPoolError {
    #[error("invalid route-target number range '{0}', expected 'min:max'")]
    InvalidRange(String),
    #[error("route-target number {0} is in use")]
    InUse(u32),
    #[error("route-target number {0} out of range ({MIN_RT_NUMBER} through {MAX_RT_NUMBER})")]
    OutOfRange(u32),
}

/// Allocator for route-target numbers under one ASN.
#[derive(Debug)]
pub struct RouteTargetPool {
    asn: u16,
    ranges: Vec<(u32, u32)>,
    /// number -> allocated. Rows exist for every in-range number and for
    /// out-of-range numbers currently reserved.
    table: BTreeMap<u32, bool>,
}

fn parse_ranges<S: AsRef<str>>(ranges: &[S]) -> Result<Vec<(u32, u32)>, RtPoolError> {
    let mut parsed = Vec::with_capacity(ranges.len());
    for entry in ranges {
        let entry = entry.as_ref().trim();
        let (lo, hi) = entry
            .split_once(':')
            .ok_or_else(|| RtPoolError::InvalidRange(entry.to_owned()))?;
        let lo = lo
            .trim()
            .parse::<u32>()
            .map_err(|_| RtPoolError::InvalidRange(entry.to_owned()))?;
        let hi = hi
            .trim()
            .parse::<u32>()
            .map_err(|_| RtPoolError::InvalidRange(entry.to_owned()))?;
        if lo > hi {
            return Err(RtPoolError::InvalidRange(entry.to_owned()));
        }
        parsed.push((lo, hi));
    }
    Ok(parsed)
}

impl RouteTargetPool {
    /// Build a pool from `min:max` range strings and populate the table.
    pub fn new<S: AsRef<str>>(asn: u16, ranges: &[S]) -> Result<Self, RtPoolError> {
        let mut pool = Self {
            asn,
            ranges: parse_ranges(ranges)?,
            table: BTreeMap::new(),
        };
        pool.sync_allocations();
        let mut pretty = String::new();
        for (lo, hi) in &pool.ranges {
            let _ = write!(&mut pretty, " {lo}:{hi}");
        }
        debug!("route-target number ranges:{pretty}");
        Ok(pool)
    }

    /// Replace the configured ranges and re-sync the table: allocated
    /// numbers survive wherever they are, unallocated numbers no longer
    /// covered by a range stop being allocatable.
    pub fn update_ranges<S: AsRef<str>>(&mut self, ranges: &[S]) -> Result<(), RtPoolError> {
        self.ranges = parse_ranges(ranges)?;
        self.sync_allocations();
        Ok(())
    }

    fn in_configured_range(&self, number: u32) -> bool {
        self.ranges.iter().any(|(lo, hi)| (*lo..=*hi).contains(&number))
    }

    /// Rebuild the table from the configured ranges: add missing rows,
    /// drop unallocated rows that are no longer allocatable, keep
    /// allocated rows wherever they are.
    fn sync_allocations(&mut self) {
        let mut allocatable = std::collections::BTreeSet::new();
        for (lo, hi) in &self.ranges {
            if hi - lo >= MAX_RT_NUMBER {
                error!("skipping unreasonable route-target range {lo}:{hi}");
                continue;
            }
            allocatable.extend(*lo..=*hi);
        }
        self.table.retain(|number, allocated| {
            *allocated || allocatable.contains(number)
        });
        for number in allocatable {
            self.table.entry(number).or_insert(false);
        }
    }

    /// Allocate the first free number in the pool.
    #[must_use]
    pub fn allocate_tenant(&mut self) -> Option<RouteTarget> {
        let number = self
            .table
            .iter()
            .find(|(_, allocated)| !**allocated)
            .map(|(number, _)| *number)?;
        self.table.insert(number, true);
        debug!("allocated route-target number {number}");
        Some(RouteTarget::new(self.asn, number))
    }

    /// Reserve a specific number, in or out of the configured ranges.
    pub fn reserve(&mut self, number: u32) -> Result<RouteTarget, RtPoolError> {
        if !(MIN_RT_NUMBER..=MAX_RT_NUMBER).contains(&number) {
            return Err(RtPoolError::OutOfRange(number));
        }
        match self.table.get_mut(&number) {
            Some(true) => Err(RtPoolError::InUse(number)),
            Some(allocated) => {
                debug!("reserving route-target number {number} from pool");
                *allocated = true;
                Ok(RouteTarget::new(self.asn, number))
            }
            None => {
                debug!("reserving route-target number {number} outside pool");
                self.table.insert(number, true);
                Ok(RouteTarget::new(self.asn, number))
            }
        }
    }

    /// Release a number back to the pool. Out-of-pool numbers are simply
    /// forgotten; releasing an unknown number is a warning, not an error.
    pub fn release(&mut self, number: u32) {
        if self.table.remove(&number).is_none() {
            warn!("route-target number {number} not found");
            return;
        }
        if self.in_configured_range(number) {
            debug!("releasing route-target number {number} to pool");
            self.table.insert(number, false);
        } else {
            debug!("releasing route-target number {number} outside pool");
        }
    }

    /// Whether a number is currently allocated.
    #[must_use]
    pub fn is_allocated(&self, number: u32) -> bool {
        self.table.get(&number).copied().unwrap_or(false)
    }

    /// Free numbers remaining in the configured ranges.
    #[must_use]
    pub fn available(&self) -> usize {
        self.table.values().filter(|allocated| !**allocated).count()
    }
}
