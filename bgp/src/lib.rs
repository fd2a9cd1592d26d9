// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! Decoded-route model for the VPN agent.
//!
//! This crate deliberately stops at the decoded level: route
//! distinguishers, route targets, NLRI, path attributes, and the
//! advertise/withdraw seam toward the external BGP speaker. Wire parsing,
//! attribute encoding and TCP session management live in that speaker,
//! not here.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

mod attrs;
mod bestpath;
mod nlri;
mod rd;
mod route;
mod rt;
mod rtalloc;
mod speaker;

pub use attrs::{DEFAULT_LOCAL_PREF, PathAttributes};
pub use bestpath::{RouteOrdering, StandardOrder};
pub use nlri::{LabeledVpnPrefix, Nlri, NlriFamily};
pub use rd::{InvalidRd, RouteDistinguisher};
pub use route::{Candidate, RouteEntry, RouteEvent};
pub use rt::{InvalidRouteTarget, RouteTarget};
pub use rtalloc::{MAX_RT_NUMBER, MIN_RT_NUMBER, RouteTargetPool, RtPoolError};
pub use speaker::{RouteAdvertiser, SpeakerError};

#[cfg(any(test, feature = "testing"))]
pub use speaker::testing;
