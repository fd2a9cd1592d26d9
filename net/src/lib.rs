// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! Basic network value types shared across the vpnd workspace.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod encap;
pub mod label;
pub mod mac;
pub mod prefix;

pub use encap::Encapsulation;
pub use label::{InvalidLabel, MplsLabel};
pub use mac::{InvalidMac, Mac};
pub use prefix::{InvalidPrefix, Prefix};
