// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! MPLS label value type

use std::fmt::{Display, Formatter};

/// An MPLS forwarding label.
///
/// A label is a 20-bit value. Values 0 through 15 are reserved by the MPLS
/// architecture but are still representable here since some of them (e.g.
/// explicit-null) legitimately appear in label stacks.
///
/// It is deliberately not possible to build a `MplsLabel` from a `u32`
/// directly; use [`MplsLabel::new`] so out-of-range values are rejected.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u32", into = "u32"))]
#[repr(transparent)]
pub struct MplsLabel(u32);

impl MplsLabel {
    /// The maximum legal label value (2^20 - 1).
    pub const MAX: u32 = 0x000F_FFFF;

    /// Create a new [`MplsLabel`] from a `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidLabel`] if the value exceeds [`MplsLabel::MAX`].
    pub fn new(label: u32) -> Result<MplsLabel, InvalidLabel> {
        if label > MplsLabel::MAX {
            return Err(InvalidLabel::TooLarge(label));
        }
        Ok(MplsLabel(label))
    }

    #[must_use]
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// Errors that can occur when converting a `u32` to a [`MplsLabel`]
#[must_use]
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, thiserror::Error)]
pub enum InvalidLabel {
    #[error("the value {0} is too large to be an MPLS label (max is {MAX})", MAX = MplsLabel::MAX)]
    TooLarge(u32),
}

impl From<MplsLabel> for u32 {
    fn from(label: MplsLabel) -> u32 {
        label.as_u32()
    }
}

impl TryFrom<u32> for MplsLabel {
    type Error = InvalidLabel;

    fn try_from(label: u32) -> Result<MplsLabel, Self::Error> {
        MplsLabel::new(label)
    }
}

impl Display for MplsLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
