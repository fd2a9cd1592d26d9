// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! Network-layer reachability information

use std::fmt::{Display, Formatter};

use net::{MplsLabel, Prefix};

use crate::rd::RouteDistinguisher;

/// A labeled VPN prefix: route distinguisher, destination prefix and a
/// label stack (bottom label selects the remote forwarding instance).
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct LabeledVpnPrefix {
    pub rd: RouteDistinguisher,
    pub prefix: Prefix,
    pub labels: Vec<MplsLabel>,
}

impl LabeledVpnPrefix {
    #[must_use]
    pub fn new(rd: RouteDistinguisher, prefix: Prefix, label: MplsLabel) -> Self {
        Self {
            rd,
            prefix,
            labels: vec![label],
        }
    }

    /// The top label of the stack.
    #[must_use]
    pub fn label(&self) -> Option<MplsLabel> {
        self.labels.first().copied()
    }
}

impl Display for LabeledVpnPrefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.rd, self.prefix)?;
        for label in &self.labels {
            write!(f, " label {label}")?;
        }
        Ok(())
    }
}

/// The address family a piece of reachability information belongs to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NlriFamily {
    LabeledVpn,
    Ipv4Unicast,
}

impl Display for NlriFamily {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NlriFamily::LabeledVpn => write!(f, "labeled-vpn"),
            NlriFamily::Ipv4Unicast => write!(f, "ipv4-unicast"),
        }
    }
}

/// Decoded reachability information, one variant per family the speaker
/// may deliver. A VPN instance only ever accepts the labeled-VPN family;
/// anything else reaching it means the route-target scoping upstream is
/// misconfigured.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Nlri {
    LabeledVpn(LabeledVpnPrefix),
    Ipv4Unicast(Prefix),
}

impl Nlri {
    #[must_use]
    pub fn family(&self) -> NlriFamily {
        match self {
            Nlri::LabeledVpn(_) => NlriFamily::LabeledVpn,
            Nlri::Ipv4Unicast(_) => NlriFamily::Ipv4Unicast,
        }
    }
}

impl Display for Nlri {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Nlri::LabeledVpn(vpn) => write!(f, "{vpn}"),
            Nlri::Ipv4Unicast(prefix) => write!(f, "{prefix}"),
        }
    }
}
