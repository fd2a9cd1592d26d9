// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! Running-kernel version probe

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use cmd::CommandRunner;

use crate::errors::DataplaneError;

/// A kernel release version, reduced to its numeric `major.minor.patch`
/// triple. The distribution suffix (`-91-generic` and friends) is
/// discarded when parsing.
#[derive(Copy, Clone, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub struct KernelVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl KernelVersion {
    #[must_use]
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for KernelVersion {
    type Err = DataplaneError;

    fn from_str(release: &str) -> Result<Self, Self::Err> {
        let bad = || DataplaneError::BadKernelVersion(release.to_owned());
        let numeric = release.split('-').next().ok_or_else(bad)?;
        let mut parts = numeric.split('.');
        let major = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(bad)?;
        let minor = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(bad)?;
        let patch = match parts.next() {
            Some(p) => p.parse().map_err(|_| bad())?,
            None => 0,
        };
        Ok(KernelVersion {
            major,
            minor,
            patch,
        })
    }
}

impl Display for KernelVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Ask the OS for the running kernel version (`uname -r`).
pub fn probe_kernel_version(runner: &dyn CommandRunner) -> Result<KernelVersion, DataplaneError> {
    let output = runner.run("uname", &["-r"])?;
    let release = output
        .first_line()
        .ok_or_else(|| DataplaneError::BadKernelVersion(String::new()))?;
    release.parse()
}
