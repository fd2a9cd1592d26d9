// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! Dataplane error type

use cmd::CommandError;

use crate::config::LOCAL_ADDRESS_KEY;

/// Errors raised by drivers and instance handles.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum DataplaneError {
    /// Fatal at driver construction; the process must not start this
    /// driver.
    #[error("malformed {LOCAL_ADDRESS_KEY} '{0}'")]
    BadLocalAddress(String),

    #[error("cannot parse kernel release '{0}'")]
    BadKernelVersion(String),

    #[error(transparent)]
    Command(#[from] CommandError),

    /// Catch-all for backend-specific forwarding-state failures.
    #[error("dataplane backend error: {0}")]
    Backend(String),
}
