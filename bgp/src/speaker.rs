// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! Seam toward the external BGP speaker

use crate::route::RouteEntry;

/// Errors reported by the speaker when it refuses a route.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("bgp speaker rejected {operation} of {route}: {reason}")]
pub struct SpeakerError {
    pub operation: &'static str,
    pub route: String,
    pub reason: String,
}

/// Outbound half of the speaker interface: hand a synthesized route to
/// BGP for advertisement, or take it back.
///
/// The inbound half (decoded [`RouteEvent`](crate::RouteEvent)s) is
/// pushed by the speaker into each instance engine; there is no trait to
/// implement on this side for it.
pub trait RouteAdvertiser: Send + Sync {
    fn advertise(&self, entry: &RouteEntry) -> Result<(), SpeakerError>;
    fn withdraw(&self, entry: &RouteEntry) -> Result<(), SpeakerError>;
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    //! Recording speaker double for engine tests.

    use std::sync::Mutex;

    use super::{RouteAdvertiser, SpeakerError};
    use crate::route::RouteEntry;

    /// What a [`RecordingSpeaker`] saw, in call order.
    #[derive(Clone, Debug, Eq, PartialEq)]
    pub enum SpeakerCall {
        Advertise(RouteEntry),
        Withdraw(RouteEntry),
    }

    #[derive(Debug, Default)]
    pub struct RecordingSpeaker {
        calls: Mutex<Vec<SpeakerCall>>,
    }

    impl RecordingSpeaker {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        #[must_use]
        pub fn calls(&self) -> Vec<SpeakerCall> {
            self.calls.lock().expect("lock poisoned").clone()
        }
    }

    impl RouteAdvertiser for RecordingSpeaker {
        fn advertise(&self, entry: &RouteEntry) -> Result<(), SpeakerError> {
            self.calls
                .lock()
                .expect("lock poisoned")
                .push(SpeakerCall::Advertise(entry.clone()));
            Ok(())
        }

        fn withdraw(&self, entry: &RouteEntry) -> Result<(), SpeakerError> {
            self.calls
                .lock()
                .expect("lock poisoned")
                .push(SpeakerCall::Withdraw(entry.clone()));
            Ok(())
        }
    }
}
