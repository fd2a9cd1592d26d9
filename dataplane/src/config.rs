// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! Opaque driver configuration

use std::collections::BTreeMap;

use serde::Deserialize;

/// Configuration key for the dataplane-facing local address override.
pub const LOCAL_ADDRESS_KEY: &str = "dataplane_local_address";

/// Key/value configuration handed to a driver at construction.
///
/// The generic driver shell only interprets [`LOCAL_ADDRESS_KEY`];
/// every other key passes through opaquely to the concrete backend.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(transparent)]
pub struct DriverConfig(BTreeMap<String, String>);

impl DriverConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DriverConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
