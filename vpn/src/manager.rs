// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! Process-level ownership: drivers and the live instance set.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ahash::RandomState;
use tracing::{info, warn};

use bgp::{RouteAdvertiser, RouteOrdering, RouteTarget};
use dataplane::Driver;
use net::{Encapsulation, Mac, MplsLabel, Prefix};

use crate::errors::VpnError;
use crate::vrf::{Vrf, VrfParamsBuilder};

/// Provisioning request for one tenant instance.
#[derive(Clone, Debug)]
pub struct InstanceConfig {
    /// Caller-chosen identifier, unique across live instances.
    pub external_id: String,
    pub gateway_ip: Ipv4Addr,
    pub mask: u8,
    pub instance_label: Option<MplsLabel>,
    /// Selects the driver (and thus the dataplane technology).
    pub encapsulation: Encapsulation,
    pub export_targets: Vec<RouteTarget>,
    pub import_targets: Vec<RouteTarget>,
}

struct Instances {
    by_external_id: HashMap<String, Arc<Vrf>, RandomState>,
    next_instance_id: u32,
}

/// Owns the process-wide drivers and the live VRF map.
///
/// Drivers are registered up front, before the manager is shared;
/// afterwards the manager is used behind an `Arc` and the instance map is
/// the only mutable state. The map lock is held for lookup and insert
/// only, never across driver or dataplane calls.
pub struct VpnManager {
    bgp_local_address: Ipv4Addr,
    advertiser: Arc<dyn RouteAdvertiser>,
    ordering: Arc<dyn RouteOrdering>,
    drivers: HashMap<Encapsulation, Arc<Driver>, RandomState>,
    instances: Mutex<Instances>,
}

impl VpnManager {
    #[must_use]
    pub fn new(
        bgp_local_address: Ipv4Addr,
        advertiser: Arc<dyn RouteAdvertiser>,
        ordering: Arc<dyn RouteOrdering>,
    ) -> Self {
        Self {
            bgp_local_address,
            advertiser,
            ordering,
            drivers: HashMap::with_hasher(RandomState::with_seed(0)),
            instances: Mutex::new(Instances {
                by_external_id: HashMap::with_hasher(RandomState::with_seed(0)),
                next_instance_id: 1,
            }),
        }
    }

    /// Register the driver serving `encapsulation`. Replacing a driver
    /// already in use is not supported; call this during startup only.
    pub fn register_driver(&mut self, encapsulation: Encapsulation, driver: Arc<Driver>) {
        info!(
            "registering driver {} for encapsulation {encapsulation}",
            driver.name()
        );
        if self.drivers.insert(encapsulation, driver).is_some() {
            warn!("replaced an already registered driver for {encapsulation}");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Instances> {
        self.instances.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn driver_for(&self, encapsulation: Encapsulation) -> Result<Arc<Driver>, VpnError> {
        self.drivers
            .get(&encapsulation)
            .cloned()
            .ok_or(VpnError::NoDriver(encapsulation))
    }

    /// Provision a new tenant instance and return its engine.
    pub fn create_instance(&self, config: InstanceConfig) -> Result<Arc<Vrf>, VpnError> {
        let driver = self.driver_for(config.encapsulation)?;
        let instance_id = {
            let mut instances = self.lock();
            if instances.by_external_id.contains_key(&config.external_id) {
                return Err(VpnError::InstanceExists(config.external_id));
            }
            let id = instances.next_instance_id;
            instances.next_instance_id += 1;
            id
        };

        // driver and dataplane work happen outside the map lock
        let params = VrfParamsBuilder::default()
            .instance_id(instance_id)
            .external_id(config.external_id.clone())
            .gateway_ip(config.gateway_ip)
            .mask(config.mask)
            .instance_label(config.instance_label)
            .bgp_local_address(self.bgp_local_address)
            .export_targets(config.export_targets)
            .import_targets(config.import_targets)
            .build()
            .map_err(|e| VpnError::InvalidInstanceConfig(e.to_string()))?;
        let vrf = Arc::new(Vrf::new(
            params,
            driver,
            self.advertiser.clone(),
            self.ordering.clone(),
        )?);

        let mut instances = self.lock();
        if instances.by_external_id.contains_key(&config.external_id) {
            // lost the race against a concurrent create of the same id
            drop(instances);
            vrf.cleanup();
            return Err(VpnError::InstanceExists(config.external_id));
        }
        instances
            .by_external_id
            .insert(config.external_id, vrf.clone());
        Ok(vrf)
    }

    /// Look up a live instance by external id.
    pub fn instance(&self, external_id: &str) -> Result<Arc<Vrf>, VpnError> {
        self.lock()
            .by_external_id
            .get(external_id)
            .cloned()
            .ok_or_else(|| VpnError::NoSuchInstance(external_id.to_owned()))
    }

    /// Tear an instance down and forget it.
    pub fn delete_instance(&self, external_id: &str) -> Result<(), VpnError> {
        let vrf = self
            .lock()
            .by_external_id
            .remove(external_id)
            .ok_or_else(|| VpnError::NoSuchInstance(external_id.to_owned()))?;
        vrf.cleanup();
        Ok(())
    }

    /// Dispatch a vif attach to the owning instance.
    pub fn plug_vif(
        &self,
        external_id: &str,
        mac: Mac,
        ip: Prefix,
        port: &str,
        label: MplsLabel,
    ) -> Result<(), VpnError> {
        self.instance(external_id)?.plug_vif(mac, ip, port, label)
    }

    /// Dispatch a vif detach to the owning instance.
    pub fn unplug_vif(
        &self,
        external_id: &str,
        mac: Mac,
        ip: Prefix,
        port: &str,
        label: MplsLabel,
        last_endpoint: bool,
    ) -> Result<(), VpnError> {
        self.instance(external_id)?
            .unplug_vif(mac, ip, port, label, last_endpoint)
    }

    /// External ids of the live instances, unordered.
    #[must_use]
    pub fn instance_ids(&self) -> Vec<String> {
        self.lock().by_external_id.keys().cloned().collect()
    }

    /// Tear down every instance, then release the drivers.
    pub fn cleanup(&self) {
        let drained: Vec<Arc<Vrf>> = {
            let mut instances = self.lock();
            instances.by_external_id.drain().map(|(_, v)| v).collect()
        };
        for vrf in drained {
            vrf.cleanup();
        }
        for driver in self.drivers.values() {
            driver.cleanup();
        }
        info!("vpn manager torn down");
    }
}
