// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! The VRF: route tracking and dataplane synchronization for one tenant
//! forwarding instance.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ahash::RandomState;
use derive_builder::Builder;
use tracing::{debug, error, info, warn};

use bgp::{
    Candidate, LabeledVpnPrefix, Nlri, PathAttributes, RouteAdvertiser, RouteDistinguisher,
    RouteEntry, RouteEvent, RouteOrdering, RouteTarget,
};
use dataplane::{Driver, InstanceSpec, VpnInstanceDataplane};
use net::{Mac, MplsLabel, Prefix};

use crate::errors::VpnError;

/// Construction parameters for a [`Vrf`].
#[derive(Builder, Clone, Debug)]
pub struct VrfParams {
    pub instance_id: u32,
    #[builder(setter(into))]
    pub external_id: String,
    pub gateway_ip: Ipv4Addr,
    pub mask: u8,
    #[builder(default)]
    pub instance_label: Option<MplsLabel>,
    /// The engine's BGP-facing address; seeds the route distinguisher and
    /// the next hop of synthesized routes when the driver has no local
    /// address override.
    pub bgp_local_address: Ipv4Addr,
    #[builder(default)]
    pub export_targets: Vec<RouteTarget>,
    #[builder(default)]
    pub import_targets: Vec<RouteTarget>,
}

/// Candidate routes for one tracked key, plus the settled best.
#[derive(Default)]
struct TrackedEntry {
    /// At most one candidate per origin peer.
    candidates: Vec<Candidate>,
    best: Option<Candidate>,
}

/// Everything the per-instance critical section protects: the tracked
/// route mapping, the advertised local endpoints, and the dataplane
/// handle itself.
struct VrfState {
    dataplane: Box<dyn VpnInstanceDataplane>,
    tracked: HashMap<Prefix, TrackedEntry, RandomState>,
    local: HashMap<(Mac, Prefix), RouteEntry, RandomState>,
}

/// A per-tenant VPN forwarding instance.
///
/// Subscribed (by the external speaker) to a route-target-scoped feed of
/// advertisements and withdrawals, it keeps per-destination best-route
/// state and drives its dataplane handle to match. It also synthesizes
/// and advertises routes for locally plugged interfaces.
///
/// All route callbacks and vif handlers for one instance are serialized
/// by one internal lock; distinct instances share nothing and never block
/// each other.
pub struct Vrf {
    instance_id: u32,
    external_id: String,
    bgp_local_address: Ipv4Addr,
    export_targets: Vec<RouteTarget>,
    import_targets: Vec<RouteTarget>,
    driver: Arc<Driver>,
    advertiser: Arc<dyn RouteAdvertiser>,
    ordering: Arc<dyn RouteOrdering>,
    inner: Mutex<VrfState>,
}

impl std::fmt::Debug for Vrf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vrf")
            .field("instance_id", &self.instance_id)
            .field("external_id", &self.external_id)
            .field("driver", &self.driver.name())
            .finish_non_exhaustive()
    }
}

impl Vrf {
    /// Provision a new instance: asks the driver for a dataplane handle
    /// (which triggers the driver's one-shot state reset on the first
    /// instance process-wide).
    pub fn new(
        params: VrfParams,
        driver: Arc<Driver>,
        advertiser: Arc<dyn RouteAdvertiser>,
        ordering: Arc<dyn RouteOrdering>,
    ) -> Result<Vrf, VpnError> {
        let spec = InstanceSpec {
            instance_id: params.instance_id,
            external_id: params.external_id.clone(),
            gateway_ip: params.gateway_ip,
            mask: params.mask,
            instance_label: params.instance_label,
        };
        let dataplane = driver.create_instance(spec)?;
        info!(
            "created VPN instance {} ('{}') on driver {}",
            params.instance_id,
            params.external_id,
            driver.name()
        );
        Ok(Vrf {
            instance_id: params.instance_id,
            external_id: params.external_id,
            bgp_local_address: params.bgp_local_address,
            export_targets: params.export_targets,
            import_targets: params.import_targets,
            driver,
            advertiser,
            ordering,
            inner: Mutex::new(VrfState {
                dataplane,
                tracked: HashMap::with_hasher(RandomState::with_seed(0)),
                local: HashMap::with_hasher(RandomState::with_seed(0)),
            }),
        })
    }

    #[must_use]
    pub fn instance_id(&self) -> u32 {
        self.instance_id
    }

    #[must_use]
    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    /// Route targets this instance wants its feed scoped by.
    #[must_use]
    pub fn import_targets(&self) -> &[RouteTarget] {
        &self.import_targets
    }

    fn lock(&self) -> MutexGuard<'_, VrfState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Map a received route to its tracked key.
    ///
    /// Only the labeled-VPN family is acceptable here; anything else
    /// means the subscription filtering upstream is broken and fails
    /// loudly.
    fn tracked_key(&self, entry: &RouteEntry) -> Result<Prefix, VpnError> {
        match &entry.nlri {
            Nlri::LabeledVpn(vpn) => Ok(vpn.prefix),
            other => Err(VpnError::UnexpectedNlri {
                instance: self.instance_id,
                family: other.family(),
            }),
        }
    }

    /// Entry point for the speaker's route-target-scoped feed.
    ///
    /// Updates the candidate set for the route's key, re-runs best-path
    /// selection, and pushes any change of outcome into the dataplane.
    /// Dataplane failures are logged and absorbed; the control-plane
    /// decision stands (see [`resync`](Self::resync)).
    pub fn handle_route_event(&self, event: &RouteEvent) -> Result<(), VpnError> {
        let key = self.tracked_key(event.entry())?;
        let mut state = self.lock();

        let (old_best, new_best) = {
            let tracked = state.tracked.entry(key).or_default();
            match event {
                RouteEvent::Advertise { peer, entry } => {
                    tracked.candidates.retain(|c| c.peer != *peer);
                    tracked.candidates.push(Candidate {
                        peer: *peer,
                        entry: entry.clone(),
                    });
                }
                RouteEvent::Withdraw { peer, .. } => {
                    tracked.candidates.retain(|c| c.peer != *peer);
                }
            }
            let new_best = tracked
                .candidates
                .iter()
                .max_by(|a, b| self.ordering.compare(a, b))
                .cloned();
            let old_best = tracked.best.take();
            tracked.best = new_best.clone();
            (old_best, new_best)
        };

        match (&old_best, &new_best) {
            (old, Some(best)) if old.as_ref() != Some(best) => {
                info!(
                    "instance {}: new best route for {key}: {} (from {})",
                    self.instance_id, best.entry, best.peer
                );
                self.install_best(&state, key, best)?;
            }
            (Some(old), None) => {
                info!(
                    "instance {}: best route for {key} withdrawn, no candidate left",
                    self.instance_id
                );
                self.uninstall_best(&state, key, old);
                state.tracked.remove(&key);
            }
            (None, None) => {
                // stray or duplicate withdraw; nothing was ever selected,
                // so drop the entry the lookup just created
                debug!(
                    "instance {}: withdraw for untracked key {key}",
                    self.instance_id
                );
                state.tracked.remove(&key);
            }
            _ => {
                debug!("instance {}: best route for {key} unchanged", self.instance_id);
            }
        }
        Ok(())
    }

    /// Reflect a (possibly new) best route into the dataplane, subject to
    /// encapsulation negotiation.
    fn install_best(
        &self,
        state: &VrfState,
        key: Prefix,
        best: &Candidate,
    ) -> Result<(), VpnError> {
        let negotiated = self
            .driver
            .capabilities()
            .negotiate(&best.entry.attrs.encaps);
        if negotiated.is_empty() {
            // deliberate degraded state: tracked but not forwarded
            warn!(
                "instance {}: no encapsulation in common with {} for {key}, not programming dataplane",
                self.instance_id, best.peer
            );
            return Ok(());
        }
        let label = self.route_label(key, &best.entry)?;
        if let Err(e) = state.dataplane.setup_remote_endpoint(
            key,
            best.entry.attrs.next_hop,
            label,
            &best.entry.nlri,
            &negotiated,
            0,
        ) {
            error!(
                "instance {}: failed to install forwarding state for {key}: {e}",
                self.instance_id
            );
        }
        Ok(())
    }

    /// Retract the forwarding state of a withdrawn best route. Removing
    /// state that was never installed is a no-op by the handle contract.
    fn uninstall_best(&self, state: &VrfState, key: Prefix, old: &Candidate) {
        let label = match self.route_label(key, &old.entry) {
            Ok(label) => label,
            Err(e) => {
                error!("instance {}: {e}", self.instance_id);
                return;
            }
        };
        let negotiated = self.driver.capabilities().negotiate(&old.entry.attrs.encaps);
        if let Err(e) = state.dataplane.remove_remote_endpoint(
            key,
            old.entry.attrs.next_hop,
            label,
            &old.entry.nlri,
            &negotiated,
            0,
        ) {
            error!(
                "instance {}: failed to remove forwarding state for {key}: {e}",
                self.instance_id
            );
        }
    }

    fn route_label(&self, key: Prefix, entry: &RouteEntry) -> Result<MplsLabel, VpnError> {
        match &entry.nlri {
            Nlri::LabeledVpn(vpn) => vpn.label().ok_or(VpnError::MissingLabel(key)),
            _ => Err(VpnError::UnexpectedNlri {
                instance: self.instance_id,
                family: entry.nlri.family(),
            }),
        }
    }

    /// Build the outbound route representing one plugged local endpoint.
    fn synthesize_local_route(
        &self,
        ip: Prefix,
        label: MplsLabel,
    ) -> Result<RouteEntry, VpnError> {
        let rd = RouteDistinguisher::for_instance(self.bgp_local_address, self.instance_id)?;
        let next_hop = self
            .driver
            .local_address()
            .unwrap_or(self.bgp_local_address);
        let attrs = PathAttributes::new(IpAddr::V4(next_hop))
            .with_encaps(self.driver.supported_encaps().iter().copied());
        Ok(RouteEntry {
            nlri: Nlri::LabeledVpn(LabeledVpnPrefix::new(rd, ip, label)),
            route_targets: self.export_targets.clone(),
            attrs,
        })
    }

    /// A vif was attached to this instance: plug it into the dataplane
    /// and advertise reachability for it.
    pub fn plug_vif(
        &self,
        mac: Mac,
        ip: Prefix,
        port: &str,
        label: MplsLabel,
    ) -> Result<(), VpnError> {
        let mut state = self.lock();
        if let Err(e) = state.dataplane.plug_local_endpoint(mac, ip, port, label) {
            error!(
                "instance {}: failed to plug {mac} {ip}: {e}",
                self.instance_id
            );
        }
        let entry = self.synthesize_local_route(ip, label)?;
        info!(
            "instance {}: advertising local endpoint route {}",
            self.instance_id, entry
        );
        self.advertiser.advertise(&entry)?;
        state.local.insert((mac, ip), entry);
        Ok(())
    }

    /// A vif was detached: withdraw its route and unplug it. With
    /// `last_endpoint` the backend may release per-instance shared
    /// resources.
    pub fn unplug_vif(
        &self,
        mac: Mac,
        ip: Prefix,
        port: &str,
        label: MplsLabel,
        last_endpoint: bool,
    ) -> Result<(), VpnError> {
        let mut state = self.lock();
        let entry = state
            .local
            .remove(&(mac, ip))
            .ok_or(VpnError::UnknownEndpoint { mac, ip })?;
        if let Err(e) =
            state
                .dataplane
                .unplug_local_endpoint(mac, ip, port, label, last_endpoint)
        {
            error!(
                "instance {}: failed to unplug {mac} {ip}: {e}",
                self.instance_id
            );
        }
        info!(
            "instance {}: withdrawing local endpoint route {}",
            self.instance_id, entry
        );
        self.advertiser.withdraw(&entry)?;
        Ok(())
    }

    /// Replay every settled best route into the dataplane.
    ///
    /// Recovery hook for failed dataplane mutations: install calls are
    /// idempotent by the handle contract, so this is safe to run at any
    /// time, and it runs inside the same critical section as everything
    /// else.
    pub fn resync(&self) -> Result<(), VpnError> {
        let state = self.lock();
        info!("instance {}: resyncing dataplane", self.instance_id);
        let settled: Vec<(Prefix, Candidate)> = state
            .tracked
            .iter()
            .filter_map(|(key, tracked)| tracked.best.clone().map(|best| (*key, best)))
            .collect();
        for (key, best) in settled {
            self.install_best(&state, key, &best)?;
        }
        Ok(())
    }

    /// The settled best route for a key, if any.
    #[must_use]
    pub fn best_route(&self, key: &Prefix) -> Option<RouteEntry> {
        self.lock()
            .tracked
            .get(key)
            .and_then(|t| t.best.as_ref().map(|c| c.entry.clone()))
    }

    /// Number of destinations currently tracked.
    #[must_use]
    pub fn tracked_len(&self) -> usize {
        self.lock().tracked.len()
    }

    /// Tear the instance down: withdraw remaining local routes and
    /// release the dataplane handle.
    pub fn cleanup(&self) {
        let mut state = self.lock();
        for (_, entry) in state.local.drain() {
            if let Err(e) = self.advertiser.withdraw(&entry) {
                error!(
                    "instance {}: failed to withdraw {entry} during teardown: {e}",
                    self.instance_id
                );
            }
        }
        if let Err(e) = state.dataplane.cleanup() {
            error!(
                "instance {}: dataplane cleanup failed: {e}",
                self.instance_id
            );
        }
        info!("instance {} ('{}') torn down", self.instance_id, self.external_id);
    }
}
