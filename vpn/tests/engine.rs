// SPDX-License-Identifier: Apache-2.0
// Copyright The Vpnd Authors

//! End-to-end engine behavior over call-recording doubles, plus the
//! locking contract: callbacks on one instance serialize, distinct
//! instances never block each other.

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use bgp::testing::RecordingSpeaker;
use bgp::{
    LabeledVpnPrefix, Nlri, PathAttributes, RouteDistinguisher, RouteEntry, RouteEvent,
    RouteTarget, StandardOrder,
};
use cmd::testing::CannedRunner;
use dataplane::testing::{DataplaneCall, RecordingBackend};
use dataplane::{
    CapabilityFlags, DataplaneError, Driver, DriverBackend, DriverCapabilities, DriverConfig,
    DriverMode, InstanceSpec, VpnInstanceDataplane,
};
use net::{Encapsulation, Mac, MplsLabel, Prefix};
use vpnd_vpn::{InstanceConfig, VpnManager};

fn instance_config(external_id: &str) -> InstanceConfig {
    InstanceConfig {
        external_id: external_id.to_owned(),
        gateway_ip: Ipv4Addr::new(10, 0, 0, 1),
        mask: 24,
        instance_label: None,
        encapsulation: Encapsulation::MplsGre,
        export_targets: vec![RouteTarget::new(64512, 70)],
        import_targets: vec![RouteTarget::new(64512, 70)],
    }
}

fn remote_route(prefix: &str, next_hop: &str, label: u32) -> RouteEntry {
    let rd =
        RouteDistinguisher::for_instance(Ipv4Addr::new(203, 0, 113, 1), 9).expect("rd");
    RouteEntry {
        nlri: Nlri::LabeledVpn(LabeledVpnPrefix::new(
            rd,
            prefix.parse().expect("prefix"),
            MplsLabel::new(label).expect("label"),
        )),
        route_targets: vec![RouteTarget::new(64512, 70)],
        attrs: PathAttributes::new(next_hop.parse().expect("next hop"))
            .with_encaps([Encapsulation::MplsGre]),
    }
}

fn advertised_by(peer: &str, entry: RouteEntry) -> RouteEvent {
    RouteEvent::Advertise {
        peer: peer.parse().expect("peer"),
        entry,
    }
}

/// Full provisioning path: driver without a configured local address,
/// one instance, one remote route, exactly one dataplane install.
#[test]
fn route_advertisement_programs_the_dataplane_once() {
    let backend = RecordingBackend::with_encaps([Encapsulation::MplsGre]);
    let journal = backend.journal();
    let runner = CannedRunner::new();
    let driver = Driver::new(
        Box::new(backend),
        &runner,
        DriverConfig::new(),
        DriverMode::Full,
    )
    .expect("driver");
    assert_eq!(driver.local_address(), None, "no local address configured");

    let mut manager = VpnManager::new(
        Ipv4Addr::new(192, 0, 2, 1),
        Arc::new(RecordingSpeaker::new()),
        Arc::new(StandardOrder),
    );
    manager.register_driver(Encapsulation::MplsGre, driver);

    let vrf = manager
        .create_instance(instance_config("tenant-A"))
        .expect("create");
    assert_eq!(vrf.instance_id(), 1);
    assert_eq!(journal.resets(), 1, "first instance resets dataplane state");

    vrf.handle_route_event(&advertised_by(
        "192.0.2.9",
        remote_route("10.0.5.0/24", "192.0.2.9", 42),
    ))
    .expect("route handled");

    let forwarding = journal.forwarding_calls();
    assert_eq!(forwarding.len(), 1);
    match &forwarding[0] {
        DataplaneCall::Setup {
            instance_id,
            prefix,
            remote_pe,
            label,
            encaps,
            lb_order,
        } => {
            assert_eq!(*instance_id, 1);
            assert_eq!(prefix.to_string(), "10.0.5.0/24");
            assert_eq!(remote_pe.to_string(), "192.0.2.9");
            assert_eq!(label.as_u32(), 42);
            assert_eq!(encaps, &BTreeSet::from([Encapsulation::MplsGre]));
            assert_eq!(*lb_order, 0);
        }
        other => panic!("expected a setup call, got {other:?}"),
    }
}

/// Plug, learn, withdraw, unplug, delete: the whole tenant lifecycle
/// leaves the dataplane and the speaker with nothing dangling.
#[test]
fn tenant_lifecycle_leaves_no_dangling_state() {
    let backend = RecordingBackend::with_encaps([Encapsulation::MplsGre]);
    let journal = backend.journal();
    let runner = CannedRunner::new();
    let driver = Driver::new(
        Box::new(backend),
        &runner,
        DriverConfig::new(),
        DriverMode::Full,
    )
    .expect("driver");
    let speaker = Arc::new(RecordingSpeaker::new());
    let mut manager = VpnManager::new(
        Ipv4Addr::new(192, 0, 2, 1),
        speaker.clone(),
        Arc::new(StandardOrder),
    );
    manager.register_driver(Encapsulation::MplsGre, driver);

    let vrf = manager
        .create_instance(instance_config("tenant-A"))
        .expect("create");
    let mac: Mac = "de:ad:be:ef:00:01".parse().expect("mac");
    let ip: Prefix = "10.0.0.5/32".parse().expect("prefix");
    let label = MplsLabel::new(7).expect("label");

    manager
        .plug_vif("tenant-A", mac, ip, "tap123", label)
        .expect("plug");

    let route = remote_route("10.0.5.0/24", "192.0.2.9", 42);
    vrf.handle_route_event(&advertised_by("192.0.2.9", route.clone()))
        .expect("advertise");
    vrf.handle_route_event(&RouteEvent::Withdraw {
        peer: "192.0.2.9".parse().expect("peer"),
        entry: route,
    })
    .expect("withdraw");
    assert_eq!(vrf.tracked_len(), 0);

    manager
        .unplug_vif("tenant-A", mac, ip, "tap123", label, true)
        .expect("unplug");
    manager.delete_instance("tenant-A").expect("delete");

    // speaker: one advertise, one withdraw, nothing left to retract at teardown
    assert_eq!(speaker.calls().len(), 2);
    // dataplane: setup/remove paired up, then instance cleanup
    let forwarding = journal.forwarding_calls();
    assert_eq!(forwarding.len(), 2);
    assert!(journal
        .calls()
        .contains(&DataplaneCall::InstanceCleanup { instance_id: 1 }));
}

/// Backend whose remote-endpoint installs block until the test opens a
/// gate, for observing lock behavior from outside.
struct Gate {
    inner: Mutex<GateState>,
    cv: Condvar,
}

#[derive(Default)]
struct GateState {
    open: bool,
    waiting: usize,
}

impl Gate {
    fn new() -> Arc<Self> {
        Arc::new(Gate {
            inner: Mutex::new(GateState::default()),
            cv: Condvar::new(),
        })
    }

    fn pass(&self) {
        let mut state = self.inner.lock().expect("lock poisoned");
        state.waiting += 1;
        self.cv.notify_all();
        while !state.open {
            state = self.cv.wait(state).expect("lock poisoned");
        }
        state.waiting -= 1;
    }

    fn open(&self) {
        self.inner.lock().expect("lock poisoned").open = true;
        self.cv.notify_all();
    }

    /// Block until at least one thread is parked at the gate.
    fn wait_for_waiter(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.lock().expect("lock poisoned");
        while state.waiting == 0 {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return false;
            }
            let (next, _) = self.cv.wait_timeout(state, left).expect("lock poisoned");
            state = next;
        }
        true
    }
}

struct GatedBackend {
    caps: DriverCapabilities,
    gate: Arc<Gate>,
}

impl GatedBackend {
    fn new(gate: Arc<Gate>) -> Self {
        Self {
            caps: DriverCapabilities::new(
                [Encapsulation::MplsGre],
                CapabilityFlags::empty(),
            ),
            gate,
        }
    }
}

impl DriverBackend for GatedBackend {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn capabilities(&self) -> &DriverCapabilities {
        &self.caps
    }

    fn init(&self, _config: &DriverConfig) -> Result<(), DataplaneError> {
        Ok(())
    }

    fn reset_state(&self) -> Result<(), DataplaneError> {
        Ok(())
    }

    fn cleanup(&self) {}

    fn new_instance(
        &self,
        _spec: InstanceSpec,
    ) -> Result<Box<dyn VpnInstanceDataplane>, DataplaneError> {
        Ok(Box::new(GatedInstance {
            gate: self.gate.clone(),
        }))
    }
}

struct GatedInstance {
    gate: Arc<Gate>,
}

impl VpnInstanceDataplane for GatedInstance {
    fn plug_local_endpoint(
        &self,
        _mac: Mac,
        _ip: Prefix,
        _port: &str,
        _label: MplsLabel,
    ) -> Result<(), DataplaneError> {
        Ok(())
    }

    fn unplug_local_endpoint(
        &self,
        _mac: Mac,
        _ip: Prefix,
        _port: &str,
        _label: MplsLabel,
        _last_endpoint: bool,
    ) -> Result<(), DataplaneError> {
        Ok(())
    }

    fn setup_remote_endpoint(
        &self,
        _prefix: Prefix,
        _remote_pe: IpAddr,
        _label: MplsLabel,
        _nlri: &Nlri,
        _encaps: &BTreeSet<Encapsulation>,
        _lb_order: u32,
    ) -> Result<(), DataplaneError> {
        self.gate.pass();
        Ok(())
    }

    fn remove_remote_endpoint(
        &self,
        _prefix: Prefix,
        _remote_pe: IpAddr,
        _label: MplsLabel,
        _nlri: &Nlri,
        _encaps: &BTreeSet<Encapsulation>,
        _lb_order: u32,
    ) -> Result<(), DataplaneError> {
        Ok(())
    }

    fn cleanup(&self) -> Result<(), DataplaneError> {
        Ok(())
    }
}

fn gated_manager(gate: Arc<Gate>) -> VpnManager {
    let runner = CannedRunner::new();
    let driver = Driver::new(
        Box::new(GatedBackend::new(gate)),
        &runner,
        DriverConfig::new(),
        DriverMode::Full,
    )
    .expect("driver");
    let mut manager = VpnManager::new(
        Ipv4Addr::new(192, 0, 2, 1),
        Arc::new(RecordingSpeaker::new()),
        Arc::new(StandardOrder),
    );
    manager.register_driver(Encapsulation::MplsGre, driver);
    manager
}

const GATE_TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn callbacks_on_one_instance_are_serialized() {
    let gate = Gate::new();
    let manager = gated_manager(gate.clone());
    let vrf = manager
        .create_instance(instance_config("tenant-A"))
        .expect("create");

    let vrf_for_route = vrf.clone();
    let route_thread = thread::spawn(move || {
        vrf_for_route
            .handle_route_event(&advertised_by(
                "192.0.2.9",
                remote_route("10.0.5.0/24", "192.0.2.9", 42),
            ))
            .expect("route handled");
    });
    assert!(
        gate.wait_for_waiter(GATE_TIMEOUT),
        "route callback must reach the dataplane"
    );

    // a vif plug on the same instance must wait for the route callback
    let vrf_for_plug = vrf.clone();
    let plug_thread = thread::spawn(move || {
        let mac: Mac = "de:ad:be:ef:00:01".parse().expect("mac");
        let ip: Prefix = "10.0.0.5/32".parse().expect("prefix");
        vrf_for_plug
            .plug_vif(mac, ip, "tap123", MplsLabel::new(7).expect("label"))
            .expect("plug");
    });
    thread::sleep(Duration::from_millis(100));
    assert!(
        !plug_thread.is_finished(),
        "same-instance work must not proceed while a callback holds the lock"
    );

    gate.open();
    route_thread.join().expect("route thread");
    plug_thread.join().expect("plug thread");
}

#[test]
fn distinct_instances_do_not_block_each_other() {
    let gate = Gate::new();
    let manager = gated_manager(gate.clone());
    let vrf_a = manager
        .create_instance(instance_config("tenant-A"))
        .expect("create a");
    let vrf_b = manager
        .create_instance(instance_config("tenant-B"))
        .expect("create b");

    let blocked = thread::spawn(move || {
        vrf_a
            .handle_route_event(&advertised_by(
                "192.0.2.9",
                remote_route("10.0.5.0/24", "192.0.2.9", 42),
            ))
            .expect("route handled");
    });
    assert!(
        gate.wait_for_waiter(GATE_TIMEOUT),
        "instance A must reach the dataplane"
    );

    // instance B makes progress while A is stuck in its dataplane call;
    // its own install parks at the same gate, which is exactly the
    // progress being asserted
    let other = thread::spawn(move || {
        vrf_b
            .handle_route_event(&advertised_by(
                "192.0.2.10",
                remote_route("10.0.6.0/24", "192.0.2.10", 43),
            ))
            .expect("route handled");
    });
    let deadline = Instant::now() + GATE_TIMEOUT;
    loop {
        let waiting = gate.inner.lock().expect("lock poisoned").waiting;
        if waiting >= 2 {
            break;
        }
        assert!(
            Instant::now() < deadline,
            "instance B must not be blocked by instance A's callback"
        );
        thread::sleep(Duration::from_millis(10));
    }

    gate.open();
    blocked.join().expect("thread a");
    other.join().expect("thread b");
}
