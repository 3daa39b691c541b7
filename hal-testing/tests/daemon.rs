// SPDX-License-Identifier: GPL-3.0-only

use std::ops::ControlFlow;

use hal_core::computer::SMBIOS_HELPER;
use hal_core::{
    CalloutPhase, ComputerInfo, Daemon, LoopEvent, Query, RulePhase, StaticRules,
};
use hal_testing::{Call, FakeCallouts, FixtureEnumerator, fixtures};
use hal_types::{Value, keys};

fn udi(short: &str) -> String {
    format!("/org/freedesktop/Hal/devices/{short}")
}

#[test]
fn rescan_tick_reaches_every_enumerator() {
    let callouts = FakeCallouts::new();
    let first = FixtureEnumerator::new(fixtures::usb_tree());
    let second = FixtureEnumerator::new(Vec::new());
    let mut daemon = fixtures::daemon(&callouts, &first);
    daemon.add_enumerator(second.clone());
    daemon.probe().expect("probe");

    assert_eq!(daemon.handle_event(LoopEvent::Rescan), ControlFlow::Continue(()));
    assert_eq!(daemon.handle_event(LoopEvent::Rescan), ControlFlow::Continue(()));

    assert_eq!(first.ticks(), 2);
    assert_eq!(second.ticks(), 2);
    assert_eq!(first.probes(), 1);
}

#[test]
fn rescan_tick_during_a_wait_is_dropped() {
    let callouts = FakeCallouts::new();
    let enumerator = FixtureEnumerator::new(fixtures::usb_tree());
    let mut daemon = fixtures::daemon(&callouts, &enumerator);
    daemon.probe().expect("probe");
    callouts.inject_during(CalloutPhase::Remove, LoopEvent::Rescan);

    let ugen0 = daemon.hal().gdl().find(&udi("ugen0")).expect("ugen0").id();
    daemon.hal_mut().remove(ugen0).expect("remove");

    assert!(!daemon.hal().has_deferred());
    assert_eq!(daemon.drain_deferred(), ControlFlow::Continue(()));
    assert_eq!(enumerator.ticks(), 0);
}

#[test]
fn run_consumes_events_until_shutdown() {
    let callouts = FakeCallouts::new();
    let enumerator = FixtureEnumerator::new(fixtures::usb_tree());
    let mut daemon = fixtures::daemon(&callouts, &enumerator);
    daemon.probe().expect("probe");

    let handle = daemon.hal().handle();
    assert!(handle.post(LoopEvent::Rescan));
    assert!(handle.post(LoopEvent::Hotplug("-ugen0 at bus=0 on uhub0".to_string())));
    assert!(handle.post(LoopEvent::Shutdown));
    assert!(handle.post(LoopEvent::Hotplug("-da0 at bus=0 on umass0".to_string())));

    daemon.run();

    assert_eq!(enumerator.ticks(), 1);
    assert!(daemon.hal().gdl().find(&udi("ugen0")).is_none());
    // Queued behind the shutdown, so never handled.
    assert!(daemon.hal().gdl().find(&udi("da0")).is_some());
    assert_eq!(callouts.udis_for(CalloutPhase::Remove), vec![udi("ugen0")]);
}

#[test]
fn smbios_helper_runs_before_the_root_is_added() {
    let rules = StaticRules::new().on(
        RulePhase::Preprobe,
        Query::new().string(keys::INFO_PRODUCT, "Computer"),
        [
            ("system.hardware.vendor", Value::from("LENOVO")),
            ("system.hardware.product", Value::from("20HR")),
            ("system.hardware.version", Value::from("ThinkPad X1")),
            ("system.chassis.type", Value::from("Notebook")),
        ],
    );
    let callouts = FakeCallouts::new();
    let computer = ComputerInfo {
        probe_smbios: true,
        ..fixtures::computer()
    };
    let mut daemon = Daemon::new(fixtures::hal_with_rules(&callouts, rules), computer);

    daemon.probe().expect("probe");

    let calls = callouts.calls();
    let helper = calls
        .iter()
        .position(|call| matches!(call, Call::Helper { command, .. } if command == SMBIOS_HELPER))
        .expect("smbios helper ran");
    let add = calls
        .iter()
        .position(|call| matches!(call, Call::Callouts { phase: CalloutPhase::Add, .. }))
        .expect("root added");
    assert!(helper < add);

    let root = daemon.hal().gdl().find(keys::COMPUTER_UDI).expect("root");
    assert_eq!(root.string("system.product"), Some("20HR ThinkPad X1"));
    assert_eq!(root.string("system.formfactor"), Some("laptop"));
}

#[test]
fn ignored_root_is_not_rebuilt_by_later_probes() {
    let rules = StaticRules::new().on(
        RulePhase::Preprobe,
        Query::new().string(keys::INFO_PRODUCT, "Computer"),
        [(keys::INFO_IGNORE, Value::Bool(true))],
    );
    let callouts = FakeCallouts::new();
    let enumerator = FixtureEnumerator::new(fixtures::usb_tree());
    let mut daemon = Daemon::new(fixtures::hal_with_rules(&callouts, rules), fixtures::computer());
    daemon.add_enumerator(enumerator.clone());

    for _ in 0..3 {
        daemon.probe().expect("probe");
    }
    assert_eq!(
        daemon.process_line("+ugen1 at bus=0 on uhub0"),
        hal_core::Handled::Probed
    );

    assert_eq!(daemon.hal().gdl().len(), 1);
    // Nothing is enumerated under an ignored root.
    assert_eq!(enumerator.probes(), 0);
}
