// SPDX-License-Identifier: GPL-3.0-only

use hal_testing::{FakeCallouts, FixtureEnumerator, fixtures};
use hal_types::keys;
use serde_json::{Value, json};

#[test]
fn probed_tree_dumps_as_json() {
    let callouts = FakeCallouts::new();
    let enumerator = FixtureEnumerator::new(fixtures::usb_tree());
    let mut daemon = fixtures::daemon(&callouts, &enumerator);
    daemon.probe().expect("probe");

    let devices: Vec<_> = daemon.hal().gdl().iter().collect();
    let dump = serde_json::to_value(&devices).expect("serialize tree");
    let Value::Array(entries) = dump else {
        panic!("tree should dump as an array");
    };
    assert_eq!(entries.len(), 6);

    let computer = &entries[0];
    assert_eq!(computer["udi"], json!(keys::COMPUTER_UDI));
    assert_eq!(computer["ignored"], json!(false));
    assert_eq!(
        computer["properties"][keys::INFO_PRODUCT],
        json!({ "type": "string", "value": "Computer" })
    );

    let da0 = entries
        .iter()
        .find(|entry| entry["udi"] == json!("/org/freedesktop/Hal/devices/da0"))
        .expect("da0 dumped");
    assert_eq!(
        da0["properties"][keys::INFO_PARENT]["value"],
        json!("/org/freedesktop/Hal/devices/umass0")
    );
    assert_eq!(
        da0["properties"][keys::BUS_UNIT],
        json!({ "type": "int32", "value": 0 })
    );
}
