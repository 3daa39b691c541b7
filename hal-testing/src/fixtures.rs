// SPDX-License-Identifier: GPL-3.0-only

use hal_core::{ComputerInfo, Daemon, Hal, HalConfig, MergeRules, NoMergeRules};

use crate::{FakeCallouts, FixtureDevice, FixtureEnumerator};

pub fn computer() -> ComputerInfo {
    ComputerInfo {
        hal_version: "0.5.14".to_string(),
        kernel_name: Some("FreeBSD".to_string()),
        kernel_version: Some("14.1-RELEASE".to_string()),
        kernel_machine: Some("amd64".to_string()),
        probe_smbios: false,
    }
}

pub fn hal(callouts: &FakeCallouts) -> Hal {
    hal_with_rules(callouts, NoMergeRules)
}

pub fn hal_with_rules(callouts: &FakeCallouts, rules: impl MergeRules + 'static) -> Hal {
    let (handle, source) = hal_core::channel();
    Hal::new(HalConfig::default(), handle, source, rules, callouts.clone())
}

/// ```text
/// usbus0
/// └── uhub0
///     ├── ugen0
///     └── umass0
///         └── da0
/// ```
pub fn usb_tree() -> Vec<FixtureDevice> {
    vec![
        FixtureDevice::new("usbus0", None),
        FixtureDevice::new("uhub0", Some("usbus0")),
        FixtureDevice::new("ugen0", Some("uhub0")),
        FixtureDevice::new("umass0", Some("uhub0")),
        FixtureDevice::new("da0", Some("umass0")),
    ]
}

/// Daemon over [`hal`] with one enumerator; nothing is probed yet.
pub fn daemon(callouts: &FakeCallouts, enumerator: &FixtureEnumerator) -> Daemon {
    let mut daemon = Daemon::new(hal(callouts), computer());
    daemon.add_enumerator(enumerator.clone());
    daemon
}
