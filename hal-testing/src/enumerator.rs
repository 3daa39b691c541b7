// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use hal_core::{Enumerator, Hal, devtree};
use hal_types::{Device, keys};
use tracing::warn;

/// One kernel device of a fixture tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureDevice {
    /// Bus name, e.g. `uhub0`.
    pub name: String,
    /// Bus name of the parent; `None` hangs the device off the computer.
    pub parent: Option<String>,
    pub ignore: bool,
}

impl FixtureDevice {
    pub fn new(name: &str, parent: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            parent: parent.map(str::to_string),
            ignore: false,
        }
    }

    pub fn ignored(mut self) -> Self {
        self.ignore = true;
        self
    }
}

/// Adds every fixture device not yet in GDL, parents before children, and
/// counts how often it was asked to probe or tick.
#[derive(Debug, Clone, Default)]
pub struct FixtureEnumerator {
    devices: Vec<FixtureDevice>,
    probes: Arc<AtomicUsize>,
    ticks: Arc<AtomicUsize>,
}

impl FixtureEnumerator {
    pub fn new(devices: Vec<FixtureDevice>) -> Self {
        Self {
            devices,
            probes: Arc::new(AtomicUsize::new(0)),
            ticks: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn ticks(&self) -> usize {
        self.ticks.load(Ordering::SeqCst)
    }
}

impl Enumerator for FixtureEnumerator {
    fn name(&self) -> &'static str {
        "fixture"
    }

    fn probe(&mut self, hal: &mut Hal) {
        self.probes.fetch_add(1, Ordering::SeqCst);

        for fixture in &self.devices {
            if devtree::find_from_name(hal.gdl(), &fixture.name).is_some() {
                continue;
            }

            let parent = fixture
                .parent
                .as_deref()
                .and_then(|name| devtree::find_from_name(hal.gdl(), name));
            let mut device = hal.new_device(parent);

            if let Err(error) = prepare(hal, &mut device, fixture) {
                warn!(name = %fixture.name, "fixture device rejected: {error}");
                continue;
            }

            if let Err(error) = hal.preprobe_and_add(device) {
                warn!(name = %fixture.name, "fixture device not added: {error}");
            }
        }
    }

    fn tick(&mut self, _hal: &mut Hal) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
    }
}

fn prepare(hal: &Hal, device: &mut Device, fixture: &FixtureDevice) -> hal_core::Result<()> {
    devtree::set_bus_name(device, &fixture.name)?;
    hal.set_udi(device, &fixture.name)?;
    if fixture.ignore {
        device.set_property(keys::INFO_IGNORE, true)?;
    }
    Ok(())
}
