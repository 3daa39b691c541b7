// SPDX-License-Identifier: GPL-3.0-only

use hal_types::DeviceId;

use crate::pipeline::Hal;

/// A bus-specific source of devices.
///
/// Enumerators run in registration order, so one that holds devices back in
/// the pending list can rely on every later enumerator seeing those UDIs as
/// taken.
pub trait Enumerator: Send {
    fn name(&self) -> &'static str;

    /// Walk the bus and push every device it finds through the pipeline.
    fn probe(&mut self, hal: &mut Hal);

    /// Rebuild one live device from scratch. Returns whether this enumerator
    /// took care of it.
    fn reprobe_device(&mut self, _hal: &mut Hal, _id: DeviceId) -> bool {
        false
    }

    /// Periodic poll for buses that do not report hotplug events.
    fn tick(&mut self, _hal: &mut Hal) {}
}
