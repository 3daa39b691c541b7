// SPDX-License-Identifier: GPL-3.0-only

//! The root `computer` device every other device hangs off

use hal_types::{Device, keys};
use tracing::{debug, info};

use crate::error::Result;
use crate::pipeline::{Hal, Preprobe};

/// Helper filling in `system.hardware.*` and `system.chassis.type`.
pub const SMBIOS_HELPER: &str = "hald-probe-smbios";

/// Facts about the host gathered before the root device is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputerInfo {
    pub hal_version: String,
    pub kernel_name: Option<String>,
    pub kernel_version: Option<String>,
    pub kernel_machine: Option<String>,
    pub probe_smbios: bool,
}

/// Build and add the root device unless GDL already has it.
///
/// Returns whether the root is live afterwards; `false` means preprobe
/// ignored it and nothing should be enumerated underneath.
pub fn ensure_computer_device(hal: &mut Hal, computer: &ComputerInfo) -> Result<bool> {
    // An ignored root no longer carries the computer UDI; find it by id.
    if let Some(root) = hal.root().and_then(|id| hal.gdl().get(id)) {
        return Ok(!root.is_ignored());
    }
    if hal.gdl().find(keys::COMPUTER_UDI).is_some() {
        return Ok(true);
    }

    let mut device = hal.new_root_device();
    hal.set_full_udi(&mut device, keys::COMPUTER_UDI)?;
    describe(&mut device, computer)?;

    let outcome = hal.preprobe(device)?;
    hal.set_root(outcome.id());
    let Preprobe::Accepted(id) = outcome else {
        return Ok(false);
    };

    if computer.probe_smbios {
        let status = hal.run_helper_sync(id, None, SMBIOS_HELPER, &[]);
        debug!(status, "smbios probe finished");
        if let Some(device) = hal.device_mut(id) {
            apply_smbios(device)?;
        }
    }

    hal.add(id)?;
    info!("computer device added");
    Ok(true)
}

fn describe(device: &mut Device, computer: &ComputerInfo) -> Result<()> {
    device.set_property(keys::INFO_SUBSYSTEM, "unknown")?;
    device.set_property(keys::INFO_PRODUCT, "Computer")?;

    device.set_property("org.freedesktop.Hal.version", computer.hal_version.as_str())?;
    let parts: Vec<i32> = computer
        .hal_version
        .split('.')
        .map_while(|part| part.parse().ok())
        .collect();
    if let [major, minor, micro, ..] = parts[..] {
        device.set_property("org.freedesktop.Hal.version.major", major)?;
        device.set_property("org.freedesktop.Hal.version.minor", minor)?;
        device.set_property("org.freedesktop.Hal.version.micro", micro)?;
    }

    let kernel = [
        ("system.kernel.name", &computer.kernel_name),
        ("system.kernel.version", &computer.kernel_version),
        ("system.kernel.machine", &computer.kernel_machine),
    ];
    for (key, value) in kernel {
        if let Some(value) = value {
            device.set_property(key, value.as_str())?;
        }
    }

    device.set_property("system.formfactor", "unknown")?;
    Ok(())
}

/// Derive `system.product` and `system.formfactor` from what the SMBIOS
/// helper reported.
pub fn apply_smbios(device: &mut Device) -> Result<()> {
    let product = match (
        device.string("system.hardware.vendor"),
        device.string("system.hardware.product"),
        device.string("system.hardware.version"),
    ) {
        (Some(_), Some(product), Some("Not Specified")) => Some(product.to_string()),
        (Some(_), Some(product), Some(version)) => Some(format!("{product} {version}")),
        _ => None,
    };
    if let Some(product) = product {
        device.properties_mut().replace("system.product", product);
    }

    let unknown = device
        .string("system.formfactor")
        .is_none_or(|formfactor| formfactor == "unknown");
    let formfactor = device
        .string("system.chassis.type")
        .and_then(formfactor_for_chassis);
    if let (true, Some(formfactor)) = (unknown, formfactor) {
        device.properties_mut().replace("system.formfactor", formfactor);
    }
    Ok(())
}

/// SMBIOS chassis type to form factor.
pub fn formfactor_for_chassis(chassis: &str) -> Option<&'static str> {
    let formfactor = match chassis {
        "Desktop" | "Low Profile Desktop" | "Mini Tower" | "Tower" | "Space-saving" => "desktop",
        "Portable" | "Laptop" | "Notebook" | "Docking Station" | "Sub Notebook" => "laptop",
        "Pizza Box" | "Main Server Chassis" | "Blade" => "server",
        "Hand Held" => "handheld",
        "Other" | "Unknown" | "All In One" | "Lunch Box" | "Expansion Chassis" | "Sub Chassis"
        | "Bus Expansion Chassis" | "Peripheral Chassis" | "RAID Chassis"
        | "Rack Mount Chassis" | "Sealed-case PC" | "Multi-system" | "CompactPCI"
        | "AdvancedTCA" | "Blade Enclosure" => "unknown",
        _ => return None,
    };
    Some(formfactor)
}
