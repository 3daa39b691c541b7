// SPDX-License-Identifier: GPL-3.0-only

//! Kernel bus names (`ugen0`, `da1`, `uhub3`) and the properties that tie a
//! device record back to one.

use std::path::Path;

use hal_types::{Device, keys};

use crate::error::Result;
use crate::store::{DeviceStore, Query};

/// Split `ugen0` into `("ugen", 0)`.
///
/// The driver is the leading run of non-digits and must not be empty; the
/// unit is the decimal number right after it. Anything past the unit is
/// ignored.
pub fn parse_bus_name(name: &str) -> Option<(&str, i32)> {
    let split = name.find(|c: char| c.is_ascii_digit())?;
    if split == 0 {
        return None;
    }

    let (driver, rest) = name.split_at(split);
    let digits = rest
        .find(|c: char| !c.is_ascii_digit())
        .map_or(rest, |end| &rest[..end]);

    digits.parse().ok().map(|unit| (driver, unit))
}

pub fn find_from_info<'a>(store: &'a DeviceStore, driver: &str, unit: i32) -> Option<&'a Device> {
    store.match_all(
        &Query::new()
            .string(keys::BUS_DRIVER, driver)
            .int32(keys::BUS_UNIT, unit),
    )
}

pub fn find_from_name<'a>(store: &'a DeviceStore, name: &str) -> Option<&'a Device> {
    let (driver, unit) = parse_bus_name(name)?;
    find_from_info(store, driver, unit)
}

/// Driver and unit of a device, when both are recorded.
pub fn bus_info(device: &Device) -> Option<(&str, i32)> {
    Some((device.string(keys::BUS_DRIVER)?, device.int32(keys::BUS_UNIT)?))
}

pub fn set_bus_info(device: &mut Device, driver: &str, unit: i32) -> Result<()> {
    set_bus_info_in(device, driver, unit, Path::new("/dev"))
}

/// Like [`set_bus_info`], looking for the device node under `dev_root`.
pub fn set_bus_info_in(device: &mut Device, driver: &str, unit: i32, dev_root: &Path) -> Result<()> {
    device.set_property(keys::BUS_DRIVER, driver)?;
    device.set_property(keys::BUS_UNIT, unit)?;

    let node = dev_root.join(format!("{driver}{unit}"));
    if node.exists() {
        device.set_property(keys::BUS_DEVICE_FILE, node.to_string_lossy().into_owned())?;
    }
    Ok(())
}

/// Record the driver and unit encoded in `name`. Returns `false` when the
/// name does not parse.
pub fn set_bus_name(device: &mut Device, name: &str) -> Result<bool> {
    match parse_bus_name(name) {
        Some((driver, unit)) => set_bus_info(device, driver, unit).map(|()| true),
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hal_types::DeviceId;

    #[test]
    fn bus_names_split_into_driver_and_unit() {
        assert_eq!(parse_bus_name("ugen0"), Some(("ugen", 0)));
        assert_eq!(parse_bus_name("uhub12"), Some(("uhub", 12)));
        assert_eq!(parse_bus_name("ugen0.2"), Some(("ugen", 0)));
        assert_eq!(parse_bus_name("0da"), None);
        assert_eq!(parse_bus_name("nexus"), None);
        assert_eq!(parse_bus_name(""), None);
    }

    #[test]
    fn name_lookup_matches_driver_and_unit() {
        let mut store = DeviceStore::new("gdl");
        let mut dev = Device::new(DeviceId::new(1));
        dev.set_udi("/org/freedesktop/Hal/devices/usb_device_0");
        set_bus_info_in(&mut dev, "ugen", 0, Path::new("/nonexistent")).expect("bus info");
        store.insert(dev);

        let found = find_from_name(&store, "ugen0").expect("found");
        assert_eq!(bus_info(found), Some(("ugen", 0)));
        assert!(!found.has_property(keys::BUS_DEVICE_FILE));
        assert!(find_from_name(&store, "ugen1").is_none());
        assert!(find_from_name(&store, "ugen").is_none());
    }

    #[test]
    fn device_file_is_recorded_when_node_exists() {
        let dir = std::env::temp_dir().join(format!("hal-devtree-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(dir.join("da3"), b"").expect("touch");

        let mut dev = Device::new(DeviceId::new(1));
        set_bus_info_in(&mut dev, "da", 3, &dir).expect("bus info");
        let expected = dir.join("da3");
        assert_eq!(dev.string(keys::BUS_DEVICE_FILE), expected.to_str());

        std::fs::remove_dir_all(&dir).expect("cleanup");
    }
}
