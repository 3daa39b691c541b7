// SPDX-License-Identifier: GPL-3.0-only

//! Well-known property keys and identifier sentinels

pub const INFO_UDI: &str = "info.udi";
pub const INFO_PARENT: &str = "info.parent";
pub const INFO_IGNORE: &str = "info.ignore";
pub const INFO_CATEGORY: &str = "info.category";
pub const INFO_CAPABILITIES: &str = "info.capabilities";
pub const INFO_PRODUCT: &str = "info.product";
pub const INFO_SUBSYSTEM: &str = "info.subsystem";

pub const CALLOUTS_PREPROBE: &str = "info.callouts.preprobe";
pub const CALLOUTS_ADD: &str = "info.callouts.add";
pub const CALLOUTS_REMOVE: &str = "info.callouts.remove";

pub const BUS_DRIVER: &str = "freebsd.driver";
pub const BUS_UNIT: &str = "freebsd.unit";
pub const BUS_DEVICE_FILE: &str = "freebsd.device_file";

/// Prefix shared by every generated UDI
pub const UDI_PREFIX: &str = "/org/freedesktop/Hal/devices/";

/// UDI of the root device every parentless device hangs off
pub const COMPUTER_UDI: &str = "/org/freedesktop/Hal/devices/computer";

/// Shared UDI of every ignored device
pub const IGNORED_UDI: &str = "/org/freedesktop/Hal/devices/ignored-device";
pub const IGNORED_PRODUCT: &str = "Ignored Device";
