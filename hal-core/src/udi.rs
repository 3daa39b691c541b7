// SPDX-License-Identifier: GPL-3.0-only

//! Unique device identifier generation

use std::collections::HashSet;

use hal_types::Device;

/// Replace every byte outside `[A-Za-z0-9_]` with `_`.
pub fn sanitize(short_name: &str) -> String {
    short_name
        .bytes()
        .map(|b| {
            if b.is_ascii_alphanumeric() || b == b'_' {
                b as char
            } else {
                '_'
            }
        })
        .collect()
}

/// Snapshot of every UDI that a new identifier must not collide with.
///
/// Built fresh for each request out of the committed devices plus whatever
/// enumerators are still holding back, then dropped.
#[derive(Debug, Default)]
pub struct UdiView<'a> {
    taken: HashSet<&'a str>,
}

impl<'a> UdiView<'a> {
    pub fn new(devices: impl IntoIterator<Item = &'a Device>) -> Self {
        Self {
            taken: devices.into_iter().filter_map(Device::udi).collect(),
        }
    }

    pub fn contains(&self, udi: &str) -> bool {
        self.taken.contains(udi)
    }

    /// `candidate` itself if free, else the first free `candidate_<n>` for
    /// `n = 0, 1, 2, ...`.
    pub fn make_unique(&self, candidate: &str) -> String {
        if !self.contains(candidate) {
            return candidate.to_string();
        }

        (0_u64..)
            .map(|n| format!("{candidate}_{n}"))
            .find(|udi| !self.contains(udi))
            .unwrap_or_else(|| candidate.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hal_types::DeviceId;

    fn with_udi(raw: u64, udi: &str) -> Device {
        let mut dev = Device::new(DeviceId::new(raw));
        dev.set_udi(udi);
        dev
    }

    #[test]
    fn sanitize_replaces_every_foreign_byte() {
        assert_eq!(sanitize("usb_device_a12_1_noserial"), "usb_device_a12_1_noserial");
        assert_eq!(sanitize("volume label/x.y"), "volume_label_x_y");
        assert_eq!(sanitize("é"), "__");
    }

    #[test]
    fn collision_appends_first_free_suffix() {
        let devices = [
            with_udi(1, "/d/ide_0_0"),
            with_udi(2, "/d/ide_0_0_0"),
            with_udi(3, "/d/ide_0_0_2"),
        ];
        let view = UdiView::new(devices.iter());

        assert_eq!(view.make_unique("/d/ide_1_0"), "/d/ide_1_0");
        assert_eq!(view.make_unique("/d/ide_0_0"), "/d/ide_0_0_1");
    }

    #[test]
    fn devices_without_udi_do_not_block_anything() {
        let devices = [Device::new(DeviceId::new(9))];
        let view = UdiView::new(devices.iter());
        assert_eq!(view.make_unique("/d/x"), "/d/x");
    }
}
