// SPDX-License-Identifier: GPL-3.0-only

//! Device stores
//!
//! A store owns its devices by value. Tree structure is never cached: parent
//! links are `info.parent` UDIs and every tree query rescans the store, which
//! keeps removals and TDL→GDL moves from leaving stale edges behind.

use std::collections::HashSet;

use hal_types::{Device, DeviceId, Value};
use tracing::debug;

#[derive(Debug)]
pub struct DeviceStore {
    name: &'static str,
    devices: Vec<Device>,
}

impl DeviceStore {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            devices: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Devices in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    pub fn insert(&mut self, device: Device) {
        debug!(store = self.name, device = %device.id(), udi = ?device.udi(), "insert");
        self.devices.push(device);
    }

    /// Remove the first device carrying `udi` and hand it back.
    pub fn remove(&mut self, udi: &str) -> Option<Device> {
        let index = self.devices.iter().position(|d| d.udi() == Some(udi))?;
        Some(self.remove_at(index))
    }

    pub fn take(&mut self, id: DeviceId) -> Option<Device> {
        let index = self.devices.iter().position(|d| d.id() == id)?;
        Some(self.remove_at(index))
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.devices.iter().any(|d| d.id() == id)
    }

    pub fn get(&self, id: DeviceId) -> Option<&Device> {
        self.devices.iter().find(|d| d.id() == id)
    }

    pub fn get_mut(&mut self, id: DeviceId) -> Option<&mut Device> {
        self.devices.iter_mut().find(|d| d.id() == id)
    }

    pub fn find(&self, udi: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.udi() == Some(udi))
    }

    pub fn find_mut(&mut self, udi: &str) -> Option<&mut Device> {
        self.devices.iter_mut().find(|d| d.udi() == Some(udi))
    }

    /// First device satisfying every term of `query`.
    pub fn match_all(&self, query: &Query) -> Option<&Device> {
        self.devices.iter().find(|d| query.matches(d))
    }

    pub fn match_many(&self, key: &str, value: &Value) -> Vec<&Device> {
        self.devices
            .iter()
            .filter(|d| d.property(key) == Some(value))
            .collect()
    }

    /// Every descendant of `udi`: direct children first, then each child's
    /// subtree in turn. Reversing the result yields a leaves-first order.
    pub fn children_of(&self, udi: &str) -> Vec<&Device> {
        let mut visited = HashSet::new();
        let mut children = Vec::new();
        self.collect_children(udi, &mut visited, &mut children);
        children
    }

    pub fn parent_of(&self, device: &Device) -> Option<&Device> {
        device.parent_udi().and_then(|udi| self.find(udi))
    }

    fn collect_children<'a>(
        &'a self,
        udi: &str,
        visited: &mut HashSet<DeviceId>,
        out: &mut Vec<&'a Device>,
    ) {
        let level: Vec<&Device> = self
            .devices
            .iter()
            .filter(|d| d.parent_udi() == Some(udi) && visited.insert(d.id()))
            .collect();

        out.extend(level.iter().copied());

        for child in level {
            if let Some(child_udi) = child.udi() {
                self.collect_children(child_udi, visited, out);
            }
        }
    }

    fn remove_at(&mut self, index: usize) -> Device {
        let device = self.devices.remove(index);
        debug!(store = self.name, device = %device.id(), udi = ?device.udi(), "remove");
        device
    }
}

/// Typed AND-query over device properties.
///
/// ```
/// use hal_core::Query;
///
/// let query = Query::new()
///     .string("freebsd.driver", "ugen")
///     .int32("freebsd.unit", 0);
/// assert_eq!(query.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    terms: Vec<(String, Value)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn string(self, key: &str, expected: &str) -> Self {
        self.value(key, Value::from(expected))
    }

    pub fn int32(self, key: &str, expected: i32) -> Self {
        self.value(key, Value::Int32(expected))
    }

    pub fn value(mut self, key: &str, expected: Value) -> Self {
        self.terms.push((key.to_string(), expected));
        self
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn matches(&self, device: &Device) -> bool {
        self.terms
            .iter()
            .all(|(key, expected)| device.property(key) == Some(expected))
    }
}
