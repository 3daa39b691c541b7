// SPDX-License-Identifier: GPL-3.0-only

//! Device records
//!
//! A `Device` exclusively owns its properties. It deliberately does not
//! implement `Clone`: moving a device between stores is a transfer of
//! ownership, never a copy.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::keys;
use crate::{PropertyBag, PropertyError, Value};

/// Internal identity of a device record.
///
/// UDIs are not enough to tell records apart: devices waiting in the
/// temporary store may not have one yet, and every ignored device shares
/// the same sentinel UDI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(u64);

impl DeviceId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device#{}", self.0)
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub struct Device {
    id: DeviceId,
    udi: Option<String>,
    ignored: bool,
    properties: PropertyBag,
}

impl Device {
    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            udi: None,
            ignored: false,
            properties: PropertyBag::new(),
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn udi(&self) -> Option<&str> {
        self.udi.as_deref()
    }

    /// Store the identifier and mirror it into `info.udi`.
    ///
    /// Uniqueness is the caller's business; see the UDI generator in hal-core.
    pub fn set_udi(&mut self, udi: impl Into<String>) {
        let udi = udi.into();
        self.properties.replace(keys::INFO_UDI, udi.as_str());
        self.udi = Some(udi);
    }

    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    pub fn set_ignored(&mut self, ignored: bool) {
        self.ignored = ignored;
    }

    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertyBag {
        &mut self.properties
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.properties.has(key)
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn set_property(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.properties.set(key, value)
    }

    pub fn remove_property(&mut self, key: &str) -> Option<Value> {
        self.properties.remove(key)
    }

    // Lenient accessors: a type mismatch is logged and read as "absent".

    pub fn string(&self, key: &str) -> Option<&str> {
        self.lenient(self.properties.get_string(key))
    }

    pub fn int32(&self, key: &str) -> Option<i32> {
        self.lenient(self.properties.get_int32(key))
    }

    pub fn uint64(&self, key: &str) -> Option<u64> {
        self.lenient(self.properties.get_uint64(key))
    }

    pub fn double(&self, key: &str) -> Option<f64> {
        self.lenient(self.properties.get_double(key))
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.lenient(self.properties.get_bool(key))
    }

    pub fn string_list(&self, key: &str) -> Option<&[String]> {
        self.lenient(self.properties.get_string_list(key))
    }

    /// UDI of the parent device, read from `info.parent`.
    pub fn parent_udi(&self) -> Option<&str> {
        self.string(keys::INFO_PARENT)
    }

    pub fn capabilities(&self) -> &[String] {
        self.string_list(keys::INFO_CAPABILITIES).unwrap_or_default()
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities().iter().any(|c| c == capability)
    }

    pub fn add_capability(&mut self, capability: &str) -> Result<()> {
        if self.has_capability(capability) {
            return Ok(());
        }
        self.properties
            .strlist_append(keys::INFO_CAPABILITIES, capability)
    }

    pub fn copy_property(&self, src_key: &str, dst: &mut Device, dst_key: &str) -> Result<bool> {
        self.properties
            .copy_property(src_key, &mut dst.properties, dst_key)
    }

    /// Copy every property of `source` into `self`.
    ///
    /// Differently-typed targets are replaced. Capabilities are unioned
    /// instead of overwritten.
    pub fn merge_from(&mut self, source: &Device) -> Result<()> {
        for (key, value) in source.properties.iter() {
            if key == keys::INFO_CAPABILITIES {
                continue;
            }
            self.properties.replace(key, value.clone());
        }

        for capability in source.capabilities() {
            self.add_capability(capability)?;
        }

        Ok(())
    }

    /// True when every property of `self` under `namespace` exists in
    /// `other` with an equal value.
    pub fn matches_namespace(&self, other: &Device, namespace: &str) -> bool {
        self.properties
            .iter()
            .filter(|(key, _)| key.starts_with(namespace))
            .all(|(key, value)| other.property(key) == Some(value))
    }

    fn lenient<T>(&self, result: std::result::Result<Option<T>, PropertyError>) -> Option<T> {
        match result {
            Ok(value) => value,
            Err(error) => {
                warn!(device = %self.id, udi = ?self.udi, "{error}");
                None
            }
        }
    }
}
