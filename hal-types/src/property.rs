// SPDX-License-Identifier: GPL-3.0-only

//! Typed key/value store owned by a single device
//!
//! Keys are dot-namespaced (`storage.removable`). A stored value never changes
//! variant in place: setting a key to a different [`ValueKind`] fails with
//! [`PropertyError::TypeMismatch`] and the caller has to `remove` first.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PropertyError, Result};
use crate::{Value, ValueKind};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyBag {
    entries: BTreeMap<String, Value>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn kind_of(&self, key: &str) -> Option<ValueKind> {
        self.entries.get(key).map(Value::kind)
    }

    /// Overwrite `key`, refusing to change the stored variant.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();

        if let Some(existing) = self.entries.get_mut(key) {
            if existing.kind() != value.kind() {
                return Err(PropertyError::TypeMismatch {
                    key: key.to_string(),
                    expected: existing.kind(),
                    found: value.kind(),
                });
            }
            *existing = value;
            return Ok(());
        }

        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Remove-then-set in one step, returning whatever was stored before.
    pub fn replace(&mut self, key: &str, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.to_string(), value.into())
    }

    pub fn get_string(&self, key: &str) -> Result<Option<&str>> {
        self.typed(key, ValueKind::String, |value| match value {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn get_int32(&self, key: &str) -> Result<Option<i32>> {
        self.typed(key, ValueKind::Int32, |value| match value {
            Value::Int32(v) => Some(*v),
            _ => None,
        })
    }

    pub fn get_uint64(&self, key: &str) -> Result<Option<u64>> {
        self.typed(key, ValueKind::UInt64, |value| match value {
            Value::UInt64(v) => Some(*v),
            _ => None,
        })
    }

    pub fn get_double(&self, key: &str) -> Result<Option<f64>> {
        self.typed(key, ValueKind::Double, |value| match value {
            Value::Double(v) => Some(*v),
            _ => None,
        })
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.typed(key, ValueKind::Bool, |value| match value {
            Value::Bool(v) => Some(*v),
            _ => None,
        })
    }

    pub fn get_string_list(&self, key: &str) -> Result<Option<&[String]>> {
        self.typed(key, ValueKind::StringList, |value| match value {
            Value::StringList(items) => Some(items.as_slice()),
            _ => None,
        })
    }

    /// Copy `src_key` into `dst` under `dst_key`.
    ///
    /// Returns `Ok(false)` when the source key is absent; the destination is
    /// left untouched in that case.
    pub fn copy_property(&self, src_key: &str, dst: &mut PropertyBag, dst_key: &str) -> Result<bool> {
        let Some(value) = self.entries.get(src_key) else {
            return Ok(false);
        };

        dst.set(dst_key, value.clone())?;
        Ok(true)
    }

    pub fn strlist_append(&mut self, key: &str, item: &str) -> Result<()> {
        self.strlist_mut(key)?.push(item.to_string());
        Ok(())
    }

    pub fn strlist_prepend(&mut self, key: &str, item: &str) -> Result<()> {
        self.strlist_mut(key)?.insert(0, item.to_string());
        Ok(())
    }

    /// Remove the first occurrence of `item`; `Ok(false)` if it was not listed.
    pub fn strlist_remove(&mut self, key: &str, item: &str) -> Result<bool> {
        if self.get_string_list(key)?.is_none() {
            return Ok(false);
        }

        let items = self.strlist_mut(key)?;
        match items.iter().position(|existing| existing == item) {
            Some(index) => {
                items.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn strlist_remove_index(&mut self, key: &str, index: usize) -> Result<String> {
        let len = self.get_string_list(key)?.map_or(0, <[String]>::len);
        if index >= len {
            return Err(PropertyError::IndexOutOfRange {
                key: key.to_string(),
                index,
                len,
            });
        }

        Ok(self.strlist_mut(key)?.remove(index))
    }

    pub fn strlist_contains(&self, key: &str, item: &str) -> Result<bool> {
        Ok(self
            .get_string_list(key)?
            .is_some_and(|items| items.iter().any(|existing| existing == item)))
    }

    fn strlist_mut(&mut self, key: &str) -> Result<&mut Vec<String>> {
        let value = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Value::StringList(Vec::new()));

        let found = value.kind();
        match value {
            Value::StringList(items) => Ok(items),
            _ => Err(PropertyError::TypeMismatch {
                key: key.to_string(),
                expected: ValueKind::StringList,
                found,
            }),
        }
    }

    fn typed<'a, T>(
        &'a self,
        key: &str,
        expected: ValueKind,
        extract: impl FnOnce(&'a Value) -> Option<T>,
    ) -> Result<Option<T>> {
        let Some(value) = self.entries.get(key) else {
            return Ok(None);
        };

        extract(value).map(Some).ok_or_else(|| PropertyError::TypeMismatch {
            key: key.to_string(),
            expected,
            found: value.kind(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_refuses_to_change_variant_in_place() {
        let mut bag = PropertyBag::new();
        bag.set("storage.removable", true).expect("set bool");

        let error = bag.set("storage.removable", "yes").unwrap_err();
        assert_eq!(
            error,
            PropertyError::TypeMismatch {
                key: "storage.removable".to_string(),
                expected: ValueKind::Bool,
                found: ValueKind::String,
            }
        );

        bag.remove("storage.removable");
        bag.set("storage.removable", "yes").expect("set after remove");
        assert_eq!(bag.get_string("storage.removable"), Ok(Some("yes")));
    }

    #[test]
    fn typed_accessors_report_mismatch_and_absence() {
        let mut bag = PropertyBag::new();
        bag.set("usb.vendor_id", 0x0a12_i32).expect("set int");

        assert_eq!(bag.get_int32("usb.vendor_id"), Ok(Some(0x0a12)));
        assert_eq!(bag.get_int32("usb.product_id"), Ok(None));
        assert!(matches!(
            bag.get_string("usb.vendor_id"),
            Err(PropertyError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn string_list_operations_preserve_order() {
        let mut bag = PropertyBag::new();
        bag.strlist_append("info.callouts.add", "b").expect("append");
        bag.strlist_append("info.callouts.add", "c").expect("append");
        bag.strlist_prepend("info.callouts.add", "a").expect("prepend");
        bag.strlist_append("info.callouts.add", "b").expect("append");

        assert!(bag.strlist_remove("info.callouts.add", "b").expect("remove"));
        assert!(!bag.strlist_remove("info.callouts.add", "zz").expect("remove"));
        assert_eq!(
            bag.strlist_remove_index("info.callouts.add", 0).expect("remove index"),
            "a"
        );
        assert_eq!(
            bag.get_string_list("info.callouts.add").expect("list"),
            Some(&["c".to_string(), "b".to_string()][..])
        );
        assert!(matches!(
            bag.strlist_remove_index("info.callouts.add", 5),
            Err(PropertyError::IndexOutOfRange { len: 2, .. })
        ));
    }

    #[test]
    fn copy_property_into_another_bag() {
        let mut src = PropertyBag::new();
        src.set("block.device", "/dev/da0").expect("set");
        let mut dst = PropertyBag::new();

        assert!(src.copy_property("block.device", &mut dst, "storage.device").expect("copy"));
        assert!(!src.copy_property("block.missing", &mut dst, "storage.missing").expect("copy"));
        assert_eq!(dst.get_string("storage.device"), Ok(Some("/dev/da0")));
        assert!(!dst.has("storage.missing"));
    }
}
