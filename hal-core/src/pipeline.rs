// SPDX-License-Identifier: GPL-3.0-only

//! Device lifecycle: preprobe, add and remove
//!
//! ```text
//! new_device ─► preprobe ─┬─► ignored stub ─────────────► GDL
//!                (TDL)    └─► populated ─► add ─────────► GDL
//! GDL ─► remove_tree ─► leaves first ─► remove callouts ─► dropped
//! ```
//!
//! Every callout goes through the [`Bridge`], so these calls return only once
//! the external helpers have finished. A device is owned by exactly one of
//! TDL, GDL or the pending list; moving it between stores never spans a wait.

use std::cell::Cell;
use std::time::Duration;

use hal_types::{Device, DeviceId, keys};
use tracing::{debug, info, warn};

use crate::bridge::{Bridge, EventSource, HelperStatus, LoopHandle};
use crate::collaborators::{CalloutPhase, Callouts, HelperRequest, MergeRules, RulePhase};
use crate::error::{HalError, Result};
use crate::store::DeviceStore;
use crate::udi::{UdiView, sanitize};

/// Default timeout for helpers invoked without an explicit one.
pub const DEFAULT_HELPER_TIMEOUT: Duration = Duration::from_millis(10_000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HalConfig {
    pub helper_timeout: Duration,
}

impl Default for HalConfig {
    fn default() -> Self {
        Self {
            helper_timeout: DEFAULT_HELPER_TIMEOUT,
        }
    }
}

/// Outcome of [`Hal::preprobe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preprobe {
    /// Still in TDL, waiting to be populated and added.
    Accepted(DeviceId),
    /// Already moved to GDL as an ignored stub.
    Ignored(DeviceId),
}

impl Preprobe {
    pub fn id(self) -> DeviceId {
        match self {
            Self::Accepted(id) | Self::Ignored(id) => id,
        }
    }

    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Temporary,
    Global,
}

pub struct Hal {
    gdl: DeviceStore,
    tdl: DeviceStore,
    pending: Vec<Device>,
    bridge: Bridge,
    rules: Box<dyn MergeRules>,
    callouts: Box<dyn Callouts>,
    helper_timeout: Duration,
    next_id: Cell<u64>,
    root: Option<DeviceId>,
}

impl Hal {
    pub fn new(
        config: HalConfig,
        handle: LoopHandle,
        source: impl EventSource + 'static,
        rules: impl MergeRules + 'static,
        callouts: impl Callouts + 'static,
    ) -> Self {
        let helper_timeout = if config.helper_timeout.is_zero() {
            DEFAULT_HELPER_TIMEOUT
        } else {
            config.helper_timeout
        };

        Self {
            gdl: DeviceStore::new("gdl"),
            tdl: DeviceStore::new("tdl"),
            pending: Vec::new(),
            bridge: Bridge::new(handle, source),
            rules: Box::new(rules),
            callouts: Box::new(callouts),
            helper_timeout,
            next_id: Cell::new(0),
            root: None,
        }
    }

    pub fn gdl(&self) -> &DeviceStore {
        &self.gdl
    }

    pub fn tdl(&self) -> &DeviceStore {
        &self.tdl
    }

    pub fn pending(&self) -> &[Device] {
        &self.pending
    }

    pub fn handle(&self) -> LoopHandle {
        self.bridge.handle()
    }

    /// The bridge's reentrancy guard.
    pub fn is_waiting(&self) -> bool {
        self.bridge.is_waiting()
    }

    /// The computer device built by the last probe, ignored or not.
    pub fn root(&self) -> Option<DeviceId> {
        self.root
    }

    pub(crate) fn set_root(&mut self, id: DeviceId) {
        self.root = Some(id);
    }

    pub fn has_deferred(&self) -> bool {
        self.bridge.has_deferred()
    }

    pub(crate) fn bridge_mut(&mut self) -> &mut Bridge {
        &mut self.bridge
    }

    /// Mutable access to a device in TDL or GDL.
    pub fn device_mut(&mut self, id: DeviceId) -> Option<&mut Device> {
        if self.tdl.contains(id) {
            return self.tdl.get_mut(id);
        }
        self.gdl.get_mut(id)
    }

    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.tdl.get(id).or_else(|| self.gdl.get(id))
    }

    /// Fresh, empty device whose `info.parent` points at `parent`, or at the
    /// computer root when there is none.
    pub fn new_device(&self, parent: Option<&Device>) -> Device {
        let mut device = self.new_root_device();
        let parent_udi = parent.and_then(Device::udi).unwrap_or(keys::COMPUTER_UDI);
        device.properties_mut().replace(keys::INFO_PARENT, parent_udi);
        device
    }

    /// Fresh device without a parent link.
    pub fn new_root_device(&self) -> Device {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        Device::new(DeviceId::new(id))
    }

    /// Assign `UDI_PREFIX + sanitize(short_name)`, made unique.
    pub fn set_udi(&self, device: &mut Device, short_name: &str) -> Result<String> {
        let candidate = format!("{}{}", keys::UDI_PREFIX, sanitize(short_name));
        self.set_full_udi(device, &candidate)
    }

    /// Assign `candidate`, or the first free `candidate_<n>`, checked against
    /// GDL, TDL and the pending list.
    pub fn set_full_udi(&self, device: &mut Device, candidate: &str) -> Result<String> {
        if let Some(udi) = device.udi() {
            return Err(HalError::UdiAlreadyAssigned {
                udi: udi.to_string(),
            });
        }

        let udi = self.unique_udi(candidate);
        device.set_udi(udi.as_str());
        Ok(udi)
    }

    /// [`Hal::set_udi`] for a device already sitting in TDL.
    pub fn assign_udi(&mut self, id: DeviceId, short_name: &str) -> Result<String> {
        let candidate = format!("{}{}", keys::UDI_PREFIX, sanitize(short_name));
        self.assign_full_udi(id, &candidate)
    }

    pub fn assign_full_udi(&mut self, id: DeviceId, candidate: &str) -> Result<String> {
        let device = self.tdl.get(id).ok_or(HalError::NotInTemporaryStore(id))?;
        if let Some(udi) = device.udi() {
            return Err(HalError::UdiAlreadyAssigned {
                udi: udi.to_string(),
            });
        }

        let udi = self.unique_udi(candidate);
        if let Some(device) = self.tdl.get_mut(id) {
            device.set_udi(udi.as_str());
        }
        Ok(udi)
    }

    fn unique_udi(&self, candidate: &str) -> String {
        let view = UdiView::new(self.gdl.iter().chain(self.tdl.iter()).chain(&self.pending));
        let udi = view.make_unique(candidate);
        if udi != candidate {
            debug!(candidate, %udi, "udi collision resolved");
        }
        udi
    }

    /// Hold a device back from GDL while other enumerators still run. Its UDI
    /// keeps blocking new identifiers until it is taken back.
    pub fn hold_pending(&mut self, device: Device) {
        debug!(device = %device.id(), udi = ?device.udi(), "holding device as pending");
        self.pending.push(device);
    }

    pub fn take_pending(&mut self) -> Vec<Device> {
        std::mem::take(&mut self.pending)
    }

    /// Insert into TDL and run the preprobe rules and callouts.
    ///
    /// An `info.ignore` device is stripped of its category and capabilities,
    /// given the shared ignored UDI and moved straight to GDL.
    pub fn preprobe(&mut self, device: Device) -> Result<Preprobe> {
        let id = device.id();
        self.tdl.insert(device);

        self.merge(id, RulePhase::Preprobe);
        self.run_callouts(id, Location::Temporary, CalloutPhase::Preprobe);

        let ignore = self
            .tdl
            .get(id)
            .ok_or(HalError::NotInTemporaryStore(id))?
            .bool(keys::INFO_IGNORE)
            .unwrap_or(false);

        if !ignore {
            return Ok(Preprobe::Accepted(id));
        }

        let mut device = self.tdl.take(id).ok_or(HalError::NotInTemporaryStore(id))?;
        device.remove_property(keys::INFO_CATEGORY);
        device.remove_property(keys::INFO_CAPABILITIES);
        device.set_udi(keys::IGNORED_UDI);
        device
            .properties_mut()
            .replace(keys::INFO_PRODUCT, keys::IGNORED_PRODUCT);
        device.set_ignored(true);

        info!(device = %id, "device ignored");
        self.gdl.insert(device);
        Ok(Preprobe::Ignored(id))
    }

    /// Run the information and policy rules and the add callouts, then move
    /// the device from TDL to GDL.
    pub fn add(&mut self, id: DeviceId) -> Result<()> {
        if !self.tdl.contains(id) {
            return Err(HalError::NotInTemporaryStore(id));
        }

        self.merge(id, RulePhase::Information);
        self.merge(id, RulePhase::Policy);
        self.run_callouts(id, Location::Temporary, CalloutPhase::Add);

        let device = self.tdl.take(id).ok_or(HalError::NotInTemporaryStore(id))?;
        info!(device = %id, udi = ?device.udi(), "device added");
        self.gdl.insert(device);
        Ok(())
    }

    /// Returns `false` when preprobe ignored the device.
    pub fn preprobe_and_add(&mut self, device: Device) -> Result<bool> {
        match self.preprobe(device)? {
            Preprobe::Accepted(id) => {
                self.add(id)?;
                Ok(true)
            }
            Preprobe::Ignored(_) => Ok(false),
        }
    }

    /// Run the remove callouts and drop the device from GDL.
    ///
    /// Children are left alone; use [`Hal::remove_tree`] for a subtree.
    pub fn remove(&mut self, id: DeviceId) -> Result<()> {
        if !self.gdl.contains(id) {
            return Err(HalError::DeviceNotFound(id));
        }

        self.run_callouts(id, Location::Global, CalloutPhase::Remove);

        let device = self.gdl.take(id).ok_or(HalError::DeviceNotFound(id))?;
        info!(device = %id, udi = ?device.udi(), "device removed");
        Ok(())
    }

    /// Remove every descendant of `id`, leaves first.
    pub fn remove_children(&mut self, id: DeviceId) -> Result<()> {
        let device = self.gdl.get(id).ok_or(HalError::DeviceNotFound(id))?;
        let Some(udi) = device.udi() else {
            return Ok(());
        };

        // A self-parented device (the shared ignored UDI) lists itself.
        let children: Vec<DeviceId> = self
            .gdl
            .children_of(udi)
            .iter()
            .map(|d| d.id())
            .filter(|child| *child != id)
            .collect();
        for child in children.into_iter().rev() {
            if self.gdl.contains(child) {
                self.remove(child)?;
            }
        }
        Ok(())
    }

    pub fn remove_tree(&mut self, id: DeviceId) -> Result<()> {
        self.remove_children(id)?;
        self.remove(id)
    }

    /// Run one helper against a device in TDL or GDL and wait for it.
    ///
    /// `None` or a zero timeout falls back to the configured default.
    /// Returns the exit code, or `-1` when the helper did not exit normally.
    pub fn run_helper_sync(
        &mut self,
        id: DeviceId,
        timeout: Option<Duration>,
        command: &str,
        extra_env: &[(&str, &str)],
    ) -> i32 {
        let request = HelperRequest {
            command: command.to_string(),
            timeout: timeout
                .filter(|t| !t.is_zero())
                .unwrap_or(self.helper_timeout),
            extra_env: extra_env
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };

        let Some(device) = self.tdl.get(id).or_else(|| self.gdl.get(id)) else {
            warn!(device = %id, command, "helper requested for unknown device");
            return -1;
        };
        let done = self.bridge.completion();
        let token = done.token();
        self.callouts.run_helper(device, request, done);

        let status = self.bridge.wait(token);
        debug!(device = %id, command, ?status, "helper finished");
        status.exit_code()
    }

    fn merge(&mut self, id: DeviceId, phase: RulePhase) {
        if let Some(device) = self.tdl.get_mut(id) {
            self.rules.merge(device, phase);
        }
    }

    fn run_callouts(&mut self, id: DeviceId, location: Location, phase: CalloutPhase) {
        let device = match location {
            Location::Temporary => self.tdl.get(id),
            Location::Global => self.gdl.get(id),
        };
        let Some(device) = device else {
            return;
        };
        let done = self.bridge.completion();
        let token = done.token();
        self.callouts.run_callouts(device, phase, done);

        match self.bridge.wait(token) {
            HelperStatus::Exited(0) => {}
            status => debug!(device = %id, %phase, ?status, "callouts did not finish cleanly"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge;
    use crate::collaborators::{NoCallouts, NoMergeRules, StaticRules};
    use crate::store::Query;
    use hal_types::Value;

    fn hal_with_rules(rules: impl MergeRules + 'static) -> Hal {
        let (handle, source) = bridge::channel();
        Hal::new(HalConfig::default(), handle, source, rules, NoCallouts)
    }

    fn hal() -> Hal {
        hal_with_rules(NoMergeRules)
    }

    #[test]
    fn new_device_links_to_parent_or_computer() {
        let hal = hal();
        let mut parent = hal.new_device(None);
        assert_eq!(parent.parent_udi(), Some(keys::COMPUTER_UDI));

        hal.set_udi(&mut parent, "usb_bus_0").expect("udi");
        let child = hal.new_device(Some(&parent));
        assert_eq!(child.parent_udi(), Some("/org/freedesktop/Hal/devices/usb_bus_0"));
        assert_ne!(child.id(), parent.id());
    }

    #[test]
    fn udi_is_assigned_once() {
        let hal = hal();
        let mut dev = hal.new_device(None);
        hal.set_udi(&mut dev, "a b").expect("udi");
        assert_eq!(dev.udi(), Some("/org/freedesktop/Hal/devices/a_b"));

        let err = hal.set_udi(&mut dev, "c").expect_err("second assignment");
        assert!(matches!(err, HalError::UdiAlreadyAssigned { .. }));
    }

    #[test]
    fn accepted_device_moves_from_tdl_to_gdl_on_add() {
        let mut hal = hal();
        let mut dev = hal.new_device(None);
        hal.set_udi(&mut dev, "pci_8086_1237").expect("udi");

        let outcome = hal.preprobe(dev).expect("preprobe");
        assert!(outcome.is_accepted());
        assert!(hal.tdl().contains(outcome.id()));
        assert!(hal.gdl().is_empty());

        hal.add(outcome.id()).expect("add");
        assert!(hal.tdl().is_empty());
        assert!(hal.gdl().find("/org/freedesktop/Hal/devices/pci_8086_1237").is_some());
    }

    #[test]
    fn ignore_rule_turns_device_into_stub() {
        let rules = StaticRules::new().on(
            RulePhase::Preprobe,
            Query::new().string(keys::BUS_DRIVER, "atkbdc"),
            [(keys::INFO_IGNORE, Value::Bool(true))],
        );
        let mut hal = hal_with_rules(rules);

        let mut dev = hal.new_device(None);
        dev.set_property(keys::BUS_DRIVER, "atkbdc").expect("set");
        dev.set_property(keys::INFO_CATEGORY, "input").expect("set");
        dev.add_capability("input").expect("cap");

        assert!(!hal.preprobe_and_add(dev).expect("pipeline"));

        let stub = hal.gdl().find(keys::IGNORED_UDI).expect("stub in gdl");
        assert!(stub.is_ignored());
        assert!(!stub.has_property(keys::INFO_CATEGORY));
        assert!(!stub.has_property(keys::INFO_CAPABILITIES));
        assert_eq!(stub.string(keys::INFO_PRODUCT), Some(keys::IGNORED_PRODUCT));
        assert!(hal.tdl().is_empty());
    }

    #[test]
    fn pending_and_tdl_devices_block_udis() {
        let mut hal = hal();

        let mut held = hal.new_device(None);
        hal.set_udi(&mut held, "ide_0_0").expect("udi");
        hal.hold_pending(held);

        let mut waiting = hal.new_device(None);
        hal.set_udi(&mut waiting, "ide_0_0").expect("udi");
        hal.preprobe(waiting).expect("preprobe");

        let mut third = hal.new_device(None);
        let udi = hal.set_udi(&mut third, "ide_0_0").expect("udi");

        assert_eq!(udi, "/org/freedesktop/Hal/devices/ide_0_0_1");
        assert_eq!(hal.take_pending().len(), 1);
        assert!(hal.pending().is_empty());
    }

    #[test]
    fn remove_requires_device_in_gdl() {
        let mut hal = hal();
        let dev = hal.new_device(None);
        let id = dev.id();
        hal.preprobe(dev).expect("preprobe");

        assert_eq!(hal.remove(id), Err(HalError::DeviceNotFound(id)));
        assert_eq!(hal.add(DeviceId::new(99)), Err(HalError::NotInTemporaryStore(DeviceId::new(99))));
    }

    #[test]
    fn ignored_child_of_ignored_device_removes_cleanly() {
        let rules = StaticRules::new().on(
            RulePhase::Preprobe,
            Query::new().string(keys::BUS_DRIVER, "atkbd"),
            [(keys::INFO_IGNORE, Value::Bool(true))],
        );
        let mut hal = hal_with_rules(rules);

        let mut parent = hal.new_device(None);
        parent.set_property(keys::BUS_DRIVER, "atkbd").expect("set");
        let parent_id = parent.id();
        assert!(!hal.preprobe_and_add(parent).expect("parent"));

        let mut child = hal.new_device(hal.gdl().get(parent_id));
        child.set_property(keys::BUS_DRIVER, "atkbd").expect("set");
        let child_id = child.id();
        assert!(!hal.preprobe_and_add(child).expect("child"));

        // The stub's parent link is its own UDI.
        let stub = hal.gdl().get(child_id).expect("child stub");
        assert_eq!(stub.parent_udi(), Some(keys::IGNORED_UDI));

        hal.remove_tree(child_id).expect("remove tree");
        assert!(!hal.gdl().contains(child_id));
        assert!(hal.gdl().contains(parent_id));
    }

    #[test]
    fn helper_on_unknown_device_fails() {
        let mut hal = hal();
        assert_eq!(hal.run_helper_sync(DeviceId::new(7), None, "hald-probe-smbios", &[]), -1);
    }
}
