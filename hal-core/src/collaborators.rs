// SPDX-License-Identifier: GPL-3.0-only

//! Contracts for the collaborators the lifecycle pipeline calls out to
//!
//! - [`MergeRules`]: synchronous default-property rules per phase
//! - [`Callouts`]: asynchronous helper programs, completed through the bridge

use std::fmt;
use std::time::Duration;

use hal_types::{Device, Value, keys};
use tracing::debug;

use crate::bridge::Completion;
use crate::store::Query;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RulePhase {
    Preprobe,
    Information,
    Policy,
}

pub trait MergeRules: Send {
    /// Apply every rule of `phase` that matches `device`, in place.
    fn merge(&self, device: &mut Device, phase: RulePhase);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoMergeRules;

impl MergeRules for NoMergeRules {
    fn merge(&self, _device: &mut Device, _phase: RulePhase) {}
}

#[derive(Debug, Clone)]
struct Rule {
    phase: RulePhase,
    matches: Query,
    properties: Vec<(String, Value)>,
}

/// Rules assembled in code: when `matches` holds, `properties` are merged in,
/// replacing existing values even of another type.
#[derive(Debug, Default, Clone)]
pub struct StaticRules {
    rules: Vec<Rule>,
}

impl StaticRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<'k>(
        mut self,
        phase: RulePhase,
        matches: Query,
        properties: impl IntoIterator<Item = (&'k str, Value)>,
    ) -> Self {
        self.rules.push(Rule {
            phase,
            matches,
            properties: properties
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        });
        self
    }
}

impl MergeRules for StaticRules {
    fn merge(&self, device: &mut Device, phase: RulePhase) {
        let matching: Vec<&Rule> = self
            .rules
            .iter()
            .filter(|rule| rule.phase == phase && rule.matches.matches(device))
            .collect();

        for rule in matching {
            for (key, value) in &rule.properties {
                debug!(device = %device.id(), ?phase, key, "merging rule property");
                device.properties_mut().replace(key, value.clone());
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalloutPhase {
    Preprobe,
    Add,
    Remove,
}

impl CalloutPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preprobe => "preprobe",
            Self::Add => "add",
            Self::Remove => "remove",
        }
    }

    /// String-list property naming the programs to run for this phase.
    pub fn programs_key(self) -> &'static str {
        match self {
            Self::Preprobe => keys::CALLOUTS_PREPROBE,
            Self::Add => keys::CALLOUTS_ADD,
            Self::Remove => keys::CALLOUTS_REMOVE,
        }
    }
}

impl fmt::Display for CalloutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperRequest {
    pub command: String,
    pub timeout: Duration,
    pub extra_env: Vec<(String, String)>,
}

pub trait Callouts: Send {
    /// Run the phase's callout programs for `device`, one after another,
    /// and complete `done` once the last one has exited.
    fn run_callouts(&mut self, device: &Device, phase: CalloutPhase, done: Completion);

    /// Run a single probe/diagnostic helper and complete `done` with its status.
    fn run_helper(&mut self, device: &Device, request: HelperRequest, done: Completion);
}

/// Completes every request immediately with a zero exit status.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCallouts;

impl Callouts for NoCallouts {
    fn run_callouts(&mut self, _device: &Device, _phase: CalloutPhase, done: Completion) {
        done.complete(crate::HelperStatus::Exited(0));
    }

    fn run_helper(&mut self, _device: &Device, _request: HelperRequest, done: Completion) {
        done.complete(crate::HelperStatus::Exited(0));
    }
}

pub fn callout_programs(device: &Device, phase: CalloutPhase) -> Vec<String> {
    device
        .string_list(phase.programs_key())
        .map(<[String]>::to_vec)
        .unwrap_or_default()
}

/// Environment every helper receives: `HAL_PROP_<KEY>` for each property
/// (upper-cased, dots turned into underscores) followed by `UDI`.
pub fn helper_environment(device: &Device) -> Vec<(String, String)> {
    let mut env: Vec<(String, String)> = device
        .properties()
        .iter()
        .map(|(key, value)| {
            let name = format!("HAL_PROP_{}", key.to_ascii_uppercase().replace('.', "_"));
            (name, value.to_string())
        })
        .collect();

    env.push(("UDI".to_string(), device.udi().unwrap_or_default().to_string()));
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use hal_types::DeviceId;

    #[test]
    fn static_rules_apply_only_to_matching_phase_and_device() {
        let rules = StaticRules::new().on(
            RulePhase::Preprobe,
            Query::new().string("info.subsystem", "usb"),
            [(keys::INFO_IGNORE, Value::Bool(true))],
        );

        let mut usb = Device::new(DeviceId::new(1));
        usb.set_property("info.subsystem", "usb").expect("set");
        let mut pci = Device::new(DeviceId::new(2));
        pci.set_property("info.subsystem", "pci").expect("set");

        rules.merge(&mut usb, RulePhase::Policy);
        assert!(!usb.has_property(keys::INFO_IGNORE));

        rules.merge(&mut usb, RulePhase::Preprobe);
        rules.merge(&mut pci, RulePhase::Preprobe);
        assert_eq!(usb.bool(keys::INFO_IGNORE), Some(true));
        assert!(!pci.has_property(keys::INFO_IGNORE));
    }

    #[test]
    fn helper_environment_exports_properties_and_udi() {
        let mut dev = Device::new(DeviceId::new(1));
        dev.set_udi("/org/freedesktop/Hal/devices/computer");
        dev.set_property("system.kernel.name", "FreeBSD").expect("set");
        dev.set_property("info.callouts.add", vec!["a".to_string(), "b".to_string()])
            .expect("set");

        let env = helper_environment(&dev);

        assert!(env.contains(&("HAL_PROP_SYSTEM_KERNEL_NAME".to_string(), "FreeBSD".to_string())));
        assert!(env.contains(&("HAL_PROP_INFO_CALLOUTS_ADD".to_string(), "a\tb".to_string())));
        assert_eq!(
            env.last(),
            Some(&(
                "UDI".to_string(),
                "/org/freedesktop/Hal/devices/computer".to_string()
            ))
        );
    }

    #[test]
    fn callout_programs_default_to_empty() {
        let mut dev = Device::new(DeviceId::new(1));
        assert!(callout_programs(&dev, CalloutPhase::Add).is_empty());

        dev.properties_mut()
            .strlist_append(keys::CALLOUTS_REMOVE, "hal-storage-cleanup")
            .expect("append");
        assert_eq!(callout_programs(&dev, CalloutPhase::Remove), vec!["hal-storage-cleanup"]);
    }
}
