// SPDX-License-Identifier: GPL-3.0-only

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use hal_core::{CalloutPhase, Callouts, Completion, HelperRequest, HelperStatus, LoopEvent};
use hal_types::{Device, DeviceId};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Callouts {
        id: DeviceId,
        udi: Option<String>,
        phase: CalloutPhase,
    },
    Helper {
        id: DeviceId,
        command: String,
        timeout: Duration,
        env: Vec<(String, String)>,
    },
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<Call>,
    injected: VecDeque<(CalloutPhase, LoopEvent)>,
    helper_status: Option<HelperStatus>,
}

/// Callout runner that completes everything immediately.
///
/// Clones share their log, so a test keeps one handle and gives the other to
/// the `Hal`.
#[derive(Debug, Clone, Default)]
pub struct FakeCallouts {
    state: Arc<Mutex<State>>,
}

impl FakeCallouts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post `event` to the loop right before the next `phase` callouts
    /// complete, i.e. while the pipeline is waiting on them.
    pub fn inject_during(&self, phase: CalloutPhase, event: LoopEvent) {
        self.lock().injected.push_back((phase, event));
    }

    /// Status every helper reports; `Exited(0)` unless set.
    pub fn set_helper_status(&self, status: HelperStatus) {
        self.lock().helper_status = Some(status);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// UDIs that went through `phase` callouts, in call order.
    pub fn udis_for(&self, phase: CalloutPhase) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Callouts {
                    udi: Some(udi),
                    phase: seen,
                    ..
                } if *seen == phase => Some(udi.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, phase: CalloutPhase) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, Call::Callouts { phase: seen, .. } if *seen == phase))
            .count()
    }

    pub fn clear(&self) {
        self.lock().calls.clear();
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test poisons the lock; the log is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Callouts for FakeCallouts {
    fn run_callouts(&mut self, device: &Device, phase: CalloutPhase, done: Completion) {
        let injected: Vec<LoopEvent> = {
            let mut state = self.lock();
            state.calls.push(Call::Callouts {
                id: device.id(),
                udi: device.udi().map(str::to_string),
                phase,
            });

            let (matching, rest): (VecDeque<_>, VecDeque<_>) = state
                .injected
                .drain(..)
                .partition(|(wanted, _)| *wanted == phase);
            state.injected = rest;
            matching.into_iter().map(|(_, event)| event).collect()
        };

        for event in injected {
            debug!(?event, %phase, "injecting event during callout wait");
            done.handle().post(event);
        }
        done.complete(HelperStatus::Exited(0));
    }

    fn run_helper(&mut self, device: &Device, request: HelperRequest, done: Completion) {
        let status = {
            let mut state = self.lock();
            state.calls.push(Call::Helper {
                id: device.id(),
                command: request.command,
                timeout: request.timeout,
                env: request.extra_env,
            });
            state.helper_status.clone().unwrap_or(HelperStatus::Exited(0))
        };
        done.complete(status);
    }
}
