// SPDX-License-Identifier: GPL-3.0-only

use std::sync::{Arc, Mutex};

use hal_core::devd::{AttachEvent, EventKind, NoMatchEvent, NotifyEvent};
use hal_core::{DevdHandler, Hal};

/// devd handler that remembers what it was offered and claims the event
/// kinds it was built with.
#[derive(Debug, Clone)]
pub struct RecordingHandler {
    name: &'static str,
    claims: Vec<EventKind>,
    seen: Arc<Mutex<Vec<EventKind>>>,
}

impl RecordingHandler {
    pub fn new(name: &'static str, claims: &[EventKind]) -> Self {
        Self {
            name,
            claims: claims.to_vec(),
            seen: Arc::default(),
        }
    }

    /// Sees every event, claims none.
    pub fn passive(name: &'static str) -> Self {
        Self::new(name, &[])
    }

    pub fn seen(&self) -> Vec<EventKind> {
        self.seen
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }

    fn offer(&self, kind: EventKind) -> bool {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(kind);
        }
        self.claims.contains(&kind)
    }
}

impl DevdHandler for RecordingHandler {
    fn name(&self) -> &'static str {
        self.name
    }

    fn add(&mut self, _hal: &mut Hal, _event: &AttachEvent) -> bool {
        self.offer(EventKind::Add)
    }

    fn remove(&mut self, _hal: &mut Hal, _event: &AttachEvent) -> bool {
        self.offer(EventKind::Remove)
    }

    fn notify(&mut self, _hal: &mut Hal, _event: &NotifyEvent) -> bool {
        self.offer(EventKind::Notify)
    }

    fn nomatch(&mut self, _hal: &mut Hal, _event: &NoMatchEvent) -> bool {
        self.offer(EventKind::NoMatch)
    }
}
