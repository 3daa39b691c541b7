// SPDX-License-Identifier: GPL-3.0-only

//! Synchronous-looking waits over asynchronous callouts
//!
//! The device tree lives on a single thread that consumes [`LoopEvent`]s.
//! When the lifecycle pipeline needs a callout to finish, it calls
//! [`Bridge::wait`], which keeps pumping events until the matching
//! completion shows up. While it pumps, the reentrancy guard is set:
//!
//! - completions are recorded,
//! - hotplug lines and shutdown requests are deferred and replayed, in
//!   order, once the outer operation has returned,
//! - rescan ticks are dropped; the next tick retriggers them.
//!
//! Waits never nest. Entering a wait while the guard is set is a
//! programming error and panics.
//!
//! This is a plain pump-until-done loop rather than async/await: the tree
//! is owned by one OS thread and the only suspension points are these waits.

use std::collections::{HashMap, VecDeque};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompletionToken(u64);

/// How a callout batch or helper finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelperStatus {
    Exited(i32),
    Signaled,
    TimedOut,
    Failed(String),
    /// The collaborator dropped its completion without reporting.
    Abandoned,
}

impl HelperStatus {
    /// Exit code on normal termination, `-1` otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Exited(code) => *code,
            _ => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    /// One line read from the devd event socket.
    Hotplug(String),
    /// Periodic rescan tick.
    Rescan,
    Completed {
        token: CompletionToken,
        status: HelperStatus,
    },
    Shutdown,
}

/// Cloneable sender side of the event loop.
#[derive(Debug, Clone)]
pub struct LoopHandle {
    tx: UnboundedSender<LoopEvent>,
}

impl LoopHandle {
    /// Queue an event; `false` once the loop is gone.
    pub fn post(&self, event: LoopEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Blocking event source consumed by the core thread.
pub trait EventSource: Send {
    fn next_event(&mut self) -> Option<LoopEvent>;
}

pub struct ChannelSource {
    rx: UnboundedReceiver<LoopEvent>,
}

impl EventSource for ChannelSource {
    fn next_event(&mut self) -> Option<LoopEvent> {
        self.rx.blocking_recv()
    }
}

pub fn channel() -> (LoopHandle, ChannelSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (LoopHandle { tx }, ChannelSource { rx })
}

/// One-shot completion handed to a collaborator.
///
/// Dropping it without calling [`Completion::complete`] reports
/// [`HelperStatus::Abandoned`] so the waiter is never stranded by a bug.
#[derive(Debug)]
pub struct Completion {
    token: CompletionToken,
    handle: LoopHandle,
    sent: bool,
}

impl Completion {
    pub fn token(&self) -> CompletionToken {
        self.token
    }

    pub fn handle(&self) -> &LoopHandle {
        &self.handle
    }

    pub fn complete(mut self, status: HelperStatus) {
        self.send(status);
    }

    fn send(&mut self, status: HelperStatus) {
        self.sent = true;
        if !self.handle.post(LoopEvent::Completed {
            token: self.token,
            status,
        }) {
            warn!(token = ?self.token, "event loop closed before completion was delivered");
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if !self.sent {
            self.send(HelperStatus::Abandoned);
        }
    }
}

pub struct Bridge {
    waiting: bool,
    next_token: u64,
    finished: HashMap<CompletionToken, HelperStatus>,
    deferred: VecDeque<LoopEvent>,
    handle: LoopHandle,
    source: Box<dyn EventSource>,
}

impl Bridge {
    pub fn new(handle: LoopHandle, source: impl EventSource + 'static) -> Self {
        Self {
            waiting: false,
            next_token: 0,
            finished: HashMap::new(),
            deferred: VecDeque::new(),
            handle,
            source: Box::new(source),
        }
    }

    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    /// The reentrancy guard. Tree-mutating callbacks must bail out while set.
    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    pub fn completion(&mut self) -> Completion {
        let token = CompletionToken(self.next_token);
        self.next_token += 1;
        Completion {
            token,
            handle: self.handle.clone(),
            sent: false,
        }
    }

    /// Pump the event loop until `token` completes.
    ///
    /// # Panics
    ///
    /// When called while another wait is in progress.
    pub fn wait(&mut self, token: CompletionToken) -> HelperStatus {
        assert!(!self.waiting, "nested bridge wait for {token:?}");

        self.waiting = true;
        let status = loop {
            if let Some(status) = self.finished.remove(&token) {
                break status;
            }

            match self.source.next_event() {
                Some(event) => self.pump(event),
                None => {
                    warn!(?token, "event source closed while waiting");
                    break HelperStatus::Abandoned;
                }
            }
        };
        self.waiting = false;

        trace!(?token, ?status, "wait finished");
        status
    }

    /// Park an event until the current operation has finished.
    pub fn defer(&mut self, event: LoopEvent) {
        debug!(?event, "deferring event while waiting");
        self.deferred.push_back(event);
    }

    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }

    pub fn pop_deferred(&mut self) -> Option<LoopEvent> {
        self.deferred.pop_front()
    }

    /// Next event for the top-level loop: deferred events first, in arrival
    /// order, then the source. Completions are absorbed here.
    pub fn next_event(&mut self) -> Option<LoopEvent> {
        loop {
            let event = match self.deferred.pop_front() {
                Some(event) => event,
                None => self.source.next_event()?,
            };

            match event {
                LoopEvent::Completed { token, status } => {
                    debug!(?token, ?status, "completion arrived with nobody waiting");
                    self.finished.insert(token, status);
                }
                other => return Some(other),
            }
        }
    }

    fn pump(&mut self, event: LoopEvent) {
        match event {
            LoopEvent::Completed { token, status } => {
                self.finished.insert(token, status);
            }
            LoopEvent::Rescan => {
                debug!("rescan tick dropped while waiting");
            }
            other => self.defer(other),
        }
    }
}
