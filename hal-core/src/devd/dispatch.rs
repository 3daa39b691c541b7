// SPDX-License-Identifier: GPL-3.0-only

use tracing::debug;

use super::parse::{AttachEvent, DevdEvent, NoMatchEvent, NotifyEvent};
use crate::pipeline::Hal;

/// Bus-specific reaction to devd events.
///
/// Every callback answers whether it consumed the event; the first `true`
/// stops dispatch.
pub trait DevdHandler: Send {
    fn name(&self) -> &'static str;

    fn add(&mut self, _hal: &mut Hal, _event: &AttachEvent) -> bool {
        false
    }

    fn remove(&mut self, _hal: &mut Hal, _event: &AttachEvent) -> bool {
        false
    }

    fn notify(&mut self, _hal: &mut Hal, _event: &NotifyEvent) -> bool {
        false
    }

    fn nomatch(&mut self, _hal: &mut Hal, _event: &NoMatchEvent) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Consumed(&'static str),
    Unclaimed,
}

/// Ordered handler chain.
#[derive(Default)]
pub struct Dispatcher {
    handlers: Vec<Box<dyn DevdHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: impl DevdHandler + 'static) {
        self.handlers.push(Box::new(handler));
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn dispatch(&mut self, hal: &mut Hal, event: &DevdEvent) -> Dispatch {
        for handler in &mut self.handlers {
            let consumed = match event {
                DevdEvent::Add(attach) => handler.add(hal, attach),
                DevdEvent::Remove(attach) => handler.remove(hal, attach),
                DevdEvent::Notify(notify) => handler.notify(hal, notify),
                DevdEvent::NoMatch(nomatch) => handler.nomatch(hal, nomatch),
            };

            if consumed {
                debug!(handler = handler.name(), kind = %event.kind(), "devd event consumed");
                return Dispatch::Consumed(handler.name());
            }
        }

        Dispatch::Unclaimed
    }
}
