// SPDX-License-Identifier: GPL-3.0-only

//! Top-level event loop of the device tree thread

use std::ops::ControlFlow;

use hal_types::DeviceId;
use tracing::{debug, info, warn};

use crate::bridge::LoopEvent;
use crate::computer::{ComputerInfo, ensure_computer_device};
use crate::devd::{DevdEvent, DevdHandler, Dispatch, Dispatcher, parse_event};
use crate::devtree;
use crate::enumerator::Enumerator;
use crate::error::Result;
use crate::pipeline::Hal;

/// What became of one devd line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Consumed(&'static str),
    /// Unclaimed add: the whole tree was probed again.
    Probed,
    /// Unclaimed remove of a known device.
    RemovedTree(DeviceId),
    Unclaimed,
    Malformed,
}

pub struct Daemon {
    hal: Hal,
    dispatcher: Dispatcher,
    enumerators: Vec<Box<dyn Enumerator>>,
    computer: ComputerInfo,
}

impl Daemon {
    pub fn new(hal: Hal, computer: ComputerInfo) -> Self {
        Self {
            hal,
            dispatcher: Dispatcher::new(),
            enumerators: Vec::new(),
            computer,
        }
    }

    pub fn add_enumerator(&mut self, enumerator: impl Enumerator + 'static) {
        self.enumerators.push(Box::new(enumerator));
    }

    pub fn add_devd_handler(&mut self, handler: impl DevdHandler + 'static) {
        self.dispatcher.register(handler);
    }

    pub fn hal(&self) -> &Hal {
        &self.hal
    }

    pub fn hal_mut(&mut self) -> &mut Hal {
        &mut self.hal
    }

    /// Make sure the computer root exists, then run every enumerator in order.
    pub fn probe(&mut self) -> Result<()> {
        if !ensure_computer_device(&mut self.hal, &self.computer)? {
            warn!("computer device was ignored, skipping enumeration");
            return Ok(());
        }

        for enumerator in &mut self.enumerators {
            debug!(enumerator = enumerator.name(), "probing");
            enumerator.probe(&mut self.hal);
        }
        Ok(())
    }

    /// Let the owning enumerator rebuild the device; when none does, drop its
    /// subtree and probe everything again.
    pub fn reprobe(&mut self, id: DeviceId) -> Result<()> {
        let claimed = self
            .enumerators
            .iter_mut()
            .any(|enumerator| enumerator.reprobe_device(&mut self.hal, id));
        if claimed {
            return Ok(());
        }

        self.hal.remove_tree(id)?;
        self.probe()
    }

    pub fn tick(&mut self) {
        for enumerator in &mut self.enumerators {
            enumerator.tick(&mut self.hal);
        }
    }

    /// Handle one loop event; `Break` on shutdown.
    ///
    /// Only reachable between waits: a bridge wait borrows the `Hal`
    /// mutably, and events arriving during it are parked by the bridge and
    /// replayed through [`Daemon::drain_deferred`].
    pub fn handle_event(&mut self, event: LoopEvent) -> ControlFlow<()> {
        debug_assert!(!self.hal.is_waiting());

        match event {
            LoopEvent::Hotplug(line) => {
                self.process_line(&line);
            }
            LoopEvent::Rescan => self.tick(),
            LoopEvent::Completed { token, .. } => {
                debug!(?token, "stray completion");
            }
            LoopEvent::Shutdown => {
                info!("shutdown requested");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    pub fn process_line(&mut self, line: &str) -> Handled {
        info!(event = line.trim_end(), "received devd event");

        let event = match parse_event(line) {
            Ok(event) => event,
            Err(error) => {
                warn!("{error}");
                return Handled::Malformed;
            }
        };

        if let Dispatch::Consumed(handler) = self.dispatcher.dispatch(&mut self.hal, &event) {
            return Handled::Consumed(handler);
        }

        match event {
            DevdEvent::Add(attach) => {
                debug!(name = %attach.name, "unclaimed add, probing");
                if let Err(error) = self.probe() {
                    warn!("probe after {} failed: {error}", attach.name);
                }
                Handled::Probed
            }
            DevdEvent::Remove(attach) => {
                let Some(id) = devtree::find_from_name(self.hal.gdl(), &attach.name).map(|d| d.id())
                else {
                    debug!(name = %attach.name, "unclaimed remove of unknown device");
                    return Handled::Unclaimed;
                };
                if let Err(error) = self.hal.remove_tree(id) {
                    warn!("removing {} failed: {error}", attach.name);
                }
                Handled::RemovedTree(id)
            }
            DevdEvent::Notify(_) | DevdEvent::NoMatch(_) => Handled::Unclaimed,
        }
    }

    /// Replay whatever was parked during the last wait.
    pub fn drain_deferred(&mut self) -> ControlFlow<()> {
        while let Some(event) = self.hal.bridge_mut().pop_deferred() {
            self.handle_event(event)?;
        }
        ControlFlow::Continue(())
    }

    /// Consume events until shutdown.
    pub fn run(&mut self) {
        loop {
            let Some(event) = self.hal.bridge_mut().next_event() else {
                info!("event source closed");
                return;
            };
            if self.handle_event(event).is_break() {
                return;
            }
        }
    }
}
