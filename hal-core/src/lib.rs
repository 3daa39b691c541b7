// SPDX-License-Identifier: GPL-3.0-only

//! Device tree and lifecycle engine for the hald daemon
//!
//! This crate owns everything that happens on the device tree thread:
//! - Device stores (GDL for visible devices, TDL for devices being probed)
//! - UDI assignment
//! - The preprobe/add/remove pipeline and its callout waits
//! - devd event parsing and dispatch to bus handlers
//! - The event loop tying it together
//!
//! Process spawning, sockets and configuration live in hal-service; this
//! crate only sees them through the [`Callouts`] trait and [`LoopEvent`]s.

pub mod bridge;
pub mod collaborators;
pub mod computer;
pub mod daemon;
pub mod devd;
pub mod devtree;
pub mod enumerator;
pub mod error;
pub mod pipeline;
pub mod store;
pub mod udi;

pub use bridge::{
    Bridge, ChannelSource, Completion, CompletionToken, EventSource, HelperStatus, LoopEvent,
    LoopHandle, channel,
};
pub use collaborators::{
    CalloutPhase, Callouts, HelperRequest, MergeRules, NoCallouts, NoMergeRules, RulePhase,
    StaticRules, callout_programs, helper_environment,
};
pub use computer::{ComputerInfo, ensure_computer_device};
pub use daemon::{Daemon, Handled};
pub use devd::{DevdHandler, Dispatch, Dispatcher};
pub use enumerator::Enumerator;
pub use error::{HalError, Result};
pub use pipeline::{DEFAULT_HELPER_TIMEOUT, Hal, HalConfig, Preprobe};
pub use store::{DeviceStore, Query};
