// SPDX-License-Identifier: GPL-3.0-only

//! Kernel hotplug events as reported by devd(8)

pub mod dispatch;
pub mod parse;

pub use dispatch::{DevdHandler, Dispatch, Dispatcher};
pub use parse::{
    AttachEvent, DevdEvent, EventKind, NoMatchEvent, NotifyEvent, ParseError, Params, parse_event,
};
