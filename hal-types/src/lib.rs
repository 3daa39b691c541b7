// SPDX-License-Identifier: GPL-3.0-only

//! Canonical data model for the hald device tree
//!
//! This crate defines the records every other layer manipulates:
//!
//! - **hal-core**: stores devices, assigns identifiers and drives their lifecycle
//! - **hal-service**: renders properties into helper environments and dumps the tree
//! - **hal-testing**: builds fixtures out of the same types
//!
//! ## Model
//!
//! - `Value` → one typed property value
//! - `PropertyBag` → the key/value mapping owned by a device
//! - `Device` → property bag + identity; the parent link is the `info.parent`
//!   property, a UDI lookup key rather than a pointer

pub mod device;
pub mod error;
pub mod keys;
pub mod property;
pub mod value;

pub use device::{Device, DeviceId};
pub use error::PropertyError;
pub use property::PropertyBag;
pub use value::{Value, ValueKind};
