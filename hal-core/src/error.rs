// SPDX-License-Identifier: GPL-3.0-only

use hal_types::{DeviceId, PropertyError};
use thiserror::Error;

use crate::devd::ParseError;

/// Error types for device tree operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HalError {
    #[error(transparent)]
    Property(#[from] PropertyError),

    #[error("Malformed devd event: {0}")]
    Parse(#[from] ParseError),

    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceId),

    #[error("Device already has UDI {udi}")]
    UdiAlreadyAssigned { udi: String },

    #[error("Device is not in the temporary store: {0}")]
    NotInTemporaryStore(DeviceId),
}

/// Result type alias for device tree operations
pub type Result<T> = std::result::Result<T, HalError>;
