// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

use crate::ValueKind;

/// Errors raised by typed property access
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error("property {key} holds {found:?}, requested {expected:?}")]
    TypeMismatch {
        key: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("index {index} out of range for {key} (len {len})")]
    IndexOutOfRange { key: String, index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, PropertyError>;
