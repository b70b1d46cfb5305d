//! Remapper Error Handling
//!
//! This module provides the error type for the remapper using `thiserror`.
//! Every failure of a remapping run is fatal: there is no partial result.
//!
//! # Error Categories
//! - **Structural errors**: malformed header, truncated or overrunning instructions,
//!   unknown opcodes, broken function nesting
//! - **Id-state errors**: ids used without declaration, mapped twice, or colliding
//!   with an already claimed new id
//! - **Unsupported errors**: type or constant kinds the structural hasher does not handle,
//!   hash parameters whose candidate ranges leave the id space

use thiserror::Error;

/// Coarse classification of a [`RemapError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCategory {
    /// The module is not well formed.
    Structural = 0,
    /// The id space is inconsistent (corrupt or adversarial module, or an internal bug).
    IdState = 1,
    /// The module uses something the remapper does not implement.
    Unsupported = 2,
}

/// Remapper error types.
///
/// Word positions are absolute indices into the module buffer (the header occupies
/// positions 0-4).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemapError {
    /// The module is shorter than its fixed header.
    #[error("module too short: {words} words (header needs {required})")]
    TooShort { words: usize, required: usize },

    /// The first header word is not the SPIR-V magic number.
    #[error("bad magic number 0x{found:08X}")]
    BadMagic { found: u32 },

    /// The schema header word must be zero.
    #[error("bad schema {found}, must be 0")]
    BadSchema { found: u32 },

    /// A byte stream cannot be split into 32-bit words.
    #[error("byte length {len} is not a multiple of 4")]
    UnalignedBytes { len: usize },

    /// Generic structural problem at a word position.
    #[error("malformed module at word {position}: {message}")]
    Malformed { message: String, position: usize },

    /// An instruction's declared length runs past the end of the walked range.
    #[error("instruction at word {position} ({word_count} words) runs past word {end}")]
    Truncated {
        position: usize,
        word_count: usize,
        end: usize,
    },

    /// The opcode descriptor table has no entry for this opcode.
    #[error("unknown opcode {opcode} at word {position}")]
    UnknownOpcode { opcode: u16, position: usize },

    /// Id 0 (no result / no type) appeared where an id is required.
    #[error("reserved id 0 used as an operand")]
    ReservedId,

    /// An id is not below the module's id bound.
    #[error("id {id} is out of the module bound {bound}")]
    IdOutOfBound { id: u32, bound: u32 },

    /// Mapping was requested for an id never seen in the module.
    #[error("id unused in module: {id}")]
    IdUnused { id: u32 },

    /// An id that is already mapped was mapped again to a different value.
    #[error("id already mapped: {id} -> {current} (requested {requested})")]
    IdAlreadyMapped {
        id: u32,
        current: u32,
        requested: u32,
    },

    /// The requested new id is already claimed by another old id.
    #[error("id already used in module: {new_id} (requested for {id})")]
    IdCollision { id: u32, new_id: u32 },

    /// An id reached the final rewrite without a mapping.
    #[error("old id not mapped: {id}")]
    IdNotMapped { id: u32 },

    /// A type or constant referenced another id that is not a type or constant.
    #[error("type id not found: {id}")]
    TypeNotFound { id: u32 },

    /// A type or constant opcode that structural hashing does not implement.
    #[error("unimplemented type or constant opcode {opcode} at word {position}")]
    UnsupportedType { opcode: u16, position: usize },

    /// A hash candidate range of the remapper's parameters leaves the id space.
    #[error("hash range of the {strategy} strategy runs past the id space")]
    HashRange { strategy: &'static str },
}

impl RemapError {
    /// Create a structural error at a word position.
    #[cold]
    pub fn malformed(message: impl Into<String>, position: usize) -> Self {
        Self::Malformed {
            message: message.into(),
            position,
        }
    }

    /// Taxonomy bucket of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::TooShort { .. }
            | Self::BadMagic { .. }
            | Self::BadSchema { .. }
            | Self::UnalignedBytes { .. }
            | Self::Malformed { .. }
            | Self::Truncated { .. }
            | Self::UnknownOpcode { .. }
            | Self::TypeNotFound { .. } => ErrorCategory::Structural,
            Self::ReservedId
            | Self::IdOutOfBound { .. }
            | Self::IdUnused { .. }
            | Self::IdAlreadyMapped { .. }
            | Self::IdCollision { .. }
            | Self::IdNotMapped { .. } => ErrorCategory::IdState,
            Self::UnsupportedType { .. } | Self::HashRange { .. } => ErrorCategory::Unsupported,
        }
    }
}

/// Result alias used throughout the remapper.
pub type Result<T> = std::result::Result<T, RemapError>;
