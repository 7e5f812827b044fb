// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Error Types
//!
//! Unified error type for the Secure Messaging Layer. Every failure is
//! returned to the caller; nothing is retried internally.

use thiserror::Error;

use crate::crypto::{EncryptionError, KDFError, SigningError};

/// Unified error type for SML operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SmlError {
    /// Malformed input (wrong key length, bad flag, truncated message).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Output buffer is smaller than the operation requires.
    ///
    /// No session or key state was mutated; retry with `required` bytes.
    #[error("buffer too small: {required} bytes required")]
    BufferTooSmall { required: usize },

    /// Signed prekey signature did not verify against the bundle identity.
    #[error("invalid signed prekey signature")]
    InvalidSignature,

    /// No usable prekey (or chain) material left to serve.
    #[error("key material exhausted: {0}")]
    KeyExhaustion(String),

    /// AEAD authentication failed; ratchet state is unchanged.
    #[error("decryption failed: message corrupted or tampered")]
    DecryptionFailed,

    /// Message key was already consumed, evicted, or never issued.
    #[error("replayed message or unknown message key")]
    ReplayOrUnknownKey,

    /// The counter gap is larger than the configured skip bound.
    #[error("too many skipped messages ({gap}, max {max})")]
    MaxSkipExceeded { gap: u32, max: u32 },

    /// The session handle was destroyed or never issued.
    #[error("invalid session handle")]
    InvalidHandle,
}

impl SmlError {
    /// Returns the stable negative integer code for this error.
    pub fn code(&self) -> i32 {
        match self {
            SmlError::InvalidArgument(_) => -1,
            SmlError::BufferTooSmall { .. } => -2,
            SmlError::InvalidSignature => -3,
            SmlError::KeyExhaustion(_) => -4,
            SmlError::DecryptionFailed => -5,
            SmlError::ReplayOrUnknownKey => -6,
            SmlError::MaxSkipExceeded { .. } => -7,
            SmlError::InvalidHandle => -8,
        }
    }
}

impl From<EncryptionError> for SmlError {
    fn from(_: EncryptionError) -> Self {
        SmlError::DecryptionFailed
    }
}

impl From<KDFError> for SmlError {
    fn from(err: KDFError) -> Self {
        SmlError::InvalidArgument(err.to_string())
    }
}

impl From<SigningError> for SmlError {
    fn from(err: SigningError) -> Self {
        match err {
            SigningError::VerificationFailed => SmlError::InvalidSignature,
            SigningError::InvalidKey => SmlError::InvalidArgument(err.to_string()),
            SigningError::RandomFailed => SmlError::KeyExhaustion(err.to_string()),
        }
    }
}

/// Result type for SML operations.
pub type SmlResult<T> = Result<T, SmlError>;
