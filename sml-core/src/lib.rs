// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! SML Core Library
//!
//! Secure Messaging Layer: end-to-end encrypted pairwise sessions with
//! forward secrecy and post-compromise security.
//!
//! - [`identity`]: identity key, signed prekey rotation, one-time prekey pool
//! - [`exchange`]: X3DH key agreement against a published prekey bundle
//! - [`crypto`]: primitives and the Double Ratchet engine
//! - [`session`]: pairwise sessions behind opaque handles
//!
//! All operations are synchronous and CPU-bound. Logging goes through the
//! `tracing` facade; key material is never logged.

pub mod config;
pub mod crypto;
pub mod error;
pub mod exchange;
pub mod identity;
pub mod session;

pub use config::{PrekeyConfig, RatchetConfig, SmlConfig};
pub use crypto::{encrypted_len, DoubleRatchetState, SymmetricKey};
pub use error::{SmlError, SmlResult};
pub use exchange::{InitialMessage, X3DHOutput, X3DH};
pub use identity::{IdentityKeyPair, PrekeyBundle, PrekeyId, PrekeyManager, BUNDLE_SIZE};
pub use session::{GroupSession, PairwiseSession, SessionHandle, SessionRole, SessionStore};
