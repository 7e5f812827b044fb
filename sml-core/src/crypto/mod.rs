// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod chain;
pub mod encryption;
pub mod header;
pub mod kdf;
pub mod keys;
pub mod ratchet;
pub mod signing;
pub mod skipped;

pub use chain::{ChainKey, MessageKey};
pub use encryption::{EncryptionError, SymmetricKey, NONCE_SIZE, TAG_SIZE};
pub use header::{decrypted_len, encrypted_len, MessageHeader, HEADER_SIZE};
pub use kdf::{KDFError, HKDF};
pub use keys::{short_fingerprint, DhKeyPair, PUBLIC_KEY_SIZE};
pub use ratchet::{DoubleRatchetState, ASSOCIATED_DATA_SIZE};
pub use signing::{xeddsa_sign, xeddsa_verify, Signature, SigningError, SIGNATURE_SIZE};
pub use skipped::SkippedKeyCache;
