// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Identity & Prekey Management
//!
//! Owns the long-term identity keypair, the rotating signed prekey and the
//! pool of one-time prekeys, and assembles publishable prekey bundles.
//!
//! The identity key is a single X25519 keypair. It takes part in X3DH as a
//! DH key and signs prekeys with XEdDSA, so peers only ever see 32 bytes.

pub mod manager;
pub mod prekeys;

pub use manager::PrekeyManager;
pub use prekeys::{
    OneTimePrekey, PrekeyBundle, PrekeyId, SignedPrekey, BUNDLE_SIZE, NO_PREKEY_ID,
};

use crate::crypto::{xeddsa_sign, DhKeyPair, Signature, PUBLIC_KEY_SIZE};
use crate::error::SmlResult;

/// Long-term identity keypair.
pub struct IdentityKeyPair {
    keypair: DhKeyPair,
}

impl std::fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityKeyPair")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

impl IdentityKeyPair {
    /// Generates a fresh random identity.
    pub fn generate() -> Self {
        IdentityKeyPair {
            keypair: DhKeyPair::generate(),
        }
    }

    /// Restores an identity from its 32 secret bytes.
    pub fn from_bytes(secret: [u8; 32]) -> Self {
        IdentityKeyPair {
            keypair: DhKeyPair::from_bytes(secret),
        }
    }

    /// Returns the public identity key.
    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        self.keypair.public_key()
    }

    /// Returns the full hex fingerprint of the public identity key.
    pub fn fingerprint(&self) -> String {
        hex::encode(self.keypair.public_key())
    }

    /// Signs `message` with the identity key (XEdDSA).
    pub fn sign(&self, message: &[u8]) -> SmlResult<Signature> {
        Ok(xeddsa_sign(message, &self.keypair)?)
    }

    pub(crate) fn dh_keypair(&self) -> &DhKeyPair {
        &self.keypair
    }
}
