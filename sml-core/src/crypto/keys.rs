// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! X25519 Key Pairs
//!
//! Diffie-Hellman key material shared by identity keys, prekeys, ephemeral
//! handshake keys and ratchet keys.

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::error::{SmlError, SmlResult};

/// Size of an X25519 public key.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// X25519 keypair.
///
/// The secret is zeroized on drop by `x25519-dalek`.
#[derive(Clone)]
pub struct DhKeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl std::fmt::Debug for DhKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DhKeyPair")
            .field("public", &short_fingerprint(self.public.as_bytes()))
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl DhKeyPair {
    /// Generates a new random X25519 keypair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);

        DhKeyPair { secret, public }
    }

    /// Creates a keypair from 32 secret bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);

        DhKeyPair { secret, public }
    }

    /// Returns the public key bytes.
    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        self.public.as_bytes()
    }

    /// Returns the secret scalar bytes (unclamped).
    pub(crate) fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.secret.to_bytes())
    }

    /// Performs Diffie-Hellman key agreement with a public key.
    pub fn diffie_hellman(&self, their_public: &[u8; PUBLIC_KEY_SIZE]) -> Zeroizing<[u8; 32]> {
        let shared = self.secret.diffie_hellman(&PublicKey::from(*their_public));
        Zeroizing::new(*shared.as_bytes())
    }

    /// Diffie-Hellman that rejects low-order peer keys.
    ///
    /// A non-contributory result means the peer key forced a known output.
    pub fn diffie_hellman_checked(
        &self,
        their_public: &[u8; PUBLIC_KEY_SIZE],
    ) -> SmlResult<Zeroizing<[u8; 32]>> {
        let shared = self.secret.diffie_hellman(&PublicKey::from(*their_public));
        if !shared.was_contributory() {
            return Err(SmlError::InvalidArgument(
                "peer public key is a low-order point".into(),
            ));
        }
        Ok(Zeroizing::new(*shared.as_bytes()))
    }
}

/// Parses a fixed-size public key from a slice.
pub fn public_key_from_slice(bytes: &[u8]) -> SmlResult<[u8; PUBLIC_KEY_SIZE]> {
    bytes.try_into().map_err(|_| {
        SmlError::InvalidArgument(format!(
            "public key must be {PUBLIC_KEY_SIZE} bytes, got {}",
            bytes.len()
        ))
    })
}

/// First eight hex characters of a public key, for logs and debug output.
pub fn short_fingerprint(public: &[u8; PUBLIC_KEY_SIZE]) -> String {
    hex::encode(&public[..4])
}
