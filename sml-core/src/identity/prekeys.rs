// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Prekeys and Prekey Bundles
//!
//! Bundle wire layout (165 bytes, big-endian id):
//!
//! ```text
//! identity (32) || signed_prekey (32) || signature (64)
//!   || one_time_prekey (32) || one_time_present (1) || prekey_id (4)
//! ```
//!
//! The presence flag is authoritative: when it is clear the one-time key
//! bytes are zero on encode and ignored on decode.

use super::IdentityKeyPair;
use crate::crypto::keys::public_key_from_slice;
use crate::crypto::{xeddsa_verify, DhKeyPair, Signature, PUBLIC_KEY_SIZE, SIGNATURE_SIZE};
use crate::error::{SmlError, SmlResult};

/// Identifier of a signed or one-time prekey.
pub type PrekeyId = u32;

/// Bundle prekey id used when no one-time prekey is included.
pub const NO_PREKEY_ID: PrekeyId = 0;

/// Encoded bundle size.
pub const BUNDLE_SIZE: usize = PUBLIC_KEY_SIZE * 3 + SIGNATURE_SIZE + 1 + 4;

/// Curve type byte prepended to a public key before it is signed.
const KEY_ENCODING_PREFIX: u8 = 0x05;

/// Message covered by a signed prekey signature: `0x05 || public key`.
pub fn signed_prekey_message(public: &[u8; PUBLIC_KEY_SIZE]) -> [u8; PUBLIC_KEY_SIZE + 1] {
    let mut message = [0u8; PUBLIC_KEY_SIZE + 1];
    message[0] = KEY_ENCODING_PREFIX;
    message[1..].copy_from_slice(public);
    message
}

/// Medium-lived prekey signed by the identity key.
#[derive(Debug)]
pub struct SignedPrekey {
    id: PrekeyId,
    keypair: DhKeyPair,
    signature: Signature,
    created_at: u64,
}

impl SignedPrekey {
    /// Generates and signs a new prekey created at `created_at` (Unix seconds).
    pub fn generate(
        identity: &IdentityKeyPair,
        id: PrekeyId,
        created_at: u64,
    ) -> SmlResult<Self> {
        let keypair = DhKeyPair::generate();
        let signature = identity.sign(&signed_prekey_message(keypair.public_key()))?;

        Ok(SignedPrekey {
            id,
            keypair,
            signature,
            created_at,
        })
    }

    pub fn id(&self) -> PrekeyId {
        self.id
    }

    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        self.keypair.public_key()
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Creation time in Unix seconds.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Age in seconds at `now`.
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.created_at)
    }

    pub(crate) fn keypair(&self) -> &DhKeyPair {
        &self.keypair
    }
}

/// Single-use prekey from the one-time pool.
#[derive(Debug)]
pub struct OneTimePrekey {
    id: PrekeyId,
    keypair: DhKeyPair,
}

impl OneTimePrekey {
    pub fn generate(id: PrekeyId) -> Self {
        OneTimePrekey {
            id,
            keypair: DhKeyPair::generate(),
        }
    }

    pub fn id(&self) -> PrekeyId {
        self.id
    }

    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        self.keypair.public_key()
    }

    pub(crate) fn keypair(&self) -> &DhKeyPair {
        &self.keypair
    }
}

/// Publishable snapshot of prekey material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrekeyBundle {
    /// Identity public key of the bundle owner.
    pub identity_key: [u8; PUBLIC_KEY_SIZE],
    /// Active signed prekey.
    pub signed_prekey: [u8; PUBLIC_KEY_SIZE],
    /// XEdDSA signature over `0x05 || signed_prekey`.
    pub signature: Signature,
    /// One-time prekey, if the pool had one to serve.
    pub one_time_prekey: Option<[u8; PUBLIC_KEY_SIZE]>,
    /// Id of the one-time prekey, or [`NO_PREKEY_ID`].
    pub prekey_id: PrekeyId,
}

impl PrekeyBundle {
    /// Returns true if a one-time prekey is included.
    pub fn has_one_time_prekey(&self) -> bool {
        self.one_time_prekey.is_some()
    }

    /// Id of the included one-time prekey.
    pub fn one_time_prekey_id(&self) -> Option<PrekeyId> {
        self.one_time_prekey.map(|_| self.prekey_id)
    }

    /// Verifies the signed prekey signature against the bundle identity.
    pub fn verify(&self) -> SmlResult<()> {
        xeddsa_verify(
            &signed_prekey_message(&self.signed_prekey),
            &self.identity_key,
            &self.signature,
        )
        .map_err(|_| SmlError::InvalidSignature)
    }

    /// Encodes the bundle into its fixed wire form.
    pub fn to_bytes(&self) -> [u8; BUNDLE_SIZE] {
        let mut out = [0u8; BUNDLE_SIZE];
        out[0..32].copy_from_slice(&self.identity_key);
        out[32..64].copy_from_slice(&self.signed_prekey);
        out[64..128].copy_from_slice(self.signature.as_bytes());
        if let Some(one_time) = &self.one_time_prekey {
            out[128..160].copy_from_slice(one_time);
            out[160] = 1;
        }
        out[161..165].copy_from_slice(&self.prekey_id.to_be_bytes());
        out
    }

    /// Decodes a bundle. Does not verify the signature.
    pub fn from_bytes(bytes: &[u8]) -> SmlResult<Self> {
        if bytes.len() != BUNDLE_SIZE {
            return Err(SmlError::InvalidArgument(format!(
                "prekey bundle must be {} bytes, got {}",
                BUNDLE_SIZE,
                bytes.len()
            )));
        }

        let identity_key = public_key_from_slice(&bytes[0..32])?;
        let signed_prekey = public_key_from_slice(&bytes[32..64])?;
        let mut signature = [0u8; SIGNATURE_SIZE];
        signature.copy_from_slice(&bytes[64..128]);

        let one_time_prekey = match bytes[160] {
            0 => None,
            1 => Some(public_key_from_slice(&bytes[128..160])?),
            flag => {
                return Err(SmlError::InvalidArgument(format!(
                    "invalid one-time prekey flag {flag}"
                )))
            }
        };

        let mut prekey_id = [0u8; 4];
        prekey_id.copy_from_slice(&bytes[161..165]);
        let prekey_id = if one_time_prekey.is_some() {
            u32::from_be_bytes(prekey_id)
        } else {
            NO_PREKEY_ID
        };

        Ok(PrekeyBundle {
            identity_key,
            signed_prekey,
            signature: Signature::from_bytes(signature),
            one_time_prekey,
            prekey_id,
        })
    }
}
