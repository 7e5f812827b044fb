// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Chain Key Ratcheting
//!
//! Implements the symmetric ratchet of the Double Ratchet protocol.
//! Each chain key derives exactly one message key and the next chain key;
//! the old chain key is zeroized once it has been replaced.

use zeroize::{Zeroize, Zeroizing};

use super::encryption::{SymmetricKey, NONCE_SIZE};
use super::kdf::HKDF;
use crate::error::{SmlError, SmlResult};

/// KDF info constants for domain separation.
const CHAIN_STEP_INFO: &[u8] = b"SML_Chain_Step";
const MESSAGE_CIPHER_INFO: &[u8] = b"SML_Message_Cipher";

/// A chain key used for symmetric ratcheting.
///
/// Chain keys are never used directly for encryption. They derive:
/// - Message keys (for actual encryption)
/// - The next chain key (for ratcheting forward)
pub struct ChainKey {
    key: [u8; 32],
    generation: u32,
}

impl std::fmt::Debug for ChainKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainKey")
            .field("key", &"[REDACTED]")
            .field("generation", &self.generation)
            .finish()
    }
}

impl Drop for ChainKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl ChainKey {
    /// Creates a new chain key from raw bytes at generation 0.
    pub fn new(key: [u8; 32]) -> Self {
        ChainKey { key, generation: 0 }
    }

    /// Returns the index of the next message key this chain will produce.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Derives the message key for the current generation and the next chain key.
    ///
    /// (message_key, next_chain_key) = KDF(chain_key, CHAIN_STEP_INFO)
    pub fn ratchet(&self) -> SmlResult<(MessageKey, ChainKey)> {
        let next_generation = self
            .generation
            .checked_add(1)
            .ok_or_else(|| SmlError::KeyExhaustion("chain counter exhausted".into()))?;

        let (message_key, next_chain_key) = HKDF::derive_key_pair(None, &self.key, CHAIN_STEP_INFO);

        let message_key = MessageKey {
            key: SymmetricKey::from_bytes(message_key),
            generation: self.generation,
        };
        let next_chain = ChainKey {
            key: next_chain_key,
            generation: next_generation,
        };

        Ok((message_key, next_chain))
    }

    /// Ratchets forward to `target`, returning every intermediate message key,
    /// the message key at `target`, and the chain positioned after it.
    ///
    /// The gap `target - generation` may not exceed `max_skip`.
    pub fn advance_to(&self, target: u32, max_skip: u32) -> SmlResult<AdvancedChain> {
        if target < self.generation {
            return Err(SmlError::ReplayOrUnknownKey);
        }

        let gap = target - self.generation;
        if gap > max_skip {
            return Err(SmlError::MaxSkipExceeded { gap, max: max_skip });
        }

        let mut skipped = Vec::with_capacity(gap as usize);
        let (mut message_key, mut next) = self.ratchet()?;
        while message_key.generation < target {
            skipped.push(message_key);
            let (key, chain) = next.ratchet()?;
            message_key = key;
            next = chain;
        }

        Ok(AdvancedChain {
            skipped,
            message_key,
            next,
        })
    }

    /// Returns a reference to the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

/// Result of ratcheting a chain forward to a target message.
#[derive(Debug)]
pub struct AdvancedChain {
    /// Keys for messages between the old position and the target.
    pub skipped: Vec<MessageKey>,
    /// Key for the target message.
    pub message_key: MessageKey,
    /// Chain positioned right after the target message.
    pub next: ChainKey,
}

/// A message encryption key derived from a chain key.
///
/// Message keys are single-use; dropping one zeroizes it.
pub struct MessageKey {
    key: SymmetricKey,
    generation: u32,
}

impl std::fmt::Debug for MessageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageKey")
            .field("key", &"[REDACTED]")
            .field("generation", &self.generation)
            .finish()
    }
}

impl MessageKey {
    /// Returns the generation this key was derived at.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Returns the underlying symmetric key.
    pub fn symmetric_key(&self) -> &SymmetricKey {
        &self.key
    }

    /// Expands the message key into the AEAD key and nonce for one message.
    pub fn cipher_material(&self) -> (SymmetricKey, Zeroizing<[u8; NONCE_SIZE]>) {
        let okm: Zeroizing<[u8; 32 + NONCE_SIZE]> =
            HKDF::derive_array(None, self.key.as_bytes(), MESSAGE_CIPHER_INFO);

        let mut cipher_key = [0u8; 32];
        cipher_key.copy_from_slice(&okm[..32]);
        let mut nonce = Zeroizing::new([0u8; NONCE_SIZE]);
        nonce.copy_from_slice(&okm[32..]);

        (SymmetricKey::from_bytes(cipher_key), nonce)
    }
}
