// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Ratchet Message Header
//!
//! Wire layout (40 bytes, big-endian integers):
//!
//! ```text
//! ratchet_public_key (32) || counter (4) || previous_chain_length (4)
//! ```
//!
//! A ratchet message is `header || ciphertext || tag (16)`. The header is
//! authenticated as AEAD associated data but not encrypted.

use super::encryption::TAG_SIZE;
use super::keys::PUBLIC_KEY_SIZE;
use crate::error::{SmlError, SmlResult};

/// Encoded header size.
pub const HEADER_SIZE: usize = PUBLIC_KEY_SIZE + 4 + 4;

/// Header carried in front of every ratchet ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Sender's current ratchet public key.
    pub ratchet_key: [u8; PUBLIC_KEY_SIZE],
    /// Message number within the sender's current chain.
    pub counter: u32,
    /// Length of the sender's previous sending chain.
    pub previous_chain_length: u32,
}

impl MessageHeader {
    /// Encodes the header into its fixed wire form.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..32].copy_from_slice(&self.ratchet_key);
        out[32..36].copy_from_slice(&self.counter.to_be_bytes());
        out[36..40].copy_from_slice(&self.previous_chain_length.to_be_bytes());
        out
    }

    /// Splits a ratchet message into its header and the `ciphertext || tag` body.
    pub fn parse(message: &[u8]) -> SmlResult<(MessageHeader, &[u8])> {
        if message.len() < HEADER_SIZE + TAG_SIZE {
            return Err(SmlError::InvalidArgument(format!(
                "ratchet message must be at least {} bytes, got {}",
                HEADER_SIZE + TAG_SIZE,
                message.len()
            )));
        }

        let (header, body) = message.split_at(HEADER_SIZE);
        let mut ratchet_key = [0u8; PUBLIC_KEY_SIZE];
        ratchet_key.copy_from_slice(&header[..32]);
        let mut counter = [0u8; 4];
        counter.copy_from_slice(&header[32..36]);
        let mut previous = [0u8; 4];
        previous.copy_from_slice(&header[36..40]);

        Ok((
            MessageHeader {
                ratchet_key,
                counter: u32::from_be_bytes(counter),
                previous_chain_length: u32::from_be_bytes(previous),
            },
            body,
        ))
    }
}

/// Total size of a ratchet message carrying `plaintext_len` bytes.
pub fn encrypted_len(plaintext_len: usize) -> usize {
    HEADER_SIZE + plaintext_len + TAG_SIZE
}

/// Plaintext size carried by a ratchet message of `message_len` bytes.
pub fn decrypted_len(message_len: usize) -> Option<usize> {
    message_len.checked_sub(HEADER_SIZE + TAG_SIZE)
}
