// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Initial Message
//!
//! Everything the responder needs to complete X3DH and start its ratchet.
//! Wire layout (134 bytes, big-endian id):
//!
//! ```text
//! version (1) || identity (32) || ephemeral (32) || signed_prekey (32)
//!   || ratchet_key (32) || one_time_present (1) || one_time_prekey_id (4)
//! ```

use crate::crypto::PUBLIC_KEY_SIZE;
use crate::error::{SmlError, SmlResult};
use crate::identity::PrekeyId;

/// Current handshake protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Encoded initial message size.
pub const INITIAL_MESSAGE_SIZE: usize = 1 + PUBLIC_KEY_SIZE * 4 + 1 + 4;

/// Handshake material sent from the initiator to the responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitialMessage {
    /// Initiator's identity public key.
    pub identity_key: [u8; PUBLIC_KEY_SIZE],
    /// Initiator's ephemeral public key.
    pub ephemeral_key: [u8; PUBLIC_KEY_SIZE],
    /// Responder's signed prekey the initiator used.
    pub signed_prekey: [u8; PUBLIC_KEY_SIZE],
    /// Initiator's first ratchet public key.
    pub ratchet_key: [u8; PUBLIC_KEY_SIZE],
    /// Responder's one-time prekey the initiator used, if any.
    pub one_time_prekey_id: Option<PrekeyId>,
}

impl InitialMessage {
    /// Encodes the message into its fixed wire form.
    pub fn to_bytes(&self) -> [u8; INITIAL_MESSAGE_SIZE] {
        let mut out = [0u8; INITIAL_MESSAGE_SIZE];
        out[0] = PROTOCOL_VERSION;
        out[1..33].copy_from_slice(&self.identity_key);
        out[33..65].copy_from_slice(&self.ephemeral_key);
        out[65..97].copy_from_slice(&self.signed_prekey);
        out[97..129].copy_from_slice(&self.ratchet_key);
        if let Some(id) = self.one_time_prekey_id {
            out[129] = 1;
            out[130..134].copy_from_slice(&id.to_be_bytes());
        }
        out
    }

    /// Decodes a message, rejecting unknown versions and malformed flags.
    pub fn from_bytes(bytes: &[u8]) -> SmlResult<Self> {
        if bytes.len() != INITIAL_MESSAGE_SIZE {
            return Err(SmlError::InvalidArgument(format!(
                "initial message must be {} bytes, got {}",
                INITIAL_MESSAGE_SIZE,
                bytes.len()
            )));
        }
        if bytes[0] != PROTOCOL_VERSION {
            return Err(SmlError::InvalidArgument(format!(
                "unsupported protocol version {}",
                bytes[0]
            )));
        }

        let key_at = |offset: usize| {
            let mut key = [0u8; PUBLIC_KEY_SIZE];
            key.copy_from_slice(&bytes[offset..offset + PUBLIC_KEY_SIZE]);
            key
        };

        let one_time_prekey_id = match bytes[129] {
            0 => None,
            1 => {
                let mut id = [0u8; 4];
                id.copy_from_slice(&bytes[130..134]);
                Some(u32::from_be_bytes(id))
            }
            flag => {
                return Err(SmlError::InvalidArgument(format!(
                    "invalid one-time prekey flag {flag}"
                )))
            }
        };

        Ok(InitialMessage {
            identity_key: key_at(1),
            ephemeral_key: key_at(33),
            signed_prekey: key_at(65),
            ratchet_key: key_at(97),
            one_time_prekey_id,
        })
    }
}
