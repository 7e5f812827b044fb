// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Pairwise Sessions
//!
//! A pairwise session is a Double Ratchet bound to one peer identity. It can
//! be owned directly by a single thread or handed out by a [`SessionStore`].
//!
//! [`SessionStore`]: super::SessionStore

use tracing::debug;

use crate::config::RatchetConfig;
use crate::crypto::{short_fingerprint, DoubleRatchetState, PUBLIC_KEY_SIZE};
use crate::error::SmlResult;
use crate::exchange::{InitialMessage, X3DH};
use crate::identity::{IdentityKeyPair, PrekeyBundle, PrekeyManager};

/// Which side of the handshake created the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    Initiator,
    Responder,
}

/// End-to-end encrypted session with a single peer.
#[derive(Debug)]
pub struct PairwiseSession {
    peer_identity: [u8; PUBLIC_KEY_SIZE],
    role: SessionRole,
    ratchet: DoubleRatchetState,
}

impl PairwiseSession {
    /// Opens a session against a peer's prekey bundle.
    ///
    /// Returns the session and the initial message to deliver to the peer.
    pub fn initiate(
        identity: &IdentityKeyPair,
        bundle: &PrekeyBundle,
        config: RatchetConfig,
    ) -> SmlResult<(Self, InitialMessage)> {
        let initiation = X3DH::initiate(identity, bundle)?;
        let ratchet = DoubleRatchetState::initialize_initiator(
            &initiation.output.shared_secret,
            initiation.output.associated_data,
            *initiation.signed_prekey(),
            config,
        );
        let message = initiation.initial_message(ratchet.ratchet_public_key());

        debug!(
            peer = %short_fingerprint(&bundle.identity_key),
            "opened pairwise session as initiator"
        );
        Ok((
            PairwiseSession {
                peer_identity: bundle.identity_key,
                role: SessionRole::Initiator,
                ratchet,
            },
            message,
        ))
    }

    /// Accepts a session from an initiator's initial message.
    ///
    /// The named one-time prekey is consumed only if the handshake succeeds.
    pub fn accept(
        prekeys: &mut PrekeyManager,
        message: &InitialMessage,
        config: RatchetConfig,
    ) -> SmlResult<Self> {
        let output = X3DH::respond(prekeys, message)?;
        let signed_prekey = prekeys.signed_prekey_for(&message.signed_prekey)?;
        let ratchet = DoubleRatchetState::initialize_responder(
            &output.shared_secret,
            output.associated_data,
            signed_prekey,
            message.ratchet_key,
            config,
        );

        if let Some(id) = message.one_time_prekey_id {
            prekeys.consume_one_time_prekey(id);
        }

        debug!(
            peer = %short_fingerprint(&message.identity_key),
            "accepted pairwise session as responder"
        );
        Ok(PairwiseSession {
            peer_identity: message.identity_key,
            role: SessionRole::Responder,
            ratchet,
        })
    }

    /// Identity public key of the peer.
    pub fn peer_identity(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.peer_identity
    }

    pub fn role(&self) -> SessionRole {
        self.role
    }

    /// Read-only view of the ratchet state.
    pub fn ratchet(&self) -> &DoubleRatchetState {
        &self.ratchet
    }

    /// Encrypts into `out`; see [`DoubleRatchetState::encrypt_into`].
    pub fn encrypt_into(&mut self, plaintext: &[u8], out: &mut [u8]) -> SmlResult<usize> {
        self.ratchet.encrypt_into(plaintext, out)
    }

    /// Decrypts into `out`; see [`DoubleRatchetState::decrypt_into`].
    pub fn decrypt_into(&mut self, message: &[u8], out: &mut [u8]) -> SmlResult<usize> {
        self.ratchet.decrypt_into(message, out)
    }

    pub fn encrypt(&mut self, plaintext: &[u8]) -> SmlResult<Vec<u8>> {
        self.ratchet.encrypt(plaintext)
    }

    pub fn decrypt(&mut self, message: &[u8]) -> SmlResult<Vec<u8>> {
        self.ratchet.decrypt(message)
    }
}
