// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Common Test Utilities
//!
//! Shared fixtures for ratchet, session and store tests.

#![allow(dead_code)]

pub mod strategies;

use std::sync::Arc;

use sml_core::crypto::{DhKeyPair, ASSOCIATED_DATA_SIZE};
use sml_core::*;

/// Two ratchets initialized from the same (fake) X3DH output.
pub fn ratchet_pair_with(config: RatchetConfig) -> (DoubleRatchetState, DoubleRatchetState) {
    let shared_secret = SymmetricKey::from_bytes([42u8; 32]);
    let bob_signed_prekey = DhKeyPair::generate();

    let alice = DoubleRatchetState::initialize_initiator(
        &shared_secret,
        [7u8; ASSOCIATED_DATA_SIZE],
        *bob_signed_prekey.public_key(),
        config.clone(),
    );
    let bob = DoubleRatchetState::initialize_responder(
        &shared_secret,
        [7u8; ASSOCIATED_DATA_SIZE],
        &bob_signed_prekey,
        alice.ratchet_public_key(),
        config,
    );
    (alice, bob)
}

pub fn ratchet_pair() -> (DoubleRatchetState, DoubleRatchetState) {
    ratchet_pair_with(RatchetConfig::default())
}

/// Initiator and responder sessions set up through a real X3DH handshake.
pub fn session_pair_with(config: SmlConfig) -> (PairwiseSession, PairwiseSession) {
    let alice = IdentityKeyPair::generate();
    let mut bob =
        PrekeyManager::new(Arc::new(IdentityKeyPair::generate()), config.prekeys.clone()).unwrap();
    let bundle = bob.get_own_prekey_bundle().unwrap();

    let (alice_session, initial) =
        PairwiseSession::initiate(&alice, &bundle, config.ratchet.clone()).unwrap();
    let bob_session = PairwiseSession::accept(&mut bob, &initial, config.ratchet).unwrap();
    (alice_session, bob_session)
}

pub fn session_pair() -> (PairwiseSession, PairwiseSession) {
    session_pair_with(SmlConfig::default())
}

pub fn new_store() -> SessionStore {
    SessionStore::new(IdentityKeyPair::generate(), SmlConfig::default()).unwrap()
}

/// Connects two stores; returns (alice handle, bob handle).
pub fn connect(alice: &SessionStore, bob: &SessionStore) -> (SessionHandle, SessionHandle) {
    let bundle = bob.get_own_prekey_bundle().unwrap();
    let (alice_handle, initial) = alice.init_session(&bundle.to_bytes()).unwrap();
    let bob_handle = bob.accept_session(&initial.to_bytes()).unwrap();
    (alice_handle, bob_handle)
}

/// Encrypts through a store into a freshly sized buffer.
pub fn store_encrypt(store: &SessionStore, handle: SessionHandle, plaintext: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; store.encrypted_len(plaintext.len())];
    let written = store.encrypt(handle, plaintext, &mut out).unwrap();
    out.truncate(written);
    out
}

/// Decrypts through a store into a buffer as large as the message.
pub fn store_decrypt(
    store: &SessionStore,
    handle: SessionHandle,
    message: &[u8],
) -> Result<Vec<u8>, SmlError> {
    let mut out = vec![0u8; message.len()];
    let written = store.decrypt(handle, message, &mut out)?;
    out.truncate(written);
    Ok(out)
}

/// Copy of `message` with one bit flipped.
pub fn flip_bit(message: &[u8], bit: usize) -> Vec<u8> {
    let mut tampered = message.to_vec();
    tampered[bit / 8] ^= 1 << (bit % 8);
    tampered
}
