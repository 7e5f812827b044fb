// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tests for crypto::ratchet

mod common;

use common::{flip_bit, ratchet_pair, ratchet_pair_with};
use sml_core::crypto::{MessageHeader, HEADER_SIZE, TAG_SIZE};
use sml_core::*;

#[test]
fn test_dr_encrypt_decrypt_roundtrip() {
    let (mut alice, mut bob) = ratchet_pair();

    let plaintext = b"Hello Bob!";
    let message = alice.encrypt(plaintext).unwrap();
    let decrypted = bob.decrypt(&message).unwrap();

    assert_eq!(plaintext.as_slice(), decrypted.as_slice());
}

#[test]
fn test_dr_bidirectional_communication() {
    let (mut alice, mut bob) = ratchet_pair();

    // Alice -> Bob
    let msg1 = alice.encrypt(b"Hello Bob").unwrap();
    assert_eq!(bob.decrypt(&msg1).unwrap(), b"Hello Bob");

    // Bob -> Alice
    let msg2 = bob.encrypt(b"Hello Alice").unwrap();
    assert_eq!(alice.decrypt(&msg2).unwrap(), b"Hello Alice");

    // Alice -> Bob again
    let msg3 = alice.encrypt(b"How are you?").unwrap();
    assert_eq!(bob.decrypt(&msg3).unwrap(), b"How are you?");
}

#[test]
fn test_dr_responder_can_send_first() {
    let (mut alice, mut bob) = ratchet_pair();

    let msg = bob.encrypt(b"Bob speaks first").unwrap();
    assert_eq!(alice.decrypt(&msg).unwrap(), b"Bob speaks first");
}

#[test]
fn test_dr_message_layout() {
    let (mut alice, _bob) = ratchet_pair();

    let msg0 = alice.encrypt(b"Test 1").unwrap();
    let msg1 = alice.encrypt(b"Test 2").unwrap();
    assert_eq!(msg0.len(), encrypted_len(6));

    let (header0, body0) = MessageHeader::parse(&msg0).unwrap();
    let (header1, _) = MessageHeader::parse(&msg1).unwrap();

    assert_eq!(header0.ratchet_key, alice.ratchet_public_key());
    assert_eq!(header0.counter, 0);
    assert_eq!(header1.counter, 1);
    assert_eq!(header0.previous_chain_length, 0);
    assert_eq!(body0.len(), 6 + TAG_SIZE);
    assert_ne!(&body0[..6], b"Test 1");
}

#[test]
fn test_dr_send_counter_increments() {
    let (mut alice, _bob) = ratchet_pair();

    assert_eq!(alice.send_counter(), 0);
    alice.encrypt(b"a").unwrap();
    alice.encrypt(b"b").unwrap();
    assert_eq!(alice.send_counter(), 2);
}

#[test]
fn test_dr_same_plaintext_different_ciphertext() {
    let (mut alice, _bob) = ratchet_pair();

    let msg1 = alice.encrypt(b"same").unwrap();
    let msg2 = alice.encrypt(b"same").unwrap();

    assert_ne!(msg1[HEADER_SIZE..], msg2[HEADER_SIZE..]);
}

#[test]
fn test_dr_dh_ratchet_on_reply() {
    let (mut alice, mut bob) = ratchet_pair();
    let initial_alice_dh = alice.ratchet_public_key();

    let msg1 = alice.encrypt(b"Hello").unwrap();
    bob.decrypt(&msg1).unwrap();

    let msg2 = bob.encrypt(b"Hi").unwrap();
    alice.decrypt(&msg2).unwrap();

    // Alice stepped her DH ratchet on Bob's new key
    assert_ne!(initial_alice_dh, alice.ratchet_public_key());

    let msg3 = alice.encrypt(b"Bye").unwrap();
    let (header, _) = MessageHeader::parse(&msg3).unwrap();
    assert_eq!(header.ratchet_key, alice.ratchet_public_key());
    assert_eq!(header.counter, 0);
    assert_eq!(header.previous_chain_length, 1);
    assert_eq!(bob.decrypt(&msg3).unwrap(), b"Bye");
}

#[test]
fn test_dr_multiple_ratchets() {
    let (mut alice, mut bob) = ratchet_pair();

    for i in 0..5 {
        let msg_a = alice.encrypt(format!("Alice {}", i).as_bytes()).unwrap();
        bob.decrypt(&msg_a).unwrap();

        let msg_b = bob.encrypt(format!("Bob {}", i).as_bytes()).unwrap();
        alice.decrypt(&msg_b).unwrap();
    }

    assert_eq!(alice.dh_generation(), 5);
    assert_eq!(bob.dh_generation(), 5);
    assert!(alice.receiving_chain_count() <= RatchetConfig::default().max_receiving_chains);
    assert!(bob.receiving_chain_count() <= RatchetConfig::default().max_receiving_chains);
}

#[test]
fn test_dr_out_of_order_messages() {
    let (mut alice, mut bob) = ratchet_pair();

    let msg1 = alice.encrypt(b"First").unwrap();
    let msg2 = alice.encrypt(b"Second").unwrap();
    let msg3 = alice.encrypt(b"Third").unwrap();

    // Delivered 1, 3, 2
    assert_eq!(bob.decrypt(&msg1).unwrap(), b"First");
    assert_eq!(bob.decrypt(&msg3).unwrap(), b"Third");
    assert_eq!(bob.skipped_keys_count(), 1);

    assert_eq!(bob.decrypt(&msg2).unwrap(), b"Second");
    assert_eq!(bob.skipped_keys_count(), 0);

    // The cached key was used exactly once
    assert_eq!(bob.decrypt(&msg2), Err(SmlError::ReplayOrUnknownKey));
}

#[test]
fn test_dr_skipped_messages_consumed() {
    let (mut alice, mut bob) = ratchet_pair();

    let messages: Vec<_> = (0..100)
        .map(|i| alice.encrypt(format!("Msg {}", i).as_bytes()).unwrap())
        .collect();

    bob.decrypt(&messages[99]).unwrap();
    assert_eq!(bob.skipped_keys_count(), 99);

    for (i, msg) in messages.iter().enumerate().take(99) {
        let dec = bob.decrypt(msg).unwrap();
        assert_eq!(format!("Msg {}", i).as_bytes(), dec.as_slice());
    }
    assert_eq!(bob.skipped_keys_count(), 0);
}

#[test]
fn test_dr_late_message_from_previous_chain() {
    let (mut alice, mut bob) = ratchet_pair();

    let early = alice.encrypt(b"early").unwrap();
    let late = alice.encrypt(b"late").unwrap();
    bob.decrypt(&early).unwrap();

    // Alice moves to a new sending chain before Bob sees `late`
    let reply = bob.encrypt(b"reply").unwrap();
    alice.decrypt(&reply).unwrap();
    let next = alice.encrypt(b"next chain").unwrap();
    assert_eq!(bob.decrypt(&next).unwrap(), b"next chain");

    assert_eq!(bob.decrypt(&late).unwrap(), b"late");
}

#[test]
fn test_dr_skipped_across_dh_step() {
    let (mut alice, mut bob) = ratchet_pair();

    let reply = bob.encrypt(b"ping").unwrap();
    alice.decrypt(&reply).unwrap();

    // Alice's second chain: Bob only gets message 2 first
    let m0 = alice.encrypt(b"zero").unwrap();
    let m1 = alice.encrypt(b"one").unwrap();
    let m2 = alice.encrypt(b"two").unwrap();

    assert_eq!(bob.decrypt(&m2).unwrap(), b"two");
    assert_eq!(bob.skipped_keys_count(), 2);
    assert_eq!(bob.decrypt(&m0).unwrap(), b"zero");
    assert_eq!(bob.decrypt(&m1).unwrap(), b"one");
}

#[test]
fn test_dr_max_skip_exceeded() {
    let (mut alice, mut bob) = ratchet_pair_with(RatchetConfig {
        max_skip: 10,
        ..RatchetConfig::default()
    });

    let messages: Vec<_> = (0..12).map(|_| alice.encrypt(b"x").unwrap()).collect();

    assert_eq!(
        bob.decrypt(&messages[11]),
        Err(SmlError::MaxSkipExceeded { gap: 11, max: 10 })
    );
    assert_eq!(bob.skipped_keys_count(), 0);

    // Session stays usable for in-range messages
    assert!(bob.decrypt(&messages[0]).is_ok());
    assert!(bob.decrypt(&messages[11]).is_ok());
    assert_eq!(bob.skipped_keys_count(), 10);
}

#[test]
fn test_dr_max_skip_on_new_chain() {
    let (mut alice, mut bob) = ratchet_pair_with(RatchetConfig {
        max_skip: 3,
        ..RatchetConfig::default()
    });

    let messages: Vec<_> = (0..5).map(|_| bob.encrypt(b"y").unwrap()).collect();
    let before = alice.ratchet_public_key();

    assert!(matches!(
        alice.decrypt(&messages[4]),
        Err(SmlError::MaxSkipExceeded { gap: 4, max: 3 })
    ));
    // No DH step was committed
    assert_eq!(alice.ratchet_public_key(), before);
    assert_eq!(alice.receiving_chain_count(), 0);

    assert!(alice.decrypt(&messages[3]).is_ok());
    assert_eq!(alice.receiving_chain_count(), 1);
}

#[test]
fn test_dr_evicted_skipped_key_is_unknown() {
    let (mut alice, mut bob) = ratchet_pair_with(RatchetConfig {
        max_skipped_keys: 5,
        ..RatchetConfig::default()
    });

    let messages: Vec<_> = (0..10).map(|_| alice.encrypt(b"z").unwrap()).collect();
    bob.decrypt(&messages[9]).unwrap();
    assert_eq!(bob.skipped_keys_count(), 5);

    // Keys 0..4 were evicted, 4..9 are still cached
    assert_eq!(bob.decrypt(&messages[0]), Err(SmlError::ReplayOrUnknownKey));
    assert!(bob.decrypt(&messages[4]).is_ok());
    assert!(bob.decrypt(&messages[8]).is_ok());
}

#[test]
fn test_dr_replay_after_receiving_chain_eviction() {
    let (mut alice, mut bob) = ratchet_pair_with(RatchetConfig {
        max_receiving_chains: 2,
        ..RatchetConfig::default()
    });

    let first = alice.encrypt(b"first").unwrap();
    assert_eq!(bob.decrypt(&first).unwrap(), b"first");

    // Undelivered messages keep every chain open until it is evicted
    let _lost = alice.encrypt(b"lost").unwrap();
    for _ in 0..4 {
        let pong = bob.encrypt(b"pong").unwrap();
        let _lost = bob.encrypt(b"lost pong").unwrap();
        alice.decrypt(&pong).unwrap();
        let ping = alice.encrypt(b"ping").unwrap();
        let _lost = alice.encrypt(b"lost ping").unwrap();
        bob.decrypt(&ping).unwrap();
    }
    assert_eq!(bob.receiving_chain_count(), 2);

    let ratchet_key = bob.ratchet_public_key();
    let generation = bob.dh_generation();
    assert_eq!(bob.decrypt(&first), Err(SmlError::ReplayOrUnknownKey));
    assert_eq!(bob.ratchet_public_key(), ratchet_key);
    assert_eq!(bob.dh_generation(), generation);
}

#[test]
fn test_dr_replay_after_many_dh_rounds() {
    let (mut alice, mut bob) = ratchet_pair();
    let max_chains = RatchetConfig::default().max_receiving_chains;

    let first = alice.encrypt(b"first").unwrap();
    bob.decrypt(&first).unwrap();
    for _ in 0..=max_chains {
        let pong = bob.encrypt(b"pong").unwrap();
        alice.decrypt(&pong).unwrap();
        let ping = alice.encrypt(b"ping").unwrap();
        bob.decrypt(&ping).unwrap();
    }

    // Fully received chains are dropped as soon as the peer moves on
    assert_eq!(bob.receiving_chain_count(), 1);
    assert_eq!(bob.decrypt(&first), Err(SmlError::ReplayOrUnknownKey));
}

#[test]
fn test_dr_encrypt_buffer_too_small() {
    let (mut alice, mut bob) = ratchet_pair();
    let plaintext = b"sized exactly";
    let required = encrypted_len(plaintext.len());

    let mut small = vec![0u8; required - 1];
    assert_eq!(
        alice.encrypt_into(plaintext, &mut small),
        Err(SmlError::BufferTooSmall { required })
    );
    assert!(small.iter().all(|b| *b == 0));
    assert_eq!(alice.send_counter(), 0);

    let mut out = vec![0u8; required];
    assert_eq!(alice.encrypt_into(plaintext, &mut out), Ok(required));
    let (header, _) = MessageHeader::parse(&out).unwrap();
    assert_eq!(header.counter, 0);
    assert_eq!(bob.decrypt(&out).unwrap(), plaintext);
}

#[test]
fn test_dr_decrypt_buffer_too_small() {
    let (mut alice, mut bob) = ratchet_pair();
    let message = alice.encrypt(b"twelve bytes").unwrap();

    let mut small = [0u8; 11];
    assert_eq!(
        bob.decrypt_into(&message, &mut small),
        Err(SmlError::BufferTooSmall { required: 12 })
    );

    let mut out = [0u8; 12];
    assert_eq!(bob.decrypt_into(&message, &mut out), Ok(12));
    assert_eq!(&out, b"twelve bytes");
}

#[test]
fn test_dr_truncated_message_rejected() {
    let (_alice, mut bob) = ratchet_pair();

    let result = bob.decrypt(&[0u8; HEADER_SIZE + TAG_SIZE - 1]);
    assert!(matches!(result, Err(SmlError::InvalidArgument(_))));
}

#[test]
fn test_dr_tampered_bits_fail_authentication() {
    let (mut alice, mut bob) = ratchet_pair();
    let message = alice.encrypt(b"integrity matters").unwrap();

    for bit in 0..message.len() * 8 {
        let byte = bit / 8;
        // High counter bits surface as skip errors, checked separately
        if (32..35).contains(&byte) {
            continue;
        }
        let tampered = flip_bit(&message, bit);
        assert_eq!(
            bob.decrypt(&tampered),
            Err(SmlError::DecryptionFailed),
            "bit {} was not detected",
            bit
        );
    }

    // Nothing was committed by the failed attempts
    assert_eq!(bob.skipped_keys_count(), 0);
    assert_eq!(bob.decrypt(&message).unwrap(), b"integrity matters");
}

#[test]
fn test_dr_tampered_counter_never_decrypts() {
    let (mut alice, mut bob) = ratchet_pair();
    let message = alice.encrypt(b"counter").unwrap();

    for bit in 32 * 8..35 * 8 {
        let result = bob.decrypt(&flip_bit(&message, bit));
        assert!(matches!(
            result,
            Err(SmlError::DecryptionFailed) | Err(SmlError::MaxSkipExceeded { .. })
        ));
    }
    assert_eq!(bob.decrypt(&message).unwrap(), b"counter");
}

#[test]
fn test_dr_associated_data_mismatch_fails() {
    use sml_core::crypto::{DhKeyPair, ASSOCIATED_DATA_SIZE};

    let shared_secret = SymmetricKey::from_bytes([42u8; 32]);
    let bob_signed_prekey = DhKeyPair::generate();
    let mut alice = DoubleRatchetState::initialize_initiator(
        &shared_secret,
        [1u8; ASSOCIATED_DATA_SIZE],
        *bob_signed_prekey.public_key(),
        RatchetConfig::default(),
    );
    let mut bob = DoubleRatchetState::initialize_responder(
        &shared_secret,
        [2u8; ASSOCIATED_DATA_SIZE],
        &bob_signed_prekey,
        alice.ratchet_public_key(),
        RatchetConfig::default(),
    );

    let message = alice.encrypt(b"bound to identities").unwrap();
    assert_eq!(bob.decrypt(&message), Err(SmlError::DecryptionFailed));
}

#[test]
fn test_dr_empty_message() {
    let (mut alice, mut bob) = ratchet_pair();

    let msg = alice.encrypt(b"").unwrap();
    assert_eq!(msg.len(), HEADER_SIZE + TAG_SIZE);
    assert!(bob.decrypt(&msg).unwrap().is_empty());
}

#[test]
fn test_dr_large_message() {
    let (mut alice, mut bob) = ratchet_pair();

    let large_data = vec![0xABu8; 100_000];
    let msg = alice.encrypt(&large_data).unwrap();
    assert_eq!(bob.decrypt(&msg).unwrap(), large_data);
}
