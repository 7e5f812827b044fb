// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Double Ratchet Protocol
//!
//! Implements the Double Ratchet algorithm for end-to-end encrypted messaging
//! with forward secrecy and break-in recovery. Based on the Signal Protocol.
//!
//! The Double Ratchet combines:
//! - A DH ratchet (using X25519) for break-in recovery
//! - Symmetric ratchets (chain keys) for forward secrecy
//!
//! Decryption is transactional: every derivation for an incoming message is
//! staged and only committed after the AEAD tag verifies, so a forged or
//! corrupted message never moves the ratchet.

use std::collections::VecDeque;

use tracing::{debug, warn};
use zeroize::{Zeroize, Zeroizing};

use super::chain::{AdvancedChain, ChainKey, MessageKey};
use super::encryption::{open_in_place, seal_in_place, SymmetricKey, TAG_SIZE};
use super::header::{decrypted_len, encrypted_len, MessageHeader, HEADER_SIZE};
use super::kdf::HKDF;
use super::keys::{short_fingerprint, DhKeyPair, PUBLIC_KEY_SIZE};
use super::skipped::SkippedKeyCache;
use crate::config::RatchetConfig;
use crate::error::{SmlError, SmlResult};

/// KDF info constant for root key derivation.
const ROOT_RATCHET_INFO: &[u8] = b"SML_Root_Ratchet";

/// Session associated data: initiator identity || responder identity.
pub const ASSOCIATED_DATA_SIZE: usize = 2 * PUBLIC_KEY_SIZE;

const AAD_SIZE: usize = ASSOCIATED_DATA_SIZE + HEADER_SIZE;

/// KDF_RK: (root key, chain key) = HKDF(salt = root key, ikm = DH output).
fn kdf_root(root_key: &[u8; 32], dh_output: &[u8; 32]) -> (Zeroizing<[u8; 32]>, ChainKey) {
    let (root, chain) =
        HKDF::derive_key_pair(Some(root_key.as_slice()), &dh_output[..], ROOT_RATCHET_INFO);
    (Zeroizing::new(root), ChainKey::new(chain))
}

/// A receiving chain, keyed by the peer ratchet key that produced it.
struct ReceivingChain {
    ratchet_key: [u8; PUBLIC_KEY_SIZE],
    chain: ChainKey,
    /// Number of messages the peer sent on this chain, known once it moved on.
    limit: Option<u32>,
}

/// Outcome of a DH ratchet step that has not been committed yet.
struct StagedRatchet {
    root_key: Zeroizing<[u8; 32]>,
    receiving: ChainKey,
    our_ratchet: DhKeyPair,
    send_chain: ChainKey,
}

impl StagedRatchet {
    /// Performs a full DH ratchet step against `their_ratchet` without touching state.
    fn compute(
        root_key: &[u8; 32],
        our_current: &DhKeyPair,
        their_ratchet: &[u8; PUBLIC_KEY_SIZE],
    ) -> Self {
        // DH with our current key -> receiving chain
        let dh_recv = our_current.diffie_hellman(their_ratchet);
        let (root_key, receiving) = kdf_root(root_key, &dh_recv);

        // Fresh ratchet keypair -> sending chain
        let our_ratchet = DhKeyPair::generate();
        let dh_send = our_ratchet.diffie_hellman(their_ratchet);
        let (root_key, send_chain) = kdf_root(&root_key, &dh_send);

        StagedRatchet {
            root_key,
            receiving,
            our_ratchet,
            send_chain,
        }
    }
}

/// The Double Ratchet state machine.
///
/// Maintains the cryptographic state for secure bidirectional communication
/// with a single peer. Callers must serialize access to one state.
pub struct DoubleRatchetState {
    /// Root key for deriving new chain keys
    root_key: [u8; 32],
    /// Our current ratchet keypair
    our_ratchet: DhKeyPair,
    /// Last ratchet key observed from the peer
    their_ratchet: Option<[u8; PUBLIC_KEY_SIZE]>,
    /// Sending chain; its generation is the send counter
    send_chain: ChainKey,
    /// Length of our previous sending chain (for message header)
    previous_send_chain_length: u32,
    /// Receiving chains, oldest first
    receiving: VecDeque<ReceivingChain>,
    /// Peer ratchet keys whose receiving chains were dropped, oldest first
    retired: VecDeque<[u8; PUBLIC_KEY_SIZE]>,
    /// Keys for messages skipped over on any receiving chain
    skipped: SkippedKeyCache,
    /// Binds both identities into every message
    associated_data: [u8; ASSOCIATED_DATA_SIZE],
    /// Number of DH ratchet steps performed
    dh_generation: u32,
    config: RatchetConfig,
}

impl std::fmt::Debug for DoubleRatchetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoubleRatchetState")
            .field("ratchet_key", &short_fingerprint(self.our_ratchet.public_key()))
            .field("dh_generation", &self.dh_generation)
            .field("send_counter", &self.send_chain.generation())
            .field("receiving_chains", &self.receiving.len())
            .field("skipped_keys_count", &self.skipped.len())
            .finish()
    }
}

impl Drop for DoubleRatchetState {
    fn drop(&mut self) {
        self.root_key.zeroize();
        self.skipped.clear();
        self.receiving.clear();
        self.retired.clear();
    }
}

impl DoubleRatchetState {
    /// Initialize as the initiator after X3DH.
    ///
    /// The peer's signed prekey doubles as its first ratchet key; we generate
    /// our first ratchet keypair and can send immediately.
    pub fn initialize_initiator(
        shared_secret: &SymmetricKey,
        associated_data: [u8; ASSOCIATED_DATA_SIZE],
        their_signed_prekey: [u8; PUBLIC_KEY_SIZE],
        config: RatchetConfig,
    ) -> Self {
        let our_ratchet = DhKeyPair::generate();
        let dh_output = our_ratchet.diffie_hellman(&their_signed_prekey);
        let (root_key, send_chain) = kdf_root(shared_secret.as_bytes(), &dh_output);

        DoubleRatchetState {
            root_key: *root_key,
            our_ratchet,
            their_ratchet: None,
            send_chain,
            previous_send_chain_length: 0,
            receiving: VecDeque::new(),
            retired: VecDeque::new(),
            skipped: SkippedKeyCache::new(config.max_skipped_keys),
            associated_data,
            dh_generation: 0,
            config,
        }
    }

    /// Initialize as the responder after X3DH.
    ///
    /// Performs the first DH ratchet step against the initiator's ratchet key
    /// right away, so the responder has both a receiving and a sending chain.
    pub fn initialize_responder(
        shared_secret: &SymmetricKey,
        associated_data: [u8; ASSOCIATED_DATA_SIZE],
        our_signed_prekey: &DhKeyPair,
        their_ratchet_key: [u8; PUBLIC_KEY_SIZE],
        config: RatchetConfig,
    ) -> Self {
        let staged =
            StagedRatchet::compute(shared_secret.as_bytes(), our_signed_prekey, &their_ratchet_key);

        let mut receiving = VecDeque::new();
        receiving.push_back(ReceivingChain {
            ratchet_key: their_ratchet_key,
            chain: staged.receiving,
            limit: None,
        });

        DoubleRatchetState {
            root_key: *staged.root_key,
            our_ratchet: staged.our_ratchet,
            their_ratchet: Some(their_ratchet_key),
            send_chain: staged.send_chain,
            previous_send_chain_length: 0,
            receiving,
            retired: VecDeque::new(),
            skipped: SkippedKeyCache::new(config.max_skipped_keys),
            associated_data,
            dh_generation: 1,
            config,
        }
    }

    /// Returns our current ratchet public key.
    pub fn ratchet_public_key(&self) -> [u8; PUBLIC_KEY_SIZE] {
        *self.our_ratchet.public_key()
    }

    /// Returns the session associated data.
    pub fn associated_data(&self) -> &[u8; ASSOCIATED_DATA_SIZE] {
        &self.associated_data
    }

    /// Number of messages sent on the current sending chain.
    pub fn send_counter(&self) -> u32 {
        self.send_chain.generation()
    }

    /// Returns the number of skipped keys currently stored.
    pub fn skipped_keys_count(&self) -> usize {
        self.skipped.len()
    }

    /// Returns the number of receiving chains currently kept.
    pub fn receiving_chain_count(&self) -> usize {
        self.receiving.len()
    }

    /// Returns the number of DH ratchet steps performed.
    pub fn dh_generation(&self) -> u32 {
        self.dh_generation
    }

    fn aad(&self, header: &[u8]) -> [u8; AAD_SIZE] {
        let mut aad = [0u8; AAD_SIZE];
        aad[..ASSOCIATED_DATA_SIZE].copy_from_slice(&self.associated_data);
        aad[ASSOCIATED_DATA_SIZE..].copy_from_slice(header);
        aad
    }

    /// Encrypts `plaintext` into `out` and returns the number of bytes written.
    ///
    /// Fails with `BufferTooSmall` (reporting the required size) before any
    /// state changes if `out` cannot hold the whole message.
    pub fn encrypt_into(&mut self, plaintext: &[u8], out: &mut [u8]) -> SmlResult<usize> {
        let required = encrypted_len(plaintext.len());
        if out.len() < required {
            return Err(SmlError::BufferTooSmall { required });
        }

        let (message_key, next_chain) = self.send_chain.ratchet()?;
        let header = MessageHeader {
            ratchet_key: *self.our_ratchet.public_key(),
            counter: message_key.generation(),
            previous_chain_length: self.previous_send_chain_length,
        };
        let header_bytes = header.to_bytes();
        let aad = self.aad(&header_bytes);

        let body_end = HEADER_SIZE + plaintext.len();
        out[..HEADER_SIZE].copy_from_slice(&header_bytes);
        out[HEADER_SIZE..body_end].copy_from_slice(plaintext);

        let (cipher_key, nonce) = message_key.cipher_material();
        let tag = match seal_in_place(&cipher_key, &nonce, &aad, &mut out[HEADER_SIZE..body_end]) {
            Ok(tag) => tag,
            Err(_) => {
                out[..body_end].zeroize();
                return Err(SmlError::InvalidArgument("plaintext too large".into()));
            }
        };
        out[body_end..required].copy_from_slice(&tag);

        // Old chain key is dropped (and zeroized) here
        self.send_chain = next_chain;
        Ok(required)
    }

    /// Decrypts a ratchet message into `out` and returns the plaintext length.
    ///
    /// Handles DH ratchet steps and out-of-order messages. On any error the
    /// ratchet state is exactly as it was before the call.
    pub fn decrypt_into(&mut self, message: &[u8], out: &mut [u8]) -> SmlResult<usize> {
        let (header, body) = MessageHeader::parse(message)?;
        let plaintext_len = body.len() - TAG_SIZE;
        if out.len() < plaintext_len {
            return Err(SmlError::BufferTooSmall {
                required: plaintext_len,
            });
        }

        let aad = self.aad(&message[..HEADER_SIZE]);
        let (ciphertext, tag_bytes) = body.split_at(plaintext_len);
        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(tag_bytes);
        let out = &mut out[..plaintext_len];
        let skipped_id = (header.ratchet_key, header.counter);

        // Previously skipped message
        if let Some(key) = self.skipped.get(&skipped_id) {
            open_message(key, &aad, ciphertext, &tag, out)?;
            self.skipped.take(&skipped_id);
            debug!(
                counter = header.counter,
                ratchet_key = %short_fingerprint(&header.ratchet_key),
                "decrypted with skipped message key"
            );
            return Ok(plaintext_len);
        }

        // Message on a chain we already know
        if let Some(index) = self
            .receiving
            .iter()
            .position(|c| c.ratchet_key == header.ratchet_key)
        {
            let receiving = &self.receiving[index];
            if header.counter < receiving.chain.generation()
                || receiving.limit.is_some_and(|limit| header.counter >= limit)
            {
                warn!(
                    counter = header.counter,
                    ratchet_key = %short_fingerprint(&header.ratchet_key),
                    "rejected replayed or unknown message"
                );
                return Err(SmlError::ReplayOrUnknownKey);
            }

            let advanced = self.advance(&receiving.chain, header.counter)?;
            open_message(&advanced.message_key, &aad, ciphertext, &tag, out)?;

            let AdvancedChain { skipped, next, .. } = advanced;
            self.receiving[index].chain = next;
            self.store_skipped(header.ratchet_key, skipped);
            self.drop_if_exhausted(index);
            return Ok(plaintext_len);
        }

        // Chain already dropped: nothing left on it can be legitimate
        if self.retired.contains(&header.ratchet_key) {
            warn!(
                counter = header.counter,
                ratchet_key = %short_fingerprint(&header.ratchet_key),
                "rejected message on a retired receiving chain"
            );
            return Err(SmlError::ReplayOrUnknownKey);
        }

        // New ratchet key from the peer: stage a DH ratchet step
        let staged = StagedRatchet::compute(&self.root_key, &self.our_ratchet, &header.ratchet_key);
        let advanced = self.advance(&staged.receiving, header.counter)?;
        open_message(&advanced.message_key, &aad, ciphertext, &tag, out)?;

        self.commit_dh_ratchet(&header, staged, advanced);
        Ok(plaintext_len)
    }

    /// Allocating convenience wrapper around [`Self::encrypt_into`].
    pub fn encrypt(&mut self, plaintext: &[u8]) -> SmlResult<Vec<u8>> {
        let mut out = vec![0u8; encrypted_len(plaintext.len())];
        let written = self.encrypt_into(plaintext, &mut out)?;
        out.truncate(written);
        Ok(out)
    }

    /// Allocating convenience wrapper around [`Self::decrypt_into`].
    pub fn decrypt(&mut self, message: &[u8]) -> SmlResult<Vec<u8>> {
        let len = decrypted_len(message.len()).ok_or_else(|| {
            SmlError::InvalidArgument("ratchet message shorter than header and tag".into())
        })?;
        let mut out = vec![0u8; len];
        let written = self.decrypt_into(message, &mut out)?;
        out.truncate(written);
        Ok(out)
    }

    fn advance(&self, chain: &ChainKey, counter: u32) -> SmlResult<AdvancedChain> {
        chain.advance_to(counter, self.config.max_skip).inspect_err(|err| {
            if let SmlError::MaxSkipExceeded { gap, max } = err {
                warn!(gap, max, "message gap exceeds skip limit");
            }
        })
    }

    fn commit_dh_ratchet(
        &mut self,
        header: &MessageHeader,
        staged: StagedRatchet,
        advanced: AdvancedChain,
    ) {
        // The peer's previous chain is finished; bound it by its reported length
        if let Some(previous) = self.their_ratchet {
            if let Some(index) = self
                .receiving
                .iter()
                .position(|c| c.ratchet_key == previous)
            {
                self.receiving[index].limit = Some(header.previous_chain_length);
                self.drop_if_exhausted(index);
            }
        }

        self.previous_send_chain_length = self.send_chain.generation();
        self.root_key = *staged.root_key;
        self.our_ratchet = staged.our_ratchet;
        self.send_chain = staged.send_chain;
        self.their_ratchet = Some(header.ratchet_key);
        self.dh_generation = self.dh_generation.saturating_add(1);

        let AdvancedChain { skipped, next, .. } = advanced;
        self.receiving.push_back(ReceivingChain {
            ratchet_key: header.ratchet_key,
            chain: next,
            limit: None,
        });
        while self.receiving.len() > self.config.max_receiving_chains {
            if let Some(evicted) = self.receiving.pop_front() {
                self.retire(evicted.ratchet_key);
            }
        }
        self.store_skipped(header.ratchet_key, skipped);

        debug!(
            dh_generation = self.dh_generation,
            their_ratchet = %short_fingerprint(&header.ratchet_key),
            our_ratchet = %short_fingerprint(self.our_ratchet.public_key()),
            previous_chain_length = self.previous_send_chain_length,
            "performed DH ratchet step"
        );
    }

    /// Drops the receiving chain at `index` once it has reached its limit.
    fn drop_if_exhausted(&mut self, index: usize) {
        let exhausted = self.receiving[index]
            .limit
            .is_some_and(|limit| self.receiving[index].chain.generation() >= limit);
        if !exhausted {
            return;
        }

        // Dropping the chain zeroizes its key
        if let Some(chain) = self.receiving.remove(index) {
            debug!(
                ratchet_key = %short_fingerprint(&chain.ratchet_key),
                "dropped exhausted receiving chain"
            );
            self.retire(chain.ratchet_key);
        }
    }

    fn retire(&mut self, ratchet_key: [u8; PUBLIC_KEY_SIZE]) {
        self.retired.push_back(ratchet_key);
        let capacity = self.config.max_receiving_chains.saturating_mul(2);
        while self.retired.len() > capacity {
            self.retired.pop_front();
        }
    }

    fn store_skipped(&mut self, ratchet_key: [u8; PUBLIC_KEY_SIZE], keys: Vec<MessageKey>) {
        if keys.is_empty() {
            return;
        }

        let count = keys.len();
        let mut evicted = 0;
        for key in keys {
            evicted += self.skipped.insert((ratchet_key, key.generation()), key);
        }

        debug!(
            count,
            cached = self.skipped.len(),
            "cached skipped message keys"
        );
        if evicted > 0 {
            warn!(
                evicted,
                capacity = self.skipped.capacity(),
                "skipped key cache full, evicted oldest keys"
            );
        }
    }
}

/// Decrypts `ciphertext` into `out` with the AEAD material of `key`.
fn open_message(
    key: &MessageKey,
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8; TAG_SIZE],
    out: &mut [u8],
) -> SmlResult<()> {
    out.copy_from_slice(ciphertext);
    let (cipher_key, nonce) = key.cipher_material();
    open_in_place(&cipher_key, &nonce, aad, out, tag).map_err(|_| {
        debug!(counter = key.generation(), "message authentication failed");
        SmlError::DecryptionFailed
    })
}
