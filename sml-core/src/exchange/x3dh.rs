// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! X3DH Key Agreement Protocol
//!
//! Derives the initial shared secret for a pairwise session from the peer's
//! published prekey bundle, without the peer being online.
//!
//! DH order (initiator view):
//! - DH1 = DH(IK_A, SPK_B)
//! - DH2 = DH(EK_A, IK_B)
//! - DH3 = DH(EK_A, SPK_B)
//! - DH4 = DH(EK_A, OPK_B), only if a one-time prekey was served
//!
//! SK = HKDF(salt = 0, ikm = 0xFF * 32 || DH1 || DH2 || DH3 [|| DH4])

use tracing::debug;
use zeroize::Zeroizing;

use super::initial::InitialMessage;
use crate::crypto::{
    short_fingerprint, DhKeyPair, SymmetricKey, ASSOCIATED_DATA_SIZE, HKDF, PUBLIC_KEY_SIZE,
};
use crate::error::{SmlError, SmlResult};
use crate::identity::{IdentityKeyPair, PrekeyBundle, PrekeyId, PrekeyManager};

/// KDF info constant for the initial shared secret.
const X3DH_INFO: &[u8] = b"SML_X3DH_Shared_Secret";

/// Leading padding of the KDF input, separating it from other curve25519 uses.
const KDF_PADDING: [u8; 32] = [0xFF; 32];

/// Result of a completed key agreement.
pub struct X3DHOutput {
    /// Initial root secret for the Double Ratchet.
    pub shared_secret: SymmetricKey,
    /// Initiator identity || responder identity.
    pub associated_data: [u8; ASSOCIATED_DATA_SIZE],
}

impl std::fmt::Debug for X3DHOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X3DHOutput")
            .field("shared_secret", &"[REDACTED]")
            .field("associated_data", &hex::encode(self.associated_data))
            .finish()
    }
}

/// Initiator side of a key agreement, before the ratchet key is known.
#[derive(Debug)]
pub struct Initiation {
    pub output: X3DHOutput,
    identity_key: [u8; PUBLIC_KEY_SIZE],
    ephemeral_key: [u8; PUBLIC_KEY_SIZE],
    signed_prekey: [u8; PUBLIC_KEY_SIZE],
    one_time_prekey_id: Option<PrekeyId>,
}

impl Initiation {
    /// The signed prekey the agreement was made against.
    pub fn signed_prekey(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.signed_prekey
    }

    /// Builds the message the responder needs, announcing our first ratchet key.
    pub fn initial_message(&self, ratchet_key: [u8; PUBLIC_KEY_SIZE]) -> InitialMessage {
        InitialMessage {
            identity_key: self.identity_key,
            ephemeral_key: self.ephemeral_key,
            signed_prekey: self.signed_prekey,
            ratchet_key,
            one_time_prekey_id: self.one_time_prekey_id,
        }
    }
}

fn associated_data(
    initiator: &[u8; PUBLIC_KEY_SIZE],
    responder: &[u8; PUBLIC_KEY_SIZE],
) -> [u8; ASSOCIATED_DATA_SIZE] {
    let mut ad = [0u8; ASSOCIATED_DATA_SIZE];
    ad[..PUBLIC_KEY_SIZE].copy_from_slice(initiator);
    ad[PUBLIC_KEY_SIZE..].copy_from_slice(responder);
    ad
}

fn derive_shared_secret(dh_outputs: &[&[u8; 32]]) -> SymmetricKey {
    let mut ikm = Zeroizing::new(Vec::with_capacity(32 * (dh_outputs.len() + 1)));
    ikm.extend_from_slice(&KDF_PADDING);
    for dh in dh_outputs {
        ikm.extend_from_slice(&dh[..]);
    }
    SymmetricKey::from_bytes(HKDF::derive_key(None, &ikm, X3DH_INFO))
}

/// X3DH protocol implementation.
pub struct X3DH;

impl X3DH {
    /// Initiates key agreement against a peer's prekey bundle.
    ///
    /// Verifies the bundle signature first; nothing is derived from an
    /// unverified bundle.
    pub fn initiate(identity: &IdentityKeyPair, bundle: &PrekeyBundle) -> SmlResult<Initiation> {
        bundle.verify()?;
        if &bundle.identity_key == identity.public_key() {
            return Err(SmlError::InvalidArgument(
                "cannot open a session with our own bundle".into(),
            ));
        }

        let ephemeral = DhKeyPair::generate();
        let dh1 = identity
            .dh_keypair()
            .diffie_hellman_checked(&bundle.signed_prekey)?;
        let dh2 = ephemeral.diffie_hellman_checked(&bundle.identity_key)?;
        let dh3 = ephemeral.diffie_hellman_checked(&bundle.signed_prekey)?;

        let shared_secret = match &bundle.one_time_prekey {
            Some(one_time) => {
                let dh4 = ephemeral.diffie_hellman_checked(one_time)?;
                derive_shared_secret(&[&*dh1, &*dh2, &*dh3, &*dh4])
            }
            None => derive_shared_secret(&[&*dh1, &*dh2, &*dh3]),
        };

        debug!(
            peer = %short_fingerprint(&bundle.identity_key),
            one_time_prekey = bundle.has_one_time_prekey(),
            "initiated X3DH"
        );

        Ok(Initiation {
            output: X3DHOutput {
                shared_secret,
                associated_data: associated_data(identity.public_key(), &bundle.identity_key),
            },
            identity_key: *identity.public_key(),
            ephemeral_key: *ephemeral.public_key(),
            signed_prekey: bundle.signed_prekey,
            one_time_prekey_id: bundle.one_time_prekey_id(),
        })
    }

    /// Completes key agreement as the responder.
    ///
    /// Only reads prekey material; the caller consumes the one-time prekey
    /// once the session has been set up.
    pub fn respond(prekeys: &PrekeyManager, message: &InitialMessage) -> SmlResult<X3DHOutput> {
        let identity = prekeys.identity();
        if &message.identity_key == identity.public_key() {
            return Err(SmlError::InvalidArgument(
                "initial message comes from our own identity".into(),
            ));
        }

        let signed_prekey = prekeys.signed_prekey_for(&message.signed_prekey)?;
        let dh1 = signed_prekey.diffie_hellman_checked(&message.identity_key)?;
        let dh2 = identity
            .dh_keypair()
            .diffie_hellman_checked(&message.ephemeral_key)?;
        let dh3 = signed_prekey.diffie_hellman_checked(&message.ephemeral_key)?;

        let shared_secret = match message.one_time_prekey_id {
            Some(id) => {
                let one_time = prekeys.claimed_one_time_prekey(id)?;
                let dh4 = one_time
                    .keypair()
                    .diffie_hellman_checked(&message.ephemeral_key)?;
                derive_shared_secret(&[&*dh1, &*dh2, &*dh3, &*dh4])
            }
            None => derive_shared_secret(&[&*dh1, &*dh2, &*dh3]),
        };

        debug!(
            peer = %short_fingerprint(&message.identity_key),
            one_time_prekey = message.one_time_prekey_id.is_some(),
            "responded to X3DH"
        );

        Ok(X3DHOutput {
            shared_secret,
            associated_data: associated_data(&message.identity_key, identity.public_key()),
        })
    }
}
