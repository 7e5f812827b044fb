// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! XEdDSA Signatures
//!
//! Lets the X25519 identity key sign its own signed prekeys, so a bundle only
//! has to publish one 32-byte identity key.
//!
//! <https://signal.org/docs/specifications/xeddsa/>

use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::montgomery::MontgomeryPoint;
use curve25519_dalek::scalar::{clamp_integer, Scalar};
use ring::digest::{Context, SHA512};
use ring::rand::{SecureRandom, SystemRandom};
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use super::keys::DhKeyPair;

/// Size of an XEdDSA signature.
pub const SIGNATURE_SIZE: usize = 64;

/// hash1 prefix: 0xFE followed by 31 bytes of 0xFF.
const HASH_1_PREFIX: [u8; 32] = [
    0xFE, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
];

/// Signing error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("public key is not a valid curve point")]
    InvalidKey,
    #[error("signature does not match public key and message")]
    VerificationFailed,
    #[error("system RNG failed")]
    RandomFailed,
}

/// XEdDSA signature (64 bytes).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    bytes: [u8; SIGNATURE_SIZE],
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({})", hex::encode(&self.bytes[..8]))
    }
}

impl Signature {
    /// Creates a signature from raw bytes.
    pub fn from_bytes(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Signature { bytes }
    }

    /// Returns the raw bytes of the signature.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.bytes
    }
}

fn sha512(parts: &[&[u8]]) -> [u8; 64] {
    let mut ctx = Context::new(&SHA512);
    for part in parts {
        ctx.update(part);
    }
    let mut out = [0u8; 64];
    out.copy_from_slice(ctx.finish().as_ref());
    out
}

/// Signs `message` with the secret half of an X25519 keypair.
pub fn xeddsa_sign(message: &[u8], keypair: &DhKeyPair) -> Result<Signature, SigningError> {
    let rng = SystemRandom::new();
    let mut z = Zeroizing::new([0u8; 64]);
    rng.fill(&mut z[..])
        .map_err(|_| SigningError::RandomFailed)?;

    // calculate_key_pair(k): force the Edwards sign bit to zero
    let mut k = Scalar::from_bytes_mod_order(clamp_integer(*keypair.secret_bytes()));
    let mut cap_a = (&k * ED25519_BASEPOINT_TABLE).compress().to_bytes();
    let sign_bit = cap_a[31] >> 7;
    cap_a[31] &= 0b0111_1111;
    let mut a = if sign_bit == 1 { -k } else { k };
    k.zeroize();

    // r = hash1(a || M || Z) (mod q)
    let mut nonce_hash = sha512(&[&HASH_1_PREFIX, a.as_bytes(), message, &z[..]]);
    let mut r = Scalar::from_bytes_mod_order_wide(&nonce_hash);
    nonce_hash.zeroize();

    let cap_r = (&r * ED25519_BASEPOINT_TABLE).compress();

    // h = hash(R || A || M) (mod q)
    let h = Scalar::from_bytes_mod_order_wide(&sha512(&[cap_r.as_bytes(), &cap_a, message]));
    let s = r + h * a;
    r.zeroize();
    a.zeroize();

    let mut bytes = [0u8; SIGNATURE_SIZE];
    bytes[..32].copy_from_slice(cap_r.as_bytes());
    bytes[32..].copy_from_slice(s.as_bytes());
    Ok(Signature { bytes })
}

/// Verifies an XEdDSA signature against an X25519 public key.
pub fn xeddsa_verify(
    message: &[u8],
    public: &[u8; 32],
    signature: &Signature,
) -> Result<(), SigningError> {
    let mut cap_r = [0u8; 32];
    cap_r.copy_from_slice(&signature.bytes[..32]);
    let mut s_bytes = [0u8; 32];
    s_bytes.copy_from_slice(&signature.bytes[32..]);

    // Reject non-canonical s
    let s: Option<Scalar> = Scalar::from_canonical_bytes(s_bytes).into();
    let s = s.ok_or(SigningError::VerificationFailed)?;

    // convert_mont(u) with sign bit 0
    let a = MontgomeryPoint(*public)
        .to_edwards(0)
        .ok_or(SigningError::InvalidKey)?;
    let cap_a = a.compress();

    let h = Scalar::from_bytes_mod_order_wide(&sha512(&[&cap_r, cap_a.as_bytes(), message]));

    // Rcheck = sB - hA
    let r_check = EdwardsPoint::vartime_double_scalar_mul_basepoint(&h, &(-a), &s).compress();

    if bool::from(r_check.as_bytes().ct_eq(&cap_r)) {
        Ok(())
    } else {
        Err(SigningError::VerificationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let kp = DhKeyPair::generate();
        let sig = xeddsa_sign(b"signed prekey", &kp).unwrap();

        assert!(xeddsa_verify(b"signed prekey", kp.public_key(), &sig).is_ok());
    }

    #[test]
    fn test_verify_rejects_wrong_message_key_and_signature() {
        let kp = DhKeyPair::generate();
        let other = DhKeyPair::generate();
        let sig = xeddsa_sign(b"hello", &kp).unwrap();
        let other_sig = xeddsa_sign(b"hello", &other).unwrap();

        assert_eq!(
            xeddsa_verify(b"hellp", kp.public_key(), &sig),
            Err(SigningError::VerificationFailed)
        );
        assert_eq!(
            xeddsa_verify(b"hello", other.public_key(), &sig),
            Err(SigningError::VerificationFailed)
        );
        assert_eq!(
            xeddsa_verify(b"hello", kp.public_key(), &other_sig),
            Err(SigningError::VerificationFailed)
        );
    }

    #[test]
    fn test_signatures_are_randomized() {
        let kp = DhKeyPair::generate();
        let a = xeddsa_sign(b"same", &kp).unwrap();
        let b = xeddsa_sign(b"same", &kp).unwrap();

        assert_ne!(a, b);
        assert!(xeddsa_verify(b"same", kp.public_key(), &b).is_ok());
    }

    #[test]
    fn test_flipped_signature_bit_fails() {
        let kp = DhKeyPair::generate();
        let sig = xeddsa_sign(b"msg", &kp).unwrap();

        let mut bytes = *sig.as_bytes();
        bytes[10] ^= 0x01;
        assert!(xeddsa_verify(b"msg", kp.public_key(), &Signature::from_bytes(bytes)).is_err());
    }
}
