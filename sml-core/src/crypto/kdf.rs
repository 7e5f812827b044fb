// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! HKDF Key Derivation Function
//!
//! Implements HMAC-based Extract-and-Expand Key Derivation Function (HKDF)
//! as specified in RFC 5869. Every key in the handshake and the ratchet is
//! derived through here.

use ring::hmac;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

const HASH_LEN: usize = 32;
const MAX_OUTPUT: usize = 255 * HASH_LEN;

/// KDF error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KDFError {
    #[error("Output length exceeds maximum (255 * hash_len)")]
    OutputTooLong,
}

/// HKDF-SHA256 key derivation.
pub struct HKDF;

impl HKDF {
    /// HKDF Extract: PRK = HMAC-SHA256(salt, IKM).
    ///
    /// If salt is None, uses a string of HashLen zeros.
    pub fn extract(salt: Option<&[u8]>, ikm: &[u8]) -> Zeroizing<[u8; 32]> {
        let default_salt = [0u8; HASH_LEN];
        let salt_bytes = salt.unwrap_or(&default_salt);
        let key = hmac::Key::new(hmac::HMAC_SHA256, salt_bytes);
        let tag = hmac::sign(&key, ikm);
        let mut prk = Zeroizing::new([0u8; HASH_LEN]);
        prk.copy_from_slice(tag.as_ref());
        prk
    }

    /// HKDF Expand into a caller-provided buffer.
    ///
    /// T(i) = HMAC-SHA256(PRK, T(i-1) || info || i)
    pub fn expand(prk: &[u8; 32], info: &[u8], out: &mut [u8]) -> Result<(), KDFError> {
        if out.len() > MAX_OUTPUT {
            return Err(KDFError::OutputTooLong);
        }
        Self::expand_bounded(prk, info, out);
        Ok(())
    }

    /// Extract-then-Expand into a caller-provided buffer.
    pub fn derive(
        salt: Option<&[u8]>,
        ikm: &[u8],
        info: &[u8],
        out: &mut [u8],
    ) -> Result<(), KDFError> {
        let prk = Self::extract(salt, ikm);
        Self::expand(&prk, info, out)
    }

    /// Derives a fixed-size 32-byte key.
    pub fn derive_key(salt: Option<&[u8]>, ikm: &[u8], info: &[u8]) -> [u8; 32] {
        let prk = Self::extract(salt, ikm);
        let mut key = [0u8; 32];
        Self::expand_bounded(&prk, info, &mut key);
        key
    }

    /// Derives two 32-byte keys from the same input.
    ///
    /// Used for (root key, chain key) and (message key, next chain key) pairs.
    pub fn derive_key_pair(salt: Option<&[u8]>, ikm: &[u8], info: &[u8]) -> ([u8; 32], [u8; 32]) {
        let prk = Self::extract(salt, ikm);
        let mut okm = Zeroizing::new([0u8; 64]);
        Self::expand_bounded(&prk, info, &mut okm[..]);

        let mut key1 = [0u8; 32];
        let mut key2 = [0u8; 32];
        key1.copy_from_slice(&okm[..32]);
        key2.copy_from_slice(&okm[32..]);
        (key1, key2)
    }

    /// Derives a fixed-size output of `N` bytes.
    pub fn derive_array<const N: usize>(
        salt: Option<&[u8]>,
        ikm: &[u8],
        info: &[u8],
    ) -> Zeroizing<[u8; N]> {
        const { assert!(N <= MAX_OUTPUT) };
        let prk = Self::extract(salt, ikm);
        let mut okm = Zeroizing::new([0u8; N]);
        Self::expand_bounded(&prk, info, &mut okm[..]);
        okm
    }

    /// Expand for outputs already known to be within `MAX_OUTPUT`.
    fn expand_bounded(prk: &[u8; 32], info: &[u8], out: &mut [u8]) {
        let key = hmac::Key::new(hmac::HMAC_SHA256, prk);
        let mut t_prev = [0u8; HASH_LEN];
        let mut t_len = 0;

        for (i, block) in out.chunks_mut(HASH_LEN).enumerate() {
            let mut ctx = hmac::Context::with_key(&key);
            ctx.update(&t_prev[..t_len]);
            ctx.update(info);
            ctx.update(&[(i + 1) as u8]);
            let tag = ctx.sign();

            t_prev.copy_from_slice(tag.as_ref());
            t_len = HASH_LEN;
            block.copy_from_slice(&t_prev[..block.len()]);
        }

        t_prev.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 5869 test case 1
    #[test]
    fn test_rfc5869_case_1() {
        let ikm = [0x0bu8; 22];
        let salt = hex::decode("000102030405060708090a0b0c").unwrap();
        let info = hex::decode("f0f1f2f3f4f5f6f7f8f9").unwrap();

        let mut okm = [0u8; 42];
        HKDF::derive(Some(&salt), &ikm, &info, &mut okm).unwrap();

        assert_eq!(
            hex::encode(okm),
            "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865"
        );
    }

    #[test]
    fn test_expand_rejects_oversized_output() {
        let prk = [0u8; 32];
        let mut out = vec![0u8; MAX_OUTPUT + 1];
        assert_eq!(
            HKDF::expand(&prk, b"info", &mut out),
            Err(KDFError::OutputTooLong)
        );
    }

    #[test]
    fn test_key_pair_halves_match_single_derive() {
        let (a, b) = HKDF::derive_key_pair(None, b"ikm", b"label");

        let mut okm = [0u8; 64];
        HKDF::derive(None, b"ikm", b"label", &mut okm).unwrap();

        assert_eq!(&okm[..32], &a);
        assert_eq!(&okm[32..], &b);
        assert_eq!(HKDF::derive_key(None, b"ikm", b"label"), a);
    }
}
