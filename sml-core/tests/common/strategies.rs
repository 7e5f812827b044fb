// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Proptest Strategies
//!
//! Reusable strategies for the property tests.

use proptest::prelude::*;

use sml_core::crypto::HEADER_SIZE;

/// Arbitrary plaintexts, including empty ones.
pub fn plaintext_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

/// A batch of plaintexts and a delivery order for them.
pub fn shuffled_batch_strategy() -> impl Strategy<Value = (Vec<Vec<u8>>, Vec<usize>)> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..10).prop_flat_map(
        |batch| {
            let order: Vec<usize> = (0..batch.len()).collect();
            (Just(batch), Just(order).prop_shuffle())
        },
    )
}

/// Bit positions outside the header counter field (bytes 32..36).
///
/// Flipping counter bits can legitimately surface as a skip or replay error
/// instead of an authentication failure.
pub fn tamper_bit_strategy(message_len: usize) -> impl Strategy<Value = usize> {
    (0..message_len * 8).prop_filter("outside counter field", |bit| {
        let byte = bit / 8;
        !(32..HEADER_SIZE - 4).contains(&byte)
    })
}

/// Arbitrary byte vectors, for decoder robustness.
pub fn byte_vec_strategy(min: usize, max: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), min..max)
}
