// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Skipped Message Key Cache
//!
//! Holds message keys for messages that have not arrived yet, indexed by
//! (peer ratchet public key, message counter). Capacity is fixed; once full,
//! the oldest inserted key is evicted and zeroized.

use std::collections::{HashMap, VecDeque};

use super::chain::MessageKey;
use super::keys::PUBLIC_KEY_SIZE;

/// Cache index: the ratchet key that produced the chain and the counter.
pub type SkippedKeyId = ([u8; PUBLIC_KEY_SIZE], u32);

/// Bounded, insertion-ordered store of skipped message keys.
#[derive(Debug)]
pub struct SkippedKeyCache {
    keys: HashMap<SkippedKeyId, MessageKey>,
    order: VecDeque<SkippedKeyId>,
    capacity: usize,
}

impl SkippedKeyCache {
    /// Creates an empty cache holding at most `capacity` keys.
    pub fn new(capacity: usize) -> Self {
        SkippedKeyCache {
            keys: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    /// Inserts a key, evicting the oldest entries once capacity is reached.
    ///
    /// Returns the number of evicted entries.
    pub fn insert(&mut self, id: SkippedKeyId, key: MessageKey) -> usize {
        if self.keys.insert(id, key).is_none() {
            self.order.push_back(id);
        }

        let mut evicted = 0;
        while self.keys.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if self.keys.remove(&oldest).is_some() {
                evicted += 1;
            }
        }
        evicted
    }

    /// Looks up a key without consuming it.
    pub fn get(&self, id: &SkippedKeyId) -> Option<&MessageKey> {
        self.keys.get(id)
    }

    /// Removes and returns a key; the caller drops (and so zeroizes) it after use.
    pub fn take(&mut self, id: &SkippedKeyId) -> Option<MessageKey> {
        let key = self.keys.remove(id)?;
        self.order.retain(|entry| entry != id);
        Some(key)
    }

    /// Returns true if a key for `id` is cached.
    pub fn contains(&self, id: &SkippedKeyId) -> bool {
        self.keys.contains_key(id)
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if no keys are cached.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Maximum number of cached keys.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops every cached key.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.order.clear();
    }
}
