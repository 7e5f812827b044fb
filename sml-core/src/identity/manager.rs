// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Prekey Manager
//!
//! Maintains our signed prekey and one-time prekey pool and serves bundles.
//!
//! A one-time prekey leaves the servable pool the moment it is put into a
//! bundle and waits in a bounded "claimed" set until a handshake consumes it.
//! Replenishing the pool is left to the caller (`needs_replenish` reports when
//! it runs low), so no key material is generated behind the caller's back.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use super::prekeys::{OneTimePrekey, PrekeyBundle, PrekeyId, SignedPrekey, NO_PREKEY_ID};
use super::IdentityKeyPair;
use crate::config::PrekeyConfig;
use crate::crypto::{short_fingerprint, DhKeyPair, PUBLIC_KEY_SIZE};
use crate::error::{SmlError, SmlResult};

/// Current time in Unix seconds.
fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Owns our prekey material and serves prekey bundles.
#[derive(Debug)]
pub struct PrekeyManager {
    identity: Arc<IdentityKeyPair>,
    current: SignedPrekey,
    /// Signed prekey replaced by the last rotation, kept for in-flight handshakes
    previous: Option<SignedPrekey>,
    pool: VecDeque<OneTimePrekey>,
    claimed: HashMap<PrekeyId, OneTimePrekey>,
    claimed_order: VecDeque<PrekeyId>,
    next_id: PrekeyId,
    config: PrekeyConfig,
}

impl PrekeyManager {
    /// Creates a manager with a fresh signed prekey and a full one-time pool.
    pub fn new(identity: Arc<IdentityKeyPair>, config: PrekeyConfig) -> SmlResult<Self> {
        Self::new_at(identity, config, unix_now())
    }

    pub(crate) fn new_at(
        identity: Arc<IdentityKeyPair>,
        config: PrekeyConfig,
        now: u64,
    ) -> SmlResult<Self> {
        let first_id = NO_PREKEY_ID + 1;
        let current = SignedPrekey::generate(&identity, first_id, now)?;

        let mut manager = PrekeyManager {
            identity,
            current,
            previous: None,
            pool: VecDeque::new(),
            claimed: HashMap::new(),
            claimed_order: VecDeque::new(),
            next_id: first_id + 1,
            config,
        };
        manager.replenish_one_time_prekeys()?;

        debug!(
            identity = %short_fingerprint(manager.identity.public_key()),
            one_time_prekeys = manager.pool.len(),
            "prekey manager initialized"
        );
        Ok(manager)
    }

    /// Returns the identity this manager signs prekeys with.
    pub fn identity(&self) -> &Arc<IdentityKeyPair> {
        &self.identity
    }

    /// Returns the currently active signed prekey.
    pub fn signed_prekey(&self) -> &SignedPrekey {
        &self.current
    }

    /// Returns our current prekey bundle.
    ///
    /// Includes and claims a one-time prekey if the pool has one; otherwise
    /// the bundle goes out with the presence flag cleared.
    pub fn get_own_prekey_bundle(&mut self) -> SmlResult<PrekeyBundle> {
        self.get_own_prekey_bundle_at(unix_now())
    }

    pub(crate) fn get_own_prekey_bundle_at(&mut self, now: u64) -> SmlResult<PrekeyBundle> {
        if self.current.age(now) > self.config.signed_prekey_lifetime_secs {
            warn!(
                signed_prekey_id = self.current.id(),
                "signed prekey expired, rotation required"
            );
            return Err(SmlError::KeyExhaustion("signed prekey expired".into()));
        }

        let one_time = self.pool.pop_front();
        let bundle = PrekeyBundle {
            identity_key: *self.identity.public_key(),
            signed_prekey: *self.current.public_key(),
            signature: *self.current.signature(),
            one_time_prekey: one_time.as_ref().map(|k| *k.public_key()),
            prekey_id: one_time.as_ref().map_or(NO_PREKEY_ID, |k| k.id()),
        };

        match one_time {
            Some(prekey) => self.claim(prekey),
            None => warn!("one-time prekey pool empty, serving bundle without one-time prekey"),
        }
        if self.needs_replenish() {
            warn!(
                available = self.pool.len(),
                low_water_mark = self.config.low_water_mark,
                "one-time prekey pool running low"
            );
        }

        Ok(bundle)
    }

    fn claim(&mut self, prekey: OneTimePrekey) {
        let id = prekey.id();
        self.claimed.insert(id, prekey);
        self.claimed_order.push_back(id);

        while self.claimed.len() > self.config.max_claimed_prekeys {
            let Some(oldest) = self.claimed_order.pop_front() else {
                break;
            };
            if self.claimed.remove(&oldest).is_some() {
                debug!(prekey_id = oldest, "dropped unused claimed one-time prekey");
            }
        }
    }

    fn allocate_id(&mut self) -> SmlResult<PrekeyId> {
        let id = self.next_id;
        self.next_id = id
            .checked_add(1)
            .ok_or_else(|| SmlError::KeyExhaustion("prekey ids exhausted".into()))?;
        Ok(id)
    }

    /// Replaces the signed prekey, keeping the old one for in-flight handshakes.
    ///
    /// Returns the id of the new signed prekey.
    pub fn rotate_signed_prekey(&mut self) -> SmlResult<PrekeyId> {
        self.rotate_signed_prekey_at(unix_now())
    }

    pub(crate) fn rotate_signed_prekey_at(&mut self, now: u64) -> SmlResult<PrekeyId> {
        let id = self.allocate_id()?;
        let rotated = SignedPrekey::generate(&self.identity, id, now)?;
        let old = std::mem::replace(&mut self.current, rotated);

        debug!(old_id = old.id(), new_id = id, "rotated signed prekey");
        self.previous = Some(old);
        Ok(id)
    }

    /// Returns true if the signed prekey is older than the rotation interval.
    pub fn needs_rotation(&self) -> bool {
        self.needs_rotation_at(unix_now())
    }

    pub(crate) fn needs_rotation_at(&self, now: u64) -> bool {
        self.current.age(now) >= self.config.signed_prekey_rotation_secs
    }

    /// Returns true if the one-time pool is at or below the low water mark.
    pub fn needs_replenish(&self) -> bool {
        self.pool.len() <= self.config.low_water_mark as usize
    }

    /// Refills the one-time pool to its configured size.
    ///
    /// Returns the number of prekeys generated.
    pub fn replenish_one_time_prekeys(&mut self) -> SmlResult<usize> {
        let target = self.config.one_time_pool_size as usize;
        let mut added = 0;
        while self.pool.len() < target {
            let id = self.allocate_id()?;
            self.pool.push_back(OneTimePrekey::generate(id));
            added += 1;
        }

        if added > 0 {
            debug!(
                added,
                available = self.pool.len(),
                "replenished one-time prekeys"
            );
        }
        Ok(added)
    }

    /// Number of one-time prekeys left to serve.
    pub fn one_time_prekeys_available(&self) -> usize {
        self.pool.len()
    }

    /// Number of served one-time prekeys not yet used by a handshake.
    pub fn claimed_prekeys(&self) -> usize {
        self.claimed.len()
    }

    /// Resolves the signed prekey (current or previous) with this public key.
    pub(crate) fn signed_prekey_for(
        &self,
        public: &[u8; PUBLIC_KEY_SIZE],
    ) -> SmlResult<&DhKeyPair> {
        if self.current.public_key() == public {
            return Ok(self.current.keypair());
        }
        match &self.previous {
            Some(previous) if previous.public_key() == public => Ok(previous.keypair()),
            _ => {
                warn!(
                    signed_prekey = %short_fingerprint(public),
                    "handshake names an unknown signed prekey"
                );
                Err(SmlError::KeyExhaustion("unknown signed prekey".into()))
            }
        }
    }

    /// Looks up a claimed one-time prekey without consuming it.
    pub(crate) fn claimed_one_time_prekey(&self, id: PrekeyId) -> SmlResult<&OneTimePrekey> {
        self.claimed.get(&id).ok_or_else(|| {
            warn!(
                prekey_id = id,
                "handshake names an unknown or used one-time prekey"
            );
            SmlError::KeyExhaustion(format!("one-time prekey {id} unavailable"))
        })
    }

    /// Removes a claimed one-time prekey; its secret is erased on drop.
    pub(crate) fn consume_one_time_prekey(&mut self, id: PrekeyId) {
        if self.claimed.remove(&id).is_some() {
            self.claimed_order.retain(|entry| *entry != id);
            debug!(prekey_id = id, "consumed one-time prekey");
        }
    }
}
