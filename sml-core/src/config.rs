// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration
//!
//! Tunables for the ratchet engine and the prekey manager. All fields have
//! defaults, so a partial JSON document is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::error::{SmlError, SmlResult};

/// Configuration for an SML instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmlConfig {
    /// Double Ratchet limits.
    pub ratchet: RatchetConfig,

    /// Prekey pool and rotation policy.
    pub prekeys: PrekeyConfig,
}

impl SmlConfig {
    /// Parses a configuration from JSON, filling missing fields with defaults.
    pub fn from_json(json: &str) -> SmlResult<Self> {
        let config: SmlConfig = serde_json::from_str(json)
            .map_err(|e| SmlError::InvalidArgument(format!("config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every capacity is usable.
    pub fn validate(&self) -> SmlResult<()> {
        self.ratchet.validate()?;
        self.prekeys.validate()
    }

    /// Sets the maximum counter gap a single message may skip.
    pub fn with_max_skip(mut self, max_skip: u32) -> Self {
        self.ratchet.max_skip = max_skip;
        self
    }

    /// Sets the skipped-key cache capacity.
    pub fn with_max_skipped_keys(mut self, capacity: usize) -> Self {
        self.ratchet.max_skipped_keys = capacity;
        self
    }

    /// Sets how many receiving chains a session keeps.
    pub fn with_max_receiving_chains(mut self, chains: usize) -> Self {
        self.ratchet.max_receiving_chains = chains;
        self
    }

    /// Sets the one-time prekey pool size.
    pub fn with_one_time_pool_size(mut self, size: u32) -> Self {
        self.prekeys.one_time_pool_size = size;
        self
    }

    /// Sets the pool level below which replenishment is requested.
    pub fn with_low_water_mark(mut self, mark: u32) -> Self {
        self.prekeys.low_water_mark = mark;
        self
    }

    /// Sets the signed prekey lifetime in seconds.
    pub fn with_signed_prekey_lifetime_secs(mut self, secs: u64) -> Self {
        self.prekeys.signed_prekey_lifetime_secs = secs;
        self
    }
}

/// Double Ratchet limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatchetConfig {
    /// Largest counter gap a single incoming message may open.
    pub max_skip: u32,

    /// Skipped message keys retained per session (oldest evicted).
    pub max_skipped_keys: usize,

    /// Receiving chains retained per session (oldest evicted).
    pub max_receiving_chains: usize,
}

impl Default for RatchetConfig {
    fn default() -> Self {
        RatchetConfig {
            max_skip: 1000,
            max_skipped_keys: 1000,
            max_receiving_chains: 5,
        }
    }
}

impl RatchetConfig {
    fn validate(&self) -> SmlResult<()> {
        if self.max_skipped_keys == 0 {
            return Err(SmlError::InvalidArgument(
                "max_skipped_keys must be non-zero".into(),
            ));
        }
        if self.max_receiving_chains == 0 {
            return Err(SmlError::InvalidArgument(
                "max_receiving_chains must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Prekey pool and rotation policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrekeyConfig {
    /// Number of one-time prekeys the pool is filled to.
    pub one_time_pool_size: u32,

    /// Pool level at or below which `needs_replenish` reports true.
    pub low_water_mark: u32,

    /// Served one-time prekeys awaiting a handshake (oldest evicted).
    pub max_claimed_prekeys: usize,

    /// Age after which the signed prekey should be rotated.
    pub signed_prekey_rotation_secs: u64,

    /// Age after which the signed prekey may no longer be served.
    pub signed_prekey_lifetime_secs: u64,
}

impl Default for PrekeyConfig {
    fn default() -> Self {
        PrekeyConfig {
            one_time_pool_size: 100,
            low_water_mark: 10,
            max_claimed_prekeys: 200,
            signed_prekey_rotation_secs: 7 * 24 * 60 * 60,
            signed_prekey_lifetime_secs: 30 * 24 * 60 * 60,
        }
    }
}

impl PrekeyConfig {
    fn validate(&self) -> SmlResult<()> {
        if self.max_claimed_prekeys == 0 {
            return Err(SmlError::InvalidArgument(
                "max_claimed_prekeys must be non-zero".into(),
            ));
        }
        if self.low_water_mark > self.one_time_pool_size {
            return Err(SmlError::InvalidArgument(
                "low_water_mark exceeds one_time_pool_size".into(),
            ));
        }
        Ok(())
    }
}
