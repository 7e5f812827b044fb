// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Session Store
//!
//! The only owner of pairwise session state. Sessions are addressed through
//! opaque, never-reused handles; each session sits behind its own mutex so
//! operations on one session are serialized while distinct sessions proceed
//! in parallel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::pairwise::PairwiseSession;
use crate::config::SmlConfig;
use crate::crypto::{encrypted_len, short_fingerprint, PUBLIC_KEY_SIZE};
use crate::error::{SmlError, SmlResult};
use crate::exchange::InitialMessage;
use crate::identity::{IdentityKeyPair, PrekeyBundle, PrekeyId, PrekeyManager};

/// Opaque handle to a session held by a [`SessionStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionHandle(u64);

impl SessionHandle {
    /// Returns the raw handle value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Rebuilds a handle from a raw value previously returned by [`Self::as_u64`].
    pub fn from_raw(raw: u64) -> Self {
        SessionHandle(raw)
    }
}

impl std::fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

type SharedSession = Arc<Mutex<PairwiseSession>>;

/// Thread-safe owner of our prekeys and all pairwise sessions.
pub struct SessionStore {
    identity: Arc<IdentityKeyPair>,
    prekeys: Mutex<PrekeyManager>,
    sessions: RwLock<HashMap<SessionHandle, SharedSession>>,
    next_handle: AtomicU64,
    config: SmlConfig,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("identity", &short_fingerprint(self.identity.public_key()))
            .field("sessions", &self.session_count())
            .finish()
    }
}

impl SessionStore {
    /// Creates a store for `identity`, generating its prekey material.
    pub fn new(identity: IdentityKeyPair, config: SmlConfig) -> SmlResult<Self> {
        config.validate()?;
        let identity = Arc::new(identity);
        let prekeys = PrekeyManager::new(Arc::clone(&identity), config.prekeys.clone())?;

        Ok(SessionStore {
            identity,
            prekeys: Mutex::new(prekeys),
            sessions: RwLock::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            config,
        })
    }

    /// Returns our identity public key.
    pub fn identity_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        self.identity.public_key()
    }

    pub fn config(&self) -> &SmlConfig {
        &self.config
    }

    fn insert(&self, session: PairwiseSession) -> SessionHandle {
        let handle = SessionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.sessions.write().insert(handle, Arc::new(Mutex::new(session)));
        handle
    }

    fn session(&self, handle: SessionHandle) -> SmlResult<SharedSession> {
        self.sessions
            .read()
            .get(&handle)
            .cloned()
            .ok_or(SmlError::InvalidHandle)
    }

    /// Opens a session against a peer's encoded prekey bundle.
    ///
    /// Returns the new handle and the initial message to deliver to the peer.
    pub fn init_session(&self, peer_bundle: &[u8]) -> SmlResult<(SessionHandle, InitialMessage)> {
        let bundle = PrekeyBundle::from_bytes(peer_bundle)?;
        let (session, initial) =
            PairwiseSession::initiate(&self.identity, &bundle, self.config.ratchet.clone())?;
        let handle = self.insert(session);

        debug!(
            %handle,
            peer = %short_fingerprint(&bundle.identity_key),
            "created session"
        );
        Ok((handle, initial))
    }

    /// Accepts a session from an encoded initial message.
    pub fn accept_session(&self, initial_message: &[u8]) -> SmlResult<SessionHandle> {
        let message = InitialMessage::from_bytes(initial_message)?;
        let session = {
            let mut prekeys = self.prekeys.lock();
            PairwiseSession::accept(&mut prekeys, &message, self.config.ratchet.clone())?
        };
        let handle = self.insert(session);

        debug!(
            %handle,
            peer = %short_fingerprint(&message.identity_key),
            "accepted session"
        );
        Ok(handle)
    }

    /// Destroys a session and erases its key material.
    ///
    /// An operation already running on the session finishes first; the state
    /// is erased when it releases the session.
    pub fn destroy_session(&self, handle: SessionHandle) -> SmlResult<()> {
        let session = self
            .sessions
            .write()
            .remove(&handle)
            .ok_or(SmlError::InvalidHandle)?;
        drop(session);

        debug!(%handle, "destroyed session");
        Ok(())
    }

    /// Returns our prekey bundle, claiming a one-time prekey if available.
    pub fn get_own_prekey_bundle(&self) -> SmlResult<PrekeyBundle> {
        self.prekeys.lock().get_own_prekey_bundle()
    }

    /// Encrypts `plaintext` for the session into `out`.
    pub fn encrypt(
        &self,
        handle: SessionHandle,
        plaintext: &[u8],
        out: &mut [u8],
    ) -> SmlResult<usize> {
        let session = self.session(handle)?;
        let mut session = session.lock();
        session.encrypt_into(plaintext, out)
    }

    /// Decrypts a ratchet message for the session into `out`.
    pub fn decrypt(
        &self,
        handle: SessionHandle,
        message: &[u8],
        out: &mut [u8],
    ) -> SmlResult<usize> {
        let session = self.session(handle)?;
        let mut session = session.lock();
        session.decrypt_into(message, out)
    }

    /// Output size needed to encrypt `plaintext_len` bytes.
    pub fn encrypted_len(&self, plaintext_len: usize) -> usize {
        encrypted_len(plaintext_len)
    }

    /// Rotates our signed prekey; returns the new prekey id.
    pub fn rotate_signed_prekey(&self) -> SmlResult<PrekeyId> {
        self.prekeys.lock().rotate_signed_prekey()
    }

    /// Returns true if the signed prekey is due for rotation.
    pub fn needs_rotation(&self) -> bool {
        self.prekeys.lock().needs_rotation()
    }

    /// Refills the one-time prekey pool; returns the number generated.
    pub fn replenish_one_time_prekeys(&self) -> SmlResult<usize> {
        self.prekeys.lock().replenish_one_time_prekeys()
    }

    /// Returns true if the one-time prekey pool is running low.
    pub fn needs_replenish(&self) -> bool {
        self.prekeys.lock().needs_replenish()
    }

    pub fn one_time_prekeys_available(&self) -> usize {
        self.prekeys.lock().one_time_prekeys_available()
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Identity public key of the session's peer.
    pub fn peer_identity(&self, handle: SessionHandle) -> SmlResult<[u8; PUBLIC_KEY_SIZE]> {
        let session = self.session(handle)?;
        let peer = *session.lock().peer_identity();
        Ok(peer)
    }
}
