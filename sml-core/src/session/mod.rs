// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Session Module
//!
//! Pairwise sessions and the store that hands them out behind opaque handles.

pub mod group;
pub mod pairwise;
pub mod store;

pub use group::GroupSession;
pub use pairwise::{PairwiseSession, SessionRole};
pub use store::{SessionHandle, SessionStore};
