// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Session Key Exchange Module
//!
//! X3DH key agreement against a published prekey bundle, and the initial
//! message the initiator hands to the responder.

pub mod initial;
pub mod x3dh;

pub use initial::{InitialMessage, INITIAL_MESSAGE_SIZE, PROTOCOL_VERSION};
pub use x3dh::{Initiation, X3DHOutput, X3DH};
