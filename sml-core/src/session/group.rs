// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Group Sessions
//!
//! Multi-party sessions are owned by a separate group protocol. This crate
//! only names the type so callers can hold both kinds of session side by side;
//! it cannot be constructed or operated on here.

/// Opaque group session owned by an external group protocol.
#[derive(Debug)]
pub struct GroupSession {
    _private: (),
}
