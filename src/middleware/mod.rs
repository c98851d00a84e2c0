// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules.

pub mod gate;

pub use gate::{require_session, AuthorizedSession, GateState};
