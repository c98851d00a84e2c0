// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod claims;
pub mod session;
pub mod user;

pub use claims::Claims;
pub use session::{CredentialFamily, SessionState, SessionView};
pub use user::{LoginRequest, ProfileUpdate, RegistrationRequest, TokenPair, UserProfile};
