// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod birth;
pub mod identity;
pub mod profile;

pub use birth::{BirthProfile, BirthProfileError, DerivedChart, Gender};
pub use identity::{FederatedIdentity, ProviderKind};
pub use profile::{AccountProfile, ProfileChanges};
