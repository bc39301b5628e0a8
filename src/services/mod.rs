// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod chart;
pub mod federation;
pub mod lifecycle;

pub use chart::ChartClient;
pub use federation::{FederationClient, IdentityFederator};
pub use lifecycle::{
    classify, AccountClass, AccountOrchestrator, LoginFailure, OnboardingOutcome, ReferralOutcome,
    ReferralRejection, SessionState, SessionUi, SignInOutcome,
};
