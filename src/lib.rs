// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Saju-Account: social sign-in and account lifecycle core
//!
//! This crate federates Google/Apple/Kakao sign-ins into a single identity,
//! classifies the account behind it (new, existing, or returning after
//! withdrawal) and drives the referral and onboarding flow over a per-user
//! profile document in Firestore.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod providers;
pub mod referral;
pub mod repo;
pub mod services;

use config::Config;
use db::FirestoreDb;
use error::Result;
use services::{AccountOrchestrator, ChartClient, IdentityFederator, SessionUi};
use std::sync::Arc;

/// Shared application services, built once at startup.
///
/// The UI layer holds one of these for the process lifetime and derives the
/// orchestrator from it; nothing in the crate relies on globals.
pub struct AppServices {
    pub config: Config,
    pub db: FirestoreDb,
    pub federator: Arc<IdentityFederator>,
    pub charts: ChartClient,
}

impl AppServices {
    /// Connect to the document store and build the service stack.
    pub async fn initialize(config: Config) -> Result<Self> {
        let db = FirestoreDb::new(&config.gcp_project_id).await?;
        let federator = Arc::new(IdentityFederator::new(&config));
        let charts = ChartClient::new(&config);

        tracing::info!(project = %config.gcp_project_id, "Application services initialized");

        Ok(Self {
            config,
            db,
            federator,
            charts,
        })
    }

    /// Build the lifecycle orchestrator bound to the given UI surface.
    pub fn orchestrator(&self, ui: Arc<dyn SessionUi>) -> AccountOrchestrator<FirestoreDb> {
        AccountOrchestrator::new(
            Arc::new(self.db.clone()),
            self.federator.clone(),
            self.charts.clone(),
            ui,
        )
    }
}
