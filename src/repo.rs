// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account repository contract.
//!
//! The lifecycle orchestrator talks to the profile store exclusively through
//! this trait; production binds it to Firestore (`db::FirestoreDb`), tests
//! bind it to an in-memory store.

use crate::error::Result;
use crate::models::{AccountProfile, BirthProfile, DerivedChart, ProfileChanges, ProviderKind};
use async_trait::async_trait;

/// CRUD and lifecycle operations over per-user account documents.
///
/// Expected absence is modeled with `Option`/`bool` returns; `NotFound`
/// errors are reserved for operations that target a document which must
/// exist. Transport failures surface as `NetworkError`.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Create a brand-new account document with a freshly generated unique
    /// referral code and creation defaults.
    ///
    /// Fails with `CodeGenerationExhausted` when every candidate code within
    /// the attempt budget collides.
    async fn create_account(
        &self,
        id: &str,
        email: Option<String>,
        provider: ProviderKind,
    ) -> Result<AccountProfile>;

    /// Re-register an account over a prior document, reusing the prior
    /// referral code and carrying the reward-claimed flag forward. All other
    /// fields are reset to creation defaults.
    async fn reactivate_account(
        &self,
        id: &str,
        email: Option<String>,
        provider: ProviderKind,
        prior: &AccountProfile,
    ) -> Result<AccountProfile>;

    async fn get_account(&self, id: &str) -> Result<Option<AccountProfile>>;

    /// Merge the named fields into the stored document; fields not present
    /// in `changes` are left untouched.
    async fn update_account(&self, id: &str, changes: &ProfileChanges) -> Result<()>;

    /// Soft-delete: clear PII and session fields, retain `referralCode` and
    /// `referralRewardClaimed`. Idempotent.
    async fn withdraw_account(&self, id: &str) -> Result<()>;

    /// Garbage-collect a partial signup that never completed onboarding.
    /// Distinct from withdrawal: the document is removed outright and no
    /// withdrawal event is recorded.
    async fn discard_incomplete(&self, id: &str) -> Result<()>;

    /// Whether any non-withdrawn profile other than `excluding_id` holds
    /// `code`.
    async fn referral_code_exists(&self, code: &str, excluding_id: &str) -> Result<bool>;

    /// Owner of `code` among non-withdrawn profiles.
    async fn find_id_by_referral_code(&self, code: &str) -> Result<Option<String>>;

    /// Store the referral attribution. No reward is granted here; payout is
    /// deferred to `complete_onboarding`.
    async fn save_referred_by(&self, id: &str, code: &str) -> Result<()>;

    async fn set_birth_profile(&self, id: &str, birth: &BirthProfile) -> Result<()>;

    async fn set_derived_chart(&self, id: &str, chart: &DerivedChart) -> Result<()>;

    /// Mark onboarding complete and, when a referral attribution is present
    /// and unrewarded, pay out the referral reward pair in the same atomic
    /// unit. The grant executes at most once per account, including under
    /// concurrent or retried completions.
    ///
    /// Returns whether the reward pair was granted by this call.
    async fn complete_onboarding(&self, id: &str) -> Result<bool>;

    /// Spend one credit. Returns false when the balance is already zero.
    async fn consume_credit(&self, id: &str) -> Result<bool>;

    async fn purchase_ad_removal(&self, id: &str) -> Result<()>;
}
