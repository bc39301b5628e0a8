//! Account profile model stored in Firestore.

use crate::models::birth::{BirthProfile, DerivedChart};
use crate::models::identity::ProviderKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Credits granted to every freshly created account.
pub const INITIAL_CREDIT_GRANT: u32 = 3;
/// Credits granted to the referrer when a referred signup completes onboarding.
pub const REFERRER_REWARD: u32 = 10;
/// Credits granted to the referred account itself.
pub const REFERRED_REWARD: u32 = 5;

/// Per-user account document, keyed by the federated user id.
///
/// Optional fields are omitted from the stored document when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    /// Federated user id (also the document id)
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Whether the user finished profile completion (birth data entered).
    /// A profile with this false is classified the same as a missing one.
    pub onboarding_complete: bool,
    /// Whether the referral reward was already paid out for this account.
    /// Never reset once true, including across withdrawal and re-registration.
    pub referral_reward_claimed: bool,
    pub withdrawn: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdrawn_at: Option<DateTime<Utc>>,
    pub login_provider: ProviderKind,
    /// 6-digit numeric code attributing signups to this account
    pub referral_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referred_by: Option<String>,
    pub credit_balance: u32,
    pub ad_removal_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_removal_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_profile: Option<BirthProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived_chart: Option<DerivedChart>,
}

impl AccountProfile {
    /// Fresh account document with creation defaults and the initial
    /// credit grant.
    pub fn new(
        id: impl Into<String>,
        email: Option<String>,
        provider: ProviderKind,
        referral_code: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            email,
            onboarding_complete: false,
            referral_reward_claimed: false,
            withdrawn: false,
            withdrawn_at: None,
            login_provider: provider,
            referral_code: referral_code.into(),
            referred_by: None,
            credit_balance: INITIAL_CREDIT_GRANT,
            ad_removal_active: false,
            ad_removal_at: None,
            created_at: Utc::now(),
            birth_profile: None,
            derived_chart: None,
        }
    }

    pub fn grant_credits(&mut self, amount: u32) {
        self.credit_balance = self.credit_balance.saturating_add(amount);
    }

    /// Spend one credit. Returns false (and leaves the balance untouched)
    /// when none remain.
    pub fn consume_credit(&mut self) -> bool {
        if self.credit_balance == 0 {
            return false;
        }
        self.credit_balance -= 1;
        true
    }

    pub fn activate_ad_removal(&mut self, at: DateTime<Utc>) {
        self.ad_removal_active = true;
        self.ad_removal_at = Some(at);
    }

    /// Apply the soft-delete field set in place: PII and session fields are
    /// cleared, `referral_code` and `referral_reward_claimed` are retained.
    pub fn apply_withdrawal(&mut self, at: DateTime<Utc>) {
        self.withdrawn = true;
        self.withdrawn_at = Some(at);
        self.onboarding_complete = false;
        self.email = None;
        self.birth_profile = None;
        self.derived_chart = None;
        self.referred_by = None;
        self.credit_balance = 0;
        self.ad_removal_active = false;
        self.ad_removal_at = None;
    }
}

/// Partial update for an account document.
///
/// Only fields that are `Some` are written; everything else is left
/// untouched in the stored document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onboarding_complete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_provider: Option<ProviderKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referred_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_balance: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_removal_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_removal_at: Option<DateTime<Utc>>,
}

impl ProfileChanges {
    /// Document field paths named by this update, for the store's field mask.
    pub fn field_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        if self.email.is_some() {
            paths.push("email".to_string());
        }
        if self.onboarding_complete.is_some() {
            paths.push("onboardingComplete".to_string());
        }
        if self.login_provider.is_some() {
            paths.push("loginProvider".to_string());
        }
        if self.referred_by.is_some() {
            paths.push("referredBy".to_string());
        }
        if self.credit_balance.is_some() {
            paths.push("creditBalance".to_string());
        }
        if self.ad_removal_active.is_some() {
            paths.push("adRemovalActive".to_string());
        }
        if self.ad_removal_at.is_some() {
            paths.push("adRemovalAt".to_string());
        }
        paths
    }
}
