// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed account operations.
//!
//! Implements [`AccountRepository`] over the `users` collection: profile
//! CRUD, referral-code uniqueness checks, soft-delete withdrawal and the
//! transactional onboarding completion with its at-most-once reward grant.

use crate::db::collections;
use crate::error::{AppError, Result};
use crate::models::profile::{REFERRED_REWARD, REFERRER_REWARD};
use crate::models::{AccountProfile, BirthProfile, DerivedChart, ProfileChanges, ProviderKind};
use crate::referral::CodeCandidates;
use crate::repo::AccountRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self> {
        // If the emulator environment variable is set, use unauthenticated
        // connection to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id).await.map_err(|e| {
            AppError::NetworkError(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::NetworkError(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb> {
        self.client.as_ref().ok_or_else(|| {
            AppError::NetworkError("Database not connected (offline mode)".to_string())
        })
    }

    /// All profiles currently holding `code`, withdrawn ones included.
    async fn profiles_with_code(&self, code: &str) -> Result<Vec<AccountProfile>> {
        let code = code.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.field("referralCode").eq(code.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::NetworkError(e.to_string()))
    }

    /// Write a full profile document, replacing whatever was stored before.
    async fn put_profile(&self, profile: &AccountProfile) -> Result<()> {
        // Delete first so fields absent from `profile` do not survive from a
        // previous incarnation of the document.
        self.delete_document(&profile.id).await?;

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&profile.id)
            .object(profile)
            .execute()
            .await
            .map_err(|e| AppError::NetworkError(e.to_string()))?;
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> Result<()> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::USERS)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::NetworkError(e.to_string()))?;
        Ok(())
    }

    /// Masked partial update: fields named in `paths` are set from `patch`;
    /// masked fields absent from `patch` are cleared.
    async fn patch_document<T: Serialize + Sync + Send + for<'de> Deserialize<'de>>(
        &self,
        id: &str,
        paths: Vec<String>,
        patch: &T,
    ) -> Result<()> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(paths)
            .in_col(collections::USERS)
            .document_id(id)
            .object(patch)
            .execute()
            .await
            .map_err(|e| AppError::NetworkError(e.to_string()))?;
        Ok(())
    }

    async fn require_account(&self, id: &str) -> Result<AccountProfile> {
        self.get_account(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("users/{}", id)))
    }
}

/// Soft-delete field set. The mask additionally names the cleared fields
/// (email, birthProfile, derivedChart, referredBy, adRemovalAt) which are
/// absent here on purpose.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WithdrawalPatch {
    withdrawn: bool,
    withdrawn_at: DateTime<Utc>,
    onboarding_complete: bool,
    credit_balance: u32,
    ad_removal_active: bool,
}

fn withdrawal_field_paths() -> Vec<String> {
    [
        "withdrawn",
        "withdrawnAt",
        "onboardingComplete",
        "creditBalance",
        "adRemovalActive",
        "email",
        "birthProfile",
        "derivedChart",
        "referredBy",
        "adRemovalAt",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReferredByPatch {
    referred_by: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BirthProfilePatch {
    birth_profile: BirthProfile,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DerivedChartPatch {
    derived_chart: DerivedChart,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreditBalancePatch {
    credit_balance: u32,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdRemovalPatch {
    ad_removal_active: bool,
    ad_removal_at: DateTime<Utc>,
}

#[async_trait]
impl AccountRepository for FirestoreDb {
    async fn create_account(
        &self,
        id: &str,
        email: Option<String>,
        provider: ProviderKind,
    ) -> Result<AccountProfile> {
        // Candidates are checked against every profile, withdrawn ones
        // included, so a withdrawn account's code stays reserved for its
        // owner until they re-register.
        for code in CodeCandidates::new() {
            if !self.profiles_with_code(&code).await?.is_empty() {
                tracing::debug!(code = %code, "Referral code candidate collided, retrying");
                continue;
            }

            let profile = AccountProfile::new(id, email, provider, &code);
            self.put_profile(&profile).await?;

            tracing::info!(user_id = id, referral_code = %code, "Account created");
            return Ok(profile);
        }

        tracing::error!(user_id = id, "Referral code attempt budget exhausted");
        Err(AppError::CodeGenerationExhausted)
    }

    async fn reactivate_account(
        &self,
        id: &str,
        email: Option<String>,
        provider: ProviderKind,
        prior: &AccountProfile,
    ) -> Result<AccountProfile> {
        let mut profile = AccountProfile::new(id, email, provider, &prior.referral_code);
        // The reward-claimed flag survives withdrawal and re-registration.
        profile.referral_reward_claimed = prior.referral_reward_claimed;

        self.put_profile(&profile).await?;

        tracing::info!(
            user_id = id,
            referral_code = %profile.referral_code,
            reward_claimed = profile.referral_reward_claimed,
            "Account re-registered with prior referral code"
        );
        Ok(profile)
    }

    async fn get_account(&self, id: &str) -> Result<Option<AccountProfile>> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::NetworkError(e.to_string()))
    }

    async fn update_account(&self, id: &str, changes: &ProfileChanges) -> Result<()> {
        let paths = changes.field_paths();
        if paths.is_empty() {
            return Ok(());
        }
        self.require_account(id).await?;
        self.patch_document(id, paths, changes).await?;

        tracing::debug!(user_id = id, "Account fields updated");
        Ok(())
    }

    async fn withdraw_account(&self, id: &str) -> Result<()> {
        let profile = self.require_account(id).await?;
        if profile.withdrawn {
            tracing::debug!(user_id = id, "Account already withdrawn, nothing to do");
            return Ok(());
        }

        let patch = WithdrawalPatch {
            withdrawn: true,
            withdrawn_at: Utc::now(),
            onboarding_complete: false,
            credit_balance: 0,
            ad_removal_active: false,
        };
        self.patch_document(id, withdrawal_field_paths(), &patch)
            .await?;

        tracing::info!(user_id = id, "Account withdrawn");
        Ok(())
    }

    async fn discard_incomplete(&self, id: &str) -> Result<()> {
        self.delete_document(id).await?;
        tracing::info!(user_id = id, "Discarded incomplete signup document");
        Ok(())
    }

    async fn referral_code_exists(&self, code: &str, excluding_id: &str) -> Result<bool> {
        let holders = self.profiles_with_code(code).await?;
        Ok(holders
            .iter()
            .any(|p| p.id != excluding_id && !p.withdrawn))
    }

    async fn find_id_by_referral_code(&self, code: &str) -> Result<Option<String>> {
        let holders = self.profiles_with_code(code).await?;
        Ok(holders
            .into_iter()
            .find(|p| !p.withdrawn)
            .map(|p| p.id))
    }

    async fn save_referred_by(&self, id: &str, code: &str) -> Result<()> {
        self.require_account(id).await?;
        self.patch_document(
            id,
            vec!["referredBy".to_string()],
            &ReferredByPatch { referred_by: code.to_string() },
        )
        .await?;

        tracing::info!(user_id = id, referred_by = code, "Referral attribution stored");
        Ok(())
    }

    async fn set_birth_profile(&self, id: &str, birth: &BirthProfile) -> Result<()> {
        self.require_account(id).await?;
        self.patch_document(
            id,
            vec!["birthProfile".to_string()],
            &BirthProfilePatch { birth_profile: birth.clone() },
        )
        .await?;

        tracing::info!(user_id = id, "Birth profile stored");
        Ok(())
    }

    async fn set_derived_chart(&self, id: &str, chart: &DerivedChart) -> Result<()> {
        self.require_account(id).await?;
        self.patch_document(
            id,
            vec!["derivedChart".to_string()],
            &DerivedChartPatch { derived_chart: chart.clone() },
        )
        .await?;

        tracing::info!(user_id = id, "Derived chart stored");
        Ok(())
    }

    async fn complete_onboarding(&self, id: &str) -> Result<bool> {
        // Begin a transaction so the flag flip and the reward pair commit as
        // one unit. A concurrent completion conflicts at commit time; the
        // retrying caller then observes referralRewardClaimed=true and the
        // grant is skipped, keeping it at most once per account.
        let mut transaction = self
            .get_client()?
            .begin_transaction()
            .await
            .map_err(|e| AppError::NetworkError(format!("Failed to begin transaction: {}", e)))?;

        let mut profile = self.require_account(id).await?;

        if profile.onboarding_complete
            && (profile.referred_by.is_none() || profile.referral_reward_claimed)
        {
            tracing::debug!(user_id = id, "Onboarding already complete (idempotent skip)");
            let _ = transaction.rollback().await;
            return Ok(false);
        }

        profile.onboarding_complete = true;

        // Resolve the referrer and stage the reward pair, if one is due.
        let mut referrer: Option<AccountProfile> = None;
        if let Some(code) = profile.referred_by.clone().filter(|_| !profile.referral_reward_claimed) {
            match self.find_id_by_referral_code(&code).await? {
                Some(referrer_id) => {
                    let mut r = self.require_account(&referrer_id).await?;
                    r.grant_credits(REFERRER_REWARD);
                    profile.grant_credits(REFERRED_REWARD);
                    profile.referral_reward_claimed = true;
                    referrer = Some(r);
                }
                None => {
                    // Referrer withdrew between attribution and completion;
                    // no payout, attribution kept for audit.
                    tracing::warn!(user_id = id, code = %code, "Referrer no longer active, skipping reward");
                }
            }
        }

        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(id)
            .object(&profile)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::NetworkError(format!("Failed to add profile to transaction: {}", e))
            })?;

        if let Some(ref r) = referrer {
            self.get_client()?
                .fluent()
                .update()
                .in_col(collections::USERS)
                .document_id(&r.id)
                .object(r)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::NetworkError(format!("Failed to add referrer to transaction: {}", e))
                })?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| AppError::NetworkError(format!("Transaction commit failed: {}", e)))?;

        let granted = referrer.is_some();
        tracing::info!(
            user_id = id,
            reward_granted = granted,
            "Onboarding completed"
        );
        Ok(granted)
    }

    async fn consume_credit(&self, id: &str) -> Result<bool> {
        let mut profile = self.require_account(id).await?;
        if !profile.consume_credit() {
            return Ok(false);
        }
        self.patch_document(
            id,
            vec!["creditBalance".to_string()],
            &CreditBalancePatch {
                credit_balance: profile.credit_balance,
            },
        )
        .await?;

        tracing::debug!(user_id = id, balance = profile.credit_balance, "Credit consumed");
        Ok(true)
    }

    async fn purchase_ad_removal(&self, id: &str) -> Result<()> {
        self.require_account(id).await?;
        self.patch_document(
            id,
            vec!["adRemovalActive".to_string(), "adRemovalAt".to_string()],
            &AdRemovalPatch {
                ad_removal_active: true,
                ad_removal_at: Utc::now(),
            },
        )
        .await?;

        tracing::info!(user_id = id, "Ad removal activated");
        Ok(())
    }
}
