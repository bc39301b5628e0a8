// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account lifecycle orchestration.
//!
//! Drives the state machine from a raw sign-in through classification
//! (new / existing / returning after withdrawal), referral-code entry and
//! onboarding completion, and routes the outcomes to the UI layer.

use crate::error::{AppError, Result};
use crate::models::{AccountProfile, BirthProfile, FederatedIdentity};
use crate::providers::CredentialProvider;
use crate::referral;
use crate::repo::AccountRepository;
use crate::services::chart::ChartClient;
use crate::services::federation::IdentityFederator;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Classification of a federated id against the account store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountClass {
    /// No usable profile: none stored, or a stale one that never finished
    /// onboarding
    New,
    /// Fully onboarded, active profile
    Existing,
    /// Profile soft-deleted by a previous withdrawal
    WithdrawnReturning,
}

/// Classify a stored profile (or its absence).
///
/// Withdrawal takes precedence: a withdrawn profile always has
/// `onboarding_complete` reset, so the incomplete-means-new rule applies
/// only to non-withdrawn profiles.
pub fn classify(profile: Option<&AccountProfile>) -> AccountClass {
    match profile {
        None => AccountClass::New,
        Some(p) if p.withdrawn => AccountClass::WithdrawnReturning,
        Some(p) if !p.onboarding_complete => AccountClass::New,
        Some(_) => AccountClass::Existing,
    }
}

/// User-visible failure category (network failures get a retry prompt,
/// everything else a generic message).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginFailure {
    Network,
    Other(String),
}

/// Final outcome of a sign-in attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    Completed(AccountClass),
    Cancelled,
    Failed(LoginFailure),
}

/// Session progress for the current identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Federated(FederatedIdentity),
    Classified {
        identity: FederatedIdentity,
        class: AccountClass,
    },
    Onboarded(FederatedIdentity),
}

/// Why a submitted referral code was not accepted. These are expected
/// validation branches, not errors; the UI picks the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferralRejection {
    Empty,
    InvalidFormat,
    OwnCode,
    UnknownCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferralOutcome {
    Accepted,
    Rejected(ReferralRejection),
}

/// Outcome of an onboarding completion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnboardingOutcome {
    Completed { reward_granted: bool },
    Invalid(String),
}

/// UI collaborator boundary. The orchestrator calls these; panel navigation
/// and messaging live entirely behind them.
pub trait SessionUi: Send + Sync {
    fn on_login_success(&self, identity: &FederatedIdentity);
    fn on_login_failure(&self, reason: &LoginFailure);
    fn on_login_cancelled(&self);
    fn show_referral_entry(&self);
    fn show_onboarding(&self);
    fn navigate_to_session(&self);
}

/// The account lifecycle state machine.
pub struct AccountOrchestrator<R: AccountRepository> {
    repo: Arc<R>,
    federator: Arc<IdentityFederator>,
    charts: ChartClient,
    ui: Arc<dyn SessionUi>,
    state: Mutex<SessionState>,
}

impl<R: AccountRepository> AccountOrchestrator<R> {
    pub fn new(
        repo: Arc<R>,
        federator: Arc<IdentityFederator>,
        charts: ChartClient,
        ui: Arc<dyn SessionUi>,
    ) -> Self {
        Self {
            repo,
            federator,
            charts,
            ui,
            state: Mutex::new(SessionState::Unauthenticated),
        }
    }

    pub async fn state(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    /// Full sign-in: native credential, federation, classification, routing.
    ///
    /// No retries happen here; on a network failure the UI shows a retry
    /// prompt and the user presses the button again.
    pub async fn sign_in(&self, provider: &dyn CredentialProvider) -> SignInOutcome {
        match self.federator.sign_in(provider).await {
            Ok(identity) => self.establish(identity).await,
            Err(AppError::UserCancelled) => {
                tracing::info!("Sign-in cancelled by user");
                self.ui.on_login_cancelled();
                SignInOutcome::Cancelled
            }
            Err(e) => self.fail(e),
        }
    }

    /// Classify an already-federated identity and route accordingly. Also
    /// the entry point for the auto-login path, where a prior session's
    /// identity is still present.
    pub async fn establish(&self, identity: FederatedIdentity) -> SignInOutcome {
        *self.state.lock().await = SessionState::Federated(identity.clone());

        // NotFound is the expected-absence branch here; a non-network read
        // failure falls back to the new-user path rather than blocking login.
        let profile = match self.repo.get_account(&identity.user_id).await {
            Ok(profile) => profile,
            Err(e) if e.is_network() => return self.fail(e),
            Err(e) => {
                tracing::warn!(
                    user_id = %identity.user_id,
                    error = %e,
                    "Classification read failed, treating as new user"
                );
                None
            }
        };

        let class = classify(profile.as_ref());
        tracing::info!(user_id = %identity.user_id, class = ?class, "User classified");
        self.ui.on_login_success(&identity);

        match self.route(&identity, profile).await {
            Ok(()) => {
                *self.state.lock().await = match class {
                    AccountClass::Existing => SessionState::Onboarded(identity),
                    _ => SessionState::Classified { identity, class },
                };
                SignInOutcome::Completed(class)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Apply the per-class account mutations and pick the next screen.
    async fn route(
        &self,
        identity: &FederatedIdentity,
        profile: Option<AccountProfile>,
    ) -> Result<()> {
        let id = &identity.user_id;
        let email = identity.email.clone();

        match profile {
            // Fully registered user: straight to the session.
            Some(ref p) if !p.withdrawn && p.onboarding_complete => {
                self.ui.navigate_to_session();
            }

            // Returning after withdrawal: re-register over the old document,
            // keeping its referral code. A user who already claimed the
            // referral reward cannot claim it again, so referral entry is
            // skipped.
            Some(ref prior) if prior.withdrawn => {
                let profile = self
                    .repo
                    .reactivate_account(id, email, identity.provider, prior)
                    .await?;
                if profile.referral_reward_claimed {
                    self.ui.show_onboarding();
                } else {
                    self.ui.show_referral_entry();
                }
            }

            // Stale signup that never finished onboarding. A reactivation
            // that was abandoned still carries the claimed flag and must
            // keep its code; a plain partial signup is garbage-collected
            // and recreated from scratch.
            Some(ref prior) => {
                if prior.referral_reward_claimed {
                    self.repo
                        .reactivate_account(id, email, identity.provider, prior)
                        .await?;
                    self.ui.show_onboarding();
                } else {
                    self.repo.discard_incomplete(id).await?;
                    self.repo
                        .create_account(id, email, identity.provider)
                        .await?;
                    self.ui.show_referral_entry();
                }
            }

            // Brand new user.
            None => {
                self.repo
                    .create_account(id, email, identity.provider)
                    .await?;
                self.ui.show_referral_entry();
            }
        }

        Ok(())
    }

    /// Validate and store a submitted referral code. The reward is not
    /// granted here; payout happens when onboarding completes.
    pub async fn submit_referral_code(&self, code: &str) -> Result<ReferralOutcome> {
        let user_id = self.current_user_id().await?;
        let code = code.trim();

        if code.is_empty() {
            return Ok(ReferralOutcome::Rejected(ReferralRejection::Empty));
        }
        if !referral::is_valid_code(code) {
            return Ok(ReferralOutcome::Rejected(ReferralRejection::InvalidFormat));
        }

        let profile = self
            .repo
            .get_account(&user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("users/{}", user_id)))?;
        if profile.referral_code == code {
            return Ok(ReferralOutcome::Rejected(ReferralRejection::OwnCode));
        }

        if !self.repo.referral_code_exists(code, &user_id).await? {
            return Ok(ReferralOutcome::Rejected(ReferralRejection::UnknownCode));
        }

        self.repo.save_referred_by(&user_id, code).await?;
        self.ui.show_onboarding();
        Ok(ReferralOutcome::Accepted)
    }

    /// Referral entry is optional; skipping moves straight to onboarding.
    pub async fn skip_referral_code(&self) -> Result<()> {
        let user_id = self.current_user_id().await?;
        tracing::info!(user_id = %user_id, "Referral entry skipped");
        self.ui.show_onboarding();
        Ok(())
    }

    /// Finish onboarding with the supplied birth data: store it, compute
    /// and store the derived chart, then run the repository's atomic
    /// completion (which pays the referral reward at most once).
    pub async fn complete_onboarding(&self, birth: BirthProfile) -> Result<OnboardingOutcome> {
        let identity = self.current_identity().await?;
        let user_id = identity.user_id.clone();

        if let Err(e) = birth.check() {
            return Ok(OnboardingOutcome::Invalid(e.to_string()));
        }

        self.repo.set_birth_profile(&user_id, &birth).await?;

        let chart = self.charts.compute(&user_id, &birth).await?;
        self.repo.set_derived_chart(&user_id, &chart).await?;

        let reward_granted = self.repo.complete_onboarding(&user_id).await?;

        *self.state.lock().await = SessionState::Onboarded(identity);
        self.ui.navigate_to_session();

        tracing::info!(user_id = %user_id, reward_granted, "Onboarding finished");
        Ok(OnboardingOutcome::Completed { reward_granted })
    }

    /// Soft-delete the signed-in account and end the session.
    pub async fn withdraw(&self) -> Result<()> {
        let user_id = self.current_user_id().await?;
        self.repo.withdraw_account(&user_id).await?;
        *self.state.lock().await = SessionState::Unauthenticated;
        tracing::info!(user_id = %user_id, "Account withdrawn, session ended");
        Ok(())
    }

    pub async fn sign_out(&self) {
        *self.state.lock().await = SessionState::Unauthenticated;
        tracing::info!("Signed out");
    }

    pub async fn consume_credit(&self) -> Result<bool> {
        let user_id = self.current_user_id().await?;
        self.repo.consume_credit(&user_id).await
    }

    pub async fn purchase_ad_removal(&self) -> Result<()> {
        let user_id = self.current_user_id().await?;
        self.repo.purchase_ad_removal(&user_id).await
    }

    async fn current_identity(&self) -> Result<FederatedIdentity> {
        match &*self.state.lock().await {
            SessionState::Unauthenticated => {
                Err(AppError::NotFound("authenticated session".to_string()))
            }
            SessionState::Federated(identity)
            | SessionState::Classified { identity, .. }
            | SessionState::Onboarded(identity) => Ok(identity.clone()),
        }
    }

    async fn current_user_id(&self) -> Result<String> {
        Ok(self.current_identity().await?.user_id)
    }

    /// Map an error onto the UI per the two-way policy: network failures get
    /// the retry prompt, everything else the generic failure message.
    fn fail(&self, error: AppError) -> SignInOutcome {
        let failure = if error.is_network() {
            LoginFailure::Network
        } else {
            LoginFailure::Other(error.to_string())
        };
        tracing::error!(error = %error, "Sign-in failed");
        self.ui.on_login_failure(&failure);
        SignInOutcome::Failed(failure)
    }
}
