// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared test fixtures: an in-memory account repository, a recording UI,
//! scripted native sign-in stubs, and an axum stub for the federation /
//! verification / chart HTTP endpoints.

use async_trait::async_trait;
use axum::{routing::post, Json, Router};
use saju_account::config::Config;
use saju_account::db::FirestoreDb;
use saju_account::error::{AppError, Result};
use saju_account::models::profile::{REFERRED_REWARD, REFERRER_REWARD};
use saju_account::models::{
    AccountProfile, BirthProfile, DerivedChart, FederatedIdentity, Gender, ProfileChanges,
    ProviderKind,
};
use saju_account::providers::{NativeCredential, NativeSignIn, SignInHandoff, SignInRequest};
use saju_account::referral::CodeCandidates;
use saju_account::repo::AccountRepository;
use saju_account::services::{
    AccountOrchestrator, ChartClient, IdentityFederator, LoginFailure, SessionUi,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Initialize test logging once; honors RUST_LOG.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    init_tracing();
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

// ─── In-memory account repository ────────────────────────────────────────────

/// In-memory [`AccountRepository`] with the same semantics as the Firestore
/// implementation. `complete_onboarding` holds the store lock across its
/// check-and-grant, matching the transactional at-most-once guarantee.
#[derive(Default)]
pub struct MemoryAccountRepository {
    profiles: Mutex<HashMap<String, AccountProfile>>,
    fail_next_read: AtomicBool,
}

impl MemoryAccountRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `get_account` fail with a transport error.
    #[allow(dead_code)]
    pub fn fail_next_read(&self) {
        self.fail_next_read.store(true, Ordering::SeqCst);
    }

    /// Seed a profile directly, bypassing the creation path.
    #[allow(dead_code)]
    pub async fn seed(&self, profile: AccountProfile) {
        self.profiles
            .lock()
            .await
            .insert(profile.id.clone(), profile);
    }

    #[allow(dead_code)]
    pub async fn profile(&self, id: &str) -> Option<AccountProfile> {
        self.profiles.lock().await.get(id).cloned()
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn create_account(
        &self,
        id: &str,
        email: Option<String>,
        provider: ProviderKind,
    ) -> Result<AccountProfile> {
        let mut map = self.profiles.lock().await;
        for code in CodeCandidates::new() {
            // Collisions are checked against every profile, withdrawn
            // included, mirroring the store.
            if map.values().any(|p| p.referral_code == code) {
                continue;
            }
            let profile = AccountProfile::new(id, email, provider, &code);
            map.insert(id.to_string(), profile.clone());
            return Ok(profile);
        }
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
        profile.referral_reward_claimed = prior.referral_reward_claimed;
        self.profiles
            .lock()
            .await
            .insert(id.to_string(), profile.clone());
        Ok(profile)
    }

    async fn get_account(&self, id: &str) -> Result<Option<AccountProfile>> {
        if self.fail_next_read.swap(false, Ordering::SeqCst) {
            return Err(AppError::NetworkError("connection reset".to_string()));
        }
        Ok(self.profiles.lock().await.get(id).cloned())
    }

    async fn update_account(&self, id: &str, changes: &ProfileChanges) -> Result<()> {
        let mut map = self.profiles.lock().await;
        let profile = map
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("users/{}", id)))?;
        if let Some(ref email) = changes.email {
            profile.email = Some(email.clone());
        }
        if let Some(v) = changes.onboarding_complete {
            profile.onboarding_complete = v;
        }
        if let Some(v) = changes.login_provider {
            profile.login_provider = v;
        }
        if let Some(ref v) = changes.referred_by {
            profile.referred_by = Some(v.clone());
        }
        if let Some(v) = changes.credit_balance {
            profile.credit_balance = v;
        }
        if let Some(v) = changes.ad_removal_active {
            profile.ad_removal_active = v;
        }
        if let Some(v) = changes.ad_removal_at {
            profile.ad_removal_at = Some(v);
        }
        Ok(())
    }

    async fn withdraw_account(&self, id: &str) -> Result<()> {
        let mut map = self.profiles.lock().await;
        let profile = map
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("users/{}", id)))?;
        if !profile.withdrawn {
            profile.apply_withdrawal(chrono::Utc::now());
        }
        Ok(())
    }

    async fn discard_incomplete(&self, id: &str) -> Result<()> {
        self.profiles.lock().await.remove(id);
        Ok(())
    }

    async fn referral_code_exists(&self, code: &str, excluding_id: &str) -> Result<bool> {
        Ok(self
            .profiles
            .lock()
            .await
            .values()
            .any(|p| p.referral_code == code && p.id != excluding_id && !p.withdrawn))
    }

    async fn find_id_by_referral_code(&self, code: &str) -> Result<Option<String>> {
        Ok(self
            .profiles
            .lock()
            .await
            .values()
            .find(|p| p.referral_code == code && !p.withdrawn)
            .map(|p| p.id.clone()))
    }

    async fn save_referred_by(&self, id: &str, code: &str) -> Result<()> {
        let mut map = self.profiles.lock().await;
        let profile = map
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("users/{}", id)))?;
        profile.referred_by = Some(code.to_string());
        Ok(())
    }

    async fn set_birth_profile(&self, id: &str, birth: &BirthProfile) -> Result<()> {
        let mut map = self.profiles.lock().await;
        let profile = map
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("users/{}", id)))?;
        profile.birth_profile = Some(birth.clone());
        Ok(())
    }

    async fn set_derived_chart(&self, id: &str, chart: &DerivedChart) -> Result<()> {
        let mut map = self.profiles.lock().await;
        let profile = map
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("users/{}", id)))?;
        profile.derived_chart = Some(chart.clone());
        Ok(())
    }

    async fn complete_onboarding(&self, id: &str) -> Result<bool> {
        // The whole check-and-grant runs under one lock; concurrent
        // completions serialize here and the second sees the claimed flag.
        let mut map = self.profiles.lock().await;
        let mut profile = map
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("users/{}", id)))?;

        if profile.onboarding_complete
            && (profile.referred_by.is_none() || profile.referral_reward_claimed)
        {
            return Ok(false);
        }

        profile.onboarding_complete = true;

        let mut granted = false;
        if let Some(code) = profile.referred_by.clone() {
            if !profile.referral_reward_claimed {
                let referrer_id = map
                    .values()
                    .find(|p| p.referral_code == code && !p.withdrawn)
                    .map(|p| p.id.clone());
                if let Some(referrer_id) = referrer_id {
                    if let Some(referrer) = map.get_mut(&referrer_id) {
                        referrer.grant_credits(REFERRER_REWARD);
                        profile.grant_credits(REFERRED_REWARD);
                        profile.referral_reward_claimed = true;
                        granted = true;
                    }
                }
            }
        }

        map.insert(id.to_string(), profile);
        Ok(granted)
    }

    async fn consume_credit(&self, id: &str) -> Result<bool> {
        let mut map = self.profiles.lock().await;
        let profile = map
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("users/{}", id)))?;
        Ok(profile.consume_credit())
    }

    async fn purchase_ad_removal(&self, id: &str) -> Result<()> {
        let mut map = self.profiles.lock().await;
        let profile = map
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("users/{}", id)))?;
        profile.activate_ad_removal(chrono::Utc::now());
        Ok(())
    }
}

// ─── Recording UI ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub enum UiEvent {
    LoginSuccess(String),
    LoginFailure(LoginFailure),
    LoginCancelled,
    ReferralEntry,
    Onboarding,
    Session,
}

/// [`SessionUi`] that records every callback for assertions.
#[derive(Default)]
pub struct RecordingUi {
    events: std::sync::Mutex<Vec<UiEvent>>,
}

impl RecordingUi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[allow(dead_code)]
    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn last(&self) -> Option<UiEvent> {
        self.events.lock().unwrap().last().cloned()
    }

    fn push(&self, event: UiEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl SessionUi for RecordingUi {
    fn on_login_success(&self, identity: &FederatedIdentity) {
        self.push(UiEvent::LoginSuccess(identity.user_id.clone()));
    }
    fn on_login_failure(&self, reason: &LoginFailure) {
        self.push(UiEvent::LoginFailure(reason.clone()));
    }
    fn on_login_cancelled(&self) {
        self.push(UiEvent::LoginCancelled);
    }
    fn show_referral_entry(&self) {
        self.push(UiEvent::ReferralEntry);
    }
    fn show_onboarding(&self) {
        self.push(UiEvent::Onboarding);
    }
    fn navigate_to_session(&self) {
        self.push(UiEvent::Session);
    }
}

// ─── Scripted native sign-in ─────────────────────────────────────────────────

/// Native stub that resolves immediately with a fixed token.
#[allow(dead_code)]
pub struct StaticTokenNative(pub &'static str);

impl NativeSignIn for StaticTokenNative {
    fn begin(&self, _request: SignInRequest, handoff: SignInHandoff) {
        handoff.succeeded(NativeCredential {
            token: self.0.to_string(),
            authorization_code: None,
        });
    }
}

/// Native stub where the user dismisses the dialog.
#[allow(dead_code)]
pub struct CancellingNative;

impl NativeSignIn for CancellingNative {
    fn begin(&self, _request: SignInRequest, handoff: SignInHandoff) {
        handoff.cancelled();
    }
}

/// Native stub that parks the handoff until the test releases it.
#[derive(Default)]
#[allow(dead_code)]
pub struct ParkedNative {
    pub handoff: std::sync::Mutex<Option<SignInHandoff>>,
}

impl NativeSignIn for ParkedNative {
    fn begin(&self, _request: SignInRequest, handoff: SignInHandoff) {
        *self.handoff.lock().unwrap() = Some(handoff);
    }
}

// ─── Stub HTTP backend ───────────────────────────────────────────────────────

/// Local axum server standing in for the federation service, the token
/// verification endpoint and the chart function.
///
/// Identity mapping is deterministic: an id_token `T` federates to user id
/// `uid-T`, and a Kakao access token `K` ends up as `uid-fedtok-K`.
pub struct StubBackend {
    pub base_url: String,
}

impl StubBackend {
    pub async fn spawn() -> Self {
        let app = Router::new()
            .route("/v1/accounts:signInWithIdp", post(sign_in_with_idp))
            .route(
                "/v1/accounts:signInWithCustomToken",
                post(sign_in_with_custom_token),
            )
            .route("/v1/accounts:lookup", post(lookup))
            .route("/api/verifyToken", post(verify_token))
            .route("/api/calculateChart", post(calculate_chart));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub backend");
        let addr = listener.local_addr().expect("stub backend addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve stub backend");
        });

        Self {
            base_url: format!("http://{}", addr),
        }
    }

    pub fn config(&self) -> Config {
        let mut config = Config::test_default();
        config.identity_api_url = format!("{}/v1", self.base_url);
        config.verify_token_url = format!("{}/api/verifyToken", self.base_url);
        config.chart_function_url = format!("{}/api/calculateChart", self.base_url);
        config
    }
}

async fn sign_in_with_idp(Json(body): Json<Value>) -> Json<Value> {
    let post_body = body["postBody"].as_str().unwrap_or_default();
    let token = post_body
        .split('&')
        .find_map(|part| part.strip_prefix("id_token="))
        .unwrap_or_default();
    Json(json!({
        "localId": format!("uid-{token}"),
        "email": format!("{token}@example.com"),
        "displayName": "Test User",
        "idToken": "session-token",
    }))
}

async fn sign_in_with_custom_token(Json(body): Json<Value>) -> Json<Value> {
    let token = body["token"].as_str().unwrap_or_default();
    Json(json!({ "idToken": format!("session-{token}"), "refreshToken": "refresh" }))
}

async fn lookup(Json(body): Json<Value>) -> Json<Value> {
    let id_token = body["idToken"].as_str().unwrap_or_default();
    let token = id_token.strip_prefix("session-").unwrap_or(id_token);
    Json(json!({
        "users": [{
            "localId": format!("uid-{token}"),
            "email": format!("{token}@example.com"),
            "displayName": "Test User",
        }]
    }))
}

async fn verify_token(Json(body): Json<Value>) -> Json<Value> {
    let token = body["token"].as_str().unwrap_or_default();
    Json(json!({ "firebase_token": format!("fedtok-{token}") }))
}

async fn calculate_chart(Json(body): Json<Value>) -> Json<Value> {
    let user_id = body["data"]["userId"].as_str().unwrap_or_default();
    Json(json!({
        "result": {
            "userId": user_id,
            "pillars": {
                "year": { "stem": "갑", "branch": "자" },
                "month": { "stem": "을", "branch": "축" },
                "day": { "stem": "병", "branch": "인" },
                "hour": { "stem": "정", "branch": "묘" },
            }
        }
    }))
}

// ─── Test harness ────────────────────────────────────────────────────────────

/// Everything a lifecycle test needs: orchestrator over the in-memory
/// repository, recording UI, and the stub backend behind federation and
/// chart calls.
#[allow(dead_code)]
pub struct TestHarness {
    pub repo: Arc<MemoryAccountRepository>,
    pub ui: Arc<RecordingUi>,
    pub orchestrator: AccountOrchestrator<MemoryAccountRepository>,
    pub backend: StubBackend,
}

#[allow(dead_code)]
pub async fn test_harness() -> TestHarness {
    init_tracing();
    let backend = StubBackend::spawn().await;
    let config = backend.config();

    let repo = MemoryAccountRepository::new();
    let ui = RecordingUi::new();
    let federator = Arc::new(IdentityFederator::new(&config));
    let charts = ChartClient::new(&config);

    let orchestrator = AccountOrchestrator::new(repo.clone(), federator, charts, ui.clone());

    TestHarness {
        repo,
        ui,
        orchestrator,
        backend,
    }
}

/// Federated identity fixture.
#[allow(dead_code)]
pub fn identity(user_id: &str, provider: ProviderKind) -> FederatedIdentity {
    FederatedIdentity {
        user_id: user_id.to_string(),
        display_name: Some("Test User".to_string()),
        email: Some(format!("{}@example.com", user_id)),
        provider,
    }
}

/// Valid birth profile fixture.
#[allow(dead_code)]
pub fn birth_profile() -> BirthProfile {
    BirthProfile {
        name: "홍길동".to_string(),
        year: 1993,
        month: 4,
        day: 16,
        hour: 7,
        minute: 30,
        lunar: false,
        gender: Gender::Male,
    }
}
