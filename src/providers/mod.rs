// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential provider adapters over the native social sign-in SDKs.
//!
//! Native SDKs report their outcome through platform callbacks; the adapters
//! bridge that to a single awaited outcome with a one-shot handoff, so a
//! sign-in always resolves to success, failure or cancellation and is never
//! left pending.

pub mod apple;
pub mod google;
pub mod kakao;

pub use apple::AppleSignIn;
pub use google::GoogleSignIn;
pub use kakao::KakaoSignIn;

use crate::error::{AppError, Result};
use crate::models::ProviderKind;
use async_trait::async_trait;
use tokio::sync::oneshot;

/// Opaque credential produced by a provider adapter, consumed by the
/// identity federator.
#[derive(Debug, Clone)]
pub enum ProviderCredential {
    /// Google ID token from the native sign-in
    GoogleIdToken { id_token: String },
    /// Apple identity token plus the raw nonce whose SHA-256 digest was
    /// bound into it
    AppleIdentityToken {
        identity_token: String,
        raw_nonce: String,
        authorization_code: Option<String>,
    },
    /// Kakao provider access token, to be exchanged server-side
    KakaoAccessToken { access_token: String },
}

impl ProviderCredential {
    pub fn provider(&self) -> ProviderKind {
        match self {
            ProviderCredential::GoogleIdToken { .. } => ProviderKind::Google,
            ProviderCredential::AppleIdentityToken { .. } => ProviderKind::Apple,
            ProviderCredential::KakaoAccessToken { .. } => ProviderKind::Kakao,
        }
    }
}

/// A provider adapter: runs the native sign-in and yields one credential.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Run the native sign-in flow to completion.
    async fn obtain(&self) -> Result<ProviderCredential>;
}

/// How the native layer should run the login for providers that support
/// more than one surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMethod {
    /// Hand off to the installed provider app
    AppSwitch,
    /// Web-based account login
    WebAccount,
}

/// Parameters for one native sign-in attempt.
#[derive(Debug, Clone)]
pub struct SignInRequest {
    pub provider: ProviderKind,
    /// SHA-256 hex digest the SDK must bind into the issued credential
    /// (Apple only)
    pub hashed_nonce: Option<String>,
    pub method: LoginMethod,
}

/// Raw material delivered by a native SDK callback.
#[derive(Debug, Clone)]
pub struct NativeCredential {
    /// ID token, identity token or access token depending on the provider
    pub token: String,
    pub authorization_code: Option<String>,
}

/// Platform glue implements this: kick off the native login UI for
/// `request` and deliver the outcome exactly once through `handoff`.
pub trait NativeSignIn: Send + Sync {
    fn begin(&self, request: SignInRequest, handoff: SignInHandoff);
}

/// Write half of a pending sign-in. Each delivery method consumes the
/// handoff, so the outcome is resolved at most once.
pub struct SignInHandoff {
    tx: oneshot::Sender<Result<NativeCredential>>,
}

impl SignInHandoff {
    pub fn succeeded(self, credential: NativeCredential) {
        let _ = self.tx.send(Ok(credential));
    }

    pub fn failed(self, message: impl Into<String>) {
        let _ = self.tx.send(Err(AppError::ProviderUnavailable(message.into())));
    }

    pub fn cancelled(self) {
        let _ = self.tx.send(Err(AppError::UserCancelled));
    }
}

/// Read half of a pending sign-in.
pub struct PendingSignIn {
    rx: oneshot::Receiver<Result<NativeCredential>>,
}

impl PendingSignIn {
    /// Wait for the native outcome. A handoff dropped without delivering
    /// anything resolves here as `ProviderUnavailable` rather than hanging.
    pub async fn resolve(self) -> Result<NativeCredential> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(AppError::ProviderUnavailable(
                "native sign-in dropped without an outcome".to_string(),
            )),
        }
    }
}

/// Create a linked handoff/pending pair for one sign-in attempt.
pub fn sign_in_handoff() -> (SignInHandoff, PendingSignIn) {
    let (tx, rx) = oneshot::channel();
    (SignInHandoff { tx }, PendingSignIn { rx })
}
