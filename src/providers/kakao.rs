// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Kakao sign-in adapter.
//!
//! Kakao yields a provider access token rather than a federation-ready
//! credential; the federator exchanges it server-side. The adapter owns the
//! login-surface policy: try the app-switch login first, fall back to the
//! web account login on failure. An explicit user cancel is final and does
//! not trigger the fallback.

use crate::error::{AppError, Result};
use crate::models::ProviderKind;
use crate::providers::{
    sign_in_handoff, CredentialProvider, LoginMethod, NativeSignIn, ProviderCredential,
    SignInRequest,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Kakao adapter.
pub struct KakaoSignIn {
    native: Arc<dyn NativeSignIn>,
}

impl KakaoSignIn {
    pub fn new(native: Arc<dyn NativeSignIn>) -> Self {
        Self { native }
    }

    async fn attempt(&self, method: LoginMethod) -> Result<String> {
        let (handoff, pending) = sign_in_handoff();
        self.native.begin(
            SignInRequest {
                provider: ProviderKind::Kakao,
                hashed_nonce: None,
                method,
            },
            handoff,
        );
        Ok(pending.resolve().await?.token)
    }
}

#[async_trait]
impl CredentialProvider for KakaoSignIn {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Kakao
    }

    async fn obtain(&self) -> Result<ProviderCredential> {
        let access_token = match self.attempt(LoginMethod::AppSwitch).await {
            Ok(token) => token,
            Err(AppError::UserCancelled) => return Err(AppError::UserCancelled),
            Err(e) => {
                tracing::warn!(error = %e, "Kakao app-switch login failed, falling back to account login");
                self.attempt(LoginMethod::WebAccount).await?
            }
        };

        if access_token.is_empty() {
            tracing::error!("Kakao sign-in returned an empty access token");
            return Err(AppError::CredentialInvalid);
        }

        Ok(ProviderCredential::KakaoAccessToken { access_token })
    }
}
