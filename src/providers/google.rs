// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google sign-in adapter.

use crate::error::{AppError, Result};
use crate::models::ProviderKind;
use crate::providers::{
    sign_in_handoff, CredentialProvider, LoginMethod, NativeSignIn, ProviderCredential,
    SignInRequest,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Google adapter: the native SDK is asked for an ID token, which the
/// federation service accepts directly.
pub struct GoogleSignIn {
    native: Arc<dyn NativeSignIn>,
}

impl GoogleSignIn {
    pub fn new(native: Arc<dyn NativeSignIn>) -> Self {
        Self { native }
    }
}

#[async_trait]
impl CredentialProvider for GoogleSignIn {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn obtain(&self) -> Result<ProviderCredential> {
        let (handoff, pending) = sign_in_handoff();
        self.native.begin(
            SignInRequest {
                provider: ProviderKind::Google,
                hashed_nonce: None,
                method: LoginMethod::AppSwitch,
            },
            handoff,
        );

        let raw = pending.resolve().await?;
        if raw.token.is_empty() {
            tracing::error!("Google sign-in returned an empty ID token");
            return Err(AppError::CredentialInvalid);
        }

        Ok(ProviderCredential::GoogleIdToken {
            id_token: raw.token,
        })
    }
}
