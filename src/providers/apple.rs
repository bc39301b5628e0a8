// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Apple sign-in adapter.
//!
//! Apple binds a nonce into the issued identity token: the SDK request
//! carries the SHA-256 digest of a random raw nonce, and the raw nonce is
//! later presented to the federation service alongside the token.

use crate::error::{AppError, Result};
use crate::models::ProviderKind;
use crate::providers::{
    sign_in_handoff, CredentialProvider, LoginMethod, NativeSignIn, ProviderCredential,
    SignInRequest,
};
use async_trait::async_trait;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;

const NONCE_LENGTH: usize = 32;
const NONCE_CHARSET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Random alphanumeric raw nonce for one sign-in attempt.
fn random_raw_nonce() -> String {
    let mut rng = rand::thread_rng();
    (0..NONCE_LENGTH)
        .map(|_| NONCE_CHARSET[rng.gen_range(0..NONCE_CHARSET.len())] as char)
        .collect()
}

/// Lowercase hex SHA-256 digest of the raw nonce, as the SDK expects it.
fn hashed_nonce(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// Apple adapter.
pub struct AppleSignIn {
    native: Arc<dyn NativeSignIn>,
}

impl AppleSignIn {
    pub fn new(native: Arc<dyn NativeSignIn>) -> Self {
        Self { native }
    }
}

#[async_trait]
impl CredentialProvider for AppleSignIn {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Apple
    }

    async fn obtain(&self) -> Result<ProviderCredential> {
        let raw_nonce = random_raw_nonce();

        let (handoff, pending) = sign_in_handoff();
        self.native.begin(
            SignInRequest {
                provider: ProviderKind::Apple,
                hashed_nonce: Some(hashed_nonce(&raw_nonce)),
                method: LoginMethod::AppSwitch,
            },
            handoff,
        );

        let raw = pending.resolve().await?;
        if raw.token.is_empty() {
            tracing::error!("Apple sign-in returned an empty identity token");
            return Err(AppError::CredentialInvalid);
        }

        Ok(ProviderCredential::AppleIdentityToken {
            identity_token: raw.token,
            raw_nonce,
            authorization_code: raw.authorization_code,
        })
    }
}
