// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity federation: exchanging provider credentials for a federated
//! identity.
//!
//! Google and Apple credentials federate directly through the identity
//! toolkit's IdP sign-in call. Kakao has no native federation support, so
//! its access token is first sent to the verification endpoint, which mints
//! a short-lived federation token that is then redeemed for the identity.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{FederatedIdentity, ProviderKind};
use crate::providers::{CredentialProvider, ProviderCredential};
use serde::Deserialize;
use tokio::sync::Mutex;

/// REST client for the federation service and the token verification
/// endpoint.
#[derive(Clone)]
pub struct FederationClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    verify_url: String,
}

impl FederationClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.identity_api_url.clone(),
            api_key: config.identity_api_key.clone(),
            verify_url: config.verify_token_url.clone(),
        }
    }

    /// Direct IdP federation (Google, Apple).
    pub async fn sign_in_with_idp(
        &self,
        provider: ProviderKind,
        id_token: &str,
        raw_nonce: Option<&str>,
    ) -> Result<IdpAccount> {
        let provider_id = provider.idp_id().ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "provider {} has no direct federation support",
                provider
            ))
        })?;

        let mut post_body = format!("id_token={}&providerId={}", id_token, provider_id);
        if let Some(nonce) = raw_nonce {
            post_body.push_str("&nonce=");
            post_body.push_str(nonce);
        }

        let url = format!("{}/accounts:signInWithIdp?key={}", self.base_url, self.api_key);
        let body = serde_json::json!({
            "postBody": post_body,
            "requestUri": "http://localhost",
            "returnSecureToken": true,
            "returnIdpCredential": true,
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::NetworkError(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Exchange a provider access token for a federation token at the
    /// verification endpoint.
    ///
    /// POST `{ "token": "<provider_access_token>" }`, expects
    /// `{ "firebase_token": "..." }`. Anything else is a network failure.
    pub async fn verify_provider_token(&self, access_token: &str) -> Result<String> {
        let body = serde_json::json!({ "token": access_token });

        let response = self
            .http
            .post(&self.verify_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::NetworkError(format!("Verify request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::NetworkError(format!(
                "Verify request failed: HTTP {}: {}",
                status, body
            )));
        }

        let parsed: VerifyTokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::NetworkError(format!("JSON parse error: {}", e)))?;

        parsed.firebase_token.ok_or_else(|| {
            AppError::NetworkError("No firebase_token in verify response".to_string())
        })
    }

    /// Redeem a federation token for a session token.
    pub async fn sign_in_with_custom_token(&self, token: &str) -> Result<String> {
        let url = format!(
            "{}/accounts:signInWithCustomToken?key={}",
            self.base_url, self.api_key
        );
        let body = serde_json::json!({
            "token": token,
            "returnSecureToken": true,
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::NetworkError(e.to_string()))?;

        let parsed: CustomTokenSignInResponse = self.check_response_json(response).await?;
        Ok(parsed.id_token)
    }

    /// Resolve account info for a session token.
    pub async fn lookup(&self, id_token: &str) -> Result<IdpAccount> {
        let url = format!("{}/accounts:lookup?key={}", self.base_url, self.api_key);
        let body = serde_json::json!({ "idToken": id_token });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::NetworkError(e.to_string()))?;

        let parsed: LookupResponse = self.check_response_json(response).await?;
        parsed
            .users
            .into_iter()
            .next()
            .ok_or(AppError::CredentialInvalid)
    }

    /// Check response status and parse JSON body.
    ///
    /// 400-class rejections of the presented token map to
    /// `CredentialInvalid`; everything else non-successful is a network
    /// failure.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.is_client_error() && is_credential_rejection(&body) {
                tracing::warn!(status = %status, "Federation service rejected the credential");
                return Err(AppError::CredentialInvalid);
            }

            return Err(AppError::NetworkError(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::NetworkError(format!("JSON parse error: {}", e)))
    }
}

fn is_credential_rejection(body: &str) -> bool {
    const REJECTIONS: [&str; 5] = [
        "INVALID_ID_TOKEN",
        "INVALID_IDP_RESPONSE",
        "INVALID_CUSTOM_TOKEN",
        "USER_DISABLED",
        "MISSING_OR_INVALID_NONCE",
    ];
    REJECTIONS.iter().any(|r| body.contains(r))
}

/// Account fields reported by the federation service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdpAccount {
    pub local_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyTokenResponse {
    firebase_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomTokenSignInResponse {
    id_token: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<IdpAccount>,
}

// ─────────────────────────────────────────────────────────────────────────────
// IdentityFederator - credential exchange with the one-at-a-time gate
// ─────────────────────────────────────────────────────────────────────────────

/// Exchanges provider credentials for federated identities.
///
/// At most one sign-in attempt proceeds at a time per process. The gate
/// fails fast: a second attempt while one is outstanding returns
/// `AlreadyInProgress` instead of queueing. The federator never touches the
/// account store.
pub struct IdentityFederator {
    client: FederationClient,
    gate: Mutex<()>,
}

impl IdentityFederator {
    pub fn new(config: &Config) -> Self {
        Self {
            client: FederationClient::new(config),
            gate: Mutex::new(()),
        }
    }

    /// Run a full sign-in: obtain the provider credential, then exchange it.
    /// The gate is held across both steps so a second tap on any login
    /// button cannot start a parallel attempt.
    pub async fn sign_in(&self, provider: &dyn CredentialProvider) -> Result<FederatedIdentity> {
        let _guard = self.gate.try_lock().map_err(|_| AppError::AlreadyInProgress)?;

        tracing::info!(provider = %provider.kind(), "Sign-in started");
        let credential = provider.obtain().await?;
        self.exchange(credential).await
    }

    /// Exchange an already-obtained credential.
    pub async fn federate(&self, credential: ProviderCredential) -> Result<FederatedIdentity> {
        let _guard = self.gate.try_lock().map_err(|_| AppError::AlreadyInProgress)?;
        self.exchange(credential).await
    }

    async fn exchange(&self, credential: ProviderCredential) -> Result<FederatedIdentity> {
        let provider = credential.provider();

        let account = match credential {
            ProviderCredential::GoogleIdToken { id_token } => {
                self.client
                    .sign_in_with_idp(ProviderKind::Google, &id_token, None)
                    .await?
            }
            ProviderCredential::AppleIdentityToken {
                identity_token,
                raw_nonce,
                ..
            } => {
                self.client
                    .sign_in_with_idp(ProviderKind::Apple, &identity_token, Some(&raw_nonce))
                    .await?
            }
            ProviderCredential::KakaoAccessToken { access_token } => {
                let federation_token = self.client.verify_provider_token(&access_token).await?;
                let session_token = self
                    .client
                    .sign_in_with_custom_token(&federation_token)
                    .await?;
                self.client.lookup(&session_token).await?
            }
        };

        tracing::info!(
            provider = %provider,
            user_id = %account.local_id,
            "Federation succeeded"
        );

        Ok(FederatedIdentity {
            user_id: account.local_id,
            display_name: account.display_name,
            email: account.email,
            provider,
        })
    }
}
