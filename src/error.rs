// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types shared by providers, federation and storage.

/// Application error type.
///
/// Provider adapters, the identity federator and the account repository all
/// surface failures through this one taxonomy; the lifecycle orchestrator
/// maps it onto the two user-visible behaviors (retry prompt vs. fallback).
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The social provider handed back a credential the federation service
    /// rejected (or an empty one).
    #[error("Provider credential invalid")]
    CredentialInvalid,

    /// The user dismissed the native sign-in dialog.
    #[error("Sign-in cancelled by user")]
    UserCancelled,

    /// The native SDK could not run the sign-in at all.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Transport failure talking to the federation service, the verification
    /// endpoint or the document store. Retryable by the caller.
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Every referral-code candidate collided within the attempt budget.
    #[error("Referral code generation exhausted")]
    CodeGenerationExhausted,

    /// Another sign-in attempt already holds the federation gate.
    #[error("Sign-in already in progress")]
    AlreadyInProgress,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether this failure should be presented as a network problem with a
    /// retry prompt (as opposed to falling back to an alternate flow).
    pub fn is_network(&self) -> bool {
        matches!(self, AppError::NetworkError(_))
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AppError>;
