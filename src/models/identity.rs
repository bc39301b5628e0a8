//! Federated identity produced by a successful credential exchange.

use serde::{Deserialize, Serialize};

/// Social identity provider backing a sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    Apple,
    Kakao,
}

impl ProviderKind {
    /// IdP identifier used by the federation REST surface, for providers
    /// with direct federation support. Kakao federates through a server-side
    /// token exchange instead and has no IdP id.
    pub fn idp_id(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Google => Some("google.com"),
            ProviderKind::Apple => Some("apple.com"),
            ProviderKind::Kakao => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::Apple => "apple",
            ProviderKind::Kakao => "kakao",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable per-person identity issued by the federation layer.
///
/// Immutable for the lifetime of a session; `user_id` keys the account
/// document in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    pub user_id: String,
    /// Display name as reported by the provider (may be absent)
    pub display_name: Option<String>,
    /// Email address (may be withheld by the provider after the first grant)
    pub email: Option<String>,
    pub provider: ProviderKind,
}
