use async_trait::async_trait;
use axum::http::HeaderMap;
use std::collections::HashMap;

use crate::error::ChatError;
use crate::models::User;
use crate::tenant::TenantStore;

/// Turns a bearer token into a user of the given tenant store. Token issuance
/// lives outside this service.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, token: &str, store: &TenantStore) -> Result<User, ChatError>;
}

/// Looks the token up in the tenant's `users.token` column.
pub struct StoreTokenVerifier;

#[async_trait]
impl CredentialVerifier for StoreTokenVerifier {
    async fn verify(&self, token: &str, store: &TenantStore) -> Result<User, ChatError> {
        if token.is_empty() {
            return Err(ChatError::AuthenticationFailure);
        }
        store
            .conversations()
            .user_by_token(token)
            .await?
            .ok_or(ChatError::AuthenticationFailure)
    }
}

/// `?token=` first, then `Authorization: Bearer`.
pub fn extract_token(headers: &HeaderMap, query: &HashMap<String, String>) -> Option<String> {
    if let Some(token) = query.get("token").filter(|t| !t.is_empty()) {
        return Some(token.clone());
    }

    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}
