use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::auth::extract_token;
use crate::error::ChatError;
use crate::models::User;
use crate::tenant::{ConnectionContext, Resolution, TenantStore};
use crate::AppState;

/// A verified user together with the tenant store their request resolved to.
pub struct TenantUser {
    pub tenant: TenantStore,
    pub user: User,
}

impl FromRequestParts<Arc<AppState>> for TenantUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let query = ConnectionContext::query_pairs(parts.uri.query());
        let ctx = ConnectionContext::from_parts(&parts.headers, &query, &state.config.tenant_header);

        let tenant = state
            .resolver
            .resolve(&ctx, Resolution::Strict)
            .await
            .map_err(IntoResponse::into_response)?;

        let token = extract_token(&parts.headers, &query)
            .ok_or_else(|| ChatError::AuthenticationFailure.into_response())?;

        let user = state
            .verifier
            .verify(&token, &tenant)
            .await
            .map_err(IntoResponse::into_response)?;

        Ok(TenantUser { tenant, user })
    }
}

/// Tenant store for unauthenticated endpoints; unknown tenants fall back to the
/// default store.
pub struct LenientTenant(pub TenantStore);

impl FromRequestParts<Arc<AppState>> for LenientTenant {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let query = ConnectionContext::query_pairs(parts.uri.query());
        let ctx = ConnectionContext::from_parts(&parts.headers, &query, &state.config.tenant_header);

        state
            .resolver
            .resolve(&ctx, Resolution::Lenient)
            .await
            .map(LenientTenant)
            .map_err(IntoResponse::into_response)
    }
}
