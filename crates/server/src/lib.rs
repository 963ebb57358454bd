pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod presence;
pub mod rate_limit;
pub mod routes;
pub mod store;
pub mod tenant;
pub mod ws;

use auth::{CredentialVerifier, StoreTokenVerifier};
use config::Config;
use presence::PresenceTracker;
use rate_limit::RateLimiter;
use std::sync::Arc;
use tenant::TenantResolver;

pub struct AppState {
    pub config: Config,
    pub resolver: TenantResolver,
    pub gateway: Arc<ws::gateway::GatewayState>,
    pub presence: PresenceTracker,
    pub rate_limiter: RateLimiter,
    pub verifier: Arc<dyn CredentialVerifier>,
}

impl AppState {
    /// State with empty registries and the store-backed token verifier.
    pub fn new(config: Config, resolver: TenantResolver) -> Self {
        Self {
            config,
            resolver,
            gateway: Arc::new(ws::gateway::GatewayState::new()),
            presence: PresenceTracker::new(),
            rate_limiter: RateLimiter::default(),
            verifier: Arc::new(StoreTokenVerifier),
        }
    }
}
