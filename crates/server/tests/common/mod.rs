#![allow(dead_code)]

pub mod ws_helpers;

use axum::Router;
use parley_server::{
    config::Config,
    routes,
    tenant::{default_extractors, ConnectionContext, Resolution, StaticTenantDirectory, TenantResolver, TenantStore},
    ws::session::MessagingSession,
    AppState,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

pub const MEMORY_URL: &str = "sqlite::memory:";

/// Config with two in-memory tenants, `acme` and `globex`.
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        default_database_url: MEMORY_URL.into(),
        tenant_directory_url: None,
        tenants: vec![
            ("acme".into(), MEMORY_URL.into()),
            ("globex".into(), MEMORY_URL.into()),
        ],
        tenant_base_domains: vec!["example.app".into()],
        reserved_tenant_keys: vec!["www".into()],
        tenant_header: "x-tenant-id".into(),
        store_max_connections: 1,
        upload_dir: std::env::temp_dir()
            .join("parley-test-uploads")
            .to_string_lossy()
            .into_owned(),
    }
}

pub fn test_resolver(config: &Config) -> TenantResolver {
    TenantResolver::new(
        default_extractors(&config.tenant_base_domains),
        Arc::new(StaticTenantDirectory::new(config.tenants.clone())),
        config.default_database_url.clone(),
    )
    .with_reserved_keys(config.reserved_tenant_keys.clone())
    .with_max_connections(config.store_max_connections)
}

pub fn test_state() -> Arc<AppState> {
    let config = test_config();
    let resolver = test_resolver(&config);
    Arc::new(AppState::new(config, resolver))
}

/// Build a test Axum app around the given state.
pub fn create_test_app(state: Arc<AppState>) -> Router {
    routes::build_router(state)
}

pub async fn tenant_store(state: &AppState, key: &str) -> TenantStore {
    state
        .resolver
        .resolve_key(key, Resolution::Strict)
        .await
        .expect("tenant store")
}

/// Create a test user directly in the store. Returns (user_id, token).
pub async fn create_test_user(store: &TenantStore, name: &str) -> (String, String) {
    let user_id = uuid::Uuid::new_v4().to_string();
    let token = uuid::Uuid::new_v4().to_string();

    sqlx::query(
        r#"INSERT INTO "users" (id, name, handle, token)
           VALUES (?, ?, ?, ?)"#,
    )
    .bind(&user_id)
    .bind(name)
    .bind(name.to_lowercase())
    .bind(&token)
    .execute(&store.pool)
    .await
    .unwrap();

    (user_id, token)
}

pub async fn set_notifications(store: &TenantStore, user_id: &str, enabled: bool) {
    sqlx::query(r#"UPDATE "users" SET notifications_enabled = ? WHERE id = ?"#)
        .bind(enabled)
        .bind(user_id)
        .execute(&store.pool)
        .await
        .unwrap();
}

pub fn tenant_ctx(key: &str) -> ConnectionContext {
    ConnectionContext {
        explicit: Some(key.to_string()),
        ..Default::default()
    }
}

/// An active session on `tenant`, with the receiving end of its outbound frames.
pub async fn connect_session(
    state: &Arc<AppState>,
    tenant: &str,
    token: &str,
) -> (MessagingSession, mpsc::UnboundedReceiver<String>) {
    let session = MessagingSession::authenticate(state.clone(), &tenant_ctx(tenant), Some(token))
        .await
        .expect("handshake");
    let (tx, rx) = mpsc::unbounded_channel();
    session.activate(tx).await.expect("activate");
    (session, rx)
}

/// Everything queued for a connection so far.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<Value> {
    let mut events = Vec::new();
    while let Ok(text) = rx.try_recv() {
        events.push(serde_json::from_str(&text).unwrap());
    }
    events
}

pub fn of_type<'a>(events: &'a [Value], kind: &str) -> Vec<&'a Value> {
    events.iter().filter(|e| e["type"] == kind).collect()
}
