mod context;
mod directory;
mod extract;

pub use context::ConnectionContext;
pub use directory::{SqliteTenantDirectory, StaticTenantDirectory, StoreCredentials, TenantDirectory};
pub use extract::{default_extractors, ExplicitKey, HostHeader, KeyExtractor, ReferringOrigin};

use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

use crate::config::Config;
use crate::db;
use crate::error::ChatError;
use crate::store::ConversationStore;
use parley_shared::constants::DEFAULT_TENANT_KEY;
use parley_shared::validation::validate_tenant_key;

/// One tenant's key and pooled store handle.
#[derive(Clone)]
pub struct TenantStore {
    pub key: String,
    pub pool: SqlitePool,
}

impl TenantStore {
    pub fn conversations(&self) -> ConversationStore {
        ConversationStore::new(self.pool.clone())
    }

    pub fn is_default(&self) -> bool {
        self.key == DEFAULT_TENANT_KEY
    }
}

impl std::fmt::Debug for TenantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantStore").field("key", &self.key).finish()
    }
}

/// How an unknown tenant key is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Reject with `TenantNotFound`.
    Strict,
    /// Serve from the default store.
    Lenient,
}

type StoreCell = Arc<OnceCell<TenantStore>>;

/// Maps connections to tenant stores. Stores are opened on first use and kept for
/// the life of the process.
pub struct TenantResolver {
    extractors: Vec<Box<dyn KeyExtractor>>,
    directory: Arc<dyn TenantDirectory>,
    reserved: Vec<String>,
    default_url: String,
    max_connections: u32,
    default_store: OnceCell<TenantStore>,
    stores: Mutex<HashMap<String, StoreCell>>,
}

impl TenantResolver {
    pub fn new(
        extractors: Vec<Box<dyn KeyExtractor>>,
        directory: Arc<dyn TenantDirectory>,
        default_url: impl Into<String>,
    ) -> Self {
        Self {
            extractors,
            directory,
            reserved: Vec::new(),
            default_url: default_url.into(),
            max_connections: 5,
            default_store: OnceCell::new(),
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Keys that always go to the default store.
    pub fn with_reserved_keys(mut self, keys: Vec<String>) -> Self {
        self.reserved = keys.into_iter().map(|k| k.to_ascii_lowercase()).collect();
        self
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Builds the resolver described by the configuration. A SQLite directory wins
    /// over the static `TENANTS` table.
    pub async fn from_config(config: &Config) -> Result<Self, ChatError> {
        let directory: Arc<dyn TenantDirectory> = match &config.tenant_directory_url {
            Some(url) => Arc::new(SqliteTenantDirectory::connect(url).await?),
            None => Arc::new(StaticTenantDirectory::new(config.tenants.clone())),
        };

        Ok(Self::new(
            default_extractors(&config.tenant_base_domains),
            directory,
            config.default_database_url.clone(),
        )
        .with_reserved_keys(config.reserved_tenant_keys.clone())
        .with_max_connections(config.store_max_connections))
    }

    /// The tenant key a connection maps to, or `None` for the default store.
    pub fn tenant_key(&self, ctx: &ConnectionContext) -> Option<String> {
        let key = self.extractors.iter().find_map(|e| e.extract(ctx))?;
        if key == DEFAULT_TENANT_KEY || self.reserved.contains(&key) {
            return None;
        }
        Some(key)
    }

    pub async fn resolve(
        &self,
        ctx: &ConnectionContext,
        mode: Resolution,
    ) -> Result<TenantStore, ChatError> {
        match self.tenant_key(ctx) {
            Some(key) => self.resolve_key(&key, mode).await,
            None => self.default_store().await,
        }
    }

    pub async fn resolve_key(&self, key: &str, mode: Resolution) -> Result<TenantStore, ChatError> {
        let result = if validate_tenant_key(key).is_err() {
            Err(ChatError::TenantNotFound(key.to_string()))
        } else {
            self.cached_or_open(key).await
        };

        match result {
            Ok(store) => Ok(store),
            Err(ChatError::TenantNotFound(_)) if mode == Resolution::Lenient => {
                tracing::debug!("Unknown tenant {}, serving default store", key);
                self.default_store().await
            }
            Err(e) => Err(e),
        }
    }

    async fn cached_or_open(&self, key: &str) -> Result<TenantStore, ChatError> {
        let cell = {
            let mut stores = self.stores.lock().await;
            stores.entry(key.to_string()).or_default().clone()
        };

        // Concurrent misses for one key wait on the same cell; a failed init leaves
        // it empty so the next call retries.
        let result = cell
            .get_or_try_init(|| self.open_tenant(key))
            .await
            .cloned();

        if result.is_err() {
            let mut stores = self.stores.lock().await;
            if stores
                .get(key)
                .is_some_and(|c| Arc::ptr_eq(c, &cell) && !c.initialized())
            {
                stores.remove(key);
            }
        }
        result
    }

    pub async fn default_store(&self) -> Result<TenantStore, ChatError> {
        self.default_store
            .get_or_try_init(|| async {
                let pool = db::open_store(&self.default_url, self.max_connections).await?;
                tracing::info!("Opened default store");
                Ok::<_, ChatError>(TenantStore {
                    key: DEFAULT_TENANT_KEY.to_string(),
                    pool,
                })
            })
            .await
            .cloned()
    }

    /// Number of tenant stores opened so far, not counting the default store.
    pub async fn open_store_count(&self) -> usize {
        let stores = self.stores.lock().await;
        stores.values().filter(|cell| cell.initialized()).count()
    }

    async fn open_tenant(&self, key: &str) -> Result<TenantStore, ChatError> {
        let credentials = self
            .directory
            .lookup(key)
            .await?
            .ok_or_else(|| ChatError::TenantNotFound(key.to_string()))?;

        let pool = db::open_store(&credentials.database_url, self.max_connections).await?;
        tracing::info!("Opened store for tenant {}", key);

        Ok(TenantStore {
            key: key.to_string(),
            pool,
        })
    }
}
