use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::error::ChatError;

/// Where a tenant's store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCredentials {
    pub database_url: String,
}

/// Maps tenant keys to store credentials. Administration happens elsewhere.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn lookup(&self, key: &str) -> Result<Option<StoreCredentials>, ChatError>;
}

/// Directory kept in a SQLite table `tenants(subdomain, database_url)`.
pub struct SqliteTenantDirectory {
    pool: SqlitePool,
}

impl SqliteTenantDirectory {
    pub async fn connect(directory_url: &str) -> Result<Self, sqlx::Error> {
        let pool = crate::db::open_pool(directory_url, 2).await?;
        Self::from_pool(pool).await
    }

    /// Uses an existing pool, creating the `tenants` table if needed.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS "tenants" (
                subdomain TEXT PRIMARY KEY,
                database_url TEXT NOT NULL
            )"#,
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl TenantDirectory for SqliteTenantDirectory {
    async fn lookup(&self, key: &str) -> Result<Option<StoreCredentials>, ChatError> {
        let url = sqlx::query_scalar::<_, String>(
            "SELECT database_url FROM tenants WHERE subdomain = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(url.map(|database_url| StoreCredentials { database_url }))
    }
}

/// Directory fixed at startup, from the `TENANTS` setting.
#[derive(Default)]
pub struct StaticTenantDirectory {
    tenants: HashMap<String, StoreCredentials>,
}

impl StaticTenantDirectory {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let tenants = entries
            .into_iter()
            .map(|(k, v)| {
                (
                    k.into().to_ascii_lowercase(),
                    StoreCredentials {
                        database_url: v.into(),
                    },
                )
            })
            .collect();
        Self { tenants }
    }
}

#[async_trait]
impl TenantDirectory for StaticTenantDirectory {
    async fn lookup(&self, key: &str) -> Result<Option<StoreCredentials>, ChatError> {
        Ok(self.tenants.get(key).cloned())
    }
}
