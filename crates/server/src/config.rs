use std::env;

use parley_shared::constants::DEFAULT_TENANT_HEADER;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Store used for traffic that maps to no tenant.
    pub default_database_url: String,
    /// Optional SQLite tenant directory (`tenants(subdomain, database_url)`).
    pub tenant_directory_url: Option<String>,
    /// Static tenant table, `key=url` pairs. Consulted when no directory URL is set.
    pub tenants: Vec<(String, String)>,
    pub tenant_base_domains: Vec<String>,
    pub reserved_tenant_keys: Vec<String>,
    pub tenant_header: String,
    pub store_max_connections: u32,
    pub upload_dir: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000),
            default_database_url: env::var("DEFAULT_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./parley.db".into()),
            tenant_directory_url: env::var("TENANT_DIRECTORY_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            tenants: parse_tenant_table(&env::var("TENANTS").unwrap_or_default()),
            tenant_base_domains: split_list(&env::var("TENANT_BASE_DOMAINS").unwrap_or_default()),
            reserved_tenant_keys: split_list(
                &env::var("RESERVED_TENANT_KEYS").unwrap_or_else(|_| "www".into()),
            ),
            tenant_header: env::var("TENANT_HEADER")
                .unwrap_or_else(|_| DEFAULT_TENANT_HEADER.into())
                .to_ascii_lowercase(),
            store_max_connections: env::var("STORE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".into()),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parses `acme=sqlite:./acme.db,globex=sqlite:./globex.db`.
/// Only the first `=` separates key from URL, since URLs may contain `=`.
fn parse_tenant_table(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|entry| {
            let (key, url) = entry.split_once('=')?;
            let key = key.trim().to_ascii_lowercase();
            let url = url.trim();
            if key.is_empty() || url.is_empty() {
                None
            } else {
                Some((key, url.to_string()))
            }
        })
        .collect()
}
