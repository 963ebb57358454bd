use axum::http::HeaderMap;
use std::collections::HashMap;

/// Request metadata a tenant key can be derived from.
#[derive(Debug, Clone, Default)]
pub struct ConnectionContext {
    /// Explicit tenant identifier from the tenant header or `?tenant=`.
    pub explicit: Option<String>,
    pub referer: Option<String>,
    pub origin: Option<String>,
    pub host: Option<String>,
}

impl ConnectionContext {
    pub fn from_parts(
        headers: &HeaderMap,
        query: &HashMap<String, String>,
        tenant_header: &str,
    ) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        let explicit = header(tenant_header).or_else(|| {
            query
                .get("tenant")
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        });

        Self {
            explicit,
            referer: header("referer"),
            origin: header("origin"),
            host: header("host"),
        }
    }

    /// Parses the query string out of a request URI.
    pub fn query_pairs(query: Option<&str>) -> HashMap<String, String> {
        query
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn with_host(host: &str) -> Self {
        Self {
            host: Some(host.to_string()),
            ..Default::default()
        }
    }
}
