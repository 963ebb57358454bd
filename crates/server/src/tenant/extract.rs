use std::net::IpAddr;

use super::ConnectionContext;

/// One way of deriving a tenant key from a connection. Resolvers try an ordered
/// list of these and take the first key produced.
pub trait KeyExtractor: Send + Sync {
    fn extract(&self, ctx: &ConnectionContext) -> Option<String>;
}

/// Tenant header or `?tenant=` query parameter.
pub struct ExplicitKey;

impl KeyExtractor for ExplicitKey {
    fn extract(&self, ctx: &ConnectionContext) -> Option<String> {
        ctx.explicit.as_deref().and_then(normalize)
    }
}

/// Subdomain of the page that opened the connection (`Referer`, then `Origin`).
pub struct ReferringOrigin {
    base_domains: Vec<String>,
}

impl ReferringOrigin {
    pub fn new(base_domains: Vec<String>) -> Self {
        Self { base_domains }
    }
}

impl KeyExtractor for ReferringOrigin {
    fn extract(&self, ctx: &ConnectionContext) -> Option<String> {
        [ctx.referer.as_deref(), ctx.origin.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|raw| {
                let parsed = url::Url::parse(raw).ok()?;
                let host = parsed.host_str()?;
                subdomain_of(host, &self.base_domains)
            })
    }
}

/// Subdomain of the `Host` header the client connected to.
pub struct HostHeader {
    base_domains: Vec<String>,
}

impl HostHeader {
    pub fn new(base_domains: Vec<String>) -> Self {
        Self { base_domains }
    }
}

impl KeyExtractor for HostHeader {
    fn extract(&self, ctx: &ConnectionContext) -> Option<String> {
        let host = strip_port(ctx.host.as_deref()?);
        subdomain_of(host, &self.base_domains)
    }
}

/// The default extractor order.
pub fn default_extractors(base_domains: &[String]) -> Vec<Box<dyn KeyExtractor>> {
    vec![
        Box::new(ExplicitKey),
        Box::new(ReferringOrigin::new(base_domains.to_vec())),
        Box::new(HostHeader::new(base_domains.to_vec())),
    ]
}

fn normalize(raw: &str) -> Option<String> {
    let key = raw.trim().to_ascii_lowercase();
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // [::1]:5000
        return host
            .split_once(']')
            .map(|(addr, _)| addr.trim_start_matches('['))
            .unwrap_or(host);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

/// `acme.example.app` against `example.app` gives `acme`. The bare base domain and
/// unrelated hosts give nothing. With no base domains configured, any non-IP host
/// of three or more labels gives its first label.
pub(crate) fn subdomain_of(host: &str, base_domains: &[String]) -> Option<String> {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() || host.parse::<IpAddr>().is_ok() {
        return None;
    }

    if base_domains.is_empty() {
        let labels: Vec<&str> = host.split('.').collect();
        if labels.len() >= 3 {
            return normalize(labels[0]);
        }
        return None;
    }

    base_domains.iter().find_map(|base| {
        let prefix = host.strip_suffix(base.as_str())?.strip_suffix('.')?;
        // Only the label next to the base domain names the tenant.
        prefix.rsplit('.').next().and_then(normalize)
    })
}
