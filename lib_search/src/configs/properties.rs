//! # Search Client Properties
//!
//! Typed view over the flattened configuration map. Binding is relaxed:
//! keys are case-insensitive, `.` and `:` both separate segments, list
//! indices may be written `uris[0]` or `uris:0`, and `-`/`_` are ignored
//! inside a segment, so `read-timeout`, `readTimeout` and `READ_TIMEOUT`
//! all address the same property.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::client::builder::{HttpHost, DEFAULT_TIMEOUT};
use crate::error::ConfigurationError;

/// Endpoint used when no URI is configured.
pub const DEFAULT_URI: &str = "http://localhost:9200";

/// Key prefix under which the properties are looked up.
pub const DEFAULT_PREFIX: &str = "search.client";

/// Proxy settings. A host without a port is a configuration error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyProperties {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Properties the client factory is built from.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SearchProperties {
    /// Endpoint URIs, tried round-robin.
    pub uris: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Pooled connections when true, a single connection per route otherwise.
    pub multi_threaded: bool,
    #[serde(with = "duration_ms")]
    pub connection_timeout: Duration,
    #[serde(with = "duration_ms")]
    pub read_timeout: Duration,
    /// Retries for transient transport failures.
    pub max_retries: u32,
    pub proxy: ProxyProperties,
}

impl Default for SearchProperties {
    fn default() -> Self {
        Self {
            uris: vec![DEFAULT_URI.to_string()],
            username: None,
            password: None,
            multi_threaded: true,
            connection_timeout: DEFAULT_TIMEOUT,
            read_timeout: DEFAULT_TIMEOUT,
            max_retries: 0,
            proxy: ProxyProperties::default(),
        }
    }
}

impl fmt::Debug for SearchProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchProperties")
            .field("uris", &self.uris)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("multi_threaded", &self.multi_threaded)
            .field("connection_timeout", &self.connection_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("max_retries", &self.max_retries)
            .field("proxy", &self.proxy)
            .finish()
    }
}

impl SearchProperties {
    /// Binds the properties found under `prefix` in a flattened key/value map.
    ///
    /// Keys that are absent keep their defaults; unknown keys are ignored.
    ///
    /// # Errors
    /// `ConfigurationError::InvalidProperty` when a value does not parse.
    pub fn bind(map: &BTreeMap<String, String>, prefix: &str) -> Result<Self, ConfigurationError> {
        let prefix = normalize_key(prefix);
        let scoped: BTreeMap<String, (&str, &str)> = map
            .iter()
            .filter_map(|(key, value)| {
                let normalized = normalize_key(key);
                let rest = if prefix.is_empty() {
                    normalized
                } else {
                    normalized.strip_prefix(&prefix)?.strip_prefix(':')?.to_string()
                };
                Some((rest, (key.as_str(), value.as_str())))
            })
            .collect();

        let mut props = Self::default();

        let uris = bind_list(&scoped, "uris")?;
        if !uris.is_empty() {
            props.uris = uris;
        }
        if let Some((_, value)) = scoped.get("username") {
            props.username = Some(value.to_string());
        }
        if let Some((_, value)) = scoped.get("password") {
            props.password = Some(value.to_string());
        }
        if let Some(&(key, value)) = scoped.get("multithreaded") {
            props.multi_threaded = parse_bool(value).ok_or_else(|| invalid(key, value))?;
        }
        if let Some(&(key, value)) = scoped.get("connectiontimeout") {
            props.connection_timeout = parse_duration(value).ok_or_else(|| invalid(key, value))?;
        }
        if let Some(&(key, value)) = scoped.get("readtimeout") {
            props.read_timeout = parse_duration(value).ok_or_else(|| invalid(key, value))?;
        }
        if let Some(&(key, value)) = scoped.get("maxretries") {
            props.max_retries = value.trim().parse().map_err(|_| invalid(key, value))?;
        }
        if let Some((_, value)) = scoped.get("proxy:host") {
            props.proxy.host = Some(value.trim().to_string());
        }
        if let Some(&(key, value)) = scoped.get("proxy:port") {
            props.proxy.port = Some(value.trim().parse().map_err(|_| invalid(key, value))?);
        }

        Ok(props)
    }

    /// The configured proxy, if any.
    ///
    /// A blank host means no proxy. A port without a host is ignored.
    ///
    /// # Errors
    /// `ConfigurationError::ProxyPortMissing` when a host is set without a port.
    pub fn proxy_host(&self) -> Result<Option<HttpHost>, ConfigurationError> {
        match self.proxy.host.as_deref().map(str::trim) {
            Some(host) if !host.is_empty() => {
                let port = self.proxy.port.ok_or(ConfigurationError::ProxyPortMissing)?;
                Ok(Some(HttpHost::new(host, port)))
            }
            _ => {
                if let Some(port) = self.proxy.port {
                    tracing::warn!(port, "proxy port configured without a proxy host, ignoring");
                }
                Ok(None)
            }
        }
    }

    /// Basic auth credentials when a username is configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.username
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(|u| (u, self.password.as_deref().unwrap_or("")))
    }
}

fn invalid(key: &str, value: &str) -> ConfigurationError {
    ConfigurationError::InvalidProperty {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Reads `name:0`, `name:1`, ... in index order, or a single comma-separated `name`.
fn bind_list(
    scoped: &BTreeMap<String, (&str, &str)>,
    name: &str,
) -> Result<Vec<String>, ConfigurationError> {
    let indexed_prefix = format!("{}:", name);
    let mut indexed: Vec<(usize, String)> = Vec::new();
    for (key, &(raw_key, value)) in scoped {
        if let Some(idx) = key.strip_prefix(&indexed_prefix) {
            let idx: usize = idx.parse().map_err(|_| invalid(raw_key, value))?;
            indexed.push((idx, value.trim().to_string()));
        }
    }
    if !indexed.is_empty() {
        indexed.sort_by_key(|(idx, _)| *idx);
        return Ok(indexed.into_iter().map(|(_, v)| v).filter(|v| !v.is_empty()).collect());
    }

    Ok(scoped
        .get(name)
        .map(|(_, value)| {
            value
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default())
}

/// Canonical form of a configuration key: lowercase segments joined by `:`.
pub fn normalize_key(key: &str) -> String {
    let replaced = key.replace("__", ":").replace('[', ":").replace(']', "");
    let mut out = String::with_capacity(replaced.len());
    for segment in replaced.split(|c| c == '.' || c == ':') {
        if segment.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(':');
        }
        out.extend(
            segment
                .chars()
                .filter(|c| *c != '-' && *c != '_')
                .map(|c| c.to_ascii_lowercase()),
        );
    }
    out
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parses `250ms`, `3s`, `1m` or a bare millisecond count.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Some(ms) = value.strip_suffix("ms") {
        return ms.trim().parse().ok().map(Duration::from_millis);
    }
    if let Some(secs) = value.strip_suffix('s') {
        return secs.trim().parse().ok().map(Duration::from_secs);
    }
    if let Some(mins) = value.strip_suffix('m') {
        return mins
            .trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs);
    }
    value.parse().ok().map(Duration::from_millis)
}

/// Serializes durations as milliseconds; accepts numbers or duration strings.
mod duration_ms {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(u64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => Ok(Duration::from_millis(ms)),
            Raw::Text(text) => super::parse_duration(&text)
                .ok_or_else(|| D::Error::custom(format!("invalid duration '{}'", text))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_point_at_localhost() {
        let props = SearchProperties::bind(&BTreeMap::new(), DEFAULT_PREFIX).unwrap();
        assert_eq!(props, SearchProperties::default());
        assert_eq!(props.uris, vec!["http://localhost:9200".to_string()]);
        assert!(props.multi_threaded);
        assert_eq!(props.read_timeout, Duration::from_secs(3));
    }

    #[test]
    fn binds_indexed_and_comma_separated_uris() {
        let indexed = map(&[
            ("search.client.uris[1]", "http://b:9200"),
            ("search.client.uris[0]", "http://a:9200"),
            ("search.client.uris[10]", "http://c:9200"),
        ]);
        let props = SearchProperties::bind(&indexed, DEFAULT_PREFIX).unwrap();
        assert_eq!(props.uris, vec!["http://a:9200", "http://b:9200", "http://c:9200"]);

        let single = map(&[("search.client.uris", "http://a:9200, http://b:9200")]);
        let props = SearchProperties::bind(&single, DEFAULT_PREFIX).unwrap();
        assert_eq!(props.uris, vec!["http://a:9200", "http://b:9200"]);
    }

    #[test]
    fn relaxed_keys_bind_to_the_same_property() {
        for key in [
            "search.client.read-timeout",
            "search:client:readTimeout",
            "SEARCH__CLIENT__READ_TIMEOUT",
        ] {
            let props = SearchProperties::bind(&map(&[(key, "250ms")]), DEFAULT_PREFIX).unwrap();
            assert_eq!(props.read_timeout, Duration::from_millis(250), "key {}", key);
        }
    }

    #[test]
    fn binds_scalars_and_proxy() {
        let props = SearchProperties::bind(
            &map(&[
                ("search.client.username", "elastic"),
                ("search.client.password", "changeme"),
                ("search.client.multi-threaded", "false"),
                ("search.client.connection-timeout", "5s"),
                ("search.client.max-retries", "2"),
                ("search.client.proxy.host", "proxy.example.com"),
                ("search.client.proxy.port", "8080"),
                ("other.client.max-retries", "9"),
            ]),
            DEFAULT_PREFIX,
        )
        .unwrap();

        assert_eq!(props.credentials(), Some(("elastic", "changeme")));
        assert!(!props.multi_threaded);
        assert_eq!(props.connection_timeout, Duration::from_secs(5));
        assert_eq!(props.max_retries, 2);
        assert_eq!(
            props.proxy_host().unwrap(),
            Some(HttpHost::new("proxy.example.com", 8080))
        );
    }

    #[test]
    fn malformed_values_name_the_offending_key() {
        let err = SearchProperties::bind(
            &map(&[("search.client.proxy.port", "eighty")]),
            DEFAULT_PREFIX,
        )
        .unwrap_err();

        assert_eq!(
            err,
            ConfigurationError::InvalidProperty {
                key: "search.client.proxy.port".to_string(),
                value: "eighty".to_string()
            }
        );
    }

    #[test]
    fn oversized_minute_timeout_is_rejected() {
        let err = SearchProperties::bind(
            &map(&[("search.client.read-timeout", "307445734561825861m")]),
            DEFAULT_PREFIX,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigurationError::InvalidProperty { ref key, .. } if key == "search.client.read-timeout"));
    }

    #[test]
    fn proxy_host_without_port_is_rejected() {
        let mut props = SearchProperties::default();
        props.proxy.host = Some("proxy.example.com".to_string());

        let err = props.proxy_host().unwrap_err();
        assert_eq!(err.to_string(), "Proxy port must not be null");
    }

    #[test]
    fn blank_proxy_host_and_lone_port_mean_no_proxy() {
        let mut props = SearchProperties::default();
        props.proxy.host = Some("  ".to_string());
        assert_eq!(props.proxy_host().unwrap(), None);

        props.proxy.host = None;
        props.proxy.port = Some(3128);
        assert_eq!(props.proxy_host().unwrap(), None);
    }

    #[test]
    fn parses_duration_units() {
        assert_eq!(parse_duration("1500"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_duration("20ms"), Some(Duration::from_millis(20)));
        assert_eq!(parse_duration("3s"), Some(Duration::from_secs(3)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("soon"), None);
    }

    #[test]
    fn deserializes_from_json_documents() {
        let props: SearchProperties = serde_json::from_value(serde_json::json!({
            "uris": ["http://es:9200"],
            "read-timeout": "10s",
            "connection-timeout": 500,
            "proxy": {"host": "proxy", "port": 3128}
        }))
        .unwrap();

        assert_eq!(props.uris, vec!["http://es:9200"]);
        assert_eq!(props.read_timeout, Duration::from_secs(10));
        assert_eq!(props.connection_timeout, Duration::from_millis(500));
        assert!(props.multi_threaded);
        assert_eq!(props.proxy.port, Some(3128));
    }

    #[test]
    fn debug_output_hides_password() {
        let mut props = SearchProperties::default();
        props.password = Some("changeme".to_string());
        assert!(!format!("{:?}", props).contains("changeme"));
    }
}
