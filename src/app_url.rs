use anyhow::{anyhow, Result};
use std::collections::HashMap;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

const API_URL_KEY: &str = "MONTY_API_URL";
const DOMAIN_KEY: &str = "DOMAIN";
const LOCAL_DOMAIN_PREFIXES: [&str; 3] = ["localhost", "127.0.0.1", "[::1]"];

fn is_local_domain(value: &str) -> bool {
    let lower = value.to_lowercase();
    LOCAL_DOMAIN_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// Accepts a bare host with an optional numeric port; anything URL-shaped is rejected.
pub fn normalize_domain(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains("://")
        || trimmed.contains('/')
        || trimmed.contains('?')
        || trimmed.contains('#')
    {
        return None;
    }
    let (host, port) = match trimmed.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (trimmed, None),
    };
    if host.is_empty()
        || !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return None;
    }
    if let Some(port) = port {
        if port.is_empty() || port.parse::<u16>().is_err() {
            return None;
        }
    }
    Some(trimmed.to_string())
}

fn setting<'a>(settings: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    settings
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

/// Base URL of the strategy service.
///
/// `MONTY_API_URL` wins when set. Otherwise `DOMAIN` is turned into a URL (plain http for
/// local hosts), and with neither the local development server is assumed.
pub fn resolve_api_base_url(settings: &HashMap<String, String>) -> Result<String> {
    if let Some(raw) = setting(settings, API_URL_KEY) {
        if !(raw.starts_with("http://") || raw.starts_with("https://")) {
            return Err(anyhow!(
                "Setting {} must start with http:// or https:// (value: {})",
                API_URL_KEY,
                raw
            ));
        }
        return Ok(raw.trim_end_matches('/').to_string());
    }

    if let Some(raw) = setting(settings, DOMAIN_KEY) {
        let domain = normalize_domain(Some(raw)).ok_or_else(|| {
            anyhow!(
                "Setting {} must be a bare host name (value: {})",
                DOMAIN_KEY,
                raw
            )
        })?;
        let scheme = if is_local_domain(&domain) {
            "http"
        } else {
            "https"
        };
        return Ok(format!("{}://{}", scheme, domain));
    }

    Ok(DEFAULT_API_BASE_URL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn explicit_url_wins_and_loses_trailing_slash() {
        let map = settings(&[
            ("MONTY_API_URL", "https://api.example.com/"),
            ("DOMAIN", "ignored.example.com"),
        ]);
        assert_eq!(
            resolve_api_base_url(&map).unwrap(),
            "https://api.example.com"
        );
    }

    #[test]
    fn domain_picks_scheme() {
        assert_eq!(
            resolve_api_base_url(&settings(&[("DOMAIN", "monty.example.com")])).unwrap(),
            "https://monty.example.com"
        );
        assert_eq!(
            resolve_api_base_url(&settings(&[("DOMAIN", "localhost:8000")])).unwrap(),
            "http://localhost:8000"
        );
    }

    #[test]
    fn falls_back_to_local_server() {
        assert_eq!(
            resolve_api_base_url(&HashMap::new()).unwrap(),
            DEFAULT_API_BASE_URL
        );
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(resolve_api_base_url(&settings(&[("MONTY_API_URL", "api.example.com")])).is_err());
        assert!(resolve_api_base_url(&settings(&[("DOMAIN", "https://x.example.com")])).is_err());
        assert_eq!(normalize_domain(Some("host:notaport")), None);
    }
}
