//! Runtime configuration.
//!
//! Read from the environment after `dotenvy::dotenv()` has loaded any `.env`
//! file; CLI flags override individual values.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `DATAEXPORT_PORT` | 3000 |
//! | `DATAEXPORT_MAX_UPLOAD_MB` | 100 |

use std::str::FromStr;

use crate::error::{ServerError, ServerResult};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_UPLOAD_MB: usize = 100;

/// Rows returned in an inspection preview.
pub const PREVIEW_ROWS: usize = 8;

/// Download name used when the request does not give one.
pub const DEFAULT_OUTPUT_NAME: &str = "data_export";

const PORT_VAR: &str = "DATAEXPORT_PORT";
const MAX_UPLOAD_VAR: &str = "DATAEXPORT_MAX_UPLOAD_MB";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
        }
    }
}

impl ServerConfig {
    /// Build from the process environment.
    pub fn from_env() -> ServerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ServerResult<Self> {
        Ok(Self {
            port: read_var(&lookup, PORT_VAR, DEFAULT_PORT)?,
            max_upload_mb: read_var(&lookup, MAX_UPLOAD_VAR, DEFAULT_MAX_UPLOAD_MB)?,
        })
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

fn read_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> ServerResult<T> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ServerError::Config(format!("{}={:?} is not valid", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.max_upload_bytes(), 100 * 1024 * 1024);
    }

    #[test]
    fn test_values_from_env() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("DATAEXPORT_PORT", "8080"),
            ("DATAEXPORT_MAX_UPLOAD_MB", " 5 "),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_upload_mb, 5);
    }

    #[test]
    fn test_invalid_value_rejected() {
        let err = ServerConfig::from_lookup(lookup(&[("DATAEXPORT_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ServerError::Config(msg) if msg.contains("DATAEXPORT_PORT")));
    }
}
