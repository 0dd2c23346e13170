//! Configuration loading for njalld.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.njall/config.toml` (user)
//! 3. `/etc/njall/config.toml` (system)
//! 4. Built-in defaults
//!
//! Environment variables then override individual values:
//! `NJALL_GRPC_ADDRESS`, `NJALL_HTTP_ADDRESS`, `NJALL_OPENAPI_SPEC`,
//! `NJALL_DEFAULT_DEADLINE_MS`.

use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{NjallError, Result};

pub const ENV_GRPC_ADDRESS: &str = "NJALL_GRPC_ADDRESS";
pub const ENV_HTTP_ADDRESS: &str = "NJALL_HTTP_ADDRESS";
pub const ENV_OPENAPI_SPEC: &str = "NJALL_OPENAPI_SPEC";
pub const ENV_DEFAULT_DEADLINE_MS: &str = "NJALL_DEFAULT_DEADLINE_MS";

/// Server configuration as written in the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub grpc: GrpcConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// gRPC listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrpcConfig {
    /// Address to bind to (default: 0.0.0.0:9090).
    #[serde(default = "default_grpc_address")]
    pub address: String,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            address: default_grpc_address(),
        }
    }
}

fn default_grpc_address() -> String {
    "0.0.0.0:9090".to_string()
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    /// Address to bind to (default: 0.0.0.0:8080).
    #[serde(default = "default_http_address")]
    pub address: String,
    /// OpenAPI document served at `/openapi.yaml` (default: openapi.yaml).
    #[serde(default = "default_openapi_spec")]
    pub openapi_spec: PathBuf,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: default_http_address(),
            openapi_spec: default_openapi_spec(),
        }
    }
}

fn default_http_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_openapi_spec() -> PathBuf {
    PathBuf::from("openapi.yaml")
}

/// Resource limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum concurrent requests per listener (default: 100).
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    /// Server-side deadline applied to every request, in milliseconds (default: 30000).
    #[serde(default = "default_deadline_ms")]
    pub default_deadline_ms: u64,
    /// Grace period for in-flight requests on shutdown, in seconds (default: 120).
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent(),
            default_deadline_ms: default_deadline_ms(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

fn default_max_concurrent() -> usize {
    100
}

fn default_deadline_ms() -> u64 {
    30_000
}

fn default_shutdown_timeout() -> u64 {
    120
}

/// Validated settings handed to [`Server::start`](super::Server::start).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub grpc_address: SocketAddr,
    pub http_address: SocketAddr,
    pub openapi_spec: PathBuf,
    pub default_deadline: Duration,
    pub max_concurrent_requests: usize,
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Load configuration from the standard locations, then apply
    /// environment overrides.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided; must exist)
    /// 2. `~/.njall/config.toml`
    /// 3. `/etc/njall/config.toml`
    /// 4. Built-in defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path)?,
            None => {
                tracing::info!("No config file found, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            NjallError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        let config = toml::from_str(&content).map_err(|e| {
            NjallError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })?;
        tracing::info!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Resolve the config file path. `None` means no file; use defaults.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(NjallError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".njall").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/njall/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(address) = lookup(ENV_GRPC_ADDRESS) {
            self.grpc.address = address;
        }
        if let Some(address) = lookup(ENV_HTTP_ADDRESS) {
            self.http.address = address;
        }
        if let Some(path) = lookup(ENV_OPENAPI_SPEC) {
            self.http.openapi_spec = PathBuf::from(path);
        }
        if let Some(ms) = lookup(ENV_DEFAULT_DEADLINE_MS) {
            self.limits.default_deadline_ms = ms.trim().parse().map_err(|e| {
                NjallError::Configuration(format!(
                    "{ENV_DEFAULT_DEADLINE_MS} must be an integer, got {ms:?}: {e}"
                ))
            })?;
        }
        Ok(())
    }

    /// Check values and convert them into [`ServerSettings`].
    pub fn validate(&self) -> Result<ServerSettings> {
        let grpc_address = parse_address("grpc.address", &self.grpc.address)?;
        let http_address = parse_address("http.address", &self.http.address)?;

        if self.limits.max_concurrent_requests == 0 {
            return Err(NjallError::Configuration(
                "limits.max_concurrent_requests must be greater than zero".to_string(),
            ));
        }
        if self.limits.default_deadline_ms == 0 {
            return Err(NjallError::Configuration(
                "limits.default_deadline_ms must be greater than zero".to_string(),
            ));
        }
        if self.http.openapi_spec.as_os_str().is_empty() {
            return Err(NjallError::Configuration(
                "http.openapi_spec must not be empty".to_string(),
            ));
        }

        Ok(ServerSettings {
            grpc_address,
            http_address,
            openapi_spec: self.http.openapi_spec.clone(),
            default_deadline: Duration::from_millis(self.limits.default_deadline_ms),
            max_concurrent_requests: self.limits.max_concurrent_requests,
            shutdown_timeout: Duration::from_secs(self.limits.shutdown_timeout_secs),
        })
    }
}

fn parse_address(field: &str, value: &str) -> Result<SocketAddr> {
    value.parse().map_err(|e| {
        NjallError::Configuration(format!("{field} is not a socket address ({value:?}): {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn default_config_has_expected_values() {
        let settings = Config::default().validate().unwrap();
        assert_eq!(settings.grpc_address, "0.0.0.0:9090".parse().unwrap());
        assert_eq!(settings.http_address, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(settings.openapi_spec, PathBuf::from("openapi.yaml"));
        assert_eq!(settings.default_deadline, Duration::from_secs(30));
        assert_eq!(settings.max_concurrent_requests, 100);
        assert_eq!(settings.shutdown_timeout, Duration::from_secs(120));
    }

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            [grpc]
            address = "127.0.0.1:50051"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.grpc.address, "127.0.0.1:50051");
        // Defaults preserved
        assert_eq!(config.http.address, "0.0.0.0:8080");
        assert_eq!(config.limits.max_concurrent_requests, 100);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [grpc]
            address = "127.0.0.1:9090"

            [http]
            address = "127.0.0.1:8080"
            openapi_spec = "/srv/njall/openapi.yaml"

            [limits]
            max_concurrent_requests = 50
            default_deadline_ms = 1500
            shutdown_timeout_secs = 10
        "#;
        let settings = toml::from_str::<Config>(toml).unwrap().validate().unwrap();
        assert_eq!(settings.max_concurrent_requests, 50);
        assert_eq!(settings.default_deadline, Duration::from_millis(1500));
        assert_eq!(settings.shutdown_timeout, Duration::from_secs(10));
        assert_eq!(
            settings.openapi_spec,
            PathBuf::from("/srv/njall/openapi.yaml")
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let toml = r#"
            [grpc]
            adress = "127.0.0.1:9090"
        "#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config::default();
        config
            .apply_env_overrides(env(&[
                (ENV_GRPC_ADDRESS, "127.0.0.1:1"),
                (ENV_HTTP_ADDRESS, "127.0.0.1:2"),
                (ENV_OPENAPI_SPEC, "api.yaml"),
                (ENV_DEFAULT_DEADLINE_MS, "250"),
            ]))
            .unwrap();
        let settings = config.validate().unwrap();
        assert_eq!(settings.grpc_address.port(), 1);
        assert_eq!(settings.http_address.port(), 2);
        assert_eq!(settings.openapi_spec, PathBuf::from("api.yaml"));
        assert_eq!(settings.default_deadline, Duration::from_millis(250));
    }

    #[test]
    fn bad_deadline_override_is_an_error() {
        let mut config = Config::default();
        let err = config
            .apply_env_overrides(env(&[(ENV_DEFAULT_DEADLINE_MS, "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_DEFAULT_DEADLINE_MS));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let mut config = Config::default();
        config.grpc.address = "localhost".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.limits.max_concurrent_requests = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.limits.default_deadline_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_not_found_returns_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
        assert!(err.is_startup());
    }

    #[test]
    fn load_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[limits]\nmax_concurrent_requests = 7\n").unwrap();
        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.limits.max_concurrent_requests, 7);
    }

    #[test]
    fn example_config_is_valid() {
        let config: Config = toml::from_str(include_str!("../../config.example.toml")).unwrap();
        let settings = config.validate().unwrap();
        assert_eq!(settings, Config::default().validate().unwrap());
    }
}
