//! Application configuration
//!
//! Configuration is layered: built-in defaults, then an optional TOML
//! file at `~/.taskhive/config.toml`, then `TASKHIVE_*` / `DATABASE_URL`
//! environment variables on top. The CLI loads `.env` files before this
//! runs, so env overrides work from either source.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, Result};

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub cache: CacheSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Bind address, host:port
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Allow any origin. Off by default; localhost origins only.
    #[serde(default)]
    pub cors_permissive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSection {
    /// PostgreSQL connection string. No default; must come from the
    /// config file or DATABASE_URL.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    /// Max entries per entity cache
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Entry time-to-live in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

fn default_bind() -> String {
    "127.0.0.1:3080".to_owned()
}

fn default_max_connections() -> u32 {
    5
}

fn default_cache_capacity() -> usize {
    1024
}

fn default_cache_ttl() -> u64 {
    300
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_permissive: false,
        }
    }
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

impl AppConfig {
    /// Path of the config file (~/.taskhive/config.toml).
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".taskhive").join("config.toml"))
    }

    /// Load configuration: defaults, then the default config file if it
    /// exists, then environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };
        config.apply_env();
        Ok(config)
    }

    /// Parse a specific TOML file. Env overrides are NOT applied.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = toml::from_str(&raw).map_err(|source| CoreError::ConfigParse {
            path: path.to_owned(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Overlay environment variables onto the loaded values.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Ok(bind) = std::env::var("TASKHIVE_BIND") {
            self.server.bind = bind;
        }
        if let Ok(v) = std::env::var("TASKHIVE_CORS_PERMISSIVE") {
            self.server.cors_permissive = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Ok(v) = std::env::var("TASKHIVE_MAX_CONNECTIONS") {
            if let Ok(n) = v.parse() {
                self.database.max_connections = n;
            }
        }
        if let Ok(v) = std::env::var("TASKHIVE_CACHE_CAPACITY") {
            if let Ok(n) = v.parse() {
                self.cache.capacity = n;
            }
        }
        if let Ok(v) = std::env::var("TASKHIVE_CACHE_TTL_SECS") {
            if let Ok(n) = v.parse() {
                self.cache.ttl_secs = n;
            }
        }
    }

    /// Database URL, or a config error telling the operator where to set it.
    pub fn database_url(&self) -> Result<&str> {
        self.database.url.as_deref().ok_or_else(|| {
            CoreError::config(
                "database URL not set; use DATABASE_URL or [database].url in ~/.taskhive/config.toml",
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind, "127.0.0.1:3080");
        assert!(!config.server.cors_permissive);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.cache.capacity, 1024);
        assert_eq!(config.cache.ttl_secs, 300);
        assert!(config.database_url().is_err());
    }

    #[test]
    fn partial_file_fills_missing_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[database]\nurl = \"postgres://localhost/taskhive\"\nmax_connections = 12"
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.database_url().unwrap(), "postgres://localhost/taskhive");
        assert_eq!(config.database.max_connections, 12);
        // untouched sections keep defaults
        assert_eq!(config.server.bind, "127.0.0.1:3080");
    }

    #[test]
    fn rejects_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nbind = ").unwrap();

        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, CoreError::ConfigParse { .. }));
    }
}
