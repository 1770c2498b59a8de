//! Gateway configuration.
//!
//! Loaded from TOML, with a single environment override for share-all mode.
//! Every field has a default, so an empty file is a valid configuration.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use sharegate_access::{AccessPolicy, PageLimits, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Environment variable that forces share-all mode on or off.
pub const SHARE_ALL_ENV: &str = "SHAREGATE_SHARE_ALL";

/// Configuration for the Gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Every authenticated user sees every session at `system` level.
    pub share_all_sessions: bool,
    /// Page size when a list request asks for 0.
    pub default_page_size: usize,
    /// Upper bound on any requested page size.
    pub max_page_size: usize,
    /// SQLite file. `None` opens an in-memory database.
    pub database_path: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            share_all_sessions: false,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            database_path: None,
        }
    }
}

impl GatewayConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(s).context("parsing gateway config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, then apply the environment override.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut config = Self::from_toml_str(&text)
            .with_context(|| format!("loading {}", path.display()))?;
        config.apply_env()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(SHARE_ALL_ENV) {
            self.share_all_sessions = parse_flag(&raw)
                .with_context(|| format!("invalid {}", SHARE_ALL_ENV))?;
            tracing::info!(
                share_all_sessions = self.share_all_sessions,
                "share-all mode set from environment"
            );
        }
        Ok(())
    }

    /// Reject settings that cannot produce a page.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.default_page_size == 0 {
            bail!("default_page_size must be positive");
        }
        if self.max_page_size < self.default_page_size {
            bail!(
                "max_page_size ({}) is below default_page_size ({})",
                self.max_page_size,
                self.default_page_size
            );
        }
        Ok(())
    }

    /// The access policy these settings imply.
    pub fn policy(&self) -> AccessPolicy {
        AccessPolicy {
            share_all_sessions: self.share_all_sessions,
        }
    }

    /// Page size bounds.
    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_size: self.default_page_size,
            max_size: self.max_page_size,
        }
    }
}

fn parse_flag(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(GatewayConfig::from_toml_str("").unwrap(), GatewayConfig::default());
    }

    #[test]
    fn test_parse_fields() {
        let config = GatewayConfig::from_toml_str(
            r#"
            share_all_sessions = true
            default_page_size = 25
            max_page_size = 100
            database_path = "/var/lib/sharegate.db"
            "#,
        )
        .unwrap();
        assert!(config.share_all_sessions);
        assert_eq!(config.page_limits().clamp(0), 25);
        assert_eq!(config.page_limits().clamp(500), 100);
        assert_eq!(
            config.database_path.as_deref(),
            Some(Path::new("/var/lib/sharegate.db"))
        );
    }

    #[test]
    fn test_rejects_bad_limits_and_unknown_keys() {
        assert!(GatewayConfig::from_toml_str("default_page_size = 0").is_err());
        assert!(GatewayConfig::from_toml_str("default_page_size = 50\nmax_page_size = 10").is_err());
        assert!(GatewayConfig::from_toml_str("share_everything = true").is_err());
    }

    #[test]
    fn test_env_override() {
        let mut config = GatewayConfig::default();
        config
            .apply_env_from(|k| (k == SHARE_ALL_ENV).then(|| "TRUE".to_string()))
            .unwrap();
        assert!(config.share_all_sessions);

        config.apply_env_from(|_| Some("0".to_string())).unwrap();
        assert!(!config.share_all_sessions);

        assert!(config.apply_env_from(|_| Some("maybe".to_string())).is_err());

        config.share_all_sessions = true;
        config.apply_env_from(|_| None).unwrap();
        assert!(config.share_all_sessions);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sharegate.toml");
        std::fs::write(&path, "default_page_size = 10\n").unwrap();
        let config = GatewayConfig::load(&path).unwrap();
        assert_eq!(config.default_page_size, 10);

        assert!(GatewayConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
