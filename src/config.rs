//! Layered daemon configuration.
//!
//! Sources, lowest to highest priority:
//! 1. built-in defaults
//! 2. a TOML file: `$GRADEBOOKD_CONFIG` if set, else `./gradebookd.toml` if present
//! 3. `GRADEBOOKD_*` environment variables, `__` separating sections
//!    (`GRADEBOOKD_AUTH__TOKEN_TTL_MINUTES=60` sets `auth.token_ttl_minutes`)

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::auth::password::HashCost;
use crate::identity::IdentityScheme;

const ENV_PREFIX: &str = "GRADEBOOKD_";
const CONFIG_PATH_VAR: &str = "GRADEBOOKD_CONFIG";
const LOCAL_CONFIG_FILE: &str = "gradebookd.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Figment(#[from] figment::Error),

    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// One year.
const MAX_TOKEN_TTL_MINUTES: i64 = 366 * 24 * 60;

const fn default_token_ttl_minutes() -> i64 {
    30
}

const fn default_hash_memory_kib() -> u32 {
    19 * 1024
}

const fn default_hash_iterations() -> u32 {
    2
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,

    #[serde(default)]
    pub identity_scheme: IdentityScheme,

    /// Argon2 memory cost for newly hashed passwords.
    #[serde(default = "default_hash_memory_kib")]
    pub hash_memory_kib: u32,

    #[serde(default = "default_hash_iterations")]
    pub hash_iterations: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_minutes: default_token_ttl_minutes(),
            identity_scheme: IdentityScheme::default(),
            hash_memory_kib: default_hash_memory_kib(),
            hash_iterations: default_hash_iterations(),
        }
    }
}

impl AuthConfig {
    pub fn hash_cost(&self) -> HashCost {
        HashCost {
            memory_kib: self.hash_memory_kib,
            iterations: self.hash_iterations,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Workspace opened at startup; otherwise the client sends `workspace.select`.
    #[serde(default)]
    pub workspace: Option<PathBuf>,

    #[serde(default)]
    pub auth: AuthConfig,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let config: Config = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        match std::env::var_os(CONFIG_PATH_VAR) {
            Some(path) => figment = figment.merge(Toml::file(PathBuf::from(path))),
            None => {
                let local = PathBuf::from(LOCAL_CONFIG_FILE);
                if local.exists() {
                    figment = figment.merge(Toml::file(local));
                }
            }
        }

        figment.merge(
            Env::prefixed(ENV_PREFIX)
                .ignore(&["CONFIG", "LOG"])
                .split("__"),
        )
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.token_ttl_minutes <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "auth.token_ttl_minutes".into(),
                reason: "must be positive".into(),
            });
        }
        if self.auth.token_ttl_minutes > MAX_TOKEN_TTL_MINUTES {
            return Err(ConfigError::InvalidValue {
                field: "auth.token_ttl_minutes".into(),
                reason: format!("must be at most {MAX_TOKEN_TTL_MINUTES}"),
            });
        }
        if self.auth.hash_memory_kib < 8 {
            return Err(ConfigError::InvalidValue {
                field: "auth.hash_memory_kib".into(),
                reason: "must be at least 8".into(),
            });
        }
        if self.auth.hash_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                field: "auth.hash_iterations".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_are_correct() {
        let config = Config::default();
        assert!(config.workspace.is_none());
        assert_eq!(config.auth.token_ttl_minutes, 30);
        assert_eq!(config.auth.identity_scheme, IdentityScheme::FullName);
        assert_eq!(config.auth.hash_memory_kib, 19 * 1024);
        assert_eq!(config.auth.hash_iterations, 2);
    }

    #[test]
    fn env_overrides_nested_values() {
        Jail::expect_with(|jail| {
            jail.set_env("GRADEBOOKD_AUTH__TOKEN_TTL_MINUTES", "90");
            jail.set_env("GRADEBOOKD_AUTH__IDENTITY_SCHEME", "username");
            jail.set_env("GRADEBOOKD_WORKSPACE", "/tmp/gb");
            let config = Config::load().expect("config loads");
            assert_eq!(config.auth.token_ttl_minutes, 90);
            assert_eq!(config.auth.identity_scheme, IdentityScheme::Username);
            assert_eq!(config.workspace, Some(PathBuf::from("/tmp/gb")));
            Ok(())
        });
    }

    #[test]
    fn local_toml_is_read_and_env_wins() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "gradebookd.toml",
                r#"
                [auth]
                token_ttl_minutes = 15
                hash_iterations = 3
                "#,
            )?;
            jail.set_env("GRADEBOOKD_AUTH__HASH_ITERATIONS", "1");
            let config = Config::load().expect("config loads");
            assert_eq!(config.auth.token_ttl_minutes, 15);
            assert_eq!(config.auth.hash_iterations, 1);
            Ok(())
        });
    }

    #[test]
    fn explicit_config_path_is_used() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "workspace = \"/srv/grades\"")?;
            jail.set_env("GRADEBOOKD_CONFIG", "custom.toml");
            let config = Config::load().expect("config loads");
            assert_eq!(config.workspace, Some(PathBuf::from("/srv/grades")));
            Ok(())
        });
    }

    #[test]
    fn invalid_values_are_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("GRADEBOOKD_AUTH__TOKEN_TTL_MINUTES", "0");
            let err = Config::load().expect_err("ttl 0");
            assert!(err.to_string().contains("auth.token_ttl_minutes"));
            Ok(())
        });
    }

    #[test]
    fn oversized_token_ttl_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("GRADEBOOKD_AUTH__TOKEN_TTL_MINUTES", "1000000000000");
            let err = Config::load().expect_err("ttl too large");
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref field, .. } if field == "auth.token_ttl_minutes"
            ));

            jail.set_env("GRADEBOOKD_AUTH__TOKEN_TTL_MINUTES", MAX_TOKEN_TTL_MINUTES.to_string());
            let config = Config::load().expect("one year is allowed");
            assert_eq!(config.auth.token_ttl_minutes, MAX_TOKEN_TTL_MINUTES);
            Ok(())
        });
    }
}
