// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values, and the
//! [`Config`] snapshot loaded once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `NITRO_ENV` | Deployment environment (`development` or `production`) | `development` |
//! | `NITRO_DATA_DIR` | Directory for the redb database | `./data` |
//! | `NITRO_TOKEN_SECRET` | HMAC secret for auth tokens | Required for production |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8443` |
//! | `TLS_CERT_PATH` | PEM certificate chain (enables TLS with the key) | Unset |
//! | `TLS_KEY_PATH` | PEM private key (enables TLS with the cert) | Unset |
//! | `CORS_ALLOWED_ORIGINS` | Comma-separated origin allow-list | Unset |
//! | `AUTHORIZE_RATE_LIMIT` | Authorize requests per identity per window | `30` |
//! | `AUTHORIZE_RATE_WINDOW_SECS` | Authorize window length | `60` |
//! | `VALIDATE_RATE_LIMIT` | Validation requests per identity per window | `120` |
//! | `VALIDATE_RATE_WINDOW_SECS` | Validation window length | `60` |
//! | `SETUP_RATE_LIMIT` | Bootstrap attempts per client per window | `1` |
//! | `SETUP_RATE_WINDOW_SECS` | Bootstrap window length | `86400` |
//! | `PRINCIPAL_TIMEOUT_MS` | Principal store read timeout | `3000` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::ratelimit::ClassLimits;

/// Environment variable selecting the deployment environment.
///
/// Anything other than `production` is treated as development. Production
/// refuses to start without an explicit token secret.
pub const ENVIRONMENT_ENV: &str = "NITRO_ENV";

/// Environment variable for the data directory path.
///
/// The broker keeps a single redb database file (`broker.redb`) under this
/// directory. It is created on first start if missing.
pub const DATA_DIR_ENV: &str = "NITRO_DATA_DIR";

/// Environment variable for the token-signing secret.
pub const TOKEN_SECRET_ENV: &str = "NITRO_TOKEN_SECRET";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const CORS_ALLOWED_ORIGINS_ENV: &str = "CORS_ALLOWED_ORIGINS";
pub const AUTHORIZE_RATE_LIMIT_ENV: &str = "AUTHORIZE_RATE_LIMIT";
pub const AUTHORIZE_RATE_WINDOW_ENV: &str = "AUTHORIZE_RATE_WINDOW_SECS";
pub const VALIDATE_RATE_LIMIT_ENV: &str = "VALIDATE_RATE_LIMIT";
pub const VALIDATE_RATE_WINDOW_ENV: &str = "VALIDATE_RATE_WINDOW_SECS";
pub const SETUP_RATE_LIMIT_ENV: &str = "SETUP_RATE_LIMIT";
pub const SETUP_RATE_WINDOW_ENV: &str = "SETUP_RATE_WINDOW_SECS";
pub const PRINCIPAL_TIMEOUT_ENV: &str = "PRINCIPAL_TIMEOUT_MS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Built-in secret used when `NITRO_TOKEN_SECRET` is absent in development.
/// Production startup rejects this path outright.
const DEV_TOKEN_SECRET: &str = "nitroauth-development-secret-not-for-production";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required when NITRO_ENV=production")]
    MissingSecret(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("TLS_CERT_PATH and TLS_KEY_PATH must be set together")]
    PartialTls,
}

/// Immutable configuration snapshot, parsed from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub env: Environment,
    pub data_dir: PathBuf,
    pub token_secret: String,
    pub host: String,
    pub port: u16,
    pub tls_cert_path: Option<PathBuf>,
    pub tls_key_path: Option<PathBuf>,
    pub cors_allowed_origins: Vec<String>,
    pub authorize_limits: ClassLimits,
    pub validate_limits: ClassLimits,
    pub setup_limits: ClassLimits,
    pub principal_timeout: Duration,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_mode = parse_environment(&env_string(ENVIRONMENT_ENV, "development"));

        let token_secret = match env::var(TOKEN_SECRET_ENV) {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if env_mode.is_production() => {
                return Err(ConfigError::MissingSecret(TOKEN_SECRET_ENV));
            }
            _ => DEV_TOKEN_SECRET.to_string(),
        };

        let tls_cert_path = env::var(TLS_CERT_PATH_ENV).ok().map(PathBuf::from);
        let tls_key_path = env::var(TLS_KEY_PATH_ENV).ok().map(PathBuf::from);
        if tls_cert_path.is_some() != tls_key_path.is_some() {
            return Err(ConfigError::PartialTls);
        }

        Ok(Self {
            env: env_mode,
            data_dir: PathBuf::from(env_string(DATA_DIR_ENV, "./data")),
            token_secret,
            host: env_string(HOST_ENV, "0.0.0.0"),
            port: env_parse(PORT_ENV, 8443)?,
            tls_cert_path,
            tls_key_path,
            cors_allowed_origins: split_origins(&env_string(CORS_ALLOWED_ORIGINS_ENV, "")),
            authorize_limits: ClassLimits::new(
                env_parse(AUTHORIZE_RATE_LIMIT_ENV, 30)?,
                Duration::from_secs(env_parse(AUTHORIZE_RATE_WINDOW_ENV, 60)?),
            ),
            validate_limits: ClassLimits::new(
                env_parse(VALIDATE_RATE_LIMIT_ENV, 120)?,
                Duration::from_secs(env_parse(VALIDATE_RATE_WINDOW_ENV, 60)?),
            ),
            setup_limits: ClassLimits::new(
                env_parse(SETUP_RATE_LIMIT_ENV, 1)?,
                Duration::from_secs(env_parse(SETUP_RATE_WINDOW_ENV, 86_400)?),
            ),
            principal_timeout: Duration::from_millis(env_parse(PRINCIPAL_TIMEOUT_ENV, 3_000)?),
            log_format: parse_log_format(&env_string(LOG_FORMAT_ENV, "pretty")),
        })
    }

    /// True when the broker fell back to the built-in development secret.
    /// `main` logs a warning for this after the subscriber is installed.
    pub fn uses_dev_secret(&self) -> bool {
        self.token_secret == DEV_TOKEN_SECRET
    }

    /// Certificate and key paths, present only when TLS is fully configured.
    pub fn tls_paths(&self) -> Option<(&Path, &Path)> {
        match (&self.tls_cert_path, &self.tls_key_path) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn for_tests(data_dir: &Path) -> Self {
        Self {
            env: Environment::Development,
            data_dir: data_dir.to_path_buf(),
            token_secret: "test-secret".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            tls_cert_path: None,
            tls_key_path: None,
            cors_allowed_origins: Vec::new(),
            authorize_limits: ClassLimits::new(30, Duration::from_secs(60)),
            validate_limits: ClassLimits::new(120, Duration::from_secs(60)),
            setup_limits: ClassLimits::new(1, Duration::from_secs(86_400)),
            principal_timeout: Duration::from_millis(3_000),
            log_format: LogFormat::Pretty,
        }
    }
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

fn parse_environment(raw: &str) -> Environment {
    if raw.trim().eq_ignore_ascii_case("production") {
        Environment::Production
    } else {
        Environment::Development
    }
}

fn parse_log_format(raw: &str) -> LogFormat {
    if raw.trim().eq_ignore_ascii_case("json") {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
