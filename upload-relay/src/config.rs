//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `UPLOAD_RELAY_CONFIG`
//! environment variable. A missing file is not an error: every field has a default.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `UPLOAD_RELAY_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `UPLOAD_RELAY_CRM__REQUEST_TIMEOUT=10s` sets the `crm.request_timeout` field.
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port
//! UPLOAD_RELAY_PORT=8080
//!
//! # Raise the inbound body limit to 100 MiB
//! UPLOAD_RELAY_LIMITS__MAX_BODY_SIZE=104857600
//!
//! # Lock CORS down to a single origin
//! UPLOAD_RELAY_CORS__ALLOW_ORIGIN=https://app.example.com
//! ```

use anyhow::{anyhow, bail};
use axum::http::HeaderValue;
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "UPLOAD_RELAY_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// All fields have defaults, so an empty file (or no file at all) yields a working relay that
/// matches the hosted deployment: 50 MiB bodies, `crm.deal.update`, and permissive CORS.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Inbound request limits
    pub limits: LimitsConfig,
    /// Outbound CRM call settings
    pub crm: CrmConfig,
    /// Headers attached to every response
    pub cors: CorsConfig,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
    /// `service.name` attached to exported spans, unless `OTEL_SERVICE_NAME` is set
    pub otel_service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum accepted request body, in bytes. Larger bodies are rejected with 413 before the
    /// upload handler runs.
    pub max_body_size: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrmConfig {
    /// REST method appended to the caller-supplied webhook URL
    pub update_method: String,
    /// Timeout for the single outbound update call
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            update_method: "crm.deal.update".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// CORS headers.
///
/// These are written verbatim onto every response rather than negotiated per request, so a
/// wildcard origin may be combined with credentials.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Value of `Access-Control-Allow-Origin`
    pub allow_origin: String,
    /// Emit `Access-Control-Allow-Credentials: true`
    pub allow_credentials: bool,
    /// Joined into `Access-Control-Allow-Methods`
    pub allow_methods: Vec<String>,
    /// Joined into `Access-Control-Allow-Headers`
    pub allow_headers: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_credentials: true,
            allow_methods: ["GET", "OPTIONS", "PATCH", "DELETE", "POST", "PUT"]
                .into_iter()
                .map(String::from)
                .collect(),
            allow_headers: [
                "X-CSRF-Token",
                "X-Requested-With",
                "Accept",
                "Accept-Version",
                "Content-Length",
                "Content-MD5",
                "Content-Type",
                "Date",
                "X-Api-Version",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            limits: LimitsConfig::default(),
            crm: CrmConfig::default(),
            cors: CorsConfig::default(),
            enable_otel_export: false,
            otel_service_name: "upload-relay".to_string(),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.host.trim().is_empty() {
            bail!("Config validation: host must not be empty");
        }

        if self.limits.max_body_size == 0 {
            bail!("Config validation: limits.max_body_size must be greater than zero");
        }
        usize::try_from(self.limits.max_body_size)
            .map_err(|_| anyhow!("Config validation: limits.max_body_size ({}) does not fit in memory", self.limits.max_body_size))?;

        if self.crm.update_method.trim().is_empty() {
            bail!("Config validation: crm.update_method must not be empty");
        }

        if self.crm.request_timeout.is_zero() {
            bail!("Config validation: crm.request_timeout must be greater than zero");
        }

        for (name, value) in [
            ("cors.allow_origin", self.cors.allow_origin.clone()),
            ("cors.allow_methods", self.cors.allow_methods.join(",")),
            ("cors.allow_headers", self.cors.allow_headers.join(", ")),
        ] {
            HeaderValue::from_str(&value).map_err(|e| anyhow!("Config validation: {name} is not a valid header value: {e}"))?;
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables override specific values. UPLOAD_RELAY_CONFIG is the file path
            // itself, not a config field.
            .merge(Env::prefixed("UPLOAD_RELAY_").ignore(&["config"]).split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
