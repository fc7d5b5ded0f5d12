//! Configuration for the haven daemon.

use haven_ledger::RetryPolicy;
use haven_scheduler::EscalationConfig;
use haven_types::Principal;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::service::ServiceOptions;

/// Main daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HavenConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub scheduler: EscalationConfig,

    #[serde(default)]
    pub guard: GuardConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for HavenConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            scheduler: EscalationConfig::default(),
            guard: GuardConfig::default(),
            identity: IdentityConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,

    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_cors: true,
        }
    }
}

/// Authorization policy knobs.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Self-heal a missing `User` grant on a principal's first case
    /// creation. The active default policy is off: creation requires an
    /// explicit prior grant.
    #[serde(default)]
    pub auto_grant_user: bool,
}

/// The daemon's own signing identity and view tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Principal the daemon signs automated actions with.
    #[serde(default = "default_service_identity")]
    pub service_identity: Principal,

    /// Advisory warning mark for case views, in minutes.
    #[serde(default = "default_warning_minutes")]
    pub warning_minutes: i64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            service_identity: default_service_identity(),
            warning_minutes: default_warning_minutes(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_listen_addr() -> SocketAddr {
    "127.0.0.1:5000".parse().expect("static default address")
}

fn default_service_identity() -> Principal {
    Principal::from_bytes([0x11; 20])
}

fn default_warning_minutes() -> i64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl HavenConfig {
    /// Load configuration: defaults, then an optional file, then `HAVEN_`
    /// environment variables.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&HavenConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("HAVEN")
                .separator("_")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// The facade options this configuration implies.
    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            service_identity: self.identity.service_identity,
            auto_grant_user: self.guard.auto_grant_user,
            warning_after_minutes: self.identity.warning_minutes,
            retry: RetryPolicy::default(),
        }
    }
}
