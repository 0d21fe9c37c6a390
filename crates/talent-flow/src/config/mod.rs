use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use chrono::NaiveTime;

use crate::workflows::recruitment::scheduling::SlotTemplate;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub workflow: WorkflowConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            workflow: WorkflowConfig::load()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Run-level knobs for the recruitment workflow. Every value can be set via
/// environment; defaults keep a development instance usable out of the box.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Match score at or above which a candidate is proposed as selected.
    pub selection_threshold: u8,
    /// Upper bound on concurrent collaborator calls per run.
    pub concurrency: usize,
    /// Budget applied to every external collaborator call.
    pub collaborator_timeout_secs: u64,
    /// Finalize the review immediately after scoring. Opt-in only.
    pub auto_finalize: bool,
    /// Also notify rejected candidates after finalize.
    pub notify_rejected: bool,
    /// Schedule all selected candidates regardless of notification outcome.
    pub decouple_scheduling: bool,
    pub slot_template: SlotTemplate,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            selection_threshold: 60,
            concurrency: 5,
            collaborator_timeout_secs: 30,
            auto_finalize: false,
            notify_rejected: false,
            decouple_scheduling: false,
            slot_template: SlotTemplate::default(),
        }
    }
}

impl WorkflowConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let selection_threshold = match env::var("WORKFLOW_SELECTION_THRESHOLD") {
            Ok(raw) => {
                let value = raw
                    .parse::<u8>()
                    .map_err(|_| ConfigError::InvalidThreshold)?;
                if value > 100 {
                    return Err(ConfigError::InvalidThreshold);
                }
                value
            }
            Err(_) => defaults.selection_threshold,
        };

        let concurrency = match env::var("WORKFLOW_CONCURRENCY") {
            Ok(raw) => {
                let value = raw
                    .parse::<usize>()
                    .map_err(|_| ConfigError::InvalidConcurrency)?;
                if value == 0 {
                    return Err(ConfigError::InvalidConcurrency);
                }
                value
            }
            Err(_) => defaults.concurrency,
        };

        let collaborator_timeout_secs = match env::var("WORKFLOW_TIMEOUT_SECS") {
            Ok(raw) => {
                let value = raw.parse::<u64>().map_err(|_| ConfigError::InvalidTimeout)?;
                if value == 0 {
                    return Err(ConfigError::InvalidTimeout);
                }
                value
            }
            Err(_) => defaults.collaborator_timeout_secs,
        };

        let auto_finalize = parse_flag("WORKFLOW_AUTO_FINALIZE", defaults.auto_finalize)?;
        let notify_rejected = parse_flag("WORKFLOW_NOTIFY_REJECTED", defaults.notify_rejected)?;
        let decouple_scheduling =
            parse_flag("WORKFLOW_DECOUPLE_SCHEDULING", defaults.decouple_scheduling)?;

        let mut slot_template = defaults.slot_template;
        if let Ok(raw) = env::var("WORKFLOW_SLOT_TIMES") {
            slot_template.start_times = parse_slot_times(&raw)?;
        }
        if let Ok(raw) = env::var("WORKFLOW_SLOT_DURATION_MINUTES") {
            let value = raw
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidSlotDuration)?;
            if value == 0 {
                return Err(ConfigError::InvalidSlotDuration);
            }
            slot_template.duration_minutes = value;
        }
        slot_template.weekdays_only =
            parse_flag("WORKFLOW_WEEKDAYS_ONLY", slot_template.weekdays_only)?;

        Ok(Self {
            selection_threshold,
            concurrency,
            collaborator_timeout_secs,
            auto_finalize,
            notify_rejected,
            decouple_scheduling,
            slot_template,
        })
    }
}

fn parse_flag(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { name }),
        },
        Err(_) => Ok(default),
    }
}

fn parse_slot_times(raw: &str) -> Result<Vec<NaiveTime>, ConfigError> {
    let times = raw
        .split(',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(|piece| {
            NaiveTime::parse_from_str(piece, "%H:%M").map_err(|_| ConfigError::InvalidSlotTimes {
                value: raw.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if times.is_empty() {
        return Err(ConfigError::InvalidSlotTimes {
            value: raw.to_string(),
        });
    }

    Ok(times)
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidThreshold,
    InvalidConcurrency,
    InvalidTimeout,
    InvalidSlotDuration,
    InvalidSlotTimes { value: String },
    InvalidFlag { name: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidThreshold => {
                write!(f, "WORKFLOW_SELECTION_THRESHOLD must be an integer in 0..=100")
            }
            ConfigError::InvalidConcurrency => {
                write!(f, "WORKFLOW_CONCURRENCY must be a positive integer")
            }
            ConfigError::InvalidTimeout => {
                write!(f, "WORKFLOW_TIMEOUT_SECS must be a positive integer")
            }
            ConfigError::InvalidSlotDuration => {
                write!(f, "WORKFLOW_SLOT_DURATION_MINUTES must be a positive integer")
            }
            ConfigError::InvalidSlotTimes { value } => {
                write!(
                    f,
                    "WORKFLOW_SLOT_TIMES '{}' must be a comma separated list of HH:MM times",
                    value
                )
            }
            ConfigError::InvalidFlag { name } => {
                write!(f, "{} must be a boolean flag (true/false)", name)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
