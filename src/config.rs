//! Gateway configuration, loaded from JSON. Every field has a default, so an
//! empty object `{}` is a valid configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;

use crate::bus::memory::MAX_PIPE_DEPTH;
use crate::subscriptions::{Subscription, SubscriptionTable, TableError, MAX_SUBSCRIPTIONS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{field} must be between 1 and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: usize,
        max: usize,
    },
    #[error("unknown log level {0:?}")]
    LogLevel(String),
    #[error(transparent)]
    Table(#[from] TableError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Sleep between cycles.
    pub task_msec: u64,
    pub cmd_pipe_depth: usize,
    pub tlm_pipe_depth: usize,
    /// Records forwarded per cycle at most.
    pub max_tlm_pkts: usize,
    /// Per-record wait on the telemetry pipe; 0 polls.
    pub tlm_pipe_timeout_ms: u64,
    pub log_level: String,
    /// Replaces the built-in subscription table when present.
    pub subscriptions: Option<Vec<Subscription>>,
    pub ingest_addr: String,
    pub text_addr: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            task_msec: 500,
            cmd_pipe_depth: 32,
            tlm_pipe_depth: 64,
            max_tlm_pkts: 100,
            tlm_pipe_timeout_ms: 10,
            log_level: "info".to_string(),
            subscriptions: None,
            ingest_addr: "127.0.0.1:1234".to_string(),
            text_addr: "127.0.0.1:2234".to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("cmd_pipe_depth", self.cmd_pipe_depth, MAX_PIPE_DEPTH)?;
        check_range("tlm_pipe_depth", self.tlm_pipe_depth, MAX_PIPE_DEPTH)?;
        check_range("max_tlm_pkts", self.max_tlm_pkts, usize::MAX)?;
        if let Some(subs) = &self.subscriptions {
            if subs.len() > MAX_SUBSCRIPTIONS {
                return Err(TableError::TooManyEntries {
                    max: MAX_SUBSCRIPTIONS,
                    got: subs.len(),
                }
                .into());
            }
        }
        self.level()?;
        Ok(())
    }

    pub fn level(&self) -> Result<Level, ConfigError> {
        self.log_level
            .parse::<Level>()
            .map_err(|_| ConfigError::LogLevel(self.log_level.clone()))
    }

    /// Configured subscriptions, or the built-in table.
    pub fn subscription_table(&self) -> Result<SubscriptionTable, ConfigError> {
        match &self.subscriptions {
            Some(subs) => Ok(SubscriptionTable::from_entries(subs.iter().copied())?),
            None => Ok(SubscriptionTable::default()),
        }
    }
}

fn check_range(field: &'static str, value: usize, max: usize) -> Result<(), ConfigError> {
    if value == 0 || value > max {
        return Err(ConfigError::OutOfRange { field, value, max });
    }
    Ok(())
}
