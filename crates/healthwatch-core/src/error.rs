//! Error taxonomy shared across every crate in the workspace.
//!
//! Mirrors §7 of the design: each variant is a terminal failure kind, and
//! callers decide per-variant whether it is fatal to the whole run (only
//! `Config` and, for a single stage, `Auth`) or recorded and absorbed
//! (`Remote`, `Data`, `Budget`).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HealthWatchError>;

#[derive(Debug, Error)]
pub enum HealthWatchError {
    /// Missing required environment input. Fatal at orchestrator startup.
    #[error("config error: {0}")]
    Config(String),

    /// Credential row missing or refresh failed. Fatal only to the specific stage.
    #[error("auth error: {0}")]
    Auth(String),

    /// Non-2xx or network error from an external API. Non-fatal at stage level.
    #[error("remote error: {0}")]
    Remote(String),

    /// Malformed external payload. Non-fatal; treated as an empty result upstream.
    #[error("data error: {0}")]
    Data(String),

    /// Time or tool-call budget exhausted during the agent loop.
    #[error("budget exceeded: {0}")]
    Budget(String),

    /// Attempt to review a decision queue item that is not pending.
    #[error("review conflict: item {0} is not pending")]
    ReviewConflict(String),
}

impl From<reqwest::Error> for HealthWatchError {
    fn from(err: reqwest::Error) -> Self {
        HealthWatchError::Remote(err.to_string())
    }
}

impl From<serde_json::Error> for HealthWatchError {
    fn from(err: serde_json::Error) -> Self {
        HealthWatchError::Data(err.to_string())
    }
}

impl From<config::ConfigError> for HealthWatchError {
    fn from(err: config::ConfigError) -> Self {
        HealthWatchError::Config(err.to_string())
    }
}

impl HealthWatchError {
    /// True when this error should only ever be recorded as a per-step string,
    /// never propagated to abort an orchestrator run (§7 propagation policy).
    pub fn is_stage_local(&self) -> bool {
        !matches!(self, HealthWatchError::Config(_))
    }
}
