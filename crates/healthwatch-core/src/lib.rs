//! Shared types for the site health watch pipeline: entities, config, the
//! error taxonomy, the persistence facade, and the signal bus. Every other
//! crate in the workspace depends on this one and nothing here depends on
//! them.

pub mod config;
pub mod entities;
pub mod error;
pub mod signal_bus;
pub mod store;

pub use config::Config;
pub use error::{HealthWatchError, Result};
pub use signal_bus::SignalBus;
pub use store::Store;
