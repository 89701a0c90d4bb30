//! CNCRelay Settings Crate
//!
//! Loads, validates, and saves the engine configuration.

pub mod config;
pub mod error;

pub use config::{Config, ConnectionSettings};
pub use error::{SettingsError, SettingsResult};
