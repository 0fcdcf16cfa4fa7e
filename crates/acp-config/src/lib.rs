#![forbid(unsafe_code)]
//! On-disk configuration for the agents this crate knows how to launch,
//! plus a compile-time catalog of well-known agents with `PATH`
//! auto-detection.

mod catalog;
mod config;
mod error;

pub use catalog::{detect_installed_agents, well_known_agents, DetectedAgent, WellKnownAgent};
pub use config::{config_path, load, save, AgentConfig, Config, McpServerConfig, Settings};
pub use error::ConfigError;
