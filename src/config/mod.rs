//! Configuration Management
//!
//! Unified configuration system with hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/stockpulse/config.toml)
//! 3. Project config (.stockpulse/config.toml)
//! 4. Environment variables (STOCKPULSE_*)

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::*;
