//! Configuration management for the agent: the TOML file and its defaults.

mod loader;
mod types;

pub use loader::*;
pub use types::*;
