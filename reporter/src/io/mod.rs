//! I/O helpers for reporter commands.

pub mod agent;
pub mod config;
pub mod env;
pub mod process;
pub mod prompt;
pub mod report_store;
