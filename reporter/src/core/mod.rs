//! Deterministic, pure logic shared by the reporter commands.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! values (stream events, parsed report JSON) and return deterministic
//! outputs suitable for tests.

pub mod feed;
pub mod message;
pub mod render;
pub mod report;
pub mod report_rules;
pub mod run_state;
