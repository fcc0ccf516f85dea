//! Weekly security report generator.
//!
//! Drives an external agent (the `claude` CLI in `stream-json` mode) that
//! researches the week's security news and writes a structured report, then
//! checks, lists and publishes those reports. The architecture enforces a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (event parsing, run state,
//!   console formatting, report rules). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (environment, config, agent
//!   process, report files). Isolated to enable scripted fakes in tests.
//!
//! Orchestration modules ([`run`], [`validate`], [`feed`]) coordinate core
//! logic with I/O to implement CLI commands.

pub mod core;
pub mod exit_codes;
pub mod feed;
pub mod io;
pub mod logging;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
