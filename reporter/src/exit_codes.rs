//! Stable exit codes for reporter CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Missing credential, failed agent run, invalid report, or any other error.
pub const FAILURE: i32 = 1;
