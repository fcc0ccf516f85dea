//! Environment access and the credential guard.
//!
//! Commands read the environment through [`Env`] so tests can supply values
//! without touching the process environment.

use anyhow::{Result, bail};

/// Token that authorizes the agent CLI.
pub const CREDENTIAL_VAR: &str = "CLAUDE_CODE_OAUTH_TOKEN";
/// Optional model override.
pub const MODEL_VAR: &str = "CLAUDE_MODEL";
/// When set, `system` events are dumped in full.
pub const DEBUG_VAR: &str = "DEBUG";

pub trait Env {
    /// Value of `key`, or `None` when unset or not valid UTF-8.
    fn var(&self, key: &str) -> Option<String>;

    /// Value of `key` when set to a non-empty string.
    fn non_empty(&self, key: &str) -> Option<String> {
        self.var(key).filter(|value| !value.is_empty())
    }

    fn is_set(&self, key: &str) -> bool {
        self.non_empty(key).is_some()
    }
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Env for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Fail unless the agent credential is present.
///
/// An empty value counts as missing.
pub fn require_credential(env: &dyn Env) -> Result<()> {
    if env.non_empty(CREDENTIAL_VAR).is_none() {
        bail!(
            "{CREDENTIAL_VAR} environment variable is required\nRun \"claude setup-token\" to generate one"
        );
    }
    Ok(())
}
