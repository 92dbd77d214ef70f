//! Configuration loaded from environment variables.
//!
//! Required settings fail startup with a `ConfigError`. Optional settings
//! fall back to documented defaults, and a missing mailbox token disables
//! the ingestion worker instead of failing.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default reasoning model when `OPENAI_MODEL` is unset.
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default OpenAI-compatible endpoint base.
const DEFAULT_ENGINE_BASE_URL: &str = "https://api.openai.com/v1";

/// Default Shopify admin API version.
const DEFAULT_SHOPIFY_API_VERSION: &str = "2025-10";

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shopify store host, e.g. `my-store.myshopify.com`.
    pub shopify_url: String,
    /// Shopify admin API access token.
    pub shopify_token: SecretString,
    /// Shopify admin API version segment.
    pub shopify_api_version: String,

    /// Reasoning engine API key.
    pub engine_api_key: SecretString,
    /// Reasoning engine model name.
    pub engine_model: String,
    /// Reasoning engine base URL (OpenAI-compatible).
    pub engine_base_url: String,

    /// Shared secret for the interactive chat surface.
    pub agent_secret: SecretString,

    /// Mailbox bearer token. `None` disables the ingestion worker.
    pub mailbox_token: Option<SecretString>,
    /// Interval between ingestion cycles.
    pub email_check_interval: Duration,

    /// Store context cache TTL.
    pub store_context_ttl: Duration,

    /// HTTP listen port.
    pub port: u16,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Errors only on the strictly required settings; everything else
    /// degrades to defaults or a disabled subsystem.
    pub fn from_env() -> Result<Self, ConfigError> {
        let shopify_url = required("SHOPIFY_URL")?;
        let shopify_token = SecretString::from(required("SHOPIFY_TOKEN")?);
        let engine_api_key = SecretString::from(required("OPENAI_API_KEY")?);
        let agent_secret = SecretString::from(required("AGENT_SECRET")?);

        let mailbox_token = std::env::var("GMAIL_ACCESS_TOKEN")
            .ok()
            .filter(|v| !v.is_empty())
            .map(SecretString::from);

        let email_check_interval =
            Duration::from_secs(parsed_or("EMAIL_CHECK_INTERVAL", 60)?);
        let store_context_ttl =
            Duration::from_secs(parsed_or("STORE_CONTEXT_TTL_SECS", 60)?);
        let port = parsed_or("PORT", 8000_u64)? as u16;

        Ok(Self {
            shopify_url,
            shopify_token,
            shopify_api_version: var_or("SHOPIFY_API_VERSION", DEFAULT_SHOPIFY_API_VERSION),
            engine_api_key,
            engine_model: var_or("OPENAI_MODEL", DEFAULT_MODEL),
            engine_base_url: var_or("OPENAI_BASE_URL", DEFAULT_ENGINE_BASE_URL),
            agent_secret,
            mailbox_token,
            email_check_interval,
            store_context_ttl,
            port,
        })
    }

    /// Whether the mailbox ingestion worker is configured to run.
    pub fn mailbox_enabled(&self) -> bool {
        self.mailbox_token.is_some()
    }
}

fn required(key: &str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::MissingEnvVar(key.to_string())),
    }
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parsed_or(key: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected an integer, got {v:?}"),
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_or_uses_default_when_unset() {
        assert_eq!(parsed_or("SUPPORT_DESK_TEST_UNSET_VAR", 42).unwrap(), 42);
    }

    #[test]
    fn parsed_or_rejects_garbage() {
        // Env mutation is process-global; use a name no other test touches.
        unsafe { std::env::set_var("SUPPORT_DESK_TEST_BAD_INT", "soon") };
        let err = parsed_or("SUPPORT_DESK_TEST_BAD_INT", 1).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        unsafe { std::env::remove_var("SUPPORT_DESK_TEST_BAD_INT") };
    }

    #[test]
    fn required_rejects_empty() {
        unsafe { std::env::set_var("SUPPORT_DESK_TEST_EMPTY", "") };
        assert!(required("SUPPORT_DESK_TEST_EMPTY").is_err());
        unsafe { std::env::remove_var("SUPPORT_DESK_TEST_EMPTY") };
    }
}
