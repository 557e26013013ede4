//! Configuration and settings management
//!
//! Loads router settings from optional config files and environment variables
//! and defines the default constants.

use chrono::NaiveDate;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Router and catalog settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Default time budget for one handler invocation, in milliseconds
    #[serde(default = "default_handler_timeout_ms")]
    pub handler_timeout_ms: u64,

    /// Time budget for the routing policy decision, in milliseconds
    #[serde(default = "default_policy_timeout_ms")]
    pub policy_timeout_ms: u64,

    /// Per-handler timeout overrides (handler name -> milliseconds)
    #[serde(default)]
    pub handler_timeouts: HashMap<String, u64>,

    /// Apology text presented whenever a request falls back
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,

    /// Optional constant phrase placed before relayed text answers
    pub text_frame: Option<String>,

    /// Whether structured answers start with the schema title
    #[serde(default)]
    pub structured_heading: bool,

    /// API key for the OpenAI-compatible inference endpoint
    pub llm_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible inference endpoint
    #[serde(default = "default_llm_api_base")]
    pub llm_api_base: String,
    /// Model used by the LLM routing policy
    #[serde(default = "default_router_model")]
    pub router_model: String,
    /// Model used by LLM-backed sub-agents
    #[serde(default = "default_sub_agent_model")]
    pub sub_agent_model: String,
    /// Output token limit for every LLM call
    #[serde(default = "default_llm_max_tokens")]
    pub llm_max_tokens: u32,

    /// Reference date (YYYY-MM-DD) for the refund policy
    pub support_today: Option<String>,
}

const fn default_handler_timeout_ms() -> u64 {
    DEFAULT_HANDLER_TIMEOUT_MS
}

const fn default_policy_timeout_ms() -> u64 {
    DEFAULT_POLICY_TIMEOUT_MS
}

fn default_fallback_message() -> String {
    DEFAULT_FALLBACK_MESSAGE.to_string()
}

fn default_llm_api_base() -> String {
    DEFAULT_LLM_API_BASE.to_string()
}

fn default_router_model() -> String {
    DEFAULT_ROUTER_MODEL.to_string()
}

fn default_sub_agent_model() -> String {
    DEFAULT_SUB_AGENT_MODEL.to_string()
}

const fn default_llm_max_tokens() -> u32 {
    DEFAULT_LLM_MAX_TOKENS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            handler_timeout_ms: default_handler_timeout_ms(),
            policy_timeout_ms: default_policy_timeout_ms(),
            handler_timeouts: HashMap::new(),
            fallback_message: default_fallback_message(),
            text_frame: None,
            structured_heading: false,
            llm_api_key: None,
            llm_api_base: default_llm_api_base(),
            router_model: default_router_model(),
            sub_agent_model: default_sub_agent_model(),
            llm_max_tokens: default_llm_max_tokens(),
            support_today: None,
        }
    }
}

impl Settings {
    /// Create new settings by loading from config files and environment
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use support_router::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or a value is out of range.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Not checked into git
            .add_source(File::with_name("config/local").required(false))
            // Eg. `ROUTER__HANDLER_TIMEOUT_MS=5000` or `ROUTER__HANDLER_TIMEOUTS__TECH_SUPPORT=2000`
            .add_source(
                Environment::with_prefix("ROUTER")
                    .separator("__")
                    .try_parsing(true)
                    .ignore_empty(true),
            )
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        // Fallback to the conventional variable name used by OpenAI-compatible tooling
        if settings.llm_api_key.is_none() {
            if let Ok(val) = std::env::var("OPENAI_API_KEY") {
                if !val.is_empty() {
                    settings.llm_api_key = Some(val);
                }
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` describing the first invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.handler_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "handler_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.policy_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "policy_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if let Some((name, _)) = self.handler_timeouts.iter().find(|(_, ms)| **ms == 0) {
            return Err(ConfigError::Message(format!(
                "handler_timeouts.{name} must be greater than zero"
            )));
        }
        if self.fallback_message.trim().is_empty() {
            return Err(ConfigError::Message(
                "fallback_message must not be empty".to_string(),
            ));
        }
        self.support_today()?;
        Ok(())
    }

    /// Default handler timeout
    #[must_use]
    pub const fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }

    /// Routing policy timeout
    #[must_use]
    pub const fn policy_timeout(&self) -> Duration {
        Duration::from_millis(self.policy_timeout_ms)
    }

    /// Per-handler timeout overrides as durations
    #[must_use]
    pub fn handler_timeout_overrides(&self) -> HashMap<String, Duration> {
        self.handler_timeouts
            .iter()
            .map(|(name, ms)| (name.clone(), Duration::from_millis(*ms)))
            .collect()
    }

    /// Returns true when an inference endpoint is configured
    #[must_use]
    pub fn llm_enabled(&self) -> bool {
        self.llm_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    /// Reference date for the refund policy, or the built-in default
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` if `support_today` is not a `YYYY-MM-DD` date.
    pub fn support_today(&self) -> Result<NaiveDate, ConfigError> {
        let raw = self
            .support_today
            .as_deref()
            .unwrap_or(DEFAULT_SUPPORT_TODAY);
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
            ConfigError::Message(format!("support_today '{raw}' is not a YYYY-MM-DD date: {e}"))
        })
    }
}

// Router configuration
/// Default handler invocation timeout in milliseconds
pub const DEFAULT_HANDLER_TIMEOUT_MS: u64 = 30_000;
/// Default routing policy timeout in milliseconds
pub const DEFAULT_POLICY_TIMEOUT_MS: u64 = 30_000;
/// Apology presented when a request cannot be completed
pub const DEFAULT_FALLBACK_MESSAGE: &str = "I'm sorry, I wasn't able to complete that request right now. Please try again in a moment.";

// LLM configuration
/// Default OpenAI-compatible API base
pub const DEFAULT_LLM_API_BASE: &str = "https://api.openai.com/v1";
/// Default model for routing decisions
pub const DEFAULT_ROUTER_MODEL: &str = "gpt-4o-mini";
/// Default model for LLM-backed sub-agents
pub const DEFAULT_SUB_AGENT_MODEL: &str = "gpt-4o-mini";
/// Default output token limit
pub const DEFAULT_LLM_MAX_TOKENS: u32 = 1024;
/// Sampling temperature for routing decisions
pub const ROUTER_TEMPERATURE: f32 = 0.0;
/// Sampling temperature for sub-agents
pub const SUB_AGENT_TEMPERATURE: f32 = 0.3;
/// Maximum retries for transient inference failures
pub const LLM_MAX_RETRIES: usize = 3;
/// Initial backoff for inference retries
pub const LLM_INITIAL_BACKOFF_MS: u64 = 500;
/// Backoff ceiling for inference retries
pub const LLM_MAX_BACKOFF_MS: u64 = 4_000;

// Support catalog configuration
/// Reference date of the bundled mock order book
pub const DEFAULT_SUPPORT_TODAY: &str = "2024-10-02";

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    // The only test in the crate that touches process environment variables.
    #[test]
    fn test_config_env_loading() -> Result<(), Box<dyn std::error::Error>> {
        env::set_var("ROUTER__HANDLER_TIMEOUT_MS", "1500");
        env::set_var("ROUTER__TEXT_FRAME", "Here is what our technician suggests:");

        let settings = Settings::new()?;
        assert_eq!(settings.handler_timeout(), Duration::from_millis(1500));
        assert_eq!(
            settings.text_frame.as_deref(),
            Some("Here is what our technician suggests:")
        );
        assert_eq!(settings.policy_timeout_ms, DEFAULT_POLICY_TIMEOUT_MS);

        env::remove_var("ROUTER__HANDLER_TIMEOUT_MS");
        env::remove_var("ROUTER__TEXT_FRAME");

        // Empty values are treated as unset
        env::set_var("ROUTER__HANDLER_TIMEOUT_MS", "");
        let settings = Settings::new()?;
        assert_eq!(settings.handler_timeout_ms, DEFAULT_HANDLER_TIMEOUT_MS);
        env::remove_var("ROUTER__HANDLER_TIMEOUT_MS");
        Ok(())
    }

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert!(!settings.llm_enabled());
        assert_eq!(settings.fallback_message, DEFAULT_FALLBACK_MESSAGE);
    }

    #[test]
    fn rejects_zero_timeouts() {
        let settings = Settings {
            handler_timeout_ms: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.handler_timeouts.insert("tech_support".to_string(), 0);
        let Err(err) = settings.validate() else {
            panic!("zero override must be rejected");
        };
        assert!(err.to_string().contains("tech_support"));
    }

    #[test]
    fn parses_support_today() {
        let settings = Settings {
            support_today: Some("2025-01-31".to_string()),
            ..Settings::default()
        };
        let today = settings.support_today();
        assert_eq!(today.ok(), NaiveDate::from_ymd_opt(2025, 1, 31));

        let settings = Settings {
            support_today: Some("31/01/2025".to_string()),
            ..Settings::default()
        };
        assert!(settings.support_today().is_err());
    }

    #[test]
    fn whitespace_api_key_is_not_enabled() {
        let settings = Settings {
            llm_api_key: Some("   ".to_string()),
            ..Settings::default()
        };
        assert!(!settings.llm_enabled());
    }

    #[test]
    fn converts_overrides_to_durations() {
        let mut settings = Settings::default();
        settings.handler_timeouts.insert("order_lookup".to_string(), 250);
        let overrides = settings.handler_timeout_overrides();
        assert_eq!(
            overrides.get("order_lookup"),
            Some(&Duration::from_millis(250))
        );
    }
}
