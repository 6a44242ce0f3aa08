//! Configuration types.

use std::path::PathBuf;

use crate::channels::MailboxConfig;
use crate::error::ConfigError;
use crate::llm::{DEFAULT_MAX_TOKENS, LlmBackend, LlmConfig};

/// Default chat model.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";

/// Turn execution settings.
#[derive(Debug, Clone, Default)]
pub struct TurnConfig {
    /// Sent ahead of every history as a system message; never stored.
    pub system_prompt: Option<String>,
    /// Drop the user message of a turn whose model call failed, keeping the
    /// history strictly paired. Off by default: the unanswered message stays.
    pub rollback_on_failure: bool,
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub llm: LlmConfig,
    pub turn: TurnConfig,
    pub mailbox: MailboxConfig,
    /// Directory for daily-rotated log files, if any.
    pub log_dir: Option<PathBuf>,
}

impl AssistantConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend: LlmBackend = std::env::var("MAIL_ASSIST_LLM_BACKEND")
            .unwrap_or_else(|_| "anthropic".to_string())
            .parse()?;

        let api_key = std::env::var(backend.api_key_var())
            .map_err(|_| ConfigError::MissingEnvVar(backend.api_key_var().to_string()))?;

        let model =
            std::env::var("MAIL_ASSIST_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let max_tokens = parse_env("MAIL_ASSIST_MAX_TOKENS", DEFAULT_MAX_TOKENS)?;

        let system_prompt = std::env::var("MAIL_ASSIST_SYSTEM_PROMPT")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let rollback_on_failure = parse_env("MAIL_ASSIST_ROLLBACK_FAILED_TURNS", false)?;

        let log_dir = std::env::var("MAIL_ASSIST_LOG_DIR").ok().map(PathBuf::from);

        Ok(Self {
            llm: LlmConfig {
                backend,
                api_key: secrecy::SecretString::from(api_key),
                model,
                max_tokens,
            },
            turn: TurnConfig {
                system_prompt,
                rollback_on_failure,
            },
            mailbox: MailboxConfig::from_env()?,
            log_dir,
        })
    }
}

/// Parse an optional typed environment variable, falling back to `default`
/// when unset.
fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
