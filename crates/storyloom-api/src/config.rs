//! Server configuration read from the environment.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use storyloom_narrative::application::orchestrator::TurnConfig;
use storyloom_narrative::infrastructure::openai_narration::{
    DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TEMPERATURE, OpenAiSettings,
};
use storyloom_rules::domain::{CombatRules, OPPONENT_HIT_THRESHOLD, PLAYER_HIT_THRESHOLD};

use crate::error::AppError;

/// Everything the server needs to start.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// `PostgreSQL` URL; campaigns live in memory when absent.
    pub database_url: Option<String>,
    /// YAML file with the six instruction templates.
    pub prompts_path: PathBuf,
    /// Narration model connection.
    pub narration: OpenAiSettings,
    /// Serve turns as event streams.
    pub streaming_enabled: bool,
    /// Use canned narration instead of a model.
    pub use_mock_responses: bool,
    /// Combat tuning.
    pub combat_rules: CombatRules,
    /// OTLP collector endpoint; traces are exported only when set.
    pub otlp_endpoint: Option<String>,
}

impl AppConfig {
    /// Reads configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable cannot be parsed or the
    /// combat thresholds are out of range.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, treating blank values as unset.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let combat_rules = CombatRules {
            player_hit_threshold: parse_or(&get, "PLAYER_HIT_THRESHOLD", PLAYER_HIT_THRESHOLD)?,
            opponent_hit_threshold: parse_or(
                &get,
                "OPPONENT_HIT_THRESHOLD",
                OPPONENT_HIT_THRESHOLD,
            )?,
            ..CombatRules::default()
        };
        combat_rules
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: parse_or(&get, "PORT", 3000)?,
            database_url: get("DATABASE_URL"),
            prompts_path: get("PROMPTS_PATH")
                .map_or_else(|| PathBuf::from("config/prompts.yaml"), PathBuf::from),
            narration: OpenAiSettings {
                base_url: get("NARRATION_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
                model: get("NARRATION_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
                api_key: get("NARRATION_API_KEY"),
                temperature: parse_or(&get, "NARRATION_TEMPERATURE", DEFAULT_TEMPERATURE)?,
            },
            streaming_enabled: parse_or(&get, "STREAMING_ENABLED", true)?,
            use_mock_responses: parse_or(&get, "USE_MOCK_RESPONSES", false)?,
            combat_rules,
            otlp_endpoint: get("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }

    /// Delivery mode for turns; mock responses disable streaming.
    #[must_use]
    pub fn turn_config(&self) -> TurnConfig {
        TurnConfig::resolve(self.streaming_enabled, self.use_mock_responses)
    }
}

fn parse_or<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid ({raw:?}): {e}"))),
        None => Ok(default),
    }
}
