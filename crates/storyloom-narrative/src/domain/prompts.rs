//! Named system instruction templates.
//!
//! The template table is loaded once at startup and shared read-only.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use storyloom_core::error::DomainError;
use storyloom_rules::domain::CombatOutcome;

/// Which instruction template governs a model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemPromptType {
    /// Ordinary narration.
    Default,
    /// Both sides hit.
    CombatHitHit,
    /// Only the player hits.
    CombatHitMiss,
    /// Only the opponent hits.
    CombatMissHit,
    /// Nobody hits.
    CombatMissMiss,
    /// Ask the model who the player is fighting.
    CombatOpponentDescription,
}

impl SystemPromptType {
    /// All template types.
    pub const ALL: [Self; 6] = [
        Self::Default,
        Self::CombatHitHit,
        Self::CombatHitMiss,
        Self::CombatMissHit,
        Self::CombatMissMiss,
        Self::CombatOpponentDescription,
    ];

    /// The narration template for a combat outcome.
    #[must_use]
    pub fn for_outcome(outcome: CombatOutcome) -> Self {
        match outcome {
            CombatOutcome::HitHit => Self::CombatHitHit,
            CombatOutcome::HitMiss => Self::CombatHitMiss,
            CombatOutcome::MissHit => Self::CombatMissHit,
            CombatOutcome::MissMiss => Self::CombatMissMiss,
        }
    }

    /// The configuration key of this template.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::CombatHitHit => "combat_hit_hit",
            Self::CombatHitMiss => "combat_hit_miss",
            Self::CombatMissHit => "combat_miss_hit",
            Self::CombatMissMiss => "combat_miss_miss",
            Self::CombatOpponentDescription => "combat_opponent_description",
        }
    }
}

impl fmt::Display for SystemPromptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The six instruction strings, one per `SystemPromptType`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PromptTemplates {
    default: String,
    combat_hit_hit: String,
    combat_hit_miss: String,
    combat_miss_hit: String,
    combat_miss_miss: String,
    combat_opponent_description: String,
}

impl PromptTemplates {
    /// Builds a table by asking `template` for each type.
    pub fn from_fn(template: impl Fn(SystemPromptType) -> String) -> Self {
        Self {
            default: template(SystemPromptType::Default),
            combat_hit_hit: template(SystemPromptType::CombatHitHit),
            combat_hit_miss: template(SystemPromptType::CombatHitMiss),
            combat_miss_hit: template(SystemPromptType::CombatMissHit),
            combat_miss_miss: template(SystemPromptType::CombatMissMiss),
            combat_opponent_description: template(SystemPromptType::CombatOpponentDescription),
        }
    }

    /// Parses a YAML mapping with one key per template type.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the document is malformed, a key
    /// is missing or unknown, or a template is blank.
    pub fn from_yaml_str(source: &str) -> Result<Self, DomainError> {
        let templates: Self = serde_yaml::from_str(source)
            .map_err(|e| DomainError::Validation(format!("invalid prompt templates: {e}")))?;
        if let Some(blank) = SystemPromptType::ALL
            .into_iter()
            .find(|t| templates.get(*t).trim().is_empty())
        {
            return Err(DomainError::Validation(format!(
                "prompt template `{blank}` must not be blank"
            )));
        }
        Ok(templates)
    }

    /// Reads and parses a YAML template file.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the file cannot be read, or
    /// the errors of [`PromptTemplates::from_yaml_str`].
    pub fn load(path: &Path) -> Result<Self, DomainError> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            DomainError::Infrastructure(format!(
                "cannot read prompt templates from {}: {e}",
                path.display()
            ))
        })?;
        Self::from_yaml_str(&source)
    }

    /// Returns the instruction string for a template type.
    #[must_use]
    pub fn get(&self, prompt_type: SystemPromptType) -> &str {
        match prompt_type {
            SystemPromptType::Default => &self.default,
            SystemPromptType::CombatHitHit => &self.combat_hit_hit,
            SystemPromptType::CombatHitMiss => &self.combat_hit_miss,
            SystemPromptType::CombatMissHit => &self.combat_miss_hit,
            SystemPromptType::CombatMissMiss => &self.combat_miss_miss,
            SystemPromptType::CombatOpponentDescription => &self.combat_opponent_description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "
default: Narrate the story.
combat_hit_hit: Both combatants land blows.
combat_hit_miss: The player lands a blow.
combat_miss_hit: The opponent lands a blow.
combat_miss_miss: Both combatants miss.
combat_opponent_description: Describe the opponent as JSON.
";

    #[test]
    fn test_from_yaml_str_maps_every_type() {
        let templates = PromptTemplates::from_yaml_str(FULL).unwrap();

        assert_eq!(
            templates.get(SystemPromptType::Default),
            "Narrate the story."
        );
        assert_eq!(
            templates.get(SystemPromptType::CombatOpponentDescription),
            "Describe the opponent as JSON."
        );
        assert_eq!(
            templates.get(SystemPromptType::CombatMissHit),
            "The opponent lands a blow."
        );
    }

    #[test]
    fn test_from_yaml_str_rejects_missing_key() {
        let source = FULL.replace("combat_miss_miss: Both combatants miss.\n", "");

        let result = PromptTemplates::from_yaml_str(&source);

        match result.unwrap_err() {
            DomainError::Validation(msg) => assert!(msg.contains("combat_miss_miss"), "{msg}"),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_from_yaml_str_rejects_blank_template() {
        let source = FULL.replace("Both combatants miss.", "\"  \"");

        let result = PromptTemplates::from_yaml_str(&source);

        match result.unwrap_err() {
            DomainError::Validation(msg) => {
                assert_eq!(msg, "prompt template `combat_miss_miss` must not be blank");
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_for_outcome_selects_matching_combat_template() {
        assert_eq!(
            SystemPromptType::for_outcome(CombatOutcome::HitMiss),
            SystemPromptType::CombatHitMiss
        );
        assert_eq!(
            SystemPromptType::for_outcome(CombatOutcome::MissMiss),
            SystemPromptType::CombatMissMiss
        );
    }

    #[test]
    fn test_shipped_templates_load() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/prompts.yaml");

        let templates = PromptTemplates::load(&path).unwrap();

        assert!(
            templates
                .get(SystemPromptType::CombatOpponentDescription)
                .contains("\"opponent\"")
        );
    }

    #[test]
    fn test_load_missing_file_returns_infrastructure_error() {
        let result = PromptTemplates::load(Path::new("/nonexistent/prompts.yaml"));
        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }
}
