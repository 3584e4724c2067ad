//! Structured narration payload produced by the model.
//!
//! The model is asked to answer with a JSON object such as
//!
//! ```json
//! {
//!   "narrative": "The goblin lunges...",
//!   "characters": [{ "name": "Goblin", "description": "...", "type": "SmallCreature" }],
//!   "environment": { "name": "Cave", "description": "..." },
//!   "isInCombat": true,
//!   "opponent": "Goblin"
//! }
//! ```
//!
//! Parsing is best-effort. Every field is read independently and anything
//! absent or malformed is treated as "no update".

use serde_json::{Map, Value};

use super::aggregates::CharacterType;

/// A character mentioned by the narrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterEntry {
    /// Character name; never empty.
    pub name: String,
    /// Description, if given.
    pub description: Option<String>,
    /// Recognised character type, if given.
    pub character_type: Option<CharacterType>,
}

/// A location mentioned by the narrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentEntry {
    /// Location name; never empty.
    pub name: String,
    /// Description, if given.
    pub description: Option<String>,
}

/// Facts extracted from one narration response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NarrationPayload {
    /// Player-facing prose.
    pub narrative: Option<String>,
    /// Characters introduced or updated.
    pub characters: Vec<CharacterEntry>,
    /// Current location.
    pub environment: Option<EnvironmentEntry>,
    /// Whether the story is now in combat.
    pub is_in_combat: Option<bool>,
    /// Name of the character the player is fighting.
    pub opponent: Option<String>,
}

impl NarrationPayload {
    /// Parses narration text. Never fails; plain prose yields an empty
    /// payload.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let Some(object) = extract_object(text) else {
            return Self::default();
        };

        Self {
            narrative: non_empty_string(object.get("narrative")),
            characters: object
                .get("characters")
                .and_then(Value::as_array)
                .map(|entries| entries.iter().filter_map(parse_character).collect())
                .unwrap_or_default(),
            environment: object.get("environment").and_then(parse_environment),
            is_in_combat: object.get("isInCombat").and_then(Value::as_bool),
            opponent: non_empty_string(object.get("opponent")),
        }
    }

    /// The opponent name, falling back to the last mentioned character.
    #[must_use]
    pub fn opponent_name(&self) -> Option<&str> {
        self.opponent
            .as_deref()
            .or_else(|| self.characters.last().map(|c| c.name.as_str()))
    }

    /// Returns `true` when nothing usable was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Finds the outermost JSON object in `text`, tolerating surrounding prose
/// and code fences.
fn extract_object(text: &str) -> Option<Map<String, Value>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn parse_character(value: &Value) -> Option<CharacterEntry> {
    let name = non_empty_string(value.get("name"))?;
    Some(CharacterEntry {
        name,
        description: non_empty_string(value.get("description")),
        character_type: value
            .get("type")
            .and_then(Value::as_str)
            .and_then(CharacterType::parse_lenient),
    })
}

fn parse_environment(value: &Value) -> Option<EnvironmentEntry> {
    let name = non_empty_string(value.get("name"))?;
    Some(EnvironmentEntry {
        name,
        description: non_empty_string(value.get("description")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_payload() {
        let text = r#"{
            "narrative": "A goblin leaps from the shadows!",
            "characters": [{"name": "Goblin", "description": "Green", "type": "SmallCreature"}],
            "environment": {"name": "Cave", "description": "Damp"},
            "isInCombat": true,
            "opponent": "Goblin"
        }"#;

        let payload = NarrationPayload::parse(text);

        assert_eq!(
            payload.narrative.as_deref(),
            Some("A goblin leaps from the shadows!")
        );
        assert_eq!(payload.characters.len(), 1);
        assert_eq!(
            payload.characters[0].character_type,
            Some(CharacterType::SmallCreature)
        );
        assert_eq!(payload.environment.as_ref().unwrap().name, "Cave");
        assert_eq!(payload.is_in_combat, Some(true));
        assert_eq!(payload.opponent_name(), Some("Goblin"));
    }

    #[test]
    fn test_parse_plain_prose_yields_empty_payload() {
        let payload = NarrationPayload::parse("You walk into the tavern.");
        assert!(payload.is_empty());
    }

    #[test]
    fn test_parse_truncated_json_yields_empty_payload() {
        let payload = NarrationPayload::parse(r#"{"narrative": "The orc"#);
        assert!(payload.is_empty());
    }

    #[test]
    fn test_parse_tolerates_code_fence_and_prose() {
        let text = "Here you go:\n```json\n{\"isInCombat\": false}\n```";

        let payload = NarrationPayload::parse(text);

        assert_eq!(payload.is_in_combat, Some(false));
    }

    #[test]
    fn test_malformed_fields_degrade_independently() {
        let text = r#"{
            "narrative": 42,
            "characters": [{"description": "nameless"}, {"name": "Troll", "type": "giant"}],
            "environment": "not an object",
            "isInCombat": "yes",
            "opponent": "   "
        }"#;

        let payload = NarrationPayload::parse(text);

        assert!(payload.narrative.is_none());
        assert_eq!(payload.characters.len(), 1);
        assert_eq!(payload.characters[0].name, "Troll");
        assert!(payload.characters[0].character_type.is_none());
        assert!(payload.environment.is_none());
        assert!(payload.is_in_combat.is_none());
        assert!(payload.opponent.is_none());
        assert_eq!(payload.opponent_name(), Some("Troll"));
    }
}
