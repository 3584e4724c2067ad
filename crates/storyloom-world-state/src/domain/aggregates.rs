//! Aggregate roots for the World State context.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use storyloom_core::error::DomainError;
use uuid::Uuid;

/// Maximum health a player starts a campaign with.
pub const PLAYER_MAX_HEALTH: u32 = 100;

/// Broad physical class of a character; drives health and damage tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CharacterType {
    /// People and people-sized foes.
    #[default]
    Humanoid,
    /// Rats, imps, goblins.
    SmallCreature,
    /// Bears, ogres, trolls.
    LargeCreature,
    /// Dragons and worse.
    Monster,
}

impl CharacterType {
    /// All character types, weakest first.
    pub const ALL: [Self; 4] = [
        Self::SmallCreature,
        Self::Humanoid,
        Self::LargeCreature,
        Self::Monster,
    ];

    /// Parses a type name leniently: case, spaces, `_` and `-` are ignored.
    /// Returns `None` for anything unrecognised.
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "humanoid" => Some(Self::Humanoid),
            "smallcreature" => Some(Self::SmallCreature),
            "largecreature" => Some(Self::LargeCreature),
            "monster" => Some(Self::Monster),
            _ => None,
        }
    }

    /// Health a newly discovered character of this type starts with.
    #[must_use]
    pub fn default_max_health(self) -> u32 {
        match self {
            Self::SmallCreature => 30,
            Self::Humanoid => 100,
            Self::LargeCreature => 150,
            Self::Monster => 200,
        }
    }
}

impl fmt::Display for CharacterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Humanoid => "Humanoid",
            Self::SmallCreature => "SmallCreature",
            Self::LargeCreature => "LargeCreature",
            Self::Monster => "Monster",
        };
        f.write_str(name)
    }
}

/// Result of applying damage to a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthChange {
    /// Health before the damage.
    pub before: u32,
    /// Health after the damage, clamped at zero.
    pub after: u32,
    /// `true` only when this application took the character to zero.
    pub died: bool,
}

/// A participant in the story, the player included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    /// Character identifier.
    pub id: Uuid,
    /// Physical class.
    pub character_type: CharacterType,
    /// Display name.
    pub name: String,
    /// Free-form description supplied by the narrator.
    pub description: String,
    /// Whether this character is the player.
    pub is_player: bool,
    current_health: u32,
    max_health: u32,
}

impl Character {
    /// Creates the player character at full health.
    #[must_use]
    pub fn new_player(id: Uuid, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            character_type: CharacterType::Humanoid,
            name: name.into(),
            description: description.into(),
            is_player: true,
            current_health: PLAYER_MAX_HEALTH,
            max_health: PLAYER_MAX_HEALTH,
        }
    }

    /// Creates a non-player character at its type's default health.
    #[must_use]
    pub fn new_npc(
        id: Uuid,
        name: impl Into<String>,
        description: impl Into<String>,
        character_type: CharacterType,
    ) -> Self {
        let max_health = character_type.default_max_health();
        Self {
            id,
            character_type,
            name: name.into(),
            description: description.into(),
            is_player: false,
            current_health: max_health,
            max_health,
        }
    }

    /// Overrides health, clamping `current` into `0..=max`.
    #[must_use]
    pub fn with_health(mut self, current: u32, max: u32) -> Self {
        self.max_health = max;
        self.current_health = current.min(max);
        self
    }

    /// Current health.
    #[must_use]
    pub fn current_health(&self) -> u32 {
        self.current_health
    }

    /// Maximum health.
    #[must_use]
    pub fn max_health(&self) -> u32 {
        self.max_health
    }

    /// A dead character stays in the campaign but cannot act.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.current_health == 0
    }

    /// Reduces health by `amount`, never below zero.
    pub fn apply_damage(&mut self, amount: u32) -> HealthChange {
        let before = self.current_health;
        self.current_health = before.saturating_sub(amount);
        HealthChange {
            before,
            after: self.current_health,
            died: before > 0 && self.current_health == 0,
        }
    }
}

/// A place the story has visited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Environment identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Free-form description supplied by the narrator.
    pub description: String,
}

/// The campaign aggregate: player, cast, locations and combat state.
///
/// Characters do not point back at the campaign or their location; the
/// campaign owns a `character -> environment` lookup instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    /// Aggregate identifier.
    pub id: Uuid,
    player: Character,
    /// Non-player characters in insertion order; the last is the most recent.
    characters: Vec<Character>,
    /// Visited locations; the last is the current one.
    environments: Vec<Environment>,
    character_locations: HashMap<Uuid, Uuid>,
    combat_mode: bool,
    concluded: bool,
    start_scenario: String,
}

impl Campaign {
    /// Creates a new campaign.
    #[must_use]
    pub fn new(id: Uuid, player: Character, start_scenario: impl Into<String>) -> Self {
        Self {
            id,
            player,
            characters: Vec::new(),
            environments: Vec::new(),
            character_locations: HashMap::new(),
            combat_mode: false,
            concluded: false,
            start_scenario: start_scenario.into(),
        }
    }

    /// The player character.
    #[must_use]
    pub fn player(&self) -> &Character {
        &self.player
    }

    /// Non-player characters in insertion order.
    #[must_use]
    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    /// Visited environments in order.
    #[must_use]
    pub fn environments(&self) -> &[Environment] {
        &self.environments
    }

    /// The current location, if the story has established one.
    #[must_use]
    pub fn current_environment(&self) -> Option<&Environment> {
        self.environments.last()
    }

    /// The opening scenario text.
    #[must_use]
    pub fn start_scenario(&self) -> &str {
        &self.start_scenario
    }

    /// Whether a combat encounter is active.
    #[must_use]
    pub fn combat_mode(&self) -> bool {
        self.combat_mode
    }

    /// Enters or leaves combat.
    pub fn set_combat_mode(&mut self, active: bool) {
        self.combat_mode = active;
    }

    /// Whether the player has died and the story is over.
    #[must_use]
    pub fn is_concluded(&self) -> bool {
        self.concluded
    }

    /// Ends the campaign. Combat cannot outlive the story.
    pub fn conclude(&mut self) {
        self.concluded = true;
        self.combat_mode = false;
    }

    /// Looks up a non-player character by id.
    #[must_use]
    pub fn character(&self, id: Uuid) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == id)
    }

    /// Returns where a character was last seen.
    #[must_use]
    pub fn location_of(&self, character_id: Uuid) -> Option<&Environment> {
        let environment_id = self.character_locations.get(&character_id)?;
        self.environments.iter().find(|e| e.id == *environment_id)
    }

    /// Returns the characters last seen at an environment.
    #[must_use]
    pub fn characters_at(&self, environment_id: Uuid) -> Vec<&Character> {
        self.characters
            .iter()
            .filter(|c| self.character_locations.get(&c.id) == Some(&environment_id))
            .collect()
    }

    /// Creates or updates a non-player character and places it at the
    /// current environment. Returns the character's id.
    ///
    /// Names match case-insensitively against living characters, preferring
    /// the most recently added one; a dead namesake is left alone and a new
    /// character is created instead. A new character without a type becomes a `Humanoid`; an
    /// existing one keeps its type unless a new one is given.
    pub fn upsert_character(
        &mut self,
        name: &str,
        description: Option<&str>,
        character_type: Option<CharacterType>,
    ) -> Uuid {
        let name = name.trim();
        let id = if let Some(existing) = self
            .characters
            .iter_mut()
            .rev()
            .find(|c| !c.is_dead() && same_name(&c.name, name))
        {
            if let Some(description) = description {
                description.clone_into(&mut existing.description);
            }
            if let Some(character_type) = character_type {
                existing.character_type = character_type;
            }
            existing.id
        } else {
            let character = Character::new_npc(
                Uuid::new_v4(),
                name,
                description.unwrap_or_default(),
                character_type.unwrap_or_default(),
            );
            let id = character.id;
            self.characters.push(character);
            id
        };

        if let Some(environment) = self.environments.last() {
            self.character_locations.insert(id, environment.id);
        }
        id
    }

    /// Finds a living non-player character by case-insensitive name,
    /// preferring the most recently added match.
    #[must_use]
    pub fn find_opponent(&self, name: &str) -> Option<&Character> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        self.characters
            .iter()
            .rev()
            .find(|c| !c.is_player && !c.is_dead() && same_name(&c.name, name))
    }

    /// Applies damage to a non-player character.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CharacterNotFound` if no such character exists.
    pub fn damage_character(
        &mut self,
        character_id: Uuid,
        amount: u32,
    ) -> Result<HealthChange, DomainError> {
        self.characters
            .iter_mut()
            .find(|c| c.id == character_id)
            .map(|c| c.apply_damage(amount))
            .ok_or(DomainError::CharacterNotFound(character_id))
    }

    /// Applies damage to the player.
    pub fn damage_player(&mut self, amount: u32) -> HealthChange {
        self.player.apply_damage(amount)
    }

    /// Moves the story to a named environment and returns its id.
    ///
    /// Staying in the current environment only refreshes its description. A
    /// previously visited environment is moved to the end rather than
    /// duplicated.
    pub fn enter_environment(&mut self, name: &str, description: Option<&str>) -> Uuid {
        let name = name.trim();
        let position = self
            .environments
            .iter()
            .position(|e| same_name(&e.name, name));

        let mut environment = match position {
            Some(index) => self.environments.remove(index),
            None => Environment {
                id: Uuid::new_v4(),
                name: name.to_owned(),
                description: String::new(),
            },
        };
        if let Some(description) = description {
            description.clone_into(&mut environment.description);
        }
        let id = environment.id;
        self.environments.push(environment);
        id
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}
