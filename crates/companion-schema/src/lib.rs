use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of personas the companion can speak as.
///
/// Serialized form matches the stored persona record (`"FRIEND"` etc.), so a
/// data directory written by one build stays readable by the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersonaId {
    Friend,
    Therapist,
    Advisor,
}

impl PersonaId {
    pub const ALL: [PersonaId; 3] = [PersonaId::Friend, PersonaId::Therapist, PersonaId::Advisor];

    pub fn as_str(&self) -> &'static str {
        match self {
            PersonaId::Friend => "FRIEND",
            PersonaId::Therapist => "THERAPIST",
            PersonaId::Advisor => "ADVISOR",
        }
    }

    /// Case-insensitive parse for user-typed input. Unknown names are a user
    /// error, not a panic; in-process lookups use the enum directly.
    pub fn parse(raw: &str) -> Option<PersonaId> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "FRIEND" => Some(PersonaId::Friend),
            "THERAPIST" => Some(PersonaId::Therapist),
            "ADVISOR" => Some(PersonaId::Advisor),
            _ => None,
        }
    }
}

impl Default for PersonaId {
    fn default() -> Self {
        PersonaId::Friend
    }
}

impl std::fmt::Display for PersonaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who produced a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One transcript turn. Immutable once created; transcript order is insertion
/// order, the timestamp is advisory only (two turns can share a millisecond).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, text)
    }
}

/// One logged wellbeing rating. Append-only: entries are never edited or
/// removed individually, only the whole timeline can be cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodEntry {
    pub id: Uuid,
    /// Rating on the 1..=10 scale.
    pub value: i32,
    #[serde(default)]
    pub note: String,
    pub timestamp: DateTime<Utc>,
}

impl MoodEntry {
    pub fn new(value: i32, note: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            value,
            note: note.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Display label for the mood scale anchors shown in history views.
pub fn mood_label(value: i32) -> Option<&'static str> {
    match value {
        1 => Some("Very Low"),
        3 => Some("Low"),
        5 => Some("Neutral"),
        7 => Some("Good"),
        10 => Some("Excellent"),
        _ => None,
    }
}
