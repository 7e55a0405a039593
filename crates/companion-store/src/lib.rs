//! Local persistence for the companion: three JSON records under one data
//! directory. The directory is the whole key-value namespace, so clearing the
//! owned records and clearing the namespace are the same operation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;

use companion_schema::{Message, MoodEntry, PersonaId};

const MOOD_HISTORY_RECORD: &str = "mood_history.json";
const CHAT_HISTORY_RECORD: &str = "chat_history.json";
const LAST_PERSONA_RECORD: &str = "last_persona.json";

/// Outcome of decoding one stored record. A missing file and a file that no
/// longer parses are distinct conditions; both recover to the default value,
/// but only the latter is worth an operator's attention.
#[derive(Debug, Clone, PartialEq)]
pub enum Record<T> {
    Value(T),
    Absent,
    Malformed,
}

impl<T> Record<T> {
    pub fn into_value(self) -> Option<T> {
        match self {
            Record::Value(v) => Some(v),
            Record::Absent | Record::Malformed => None,
        }
    }
}

/// Manages the mood history, chat transcript and last-persona records.
pub struct ProfileStore {
    root: PathBuf,
}

impl ProfileStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Decode one record by file name. Exposed so callers and tests can
    /// observe the absent/malformed distinction directly.
    pub async fn read_record<T: DeserializeOwned>(&self, name: &str) -> Record<T> {
        let path = self.root.join(name);
        match fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(value) => Record::Value(value),
                Err(err) => {
                    tracing::warn!("Malformed record {name}, treating as empty: {err}");
                    Record::Malformed
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Record::Absent,
            Err(err) => {
                tracing::warn!("Unreadable record {name}, treating as empty: {err}");
                Record::Malformed
            }
        }
    }

    async fn write_record<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("creating store dir {}", self.root.display()))?;
        let raw = serde_json::to_string(value)?;
        fs::write(self.root.join(name), raw)
            .await
            .with_context(|| format!("writing record {name}"))?;
        Ok(())
    }

    /// Append one entry and return the full updated history, so the caller
    /// can refresh its view without a second read.
    pub async fn append_mood(&self, entry: MoodEntry) -> Result<Vec<MoodEntry>> {
        let mut history = self.get_mood_history().await;
        history.push(entry);
        self.write_record(MOOD_HISTORY_RECORD, &history).await?;
        Ok(history)
    }

    pub async fn get_mood_history(&self) -> Vec<MoodEntry> {
        self.read_record(MOOD_HISTORY_RECORD)
            .await
            .into_value()
            .unwrap_or_default()
    }

    /// Whole-list replace; the caller always writes the full transcript.
    pub async fn replace_chat_history(&self, messages: &[Message]) -> Result<()> {
        self.write_record(CHAT_HISTORY_RECORD, &messages).await
    }

    pub async fn get_chat_history(&self) -> Vec<Message> {
        self.read_record(CHAT_HISTORY_RECORD)
            .await
            .into_value()
            .unwrap_or_default()
    }

    pub async fn set_last_persona(&self, persona: PersonaId) -> Result<()> {
        self.write_record(LAST_PERSONA_RECORD, &persona).await
    }

    pub async fn get_last_persona(&self) -> PersonaId {
        self.read_record(LAST_PERSONA_RECORD)
            .await
            .into_value()
            .unwrap_or_default()
    }

    /// Erase every record the store owns.
    pub async fn clear_all(&self) -> Result<()> {
        for name in [MOOD_HISTORY_RECORD, CHAT_HISTORY_RECORD, LAST_PERSONA_RECORD] {
            match fs::remove_file(self.root.join(name)).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(err).with_context(|| format!("removing record {name}"));
                }
            }
        }
        Ok(())
    }
}
