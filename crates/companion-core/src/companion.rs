use std::sync::{Mutex, MutexGuard};

use anyhow::{ensure, Result};
use companion_schema::{Message, MoodEntry, PersonaId};
use companion_store::ProfileStore;

use crate::session::{SendOutcome, SessionManager};

/// Binds the store and the session manager behind the application's entry
/// points, keeping the in-memory transcript equal to the persisted one after
/// every operation.
pub struct Companion {
    store: ProfileStore,
    sessions: SessionManager,
    state: Mutex<ViewState>,
}

struct ViewState {
    transcript: Vec<Message>,
    persona: PersonaId,
}

impl Companion {
    /// Load persisted state. The transcript is reconstructed from the store
    /// only — the model session always starts cold after a restart.
    pub async fn open(store: ProfileStore, sessions: SessionManager) -> Self {
        let transcript = store.get_chat_history().await;
        let persona = store.get_last_persona().await;
        Self {
            store,
            sessions,
            state: Mutex::new(ViewState { transcript, persona }),
        }
    }

    pub fn current_persona(&self) -> PersonaId {
        self.lock().persona
    }

    pub fn transcript(&self) -> Vec<Message> {
        self.lock().transcript.clone()
    }

    pub fn bound_persona(&self) -> Option<PersonaId> {
        self.sessions.bound_persona()
    }

    pub async fn mood_history(&self) -> Vec<MoodEntry> {
        self.store.get_mood_history().await
    }

    /// Send one user turn under the current persona. The user turn is
    /// persisted before the model is called; the reply (or its fallback) is
    /// appended afterwards unless the session was superseded mid-flight.
    pub async fn send_message(&self, text: &str) -> Result<SendOutcome> {
        let persona = self.lock().persona;

        let snapshot = {
            let mut state = self.lock();
            state.transcript.push(Message::user(text));
            state.transcript.clone()
        };
        self.store.replace_chat_history(&snapshot).await?;

        match self.sessions.send(text, persona).await {
            SendOutcome::Replied(reply) => {
                let snapshot = {
                    let mut state = self.lock();
                    state.transcript.push(Message::model(reply.clone()));
                    state.transcript.clone()
                };
                self.store.replace_chat_history(&snapshot).await?;
                Ok(SendOutcome::Replied(reply))
            }
            SendOutcome::Superseded => {
                tracing::debug!("Dropping reply that resolved after a session change");
                Ok(SendOutcome::Superseded)
            }
        }
    }

    /// Record the selection; the model session rebinds lazily on the next
    /// send, so by then the bound persona equals the most recent selection.
    pub async fn select_persona(&self, persona: PersonaId) -> Result<()> {
        self.lock().persona = persona;
        self.store.set_last_persona(persona).await
    }

    pub async fn log_mood(&self, value: i32, note: &str) -> Result<Vec<MoodEntry>> {
        ensure!((1..=10).contains(&value), "mood value must be 1-10, got {value}");
        self.store.append_mood(MoodEntry::new(value, note)).await
    }

    /// Clear the transcript and drop the model session. Persona selection and
    /// mood history are kept.
    pub async fn start_new_chat(&self) -> Result<()> {
        self.lock().transcript.clear();
        self.store.replace_chat_history(&[]).await?;
        self.sessions.reset();
        Ok(())
    }

    /// Erase everything the application owns and return to the defaults.
    pub async fn clear_all_data(&self) -> Result<()> {
        self.store.clear_all().await?;
        {
            let mut state = self.lock();
            state.transcript.clear();
            state.persona = PersonaId::default();
        }
        self.sessions.reset();
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
