use std::sync::{Arc, Mutex, MutexGuard};

use companion_provider::{LlmMessage, LlmProvider, LlmRequest};
use companion_schema::PersonaId;

use crate::persona;

/// Shown instead of a reply when the inference call fails outright.
pub const CONNECTION_FALLBACK: &str =
    "I'm sorry, I seem to be having connection issues. Can we try again?";

/// Shown when the model answers with no text at all.
pub const EMPTY_REPLY_FALLBACK: &str = "I'm having trouble finding the right words right now.";

const SESSION_TEMPERATURE: f32 = 0.7;

/// What became of one `send`. A reply resolving after its session was
/// discarded (persona switch, new chat) is reported as superseded so the
/// caller drops it instead of applying it to whatever transcript is current.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Replied(String),
    Superseded,
}

/// One bound model conversation: a persona's instruction plus the turns the
/// model has acknowledged. Replaced wholesale on persona switch — prior turns
/// are never replayed into the successor.
struct BoundSession {
    persona: PersonaId,
    generation: u64,
    history: Vec<LlmMessage>,
}

struct SessionState {
    session: Option<BoundSession>,
    next_generation: u64,
}

impl SessionState {
    fn bind(&mut self, persona: PersonaId) -> u64 {
        match &self.session {
            Some(s) if s.persona == persona => s.generation,
            _ => {
                let generation = self.next_generation;
                self.next_generation += 1;
                self.session = Some(BoundSession {
                    persona,
                    generation,
                    history: Vec::new(),
                });
                tracing::debug!("Bound new model session: {persona} (generation {generation})");
                generation
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        matches!(&self.session, Some(s) if s.generation == generation)
    }
}

/// Owns at most one live model session and the at-most-one-attempt send
/// policy: inference failures never reach the caller, they become a fixed
/// fallback reply and a log line.
pub struct SessionManager {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    state: Mutex<SessionState>,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: 2048,
            state: Mutex::new(SessionState {
                session: None,
                next_generation: 0,
            }),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Send one user turn under `persona`, rebinding the session first if the
    /// persona changed. The provider is called exactly once — no retry, no
    /// backoff, no timeout beyond the transport's own.
    pub async fn send(&self, text: &str, persona: PersonaId) -> SendOutcome {
        let (generation, request) = {
            let mut state = self.lock();
            let generation = state.bind(persona);
            let mut messages = match &state.session {
                Some(s) => s.history.clone(),
                None => Vec::new(),
            };
            messages.push(LlmMessage::user(text));
            let request = LlmRequest {
                model: self.model.clone(),
                system_instruction: Some(
                    persona::lookup(persona).system_instruction.to_string(),
                ),
                temperature: Some(SESSION_TEMPERATURE),
                messages,
                max_tokens: self.max_tokens,
            };
            (generation, request)
        };

        // The lock is released across the await: a persona switch or reset
        // may land while this request is in flight, which is exactly what the
        // generation check below catches.
        match self.provider.chat(request).await {
            Ok(response) => {
                let reply = if response.text.is_empty() {
                    EMPTY_REPLY_FALLBACK.to_string()
                } else {
                    response.text
                };
                self.commit(generation, text, reply)
            }
            Err(err) => {
                tracing::warn!("Model request failed, using fallback reply: {err}");
                let state = self.lock();
                if state.is_current(generation) {
                    SendOutcome::Replied(CONNECTION_FALLBACK.to_string())
                } else {
                    SendOutcome::Superseded
                }
            }
        }
    }

    /// Discard any bound session. The next send starts a fresh conversation.
    pub fn reset(&self) {
        self.lock().session = None;
    }

    pub fn bound_persona(&self) -> Option<PersonaId> {
        self.lock().session.as_ref().map(|s| s.persona)
    }

    pub fn generation(&self) -> Option<u64> {
        self.lock().session.as_ref().map(|s| s.generation)
    }

    fn commit(&self, generation: u64, user_text: &str, reply: String) -> SendOutcome {
        let mut state = self.lock();
        match &mut state.session {
            Some(s) if s.generation == generation => {
                s.history.push(LlmMessage::user(user_text));
                s.history.push(LlmMessage::model(reply.clone()));
                SendOutcome::Replied(reply)
            }
            _ => {
                tracing::debug!("Discarding reply for superseded session {generation}");
                SendOutcome::Superseded
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use companion_provider::LlmResponse;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Test double: replays a scripted queue of replies (with optional
    /// latency) and records every request it saw.
    struct ScriptedProvider {
        requests: Mutex<Vec<LlmRequest>>,
        replies: Mutex<VecDeque<ScriptedReply>>,
    }

    struct ScriptedReply {
        delay: Duration,
        result: Result<String, String>,
    }

    impl ScriptedProvider {
        fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                replies: Mutex::new(VecDeque::new()),
            }
        }

        fn reply(self, text: &str) -> Self {
            self.push(Duration::ZERO, Ok(text.to_string()))
        }

        fn slow_reply(self, text: &str, delay: Duration) -> Self {
            self.push(delay, Ok(text.to_string()))
        }

        fn failure(self, message: &str) -> Self {
            self.push(Duration::ZERO, Err(message.to_string()))
        }

        fn push(self, delay: Duration, result: Result<String, String>) -> Self {
            self.replies
                .lock()
                .unwrap()
                .push_back(ScriptedReply { delay, result });
            self
        }

        fn request(&self, index: usize) -> LlmRequest {
            self.requests.lock().unwrap()[index].clone()
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn chat(&self, request: LlmRequest) -> anyhow::Result<LlmResponse> {
            self.requests.lock().unwrap().push(request);
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted provider ran out of replies");
            if !reply.delay.is_zero() {
                tokio::time::sleep(reply.delay).await;
            }
            match reply.result {
                Ok(text) => Ok(LlmResponse {
                    text,
                    input_tokens: None,
                    output_tokens: None,
                }),
                Err(message) => Err(anyhow!(message)),
            }
        }
    }

    fn manager(provider: ScriptedProvider) -> (Arc<ScriptedProvider>, SessionManager) {
        let provider = Arc::new(provider);
        let mgr = SessionManager::new(provider.clone(), "test-model");
        (provider, mgr)
    }

    #[tokio::test]
    async fn first_send_binds_session_with_persona_instruction() {
        let (provider, mgr) = manager(ScriptedProvider::new().reply("That sounds hard."));

        let outcome = mgr.send("I feel anxious", PersonaId::Therapist).await;

        assert_eq!(outcome, SendOutcome::Replied("That sounds hard.".into()));
        assert_eq!(mgr.bound_persona(), Some(PersonaId::Therapist));

        let req = provider.request(0);
        assert_eq!(
            req.system_instruction.as_deref(),
            Some(persona::lookup(PersonaId::Therapist).system_instruction)
        );
        assert_eq!(req.temperature, Some(SESSION_TEMPERATURE));
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].content, "I feel anxious");
    }

    #[tokio::test]
    async fn same_persona_reuses_session_and_carries_history() {
        let (provider, mgr) =
            manager(ScriptedProvider::new().reply("first reply").reply("second reply"));

        mgr.send("hello", PersonaId::Friend).await;
        let generation = mgr.generation();
        mgr.send("still there?", PersonaId::Friend).await;

        assert_eq!(mgr.generation(), generation);
        let req = provider.request(1);
        let contents: Vec<&str> = req.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hello", "first reply", "still there?"]);
    }

    #[tokio::test]
    async fn persona_switch_discards_old_session() {
        let (provider, mgr) =
            manager(ScriptedProvider::new().reply("hey!").reply("here is a plan"));

        mgr.send("hello", PersonaId::Friend).await;
        let friend_generation = mgr.generation();
        mgr.send("what should I do?", PersonaId::Advisor).await;

        assert_eq!(mgr.bound_persona(), Some(PersonaId::Advisor));
        assert_ne!(mgr.generation(), friend_generation);

        let req = provider.request(1);
        assert_eq!(
            req.system_instruction.as_deref(),
            Some(persona::lookup(PersonaId::Advisor).system_instruction)
        );
        assert_eq!(req.messages.len(), 1, "prior turns must not be replayed");
    }

    #[tokio::test]
    async fn provider_failure_becomes_connection_fallback() {
        let (provider, mgr) = manager(
            ScriptedProvider::new()
                .failure("boom")
                .reply("recovered"),
        );

        let outcome = mgr.send("hello", PersonaId::Friend).await;
        assert_eq!(outcome, SendOutcome::Replied(CONNECTION_FALLBACK.into()));

        // The failed exchange is not part of the session history.
        mgr.send("are you back?", PersonaId::Friend).await;
        let req = provider.request(1);
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].content, "are you back?");
    }

    #[tokio::test]
    async fn empty_reply_becomes_empty_fallback_and_is_recorded() {
        let (provider, mgr) = manager(ScriptedProvider::new().reply("").reply("ok"));

        let outcome = mgr.send("hello", PersonaId::Friend).await;
        assert_eq!(outcome, SendOutcome::Replied(EMPTY_REPLY_FALLBACK.into()));

        mgr.send("hm", PersonaId::Friend).await;
        let req = provider.request(1);
        let contents: Vec<&str> = req.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hello", EMPTY_REPLY_FALLBACK, "hm"]);
    }

    #[tokio::test]
    async fn reply_after_reset_is_superseded() {
        let (provider, mgr) = manager(
            ScriptedProvider::new().slow_reply("too late", Duration::from_millis(80)),
        );
        let mgr = Arc::new(mgr);

        let pending = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.send("hello", PersonaId::Friend).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        mgr.reset();

        assert_eq!(pending.await.unwrap(), SendOutcome::Superseded);
        assert_eq!(mgr.bound_persona(), None);
        assert_eq!(provider.request_count(), 1);
    }

    #[tokio::test]
    async fn reply_after_persona_switch_is_superseded() {
        let (provider, mgr) = manager(
            ScriptedProvider::new()
                .slow_reply("stale friend reply", Duration::from_millis(80))
                .reply("fresh advisor reply"),
        );
        let mgr = Arc::new(mgr);

        let pending = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.send("hello", PersonaId::Friend).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let fresh = mgr.send("plan my week", PersonaId::Advisor).await;
        assert_eq!(fresh, SendOutcome::Replied("fresh advisor reply".into()));

        assert_eq!(pending.await.unwrap(), SendOutcome::Superseded);
        assert_eq!(mgr.bound_persona(), Some(PersonaId::Advisor));

        // The advisor session never saw the stale friend exchange.
        let advisor_req = provider.request(1);
        assert_eq!(advisor_req.messages.len(), 1);
        assert_eq!(advisor_req.messages[0].content, "plan my week");
    }

    #[tokio::test]
    async fn reset_then_send_starts_fresh_conversation() {
        let (provider, mgr) =
            manager(ScriptedProvider::new().reply("hi").reply("hi again"));

        mgr.send("hello", PersonaId::Friend).await;
        mgr.reset();
        mgr.send("hello again", PersonaId::Friend).await;

        let req = provider.request(1);
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].content, "hello again");
    }
}
