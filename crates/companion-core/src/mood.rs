use std::sync::Arc;

use companion_provider::{LlmProvider, LlmRequest};

/// One-shot sentiment scoring, fully independent of the conversation session:
/// it shares only the provider handle and never touches session state.
pub struct MoodAnalyzer {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl MoodAnalyzer {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Score free text on the 1-10 mood scale. Absent (`None`) on any call
    /// failure or unparsable reply — never an error, never retried.
    pub async fn score_text(&self, text: &str) -> Option<i32> {
        let prompt = format!(
            "Analyze the sentiment of the following text and return ONLY a number from 1 \
             (extremely negative) to 10 (extremely positive). Text: \"{text}\""
        );
        let request = LlmRequest::simple(self.model.clone(), None, prompt);
        match self.provider.chat(request).await {
            Ok(response) => parse_leading_int(&response.text),
            Err(err) => {
                tracing::warn!("Mood scoring failed: {err}");
                None
            }
        }
    }
}

/// Leading-integer parse: optional sign, then the longest digit run, trailing
/// text ignored ("7/10" scores 7, "pretty good" scores nothing).
fn parse_leading_int(raw: &str) -> Option<i32> {
    let trimmed = raw.trim();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1i32, rest),
        None => (1i32, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let run: String = digits.chars().take_while(|c| c.is_ascii_digit()).collect();
    if run.is_empty() {
        return None;
    }
    run.parse::<i32>().ok().map(|n| sign * n)
}
