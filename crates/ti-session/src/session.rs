use tracing::{info, warn};

use ti_ingest::{Completion, IngestError};
use ti_tokens::{
    Alternative, ConfidenceTier, ProbabilityNormalizer, SubwordMarker, TokenRecord, WordGroup,
    WordGrouper,
};

use crate::config::ClientConfig;
use crate::conversation::{ApiMessage, Conversation, Message};
use crate::cursor::StepCursor;
use crate::error::{Result, SessionError};
use crate::source::CompletionSource;

/// A submission that has been accepted and is waiting on the source.
///
/// Only `ChatSession::begin_submission` creates one; hand it back to
/// `finish_submission` with the source's result.
#[derive(Debug)]
pub struct PendingSubmission {
    messages: Vec<ApiMessage>,
    temperature: f32,
}

impl PendingSubmission {
    /// The full history to send, ending with the new user message.
    pub fn messages(&self) -> &[ApiMessage] {
        &self.messages
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}

/// One user's chat session: history, step mode, and the completion source.
///
/// Submissions are serialized: while one is pending, another is rejected
/// with `Busy`. A failed submission keeps the history (including the user's
/// message) and re-enables input.
pub struct ChatSession<S> {
    source: S,
    conversation: Conversation,
    cursor: StepCursor,
    in_flight: bool,
    step_mode: bool,
    temperature: f32,
    normalizer: ProbabilityNormalizer,
    grouper: WordGrouper,
    strong_alternative_ratio: f64,
}

impl<S: CompletionSource> ChatSession<S> {
    /// Create a session from a validated config.
    pub fn new(source: S, config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            conversation: Conversation::new(),
            cursor: StepCursor::inactive(),
            in_flight: false,
            step_mode: false,
            temperature: config.temperature,
            normalizer: config.normalizer(),
            grouper: config.grouper(),
            strong_alternative_ratio: config.strong_alternative_ratio,
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Accept a prompt: append it to the history and return the request to
    /// send.
    ///
    /// # Errors
    /// - `Busy` if a submission is already pending.
    /// - `EmptyPrompt` if the prompt is blank.
    pub fn begin_submission(&mut self, prompt: &str) -> Result<PendingSubmission> {
        if self.in_flight {
            return Err(SessionError::Busy);
        }
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(SessionError::EmptyPrompt);
        }

        self.conversation.push(Message::User {
            content: prompt.to_string(),
        });
        self.cursor.reset(0);
        self.in_flight = true;

        info!(
            history = self.conversation.len(),
            temperature = self.temperature,
            "submission started"
        );
        Ok(PendingSubmission {
            messages: self.conversation.api_messages(),
            temperature: self.temperature,
        })
    }

    /// Complete a pending submission with the source's result.
    ///
    /// On success the assistant message is appended and the step cursor
    /// returns to the first token. On failure the error is returned and the
    /// history is left as it was. A reply without tokens counts as a failure
    /// (`MalformedResponse`).
    pub fn finish_submission(
        &mut self,
        _pending: PendingSubmission,
        result: Result<Completion>,
    ) -> Result<&Message> {
        self.in_flight = false;

        let completion = match result {
            Ok(completion) if completion.tokens.is_empty() => {
                let e = SessionError::Ingest(IngestError::MalformedResponse(
                    "reply carries no tokens".to_string(),
                ));
                warn!(error = %e, "submission failed");
                return Err(e);
            }
            Ok(completion) => completion,
            Err(e) => {
                warn!(error = %e, kind = ?e.kind(), "submission failed");
                return Err(e);
            }
        };

        info!(tokens = completion.tokens.len(), "assistant reply received");
        self.cursor.reset(completion.tokens.len());
        self.conversation.push(Message::Assistant {
            content: completion.content,
            tokens: completion.tokens,
        });
        self.conversation
            .messages()
            .last()
            .ok_or(SessionError::NoAssistantMessage)
    }

    /// Submit a prompt and wait for the reply.
    pub async fn submit(&mut self, prompt: &str) -> Result<&Message> {
        let pending = self.begin_submission(prompt)?;
        let result = self
            .source
            .get_completion(pending.messages(), pending.temperature())
            .await;
        self.finish_submission(pending, result)
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Set the sampling temperature for future submissions.
    pub fn set_temperature(&mut self, temperature: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&temperature) {
            return Err(SessionError::InvalidTemperature(temperature));
        }
        self.temperature = temperature;
        Ok(())
    }

    pub fn step_mode(&self) -> bool {
        self.step_mode
    }

    pub fn set_step_mode(&mut self, enabled: bool) {
        self.step_mode = enabled;
    }

    pub fn cursor(&self) -> &StepCursor {
        &self.cursor
    }

    pub fn next_step(&mut self) -> Option<usize> {
        self.cursor.advance()
    }

    pub fn previous_step(&mut self) -> Option<usize> {
        self.cursor.retreat()
    }

    /// Jump to token `index` of the latest reply.
    ///
    /// # Errors
    /// `NoAssistantMessage` before any reply, `OutOfRange` past its end.
    pub fn jump_to_step(&mut self, index: usize) -> Result<usize> {
        if self.last_assistant().is_none() {
            return Err(SessionError::NoAssistantMessage);
        }
        self.cursor.jump_to(index)
    }

    /// The latest message, if it is an assistant reply.
    pub fn last_assistant(&self) -> Option<&Message> {
        self.conversation.last_assistant()
    }

    /// Tokens of the latest reply to show: the revealed prefix in step mode,
    /// all of them otherwise.
    pub fn visible_tokens(&self) -> Option<&[TokenRecord]> {
        let tokens = self.last_assistant()?.tokens();
        if self.step_mode {
            Some(self.cursor.visible(tokens))
        } else {
            Some(tokens)
        }
    }

    /// Word groups over the whole latest reply.
    pub fn word_groups(&self) -> Vec<WordGroup> {
        self.last_assistant()
            .map(|m| self.grouper.group(m.tokens()))
            .unwrap_or_default()
    }

    /// The token under the cursor.
    pub fn current_token(&self) -> Option<&TokenRecord> {
        let position = self.cursor.position()?;
        self.last_assistant()?.tokens().get(position)
    }

    /// Chart data for the current step: the chosen token and its
    /// alternatives, most likely first.
    pub fn current_candidates(&self) -> Option<Vec<(Alternative, bool)>> {
        self.current_token().map(TokenRecord::ranked_candidates)
    }

    pub fn tier(&self, probability: f64) -> ConfidenceTier {
        self.normalizer.classify(probability)
    }

    pub fn has_strong_alternative(&self, record: &TokenRecord) -> bool {
        record.has_strong_alternative(self.strong_alternative_ratio)
    }

    pub fn grouper(&self) -> &WordGrouper {
        &self.grouper
    }

    pub fn marker(&self) -> &SubwordMarker {
        self.grouper.marker()
    }

    pub fn normalizer(&self) -> &ProbabilityNormalizer {
        &self.normalizer
    }

    pub fn strong_alternative_ratio(&self) -> f64 {
        self.strong_alternative_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use ti_ingest::IngestError;

    /// Returns queued results in order.
    struct ScriptedSource {
        replies: Mutex<VecDeque<Result<Completion>>>,
        seen: Mutex<Vec<(Vec<ApiMessage>, f32)>>,
    }

    impl ScriptedSource {
        fn new(replies: Vec<Result<Completion>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn get_completion(
            &self,
            history: &[ApiMessage],
            temperature: f32,
        ) -> Result<Completion> {
            self.seen
                .lock()
                .unwrap()
                .push((history.to_vec(), temperature));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(SessionError::Upstream("no reply scripted".into())))
        }
    }

    fn completion(tokens: &[(&str, f64)]) -> Completion {
        let tokens: Vec<TokenRecord> = tokens
            .iter()
            .map(|(t, p)| TokenRecord {
                token: t.to_string(),
                probability: *p,
                alternatives: Vec::new(),
            })
            .collect();
        Completion {
            content: tokens.iter().map(|t| t.token.replace('Ġ', " ")).collect(),
            tokens,
        }
    }

    fn session(replies: Vec<Result<Completion>>) -> ChatSession<ScriptedSource> {
        ChatSession::new(ScriptedSource::new(replies), &ClientConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_submit_appends_both_messages() {
        let mut s = session(vec![Ok(completion(&[("Hello", 0.9), ("Ġthere", 0.6)]))]);
        let reply = s.submit("  hi  ").await.unwrap();
        assert_eq!(reply.content(), "Hello there");

        assert_eq!(s.messages().len(), 2);
        assert_eq!(s.messages()[0].content(), "hi");
        assert!(!s.is_loading());
        assert_eq!(s.cursor().position(), Some(0));

        let seen = s.source().seen.lock().unwrap();
        assert_eq!(seen[0].0.len(), 1);
        assert_eq!(seen[0].0[0].role, Role::User);
        assert_eq!(seen[0].1, 0.3);
    }

    #[tokio::test]
    async fn test_history_sent_on_second_turn() {
        let mut s = session(vec![
            Ok(completion(&[("A", 0.9)])),
            Ok(completion(&[("B", 0.9)])),
        ]);
        s.submit("one").await.unwrap();
        s.submit("two").await.unwrap();

        let seen = s.source().seen.lock().unwrap();
        let roles: Vec<Role> = seen[1].0.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
    }

    #[test]
    fn test_busy_guard() {
        let mut s = session(vec![]);
        let pending = s.begin_submission("first").unwrap();
        assert!(s.is_loading());
        assert!(matches!(s.begin_submission("second"), Err(SessionError::Busy)));

        let err = s
            .finish_submission(pending, Err(SessionError::Upstream("boom".into())))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamFailure);
        assert!(!s.is_loading());

        // Input is re-enabled after a failure.
        assert!(s.begin_submission("third").is_ok());
    }

    #[test]
    fn test_empty_prompt_rejected() {
        let mut s = session(vec![]);
        assert!(matches!(s.begin_submission("   "), Err(SessionError::EmptyPrompt)));
        assert!(s.messages().is_empty());
        assert!(!s.is_loading());
    }

    #[tokio::test]
    async fn test_empty_reply_rejected() {
        let mut s = session(vec![Ok(Completion {
            content: "Hi".into(),
            tokens: Vec::new(),
        })]);
        let err = s.submit("hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);

        assert_eq!(s.messages().len(), 1);
        assert!(s.last_assistant().is_none());
        assert!(!s.is_loading());
    }

    #[tokio::test]
    async fn test_failure_keeps_history() {
        let mut s = session(vec![
            Ok(completion(&[("A", 0.9)])),
            Err(SessionError::Ingest(IngestError::MergeMismatch("no tokens".into()))),
        ]);
        s.submit("one").await.unwrap();
        let err = s.submit("two").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MergeMismatch);

        let contents: Vec<&str> = s.messages().iter().map(Message::content).collect();
        assert_eq!(contents, vec!["one", "A", "two"]);
        assert!(s.last_assistant().is_none());
        assert!(!s.cursor().is_active());
    }

    #[tokio::test]
    async fn test_new_reply_resets_cursor() {
        let mut s = session(vec![
            Ok(completion(&[("a", 0.9), ("b", 0.8), ("c", 0.7), ("d", 0.6), ("e", 0.5)])),
            Ok(completion(&[("x", 0.9), ("y", 0.8)])),
        ]);
        s.submit("one").await.unwrap();
        s.jump_to_step(3).unwrap();
        assert_eq!(s.cursor().position(), Some(3));

        s.submit("two").await.unwrap();
        assert_eq!(s.cursor().position(), Some(0));
        assert_eq!(s.cursor().len(), 2);
    }

    #[tokio::test]
    async fn test_step_mode_views() {
        let mut s = session(vec![Ok(completion(&[
            ("The", 0.9),
            ("Ġc", 0.5),
            ("at", 0.3),
            (".", 0.8),
        ]))]);
        s.submit("go").await.unwrap();

        assert_eq!(s.visible_tokens().unwrap().len(), 4);

        s.set_step_mode(true);
        assert_eq!(s.visible_tokens().unwrap().len(), 1);
        assert_eq!(s.next_step(), Some(1));
        assert_eq!(s.next_step(), Some(2));
        assert_eq!(s.visible_tokens().unwrap().len(), 3);
        assert_eq!(s.current_token().unwrap().token, "at");
        assert_eq!(s.previous_step(), Some(1));
        assert!(matches!(
            s.jump_to_step(4),
            Err(SessionError::OutOfRange { index: 4, len: 4 })
        ));

        let words: Vec<String> = s.word_groups().into_iter().map(|g| g.text).collect();
        assert_eq!(words, vec!["The", "cat", "."]);

        let candidates = s.current_candidates().unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].1);
    }

    #[test]
    fn test_navigation_without_reply() {
        let mut s = session(vec![]);
        assert_eq!(s.next_step(), None);
        assert_eq!(s.previous_step(), None);
        assert!(matches!(s.jump_to_step(0), Err(SessionError::NoAssistantMessage)));
        assert!(s.visible_tokens().is_none());
        assert!(s.word_groups().is_empty());
        assert!(s.current_candidates().is_none());
    }

    #[test]
    fn test_temperature_bounds() {
        let mut s = session(vec![]);
        assert!(s.set_temperature(0.9).is_ok());
        assert_eq!(s.temperature(), 0.9);
        assert!(matches!(
            s.set_temperature(1.2),
            Err(SessionError::InvalidTemperature(_))
        ));
        assert_eq!(s.temperature(), 0.9);
    }

    #[test]
    fn test_tier_and_strong_alternative() {
        let s = session(vec![]);
        assert_eq!(s.tier(0.75), ConfidenceTier::High);
        assert_eq!(s.tier(0.1), ConfidenceTier::Low);

        let record = TokenRecord {
            token: "cat".into(),
            probability: 0.4,
            alternatives: vec![Alternative {
                token: "dog".into(),
                probability: 0.35,
            }],
        };
        assert!(s.has_strong_alternative(&record));
    }
}
