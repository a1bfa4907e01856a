use async_trait::async_trait;
use tracing::{debug, warn};

use ti_ingest::{Completion, CompletionMerger, ParsedCompletion};
use ti_tokens::SubwordMarker;

use crate::conversation::ApiMessage;
use crate::error::Result;
use crate::relay::RelayRequest;

/// One upstream endpoint that returns a parsed completion.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Returns the relay name for logging.
    fn name(&self) -> &str;

    /// Send one request and normalize the response body.
    async fn fetch(&self, request: &RelayRequest) -> Result<ParsedCompletion>;
}

/// The `get_completion(history, temperature)` contract the session calls.
///
/// Implementations may fan out to more than one relay, but always return a
/// single canonical `Completion` or fail as a whole.
#[async_trait]
pub trait CompletionSource: Send + Sync {
    fn name(&self) -> &str;

    async fn get_completion(&self, history: &[ApiMessage], temperature: f32)
        -> Result<Completion>;
}

#[async_trait]
impl<S: CompletionSource + ?Sized> CompletionSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn get_completion(
        &self,
        history: &[ApiMessage],
        temperature: f32,
    ) -> Result<Completion> {
        (**self).get_completion(history, temperature).await
    }
}

/// A source backed by one relay that returns both text and log-probabilities.
pub struct SingleSource<R> {
    relay: R,
    top_logprobs: u8,
    marker: SubwordMarker,
}

impl<R: Relay> SingleSource<R> {
    pub fn new(relay: R, top_logprobs: u8, marker: SubwordMarker) -> Self {
        Self {
            relay,
            top_logprobs,
            marker,
        }
    }
}

#[async_trait]
impl<R: Relay> CompletionSource for SingleSource<R> {
    fn name(&self) -> &str {
        self.relay.name()
    }

    async fn get_completion(
        &self,
        history: &[ApiMessage],
        temperature: f32,
    ) -> Result<Completion> {
        let request = RelayRequest::new(history.to_vec(), temperature).with_logprobs(self.top_logprobs);
        let parsed = self.relay.fetch(&request).await?;
        Ok(parsed.into_completion(&self.marker)?)
    }
}

/// A source that takes its text from one relay and its token probabilities
/// from another.
///
/// Both calls run concurrently and both must succeed; there is no fallback
/// to a partial result.
pub struct HybridSource<T, P> {
    text: T,
    probe: P,
    top_logprobs: u8,
    merger: CompletionMerger,
}

impl<T: Relay, P: Relay> HybridSource<T, P> {
    pub fn new(text: T, probe: P, top_logprobs: u8, marker: SubwordMarker) -> Self {
        Self {
            text,
            probe,
            top_logprobs,
            merger: CompletionMerger::new(marker),
        }
    }
}

#[async_trait]
impl<T: Relay, P: Relay> CompletionSource for HybridSource<T, P> {
    fn name(&self) -> &str {
        "hybrid"
    }

    async fn get_completion(
        &self,
        history: &[ApiMessage],
        temperature: f32,
    ) -> Result<Completion> {
        let text_request = RelayRequest::new(history.to_vec(), temperature);
        let probe_request = text_request.clone().with_logprobs(self.top_logprobs);

        debug!(text = self.text.name(), probe = self.probe.name(), "fanning out hybrid request");
        let (text, probe) = tokio::try_join!(
            self.text.fetch(&text_request),
            self.probe.fetch(&probe_request)
        )
        .map_err(|e| {
            warn!(error = %e, "hybrid request failed");
            e
        })?;

        Ok(self.merger.merge(text, probe)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use crate::error::SessionError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use ti_ingest::IngestError;
    use ti_tokens::TokenRecord;

    struct FakeRelay {
        name: &'static str,
        reply: std::result::Result<ParsedCompletion, &'static str>,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl FakeRelay {
        fn ok(name: &'static str, text: &str, tokens: Option<Vec<(&str, f64)>>) -> Self {
            Self {
                name,
                reply: Ok(ParsedCompletion {
                    text: text.to_string(),
                    tokens: tokens.map(|ts| {
                        ts.into_iter()
                            .map(|(t, p)| TokenRecord {
                                token: t.to_string(),
                                probability: p,
                                alternatives: Vec::new(),
                            })
                            .collect()
                    }),
                }),
                delay: Duration::ZERO,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing(name: &'static str, msg: &'static str) -> Self {
            Self {
                name,
                reply: Err(msg),
                delay: Duration::ZERO,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl Relay for FakeRelay {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, _request: &RelayRequest) -> Result<ParsedCompletion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match &self.reply {
                Ok(parsed) => Ok(parsed.clone()),
                Err(msg) => Err(SessionError::Upstream(msg.to_string())),
            }
        }
    }

    fn history() -> Vec<ApiMessage> {
        vec![ApiMessage {
            role: Role::User,
            content: "Say hello".to_string(),
        }]
    }

    #[tokio::test]
    async fn test_single_source() {
        let source = SingleSource::new(
            FakeRelay::ok("relay", "Hello there", Some(vec![("Hello", 0.9), ("Ġthere", 0.6)])),
            5,
            SubwordMarker::default(),
        );
        let completion = source.get_completion(&history(), 0.3).await.unwrap();
        assert_eq!(completion.content, "Hello there");
        assert_eq!(completion.tokens.len(), 2);
    }

    #[tokio::test]
    async fn test_boxed_source() {
        let source: Box<dyn CompletionSource> = Box::new(SingleSource::new(
            FakeRelay::ok("relay", "Hi", Some(vec![("Hi", 0.9)])),
            5,
            SubwordMarker::default(),
        ));
        assert_eq!(source.name(), "relay");
        let completion = source.get_completion(&history(), 0.3).await.unwrap();
        assert_eq!(completion.content, "Hi");
    }

    #[tokio::test]
    async fn test_single_source_without_logprobs() {
        let source = SingleSource::new(
            FakeRelay::ok("relay", "Hello there", None),
            5,
            SubwordMarker::default(),
        );
        let err = source.get_completion(&history(), 0.3).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Ingest(IngestError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_single_source_with_empty_tokens() {
        let source = SingleSource::new(
            FakeRelay::ok("relay", "Hello", Some(vec![])),
            5,
            SubwordMarker::default(),
        );
        let err = source.get_completion(&history(), 0.3).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn test_hybrid_merges() {
        let source = HybridSource::new(
            FakeRelay::ok("text", "Hello there", None),
            FakeRelay::ok("probe", "Hi there", Some(vec![("Hi", 0.7), ("Ġthere", 0.8)])),
            5,
            SubwordMarker::default(),
        );
        let completion = source.get_completion(&history(), 0.3).await.unwrap();
        assert_eq!(completion.content, "Hello there");
        assert_eq!(completion.tokens[0].token, "Hi");
    }

    #[tokio::test]
    async fn test_hybrid_empty_probe() {
        let source = HybridSource::new(
            FakeRelay::ok("text", "Hello there", None),
            FakeRelay::ok("probe", "", Some(vec![])),
            5,
            SubwordMarker::default(),
        );
        let err = source.get_completion(&history(), 0.3).await.unwrap_err();
        assert!(matches!(err, SessionError::Ingest(IngestError::MergeMismatch(_))));
    }

    #[tokio::test]
    async fn test_hybrid_fails_when_either_side_fails() {
        let source = HybridSource::new(
            FakeRelay::failing("text", "text relay down"),
            FakeRelay::ok("probe", "Hi", Some(vec![("Hi", 0.7)])),
            5,
            SubwordMarker::default(),
        );
        let err = source.get_completion(&history(), 0.3).await.unwrap_err();
        assert!(matches!(err, SessionError::Upstream(m) if m == "text relay down"));

        let source = HybridSource::new(
            FakeRelay::ok("text", "Hello", None),
            FakeRelay::failing("probe", "probe relay down"),
            5,
            SubwordMarker::default(),
        );
        let err = source.get_completion(&history(), 0.3).await.unwrap_err();
        assert!(matches!(err, SessionError::Upstream(m) if m == "probe relay down"));
    }

    #[tokio::test]
    async fn test_hybrid_calls_run_concurrently() {
        let text = FakeRelay::ok("text", "Hello", None).with_delay(Duration::from_millis(200));
        let probe = FakeRelay::ok("probe", "Hi", Some(vec![("Hi", 0.7)]))
            .with_delay(Duration::from_millis(200));
        let text_calls = text.calls.clone();
        let probe_calls = probe.calls.clone();
        let source = HybridSource::new(text, probe, 5, SubwordMarker::default());

        let start = std::time::Instant::now();
        source.get_completion(&history(), 0.3).await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(390));
        assert_eq!(text_calls.load(Ordering::SeqCst), 1);
        assert_eq!(probe_calls.load(Ordering::SeqCst), 1);
    }
}
