//! Model routing with transparent fallback across equivalent free models.
//!
//! One candidate is active at a time: sequential trial bounds concurrent
//! backend cost and avoids double-billing. A candidate that has already
//! delivered content is never retried elsewhere; partial output is reported
//! as a degraded success so callers never see duplicated answers.

use std::collections::HashMap;
use std::pin::pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use super::adapter::ProviderAdapter;
use super::decoder::{SseDecoder, Utf8StreamDecoder};
use crate::models::{ApiProvider, ModelDescriptor, RegistryHandle};
use crate::types::{ChatCompletion, ChatMessage, StreamEvent, StreamHandler};
use crate::{Error, Result};

/// How one candidate's stream ended.
enum StreamOutcome {
    /// Clean `[DONE]` (or end-of-stream after content).
    Done { message_id: Option<String> },
    /// Cancellation observed; partial content stands.
    Cancelled,
    /// In-band error or transport failure before any terminator.
    Failed { message: String },
}

/// Routes chat requests to provider backends, retrying across the registry's
/// free models of the same backend on recoverable failure.
#[derive(Debug, Clone)]
pub struct ModelRouter {
    http: reqwest::Client,
    registry: Arc<RegistryHandle>,
    adapters: HashMap<ApiProvider, Arc<dyn ProviderAdapter>>,
}

impl ModelRouter {
    pub fn new(http: reqwest::Client, registry: Arc<RegistryHandle>) -> Self {
        Self {
            http,
            registry,
            adapters: HashMap::new(),
        }
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    fn candidates(&self, model_key: &str) -> Vec<ModelDescriptor> {
        let registry = self.registry.current();
        let Some(requested) = registry.resolve(model_key) else {
            return Vec::new();
        };
        let mut list = vec![requested.clone()];
        list.extend(
            registry
                .fallback_candidates(requested)
                .into_iter()
                .cloned(),
        );
        list
    }

    /// Stream a chat response, signaling completion only via the handler.
    ///
    /// Never surfaces a provider's raw error text: exhaustion reports a
    /// generic message, and cancellation always resolves through `on_done`
    /// with whatever partial content exists.
    pub async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        model_key: &str,
        handler: &mut dyn StreamHandler,
        cancel: &CancellationToken,
    ) {
        let candidates = self.candidates(model_key);
        if candidates.is_empty() {
            tracing::warn!(model = model_key, "unknown model requested");
            handler.on_error(&Error::NoModelAvailable.to_string());
            return;
        }

        let mut full = String::new();
        for candidate in &candidates {
            if cancel.is_cancelled() {
                handler.on_done(&full, None);
                return;
            }
            let Some(adapter) = self.adapters.get(&candidate.api_provider) else {
                tracing::warn!(
                    backend = %candidate.api_provider,
                    "no adapter configured for backend"
                );
                continue;
            };

            tracing::debug!(model = %candidate.short_key, backend = adapter.name(), "trying candidate");
            let response = tokio::select! {
                _ = cancel.cancelled() => {
                    handler.on_done(&full, None);
                    return;
                }
                res = adapter.send_stream(&self.http, messages, &candidate.id) => res,
            };
            let response = match response {
                Ok(response) => response,
                Err(err) => {
                    tracing::warn!(
                        model = %candidate.short_key,
                        error = %err,
                        "provider call failed, trying next candidate"
                    );
                    continue;
                }
            };

            match consume_stream(response.bytes_stream(), handler, cancel, &mut full).await {
                StreamOutcome::Done { message_id } => {
                    handler.on_done(&full, message_id.as_deref());
                    return;
                }
                StreamOutcome::Cancelled => {
                    handler.on_done(&full, None);
                    return;
                }
                StreamOutcome::Failed { message } => {
                    if !full.is_empty() {
                        // Content already reached the caller; retrying a
                        // different model would duplicate the partial answer.
                        tracing::warn!(
                            model = %candidate.short_key,
                            error = %message,
                            "stream failed after partial content, completing with partial response"
                        );
                        handler.on_done(&full, None);
                        return;
                    }
                    tracing::warn!(
                        model = %candidate.short_key,
                        error = %message,
                        "stream failed before any content, trying next candidate"
                    );
                }
            }
        }

        handler.on_error(&Error::NoModelAvailable.to_string());
    }

    /// Non-streaming variant: same candidate list, single request/response,
    /// errors only after every candidate is exhausted.
    pub async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        model_key: &str,
    ) -> Result<ChatCompletion> {
        let candidates = self.candidates(model_key);
        if candidates.is_empty() {
            return Err(Error::NoModelAvailable);
        }

        for candidate in &candidates {
            let Some(adapter) = self.adapters.get(&candidate.api_provider) else {
                continue;
            };
            match adapter.send(&self.http, messages, &candidate.id).await {
                Ok(completion) => return Ok(completion),
                Err(err) => {
                    tracing::warn!(
                        model = %candidate.short_key,
                        error = %err,
                        "completion failed, trying next candidate"
                    );
                }
            }
        }

        Err(Error::NoModelAvailable)
    }
}

/// Decode one candidate's byte stream, forwarding chunk content in FIFO
/// order and accumulating it into `full`.
///
/// Generic over the byte source so the cancellation and ordering semantics
/// are testable without a network.
async fn consume_stream<S, E>(
    stream: S,
    handler: &mut dyn StreamHandler,
    cancel: &CancellationToken,
    full: &mut String,
) -> StreamOutcome
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let mut stream = pin!(stream);
    let mut bytes_decoder = Utf8StreamDecoder::new();
    let mut decoder = SseDecoder::new();
    let mut events: Vec<StreamEvent> = Vec::new();

    loop {
        if cancel.is_cancelled() {
            return StreamOutcome::Cancelled;
        }
        let next = tokio::select! {
            _ = cancel.cancelled() => return StreamOutcome::Cancelled,
            item = stream.next() => item,
        };
        match next {
            Some(Ok(bytes)) => {
                let text = bytes_decoder.decode(&bytes);
                decoder.process_chunk(&text, &mut |event| events.push(event));
            }
            Some(Err(err)) => {
                return StreamOutcome::Failed {
                    message: err.to_string(),
                };
            }
            None => {
                let tail = bytes_decoder.finish();
                decoder.process_chunk(&tail, &mut |event| events.push(event));
                decoder.flush(&mut |event| events.push(event));
                if let Some(outcome) = dispatch(&mut events, handler, cancel, full) {
                    return outcome;
                }
                // End of stream without a [DONE] sentinel: content already
                // delivered stands as a completed response.
                return if full.is_empty() {
                    StreamOutcome::Failed {
                        message: "stream ended without data".to_string(),
                    }
                } else {
                    StreamOutcome::Done { message_id: None }
                };
            }
        }
        if let Some(outcome) = dispatch(&mut events, handler, cancel, full) {
            return outcome;
        }
    }
}

fn dispatch(
    events: &mut Vec<StreamEvent>,
    handler: &mut dyn StreamHandler,
    cancel: &CancellationToken,
    full: &mut String,
) -> Option<StreamOutcome> {
    for event in events.drain(..) {
        // A handler may cancel from inside on_chunk; events decoded from the
        // same network read must not be forwarded past that point.
        if cancel.is_cancelled() {
            return Some(StreamOutcome::Cancelled);
        }
        match event {
            StreamEvent::Chunk { content } => {
                full.push_str(&content);
                handler.on_chunk(&content);
            }
            StreamEvent::Title { title } => handler.on_title_update(&title),
            StreamEvent::Done { message_id } => {
                return Some(StreamOutcome::Done { message_id });
            }
            StreamEvent::Error { message } => {
                return Some(StreamOutcome::Failed { message });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::convert::Infallible;

    #[derive(Default)]
    struct RecordingHandler {
        chunks: Vec<String>,
        done: Option<String>,
        errors: Vec<String>,
        titles: Vec<String>,
        cancel_on_chunk: Option<(usize, CancellationToken)>,
    }

    impl StreamHandler for RecordingHandler {
        fn on_chunk(&mut self, text: &str) {
            self.chunks.push(text.to_string());
            if let Some((at, token)) = &self.cancel_on_chunk
                && self.chunks.len() >= *at
            {
                token.cancel();
            }
        }
        fn on_done(&mut self, full_text: &str, _message_id: Option<&str>) {
            assert!(self.done.is_none(), "on_done fired twice");
            self.done = Some(full_text.to_string());
        }
        fn on_error(&mut self, message: &str) {
            self.errors.push(message.to_string());
        }
        fn on_title_update(&mut self, title: &str) {
            self.titles.push(title.to_string());
        }
    }

    fn byte_stream(
        chunks: &[&str],
    ) -> impl Stream<Item = std::result::Result<Bytes, Infallible>> {
        let owned: Vec<std::result::Result<Bytes, Infallible>> = chunks
            .iter()
            .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
            .collect();
        stream::iter(owned)
    }

    #[tokio::test]
    async fn test_consume_stream_clean_done() {
        let mut handler = RecordingHandler::default();
        let mut full = String::new();
        let cancel = CancellationToken::new();
        let outcome = consume_stream(
            byte_stream(&[
                "data: {\"type\":\"chunk\",\"content\":\"Hello\"}\n",
                "data: {\"type\":\"chunk\",\"content\":\" world\"}\ndata: [DONE]\n",
            ]),
            &mut handler,
            &cancel,
            &mut full,
        )
        .await;

        assert!(matches!(outcome, StreamOutcome::Done { .. }));
        assert_eq!(full, "Hello world");
        assert_eq!(handler.chunks, vec!["Hello", " world"]);
        assert!(handler.errors.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_keeps_partial() {
        let cancel = CancellationToken::new();
        let mut handler = RecordingHandler {
            cancel_on_chunk: Some((2, cancel.clone())),
            ..Default::default()
        };
        let mut full = String::new();
        let outcome = consume_stream(
            byte_stream(&[
                "data: {\"type\":\"chunk\",\"content\":\"chunk1\"}\n",
                "data: {\"type\":\"chunk\",\"content\":\"chunk2\"}\n",
                "data: {\"type\":\"chunk\",\"content\":\"chunk3\"}\n",
                "data: [DONE]\n",
            ]),
            &mut handler,
            &cancel,
            &mut full,
        )
        .await;

        assert!(matches!(outcome, StreamOutcome::Cancelled));
        assert_eq!(full, "chunk1chunk2");
        assert!(handler.errors.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_stops_events_within_one_read() {
        // Everything arrives in a single network read; once on_chunk cancels,
        // the rest of the batch must be discarded.
        let cancel = CancellationToken::new();
        let mut handler = RecordingHandler {
            cancel_on_chunk: Some((2, cancel.clone())),
            ..Default::default()
        };
        let mut full = String::new();
        let outcome = consume_stream(
            byte_stream(&[concat!(
                "data: {\"type\":\"chunk\",\"content\":\"chunk1\"}\n",
                "data: {\"type\":\"chunk\",\"content\":\"chunk2\"}\n",
                "data: {\"type\":\"chunk\",\"content\":\"chunk3\"}\n",
                "data: [DONE]\n",
            )]),
            &mut handler,
            &cancel,
            &mut full,
        )
        .await;

        assert!(matches!(outcome, StreamOutcome::Cancelled));
        assert_eq!(full, "chunk1chunk2");
        assert_eq!(handler.chunks, vec!["chunk1", "chunk2"]);
        assert!(handler.errors.is_empty());
    }

    #[tokio::test]
    async fn test_in_band_error_after_content() {
        let mut handler = RecordingHandler::default();
        let mut full = String::new();
        let cancel = CancellationToken::new();
        let outcome = consume_stream(
            byte_stream(&[
                "data: {\"type\":\"chunk\",\"content\":\"partial\"}\n",
                "data: {\"error\":{\"message\":\"upstream fell over\"}}\n",
            ]),
            &mut handler,
            &cancel,
            &mut full,
        )
        .await;

        assert!(matches!(outcome, StreamOutcome::Failed { .. }));
        assert_eq!(full, "partial");
    }

    #[tokio::test]
    async fn test_eof_without_done_after_content_is_success() {
        let mut handler = RecordingHandler::default();
        let mut full = String::new();
        let cancel = CancellationToken::new();
        let outcome = consume_stream(
            byte_stream(&["data: {\"type\":\"chunk\",\"content\":\"tail\"}"]),
            &mut handler,
            &cancel,
            &mut full,
        )
        .await;

        assert!(matches!(outcome, StreamOutcome::Done { message_id: None }));
        assert_eq!(full, "tail");
    }

    #[tokio::test]
    async fn test_empty_stream_is_failure() {
        let mut handler = RecordingHandler::default();
        let mut full = String::new();
        let cancel = CancellationToken::new();
        let outcome = consume_stream(
            byte_stream(&[]),
            &mut handler,
            &cancel,
            &mut full,
        )
        .await;
        assert!(matches!(outcome, StreamOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_title_events_forwarded() {
        let mut handler = RecordingHandler::default();
        let mut full = String::new();
        let cancel = CancellationToken::new();
        consume_stream(
            byte_stream(&[
                "data: {\"type\":\"title\",\"title\":\"My Chat\"}\n",
                "data: {\"type\":\"chunk\",\"content\":\"hi\"}\ndata: [DONE]\n",
            ]),
            &mut handler,
            &cancel,
            &mut full,
        )
        .await;
        assert_eq!(handler.titles, vec!["My Chat"]);
    }

    #[tokio::test]
    async fn test_pre_cancelled_stream_chat_emits_done() {
        let registry = Arc::new(RegistryHandle::builtin());
        let router = ModelRouter::new(reqwest::Client::new(), registry);
        let cancel = CancellationToken::new();
        cancel.cancel();
        cancel.cancel(); // idempotent

        let mut handler = RecordingHandler::default();
        router
            .stream_chat(
                &[ChatMessage::user("hi")],
                "llama-3.3-70b",
                &mut handler,
                &cancel,
            )
            .await;

        assert_eq!(handler.done.as_deref(), Some(""));
        assert!(handler.errors.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_model_reports_generic_error() {
        let registry = Arc::new(RegistryHandle::builtin());
        let router = ModelRouter::new(reqwest::Client::new(), registry);
        let mut handler = RecordingHandler::default();
        router
            .stream_chat(
                &[ChatMessage::user("hi")],
                "no-such-model",
                &mut handler,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(handler.errors.len(), 1);
        assert!(handler.errors[0].contains("No model is currently available"));
        assert!(handler.done.is_none());
    }
}
