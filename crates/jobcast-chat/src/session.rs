//! Session driver: owns the stream loop and the full lifecycle of one
//! streamed chat run.
//!
//! One foreground task reads the upstream SSE stream, feeds fragments to
//! the batcher, and submits ready batches to the single-writer dispatcher;
//! the dispatcher's lone background task performs the sink round-trips.
//! Sink writes therefore never backpressure upstream token consumption,
//! while the single consumer keeps them in flush order end to end.

use std::time::Instant;

use futures::StreamExt;
use jobcast_events::{DispatchTask, EventDispatcher, EventSink, JobContext};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::buffer_utils::{CircularLineBuffer, TokenBatcher};
use crate::client::{classify_transport_error, ProxyClient};
use crate::config::ChatRelayConfig;
use crate::error::{truncate_message, ChatRelayError, Result, EVENT_MESSAGE_LIMIT};
use crate::streaming::ChatStreamChunk;
use crate::types::Message;

/// Marker prefix telling sink consumers a step message is latency metadata
pub const LATENCY_META_PREFIX: &str = "__latency_meta__:";

/// One streamed chat request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Summary returned when a streamed run completes
#[derive(Debug, Clone, Serialize)]
pub struct ChatRunResult {
    pub model: String,
    /// Concatenated fragment text, trimmed
    pub response_text: String,
    /// Non-empty fragments received from upstream
    pub chunks_emitted: u64,
    /// Token batches written to the sink
    pub batches_flushed: u64,
    /// Whitespace word-count estimate (minimum 1 per non-empty fragment,
    /// summed over the session). An approximation, not a tokenizer count.
    pub approx_tokens_emitted: u64,
    /// Sink events emitted (start/finish both count), tallied at
    /// submission time
    pub total_events: u64,
    pub elapsed_seconds: f64,
}

/// Drives one streamed chat run end to end
///
/// Opens the upstream stream, translates deltas into batched token events,
/// emits lifecycle and latency markers inline, drains the dispatcher, and
/// assembles the result, or a classified [`ChatRelayError`].
pub struct ChatSession {
    config: ChatRelayConfig,
    job: JobContext,
    event_count: u64,
}

impl ChatSession {
    pub fn new(config: ChatRelayConfig, job: JobContext) -> Self {
        Self {
            config,
            job,
            event_count: 0,
        }
    }

    /// Run a streaming chat request to completion
    ///
    /// On failure a best-effort `chat:error` step (length-capped) is
    /// written before the classified error is returned; partial response
    /// text is not surfaced on the error path.
    pub async fn run(&mut self, request: ChatRequest) -> Result<ChatRunResult> {
        let started = Instant::now();
        self.event_count = 0;

        match self.run_inner(&request, started).await {
            Ok(result) => Ok(result),
            Err(err) => {
                error!(code = err.code(), error = %err, "chat session failed");
                let mut message = format!("{}: {}", err.code(), err);
                if let ChatRelayError::UpstreamHttp {
                    call_id: Some(call_id),
                    ..
                } = &err
                {
                    message.push_str(&format!(" (call_id={call_id})"));
                }
                self.emit_error_event(&message).await;
                Err(err)
            }
        }
    }

    async fn run_inner(&mut self, request: &ChatRequest, started: Instant) -> Result<ChatRunResult> {
        // Credential resolution happens before any network call.
        let token = ProxyClient::resolve_bearer_token(&self.config, &self.job)?;
        let client = ProxyClient::new(&self.config)?;
        let payload = ProxyClient::build_chat_payload(request)?;

        // If an error propagates past this point, the dispatcher is dropped
        // without a drain: queued writes finish detached, nobody waits.
        let mut dispatcher = EventDispatcher::spawn(self.job.sink.clone(), self.config.queue_capacity);
        let mut batcher = TokenBatcher::new(self.config.flush_policy());

        self.emit_latency_marker(
            "chat:latency:request-dispatch",
            "Outbound request dispatched to upstream proxy",
            &[],
        )
        .await;
        self.emit_step_started(
            "chat:request",
            &format!("Submitting chat request to model '{}'", request.model),
        )
        .await;

        let response = client.open_chat_stream(&token, &payload).await?;

        self.emit_step_finished("chat:request", "Chat request accepted by upstream proxy")
            .await;
        self.emit_latency_marker(
            "chat:latency:upstream-accepted",
            "Upstream proxy accepted the chat request",
            &[],
        )
        .await;
        self.emit_step_started("chat:response", "Streaming model response")
            .await;

        let mut chunks_emitted: u64 = 0;
        let mut approx_tokens_emitted: u64 = 0;
        let mut response_fragments: Vec<String> = Vec::new();
        let mut first_delta_seen = false;
        let mut first_batch_flushed = false;

        let mut byte_stream = response.bytes_stream();
        let mut lines = CircularLineBuffer::with_capacity(8192);

        'stream: while let Some(chunk) = byte_stream.next().await {
            let bytes = chunk.map_err(classify_transport_error)?;
            lines.extend(&bytes);

            while let Some(line) = lines.next_line() {
                if line.is_empty() {
                    continue;
                }
                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();
                if data == "[DONE]" {
                    break 'stream;
                }

                let payload: Value = match serde_json::from_str(data) {
                    Ok(payload) => payload,
                    Err(_) => {
                        warn!(
                            snippet = %truncate_message(data, 120),
                            "skipping non-JSON stream chunk"
                        );
                        continue;
                    }
                };

                let chunk = ChatStreamChunk::parse(&payload);
                let delta = chunk.delta_text();

                if !delta.is_empty() {
                    if !first_delta_seen {
                        first_delta_seen = true;
                        self.emit_latency_marker(
                            "chat:latency:first-upstream-delta",
                            "First upstream delta received from model stream",
                            &[],
                        )
                        .await;
                    }

                    chunks_emitted += 1;
                    approx_tokens_emitted += approx_token_count(&delta);
                    response_fragments.push(delta.clone());

                    batcher.push(delta);
                    if batcher.should_flush(Instant::now()) {
                        self.flush_batch(&mut batcher, &mut dispatcher, &mut first_batch_flushed)
                            .await;
                    }
                }

                // Some providers close with a finish_reason instead of (or
                // before) the sentinel line.
                if chunk.is_done() {
                    break 'stream;
                }
            }
        }

        // Flush whatever is left, then wait for the background writes
        // before closing the response step.
        self.flush_batch(&mut batcher, &mut dispatcher, &mut first_batch_flushed)
            .await;
        dispatcher.drain(self.config.per_write_drain_timeout).await;

        self.emit_step_finished(
            "chat:response",
            &format!("Completed streaming {chunks_emitted} chunks"),
        )
        .await;
        self.emit_step("chat:complete", "Chat response finalized").await;

        let response_text = response_fragments.concat().trim().to_string();
        info!(
            chunks_emitted,
            batches_flushed = batcher.batches_flushed(),
            "chat stream completed"
        );

        Ok(ChatRunResult {
            model: request.model.clone(),
            response_text,
            chunks_emitted,
            batches_flushed: batcher.batches_flushed(),
            approx_tokens_emitted,
            total_events: self.event_count,
            elapsed_seconds: started.elapsed().as_secs_f64(),
        })
    }

    /// Submit a background write for all buffered fragment text
    ///
    /// The very first flush additionally emits the one-time first-batch
    /// marker, before the batch itself is dispatched.
    async fn flush_batch(
        &mut self,
        batcher: &mut TokenBatcher,
        dispatcher: &mut EventDispatcher,
        first_batch_flushed: &mut bool,
    ) {
        if batcher.is_empty() {
            return;
        }
        if !*first_batch_flushed {
            *first_batch_flushed = true;
            self.emit_latency_marker(
                "chat:latency:first-batch",
                "First token batch emitted to progress events",
                &[("batch_num", serde_json::json!(1))],
            )
            .await;
        }

        let Some(batch) = batcher.flush(Instant::now()) else {
            return;
        };
        self.event_count += 2; // start + finish
        let step_id = format!("chat:tokens:{}", batch.seq);
        if let Err(e) = dispatcher.submit(DispatchTask::new(step_id, batch.text)).await {
            warn!(error = %e, "failed to queue token batch write");
        }
    }

    /// Emit a lightweight latency marker step with JSON metadata
    async fn emit_latency_marker(&mut self, step_id: &str, label: &str, extra: &[(&str, Value)]) {
        let mut payload = serde_json::Map::new();
        payload.insert("label".to_string(), Value::String(label.to_string()));
        payload.insert(
            "server_emit_ts_ms".to_string(),
            serde_json::json!(chrono::Utc::now().timestamp_millis()),
        );
        for (key, value) in extra {
            payload.insert((*key).to_string(), value.clone());
        }

        let message = format!("{}{}", LATENCY_META_PREFIX, Value::Object(payload));
        self.emit_step(step_id, &message).await;
    }

    /// Best-effort error step for easier remote diagnosis
    async fn emit_error_event(&mut self, message: &str) {
        let safe = truncate_message(message, EVENT_MESSAGE_LIMIT);
        self.emit_step("chat:error", &safe).await;
    }

    /// Start + finish pair emitted inline; failures degrade visibility only
    async fn emit_step(&mut self, step_id: &str, message: &str) {
        self.event_count += 2;
        let sink: &dyn EventSink = self.job.sink.as_ref();
        match sink.start_step(step_id, message).await {
            Ok(step) => {
                if let Err(e) = step.finish("").await {
                    warn!(step_id, error = %e, "event sink write failed");
                }
            }
            Err(e) => warn!(step_id, error = %e, "event sink write failed"),
        }
    }

    async fn emit_step_started(&mut self, step_id: &str, message: &str) {
        self.event_count += 1;
        if let Err(e) = self.job.sink.step_started(step_id, message).await {
            warn!(step_id, error = %e, "event sink write failed");
        }
    }

    async fn emit_step_finished(&mut self, step_id: &str, message: &str) {
        self.event_count += 1;
        if let Err(e) = self.job.sink.step_finished(step_id, message).await {
            warn!(step_id, error = %e, "event sink write failed");
        }
    }
}

/// Whitespace word count, minimum 1; called only on non-empty fragments
fn approx_token_count(fragment: &str) -> u64 {
    (fragment.split_whitespace().count() as u64).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approx_token_count_floor() {
        assert_eq!(approx_token_count("one two three"), 3);
        assert_eq!(approx_token_count(","), 1);
        assert_eq!(approx_token_count("   "), 1);
    }

    #[test]
    fn test_request_builder() {
        let request = ChatRequest::new("gpt-4o", vec![Message::human("hi")])
            .temperature(0.5)
            .max_tokens(64);
        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.temperature, Some(0.5));
        assert_eq!(request.max_tokens, Some(64));
    }
}
