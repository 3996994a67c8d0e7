//! # Jobcast
//!
//! Streaming chat relay and workflow simulator that translate upstream
//! activity into an ordered trail of progress events.
//!
//! ## Overview
//!
//! Jobcast turns long-running jobs into something a client can watch:
//!
//! - **Relay chat streams** from an OpenAI-compatible proxy, batching
//!   token deltas into progress events
//! - **Guarantee ordering** with a single-writer background dispatcher
//! - **Degrade gracefully**: sink failures and drain timeouts cost
//!   visibility, never correctness
//! - **Simulate workflows** from JSON presets for testing event backends
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jobcast::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Any EventSink works; MemorySink records events in order.
//!     let sink = Arc::new(MemorySink::new());
//!     let job = JobContext::new(sink.clone());
//!
//!     let config = ChatRelayConfig::from_env();
//!     let request = ChatRequest::new(
//!         "gpt-4o",
//!         vec![Message::human("Hello!")],
//!     );
//!
//!     let mut session = ChatSession::new(config, job);
//!     let result = session.run(request).await?;
//!     println!("{}", result.response_text);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Jobcast is organized into focused crates:
//!
//! - **`jobcast-events`**: `EventSink` trait, in-order background dispatcher
//! - **`jobcast-chat`**: SSE chat relay with two-phase token batching
//! - **`jobcast-sim`**: preset-driven multi-agent workflow simulator

pub mod prelude;

pub use jobcast_events::{
    DispatchHandle, DispatchTask, EventDispatcher, EventSink, JobContext, MemorySink,
    RecordedStep, StepHandle, StepPhase, TracingSink,
};

pub use jobcast_chat::{
    ChatRelayConfig, ChatRelayError, ChatRequest, ChatRunResult, ChatSession, Content,
    ContentPart, FlushPolicy, FlushThresholds, Message, TokenBatcher,
};

pub use jobcast_sim::{
    AgentConfig, PhaseConfig, PresetStore, SimError, SimulationRunResult, WorkflowPreset,
    WorkflowSimulator,
};
