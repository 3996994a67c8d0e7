//! Prelude module for convenient imports
//!
//! Import everything you need with:
//! ```rust
//! use jobcast::prelude::*;
//! ```

pub use crate::{
    ChatRelayConfig, ChatRelayError, ChatRequest, ChatRunResult, ChatSession, Content,
    ContentPart, EventDispatcher, EventSink, JobContext, MemorySink, Message, PresetStore,
    SimulationRunResult, StepPhase, TracingSink, WorkflowPreset, WorkflowSimulator,
};
