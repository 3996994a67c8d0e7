pub mod buffer_utils;
pub mod client;
pub mod config;
pub mod error;
pub mod session;
pub mod streaming;
pub mod types;

pub use buffer_utils::{CircularLineBuffer, FlushPolicy, FlushThresholds, FlushedBatch, TokenBatcher};
pub use client::ProxyClient;
pub use config::ChatRelayConfig;
pub use error::{ChatRelayError, Result};
pub use session::{ChatRequest, ChatRunResult, ChatSession};
pub use streaming::{ChatStreamChunk, Delta, DeltaContent, DeltaSegment, StreamChoice};
pub use types::{Content, ContentPart, Message};
