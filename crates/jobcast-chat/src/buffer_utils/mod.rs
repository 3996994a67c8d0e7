mod batching;
mod buffering;

pub use batching::{
    FlushPolicy, FlushThresholds, FlushedBatch, TokenBatcher, FIRST_BATCH_MAX_FRAGMENTS,
    FIRST_BATCH_MAX_INTERVAL, STEADY_MAX_FRAGMENTS, STEADY_MAX_INTERVAL,
};
pub use buffering::CircularLineBuffer;
