pub mod dispatcher;
pub mod sink;

pub use dispatcher::{DispatchHandle, DispatchTask, EventDispatcher, DEFAULT_QUEUE_CAPACITY};
pub use sink::{EventSink, JobContext, MemorySink, RecordedStep, StepHandle, StepPhase, TracingSink};
