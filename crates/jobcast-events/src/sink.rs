use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Core trait for progress-event backends
///
/// A sink accepts "step" writes: a stable step identifier plus a message,
/// emitted as a started/finished pair. Implementations adapt one concrete
/// backend each; callers never branch on sink capability.
///
/// Sink writes are best-effort: callers catch and log failures rather than
/// failing the surrounding session.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Record that a step has started
    async fn step_started(&self, step_id: &str, message: &str) -> Result<()>;

    /// Record that a step has finished
    async fn step_finished(&self, step_id: &str, message: &str) -> Result<()>;
}

/// Open step awaiting its paired finish write
///
/// Returned by `start_step`; consuming it with `finish` emits the closing
/// event for the same step id.
pub struct StepHandle<'a> {
    sink: &'a dyn EventSink,
    step_id: String,
}

impl<'a> StepHandle<'a> {
    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    /// Emit the finished event for this step
    pub async fn finish(self, message: &str) -> Result<()> {
        self.sink.step_finished(&self.step_id, message).await
    }
}

impl dyn EventSink + '_ {
    /// Start a step and return a handle for the paired finish write
    pub async fn start_step(&self, step_id: &str, message: &str) -> Result<StepHandle<'_>> {
        self.step_started(step_id, message).await?;
        Ok(StepHandle {
            sink: self,
            step_id: step_id.to_string(),
        })
    }
}

/// Execution context handed to a job run: the event sink plus the
/// runtime-provided authorization string, if any.
#[derive(Clone)]
pub struct JobContext {
    pub sink: Arc<dyn EventSink>,
    pub job_authorization: Option<String>,
}

impl JobContext {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            job_authorization: None,
        }
    }

    pub fn with_job_authorization(mut self, authorization: impl Into<String>) -> Self {
        self.job_authorization = Some(authorization.into());
        self
    }
}

/// Which half of a step pair a recorded write belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    Started,
    Finished,
}

/// One write observed by a [`MemorySink`], in arrival order
#[derive(Debug, Clone)]
pub struct RecordedStep {
    pub step_id: String,
    pub message: String,
    pub phase: StepPhase,
}

/// In-memory sink recording every write in order
///
/// Doubles as the no-network demo backend and the main test double. An
/// optional per-write delay simulates sink latency; `fail_writes` makes
/// every write error, for exercising best-effort paths.
pub struct MemorySink {
    steps: Mutex<Vec<RecordedStep>>,
    write_delay: Option<Duration>,
    fail_writes: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            steps: Mutex::new(Vec::new()),
            write_delay: None,
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Sleep this long inside every write, simulating sink round-trip latency
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Make every subsequent write fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of all recorded writes, in arrival order
    pub async fn recorded(&self) -> Vec<RecordedStep> {
        self.steps.lock().await.clone()
    }

    /// Step ids of recorded writes, in arrival order (both phases)
    pub async fn step_ids(&self) -> Vec<String> {
        self.steps
            .lock()
            .await
            .iter()
            .map(|s| s.step_id.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.steps.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.steps.lock().await.is_empty()
    }

    async fn record(&self, step_id: &str, message: &str, phase: StepPhase) -> Result<()> {
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("memory sink configured to fail writes");
        }
        self.steps.lock().await.push(RecordedStep {
            step_id: step_id.to_string(),
            message: message.to_string(),
            phase,
        });
        Ok(())
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn step_started(&self, step_id: &str, message: &str) -> Result<()> {
        self.record(step_id, message, StepPhase::Started).await
    }

    async fn step_finished(&self, step_id: &str, message: &str) -> Result<()> {
        self.record(step_id, message, StepPhase::Finished).await
    }
}

/// Sink that writes steps to the `tracing` log stream
pub struct TracingSink;

#[async_trait]
impl EventSink for TracingSink {
    async fn step_started(&self, step_id: &str, message: &str) -> Result<()> {
        tracing::info!(step_id, message, "step started");
        Ok(())
    }

    async fn step_finished(&self, step_id: &str, message: &str) -> Result<()> {
        tracing::info!(step_id, message, "step finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_records_in_order() {
        let sink = MemorySink::new();

        sink.step_started("a", "one").await.unwrap();
        sink.step_finished("a", "two").await.unwrap();

        let recorded = sink.recorded().await;
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].step_id, "a");
        assert_eq!(recorded[0].phase, StepPhase::Started);
        assert_eq!(recorded[1].phase, StepPhase::Finished);
    }

    #[tokio::test]
    async fn test_step_handle_pairs_start_and_finish() {
        let sink = MemorySink::new();
        let dyn_sink: &dyn EventSink = &sink;

        let handle = dyn_sink.start_step("job:setup", "starting").await.unwrap();
        assert_eq!(handle.step_id(), "job:setup");
        handle.finish("done").await.unwrap();

        let recorded = sink.recorded().await;
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].message, "starting");
        assert_eq!(recorded[1].message, "done");
        assert_eq!(recorded[1].step_id, "job:setup");
    }

    #[tokio::test]
    async fn test_failing_sink_errors() {
        let sink = MemorySink::new();
        sink.fail_writes(true);

        assert!(sink.step_started("a", "m").await.is_err());
        assert!(sink.is_empty().await);
    }
}
