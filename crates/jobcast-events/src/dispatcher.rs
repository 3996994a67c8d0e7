use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::sink::EventSink;

/// Default bound for the dispatch queue. The foreground only ever waits on
/// queue capacity, never on sink I/O, so this is generous.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Immutable unit of work: one step write handed to the background worker
#[derive(Debug, Clone)]
pub struct DispatchTask {
    pub step_id: String,
    pub text: String,
}

impl DispatchTask {
    pub fn new(step_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            text: text.into(),
        }
    }
}

/// Token for a submitted task. Completion is observed through
/// [`EventDispatcher::drain`]; the sequence number equals the order the sink
/// will observe the write in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchHandle {
    pub seq: u64,
}

struct QueuedWrite {
    task: DispatchTask,
    done: oneshot::Sender<()>,
}

/// Single-writer background dispatcher for sink step writes
///
/// Exactly one worker task consumes a bounded FIFO queue, so writes reach
/// the sink strictly in submission order without sequence numbers or a
/// reordering buffer at the sink. Sink failures are logged, never raised
/// into the submitting task.
pub struct EventDispatcher {
    tx: mpsc::Sender<QueuedWrite>,
    pending: Vec<oneshot::Receiver<()>>,
    next_seq: u64,
    worker: JoinHandle<()>,
}

impl EventDispatcher {
    /// Spawn the background worker writing to `sink`
    pub fn spawn(sink: Arc<dyn EventSink>, queue_capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<QueuedWrite>(queue_capacity);

        let worker = tokio::spawn(async move {
            while let Some(QueuedWrite { task, done }) = rx.recv().await {
                if let Err(e) = sink.step_started(&task.step_id, &task.text).await {
                    warn!(step_id = %task.step_id, error = %e, "background event write failed");
                } else if let Err(e) = sink.step_finished(&task.step_id, "").await {
                    warn!(step_id = %task.step_id, error = %e, "background event write failed");
                }
                // Receiver may have been dropped by an unforced shutdown.
                let _ = done.send(());
            }
        });

        Self {
            tx,
            pending: Vec::new(),
            next_seq: 0,
            worker,
        }
    }

    /// Enqueue a task for the background worker
    ///
    /// Returns as soon as the task is queued; the await covers queue
    /// capacity only, never the sink round-trip.
    pub async fn submit(&mut self, task: DispatchTask) -> Result<DispatchHandle> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(QueuedWrite {
                task,
                done: done_tx,
            })
            .await
            .map_err(|_| anyhow!("event dispatcher worker is gone"))?;

        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(done_rx);
        Ok(DispatchHandle { seq })
    }

    /// Number of submitted tasks not yet accounted for by a drain
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Wait for every previously submitted task, bounding each wait by
    /// `per_task_timeout`
    ///
    /// A timed-out or dropped write is logged as a warning and does not
    /// abort the remaining waits. Draining twice in a row is a no-op: the
    /// pending list is consumed by the first call.
    pub async fn drain(&mut self, per_task_timeout: Duration) {
        for done in self.pending.drain(..) {
            match tokio::time::timeout(per_task_timeout, done).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    warn!("background event write dropped before completing");
                }
                Err(_) => {
                    warn!(
                        timeout_ms = per_task_timeout.as_millis() as u64,
                        "timed out waiting for background event write"
                    );
                }
            }
        }
    }

    /// Close the queue without waiting for in-flight work
    ///
    /// Already-queued writes complete on the detached worker; nobody waits
    /// for them. Callers needing guaranteed delivery must `drain` first.
    pub fn shutdown(self) {
        drop(self.tx);
        drop(self.worker);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    #[tokio::test]
    async fn test_handles_carry_submission_order() {
        let sink = Arc::new(MemorySink::new());
        let mut dispatcher = EventDispatcher::spawn(sink, DEFAULT_QUEUE_CAPACITY);

        let a = dispatcher
            .submit(DispatchTask::new("s:1", "one"))
            .await
            .unwrap();
        let b = dispatcher
            .submit(DispatchTask::new("s:2", "two"))
            .await
            .unwrap();

        assert_eq!(a.seq, 0);
        assert_eq!(b.seq, 1);
        assert_eq!(dispatcher.pending_count(), 2);

        dispatcher.drain(Duration::from_secs(1)).await;
        assert_eq!(dispatcher.pending_count(), 0);
    }
}
