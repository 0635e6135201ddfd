//! Cancelable background tasks scoped to a call (C10).
//!
//! Grounded directly on
//! `infra-common/src/planes/task_management.rs`'s `LayerTaskManager`:
//! tracked `tokio::spawn` plus a `CancellationToken`, narrowed here to one
//! executor per call rather than per layer, with tasks keyed
//! `"<callId>:<taskName>-<unique>"` (spec.md §4.10).

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct TrackedTask {
    key: String,
    handle: JoinHandle<()>,
}

/// Spawns and tracks background tasks for one call (transcript logging,
/// periodic keepalives, rate-limit backoff timers, …), all cancelled
/// together when the call reaches `Ending`.
pub struct CallTaskExecutor {
    call_id: String,
    next_id: AtomicUsize,
    tasks: Arc<Mutex<Vec<TrackedTask>>>,
    cancel_token: CancellationToken,
}

impl CallTaskExecutor {
    pub fn new(call_id: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            next_id: AtomicUsize::new(0),
            tasks: Arc::new(Mutex::new(Vec::new())),
            cancel_token: CancellationToken::new(),
        }
    }

    /// Spawn `future` under `task_name`, cancelable alongside every other
    /// task for this call. Returns the fully qualified task key.
    pub async fn spawn<F>(&self, task_name: &str, future: F) -> String
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let unique = self.next_id.fetch_add(1, Ordering::SeqCst);
        let key = format!("{}:{}-{}", self.call_id, task_name, unique);

        let cancel_token = self.cancel_token.clone();
        let key_for_task = key.clone();
        let wrapped = async move {
            tokio::select! {
                () = future => {
                    debug!(task = %key_for_task, "call task completed");
                }
                () = cancel_token.cancelled() => {
                    debug!(task = %key_for_task, "call task cancelled");
                }
            }
        };

        let handle = tokio::spawn(wrapped);
        self.tasks.lock().await.push(TrackedTask { key: key.clone(), handle });
        key
    }

    /// Spawn a task that is force-aborted if it doesn't finish within
    /// `timeout` (used for tool invocations with an upper time budget).
    pub async fn spawn_with_timeout<F>(&self, task_name: &str, timeout: std::time::Duration, future: F) -> String
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task_name = task_name.to_string();
        let timed = async move {
            if tokio::time::timeout(timeout, future).await.is_err() {
                warn!(task = %task_name, ?timeout, "call task timed out");
            }
        };
        self.spawn("timed", timed).await
    }

    pub fn active_count_hint(&self) -> usize {
        self.next_id.load(Ordering::Relaxed)
    }

    /// Cancel every task spawned for this call. Called when the call
    /// transitions to `Ending` (spec.md §4.10).
    pub fn cancel_all(&self) {
        debug!(call_id = %self.call_id, "cancelling all call tasks");
        self.cancel_token.cancel();
    }

    /// Drop handles for tasks that have already finished.
    pub async fn cleanup_finished(&self) {
        let mut tasks = self.tasks.lock().await;
        tasks.retain(|t| !t.handle.is_finished());
    }
}
