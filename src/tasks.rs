//! Respond-then-continue task dispatch.
//!
//! HTTP handlers hand work to `BackgroundTasks::spawn` and return at once.
//! Tasks are never cancelled; `wait_idle` lets tests and shutdown observe
//! completion instead of sleeping.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, info_span};

#[derive(Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
    // Held across close/wait/reopen so one waiter cannot reopen the tracker
    // under another.
    waiters: Arc<Mutex<()>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `future` detached from the caller inside a `task` span.
    pub fn spawn<F>(&self, name: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!(task = name, in_flight = self.tracker.len() + 1, "dispatching background task");
        self.tracker.spawn(future.instrument(info_span!("task", name)));
    }

    /// Number of tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every task spawned so far (and any spawned meanwhile) has
    /// finished. The tracker stays usable afterwards. Concurrent callers wait
    /// one after another.
    pub async fn wait_idle(&self) {
        let _turn = self.waiters.lock().await;
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}
