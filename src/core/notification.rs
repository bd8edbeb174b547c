//! Job notification bus.
//!
//! Subscribers register a [`JobNotificationHandler`] with the bus owned by a
//! [`JobRunner`](crate::core::JobRunner) and are told about every completed
//! job and every chunk of realtime stdio. A completion notification returns
//! the aggregate of all subscriber votes: if any subscriber asks to abort,
//! the run aborts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::job::{JobInfo, JobMeta};
use crate::core::process::{ProcessCallbackResult, StdBuffers, StdContent};

/// Handle returned by [`JobNotificationBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Receiver of job notifications.
pub trait JobNotificationHandler<A>: Send + Sync {
    /// A job finished (or failed to launch). Return `Abort` to end the run.
    fn on_job_complete(
        &self,
        job: &JobInfo<A>,
        meta: &JobMeta,
        std_content: &StdContent,
    ) -> ProcessCallbackResult;

    /// A running job produced stdio. Informational only.
    fn on_realtime_std_content(&self, _job: &JobInfo<A>, _buffers: &StdBuffers<'_>) {}
}

/// Multi-subscriber channel for job notifications.
pub struct JobNotificationBus<A> {
    handlers: RwLock<Vec<(SubscriptionId, Arc<dyn JobNotificationHandler<A>>)>>,
    next_id: AtomicU64,
}

impl<A> Default for JobNotificationBus<A> {
    fn default() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<A> JobNotificationBus<A> {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`; it receives notifications until unsubscribed.
    pub fn subscribe(&self, handler: Arc<dyn JobNotificationHandler<A>>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().push((id, handler));
        id
    }

    /// Remove a subscription. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != before
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Snapshot so handlers may (un)subscribe from inside a notification.
    fn snapshot(&self) -> Vec<Arc<dyn JobNotificationHandler<A>>> {
        self.handlers
            .read()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect()
    }

    /// Tell every subscriber a job completed and aggregate their votes.
    ///
    /// Every subscriber is notified even after one has voted to abort.
    pub fn notify_job_complete(
        &self,
        job: &JobInfo<A>,
        meta: &JobMeta,
        std_content: &StdContent,
    ) -> ProcessCallbackResult {
        self.snapshot()
            .iter()
            .map(|handler| handler.on_job_complete(job, meta, std_content))
            .fold(ProcessCallbackResult::Continue, |aggregate, vote| {
                if vote == ProcessCallbackResult::Abort {
                    ProcessCallbackResult::Abort
                } else {
                    aggregate
                }
            })
    }

    /// Forward realtime stdio to every subscriber.
    pub fn notify_realtime_std_content(&self, job: &JobInfo<A>, buffers: &StdBuffers<'_>) {
        for handler in self.snapshot() {
            handler.on_realtime_std_content(job, buffers);
        }
    }
}
