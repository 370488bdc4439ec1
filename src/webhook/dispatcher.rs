//! Background execution of handler jobs
//!
//! The request path only enqueues; a single worker drains the queue in order,
//! bounding every job by a timeout and isolating its errors and panics so the
//! response already sent to Meta is never affected.

use super::{errors::WebhookError, registry::HandlerKey};
use crate::metric;
use futures::{FutureExt, future::BoxFuture};
use std::{panic::AssertUnwindSafe, time::Duration};
use tokio::sync::mpsc;
use uuid::Uuid;

/// A pending handler invocation.
pub struct HandlerJob {
    key: HandlerKey,
    delivery_id: Uuid,
    task: BoxFuture<'static, anyhow::Result<()>>,
}

impl HandlerJob {
    pub fn new(
        key: HandlerKey,
        delivery_id: Uuid,
        task: BoxFuture<'static, anyhow::Result<()>>,
    ) -> Self {
        Self {
            key,
            delivery_id,
            task,
        }
    }

    pub fn key(&self) -> &HandlerKey {
        &self.key
    }

    /// Runs the handler inline, without timeout or panic isolation.
    pub async fn run(self) -> anyhow::Result<()> {
        self.task.await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed,
    TimedOut,
    Panicked,
}

/// Sending half of the dispatch queue, cloned into every request handler.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<HandlerJob>,
}

/// Receiving half, driven by [`DispatchWorker::run`].
pub struct DispatchWorker {
    rx: mpsc::Receiver<HandlerJob>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(capacity: usize, timeout: Duration) -> (Self, DispatchWorker) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, DispatchWorker { rx, timeout })
    }

    /// Hands a job to the worker without waiting. A full or closed queue drops
    /// the job.
    pub fn enqueue(&self, job: HandlerJob) -> Result<(), WebhookError> {
        self.tx.try_send(job).map_err(|e| {
            let (reason, job) = match e {
                mpsc::error::TrySendError::Full(job) => ("dispatch queue full", job),
                mpsc::error::TrySendError::Closed(job) => ("dispatch worker stopped", job),
            };
            metric::incr_handler_outcome_statds("dropped");
            WebhookError::HandlerFailure(format!(
                "{reason}, dropped job for {key} of delivery {delivery_id}",
                key = job.key,
                delivery_id = job.delivery_id
            ))
        })
    }
}

impl DispatchWorker {
    /// Executes queued jobs in order until every [`Dispatcher`] is dropped and
    /// the queue is empty.
    pub async fn run(mut self) {
        logfire::info!("dispatch worker started");

        while let Some(job) = self.rx.recv().await {
            execute(job, self.timeout).await;
        }

        logfire::info!("dispatch worker stopped");
    }

    /// Executes whatever is queued right now and returns how many jobs ran.
    #[cfg(test)]
    pub async fn run_pending(&mut self) -> usize {
        let mut executed = 0;
        while let Ok(job) = self.rx.try_recv() {
            execute(job, self.timeout).await;
            executed += 1;
        }
        executed
    }
}

/// Runs one job under `timeout`, logging any failure as a handler failure.
pub async fn execute(job: HandlerJob, timeout: Duration) -> JobOutcome {
    let HandlerJob {
        key,
        delivery_id,
        task,
    } = job;

    let outcome = match tokio::time::timeout(timeout, AssertUnwindSafe(task).catch_unwind()).await
    {
        Ok(Ok(Ok(()))) => JobOutcome::Completed,
        Ok(Ok(Err(e))) => {
            log_failure(&key, delivery_id, &format!("{e:#}"));
            JobOutcome::Failed
        }
        Ok(Err(_)) => {
            log_failure(&key, delivery_id, "handler panicked");
            JobOutcome::Panicked
        }
        Err(_) => {
            log_failure(
                &key,
                delivery_id,
                &format!("handler timed out after {timeout:?}"),
            );
            JobOutcome::TimedOut
        }
    };

    metric::incr_handler_outcome_statds(outcome.as_str());
    outcome
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Completed => "completed",
            JobOutcome::Failed => "failed",
            JobOutcome::TimedOut => "timed_out",
            JobOutcome::Panicked => "panicked",
        }
    }
}

fn log_failure(key: &HandlerKey, delivery_id: Uuid, reason: &str) {
    let error = WebhookError::HandlerFailure(reason.to_string());
    logfire::error!(
        "handler for {key} failed on delivery {delivery_id}: {error}",
        key = key.to_string(),
        delivery_id = delivery_id.to_string(),
        error = error.to_string()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::schemas::ObjectType;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    fn job(task: BoxFuture<'static, anyhow::Result<()>>) -> HandlerJob {
        HandlerJob::new(
            HandlerKey::new(ObjectType::Instagram, "comments"),
            Uuid::new_v4(),
            task,
        )
    }

    async fn failing_handler() -> anyhow::Result<()> {
        anyhow::bail!("boom")
    }

    async fn panicking_handler() -> anyhow::Result<()> {
        panic!("handler bug")
    }

    #[ntex::test]
    async fn test_execute_outcomes() {
        let timeout = Duration::from_millis(50);

        assert_eq!(
            execute(job(async { anyhow::Ok(()) }.boxed()), timeout).await,
            JobOutcome::Completed
        );
        assert_eq!(
            execute(job(failing_handler().boxed()), timeout).await,
            JobOutcome::Failed
        );
        assert_eq!(
            execute(job(panicking_handler().boxed()), timeout).await,
            JobOutcome::Panicked
        );
        assert_eq!(
            execute(
                job(futures::future::pending::<anyhow::Result<()>>().boxed()),
                timeout
            )
            .await,
            JobOutcome::TimedOut
        );
    }

    #[ntex::test]
    async fn test_worker_keeps_order_and_survives_failures() {
        let (dispatcher, worker) = Dispatcher::new(8, Duration::from_millis(50));
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

        for i in 0..4 {
            let seen = seen.clone();
            dispatcher
                .enqueue(job(async move {
                    seen.lock().unwrap().push(i);
                    anyhow::ensure!(i != 1, "handler {i} failed");
                    Ok(())
                }
                .boxed()))
                .unwrap();
        }
        drop(dispatcher);

        worker.run().await;
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[ntex::test]
    async fn test_enqueue_on_full_queue_drops_job() {
        let (dispatcher, mut worker) = Dispatcher::new(1, Duration::from_millis(50));
        let ran = Arc::new(AtomicUsize::new(0));

        let counter = ran.clone();
        assert!(dispatcher
            .enqueue(job(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(())
            }
            .boxed()))
            .is_ok());
        assert!(matches!(
            dispatcher.enqueue(job(async { anyhow::Ok(()) }.boxed())),
            Err(WebhookError::HandlerFailure(_))
        ));

        assert_eq!(worker.run_pending().await, 1);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
