//! Bounded Task Queue
//!
//! FIFO queue of asynchronous work items executed by a fixed pool of
//! workers. Used to cap how many upstream fetches run at once.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, warn};

use crate::error::{AppError, Result};

type WorkFn<I, O> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<O>> + Send + Sync>;

struct QueuedTask<I, O> {
    input: I,
    completion: oneshot::Sender<Result<O>>,
}

// == Task Queue ==
/// Runs submitted inputs through a shared work function with at most
/// `concurrency` executions in flight.
///
/// Tasks start in submission order. Each worker waits the configured
/// `delay` before calling the work function, standing in for network or
/// database latency. A failing or panicking task only affects the caller
/// that submitted it.
///
/// Dropping the queue closes it: workers finish whatever was already
/// submitted and then exit.
pub struct TaskQueue<I, O> {
    sender: mpsc::UnboundedSender<QueuedTask<I, O>>,
    pending: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    concurrency: usize,
}

impl<I, O> TaskQueue<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    // == Constructor ==
    /// Creates the queue and spawns its workers on the current runtime.
    ///
    /// # Arguments
    /// * `work` - Function run for every dequeued input
    /// * `concurrency` - Number of workers (values below 1 are raised to 1)
    /// * `delay` - Fixed wait before each call to `work`
    pub fn new<F, Fut>(work: F, concurrency: usize, delay: Duration) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        let concurrency = concurrency.max(1);
        let work: WorkFn<I, O> =
            Arc::new(move |input: I| -> BoxFuture<'static, Result<O>> { Box::pin(work(input)) });
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver = Arc::new(Mutex::new(receiver));
        let pending = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));

        for worker_id in 0..concurrency {
            let worker = Worker {
                id: worker_id,
                receiver: Arc::clone(&receiver),
                work: Arc::clone(&work),
                delay,
                pending: Arc::clone(&pending),
                active: Arc::clone(&active),
            };
            tokio::spawn(worker.run());
        }

        debug!(concurrency, delay_ms = delay.as_millis() as u64, "task queue started");

        Self {
            sender,
            pending,
            active,
            concurrency,
        }
    }

    // == Enqueue ==
    /// Submits `input` and waits for its result.
    pub async fn enqueue(&self, input: I) -> Result<O> {
        let (completion, result) = oneshot::channel();

        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(QueuedTask { input, completion }).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(AppError::Internal("task queue is closed".to_string()));
        }

        result
            .await
            .map_err(|_| AppError::Internal("task dropped before completion".to_string()))?
    }

    /// Tasks submitted but not yet claimed by a worker.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Workers currently executing a task.
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }
}

// == Worker ==
struct Worker<I, O> {
    id: usize,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<QueuedTask<I, O>>>>,
    work: WorkFn<I, O>,
    delay: Duration,
    pending: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
}

impl<I, O> Worker<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    async fn run(self) {
        loop {
            // The receiver lock is fair, so idle workers claim tasks in turn
            // and tasks start in FIFO order.
            let next = {
                let mut receiver = self.receiver.lock().await;
                receiver.recv().await
            };
            let Some(task) = next else {
                break;
            };

            self.pending.fetch_sub(1, Ordering::SeqCst);
            self.active.fetch_add(1, Ordering::SeqCst);

            let result = self.execute(task.input).await;

            self.active.fetch_sub(1, Ordering::SeqCst);
            if task.completion.send(result).is_err() {
                debug!(worker = self.id, "task submitter went away before completion");
            }
        }
        debug!(worker = self.id, "task queue worker stopped");
    }

    /// Runs one task in its own tokio task so a panic in the work function
    /// is reported to the submitter instead of taking the worker down.
    async fn execute(&self, input: I) -> Result<O> {
        let work = Arc::clone(&self.work);
        let delay = self.delay;

        let handle = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            work(input).await
        });

        match handle.await {
            Ok(result) => result,
            Err(e) => {
                warn!(worker = self.id, error = %e, "queued task aborted");
                Err(AppError::Upstream(format!("queued task aborted: {}", e)))
            }
        }
    }
}
