// src/pipeline/scheduler.rs

//! Rate-limited task scheduler.
//!
//! A single unbounded FIFO is drained by a fixed pool of workers. After each
//! task a worker sleeps for the configured interval before it dequeues again,
//! so `W` workers with interval `T` start at most `W / T` tasks per second no
//! matter how many tasks the running tasks themselves submit.
//!
//! Task failures never leave the worker: errors are logged, panics are caught
//! and logged, and the worker moves on to the next task.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::join_all;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};

/// Producer half of the queue. Cheap to clone; never blocks.
pub struct TaskSender<T> {
    tx: mpsc::UnboundedSender<T>,
    pending: Arc<AtomicUsize>,
}

impl<T> Clone for TaskSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<T> TaskSender<T> {
    /// Enqueue a task. Fails once the scheduler has shut down.
    pub fn submit(&self, task: T) -> Result<()> {
        self.pending.fetch_add(1, Ordering::AcqRel);
        self.tx.send(task).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            AppError::scheduler("task queue is closed")
        })
    }

    /// Number of tasks waiting to be dequeued.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

/// Consumer half of the queue, shared by every worker.
pub struct TaskQueue<T> {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<T>>>,
    pending: Arc<AtomicUsize>,
}

impl<T> Clone for TaskQueue<T> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<T> TaskQueue<T> {
    /// Wait for the next task in FIFO order.
    ///
    /// Returns `None` once the queue is closed and drained. Cancel safe.
    pub async fn next(&self) -> Option<T> {
        let task = self.rx.lock().await.recv().await;
        if task.is_some() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }
        task
    }

    /// Next task if one is queued and no worker is currently waiting.
    pub fn try_next(&self) -> Option<T> {
        let task = self.rx.try_lock().ok()?.try_recv().ok();
        if task.is_some() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }
        task
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Refuse further submissions. Queued tasks stay readable.
    pub async fn close(&self) {
        self.rx.lock().await.close();
    }
}

/// Create a connected sender/queue pair.
pub fn task_queue<T>() -> (TaskSender<T>, TaskQueue<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pending = Arc::new(AtomicUsize::new(0));
    (
        TaskSender {
            tx,
            pending: Arc::clone(&pending),
        },
        TaskQueue {
            rx: Arc::new(Mutex::new(rx)),
            pending,
        },
    )
}

/// Work executed for each dequeued task.
#[async_trait]
pub trait TaskHandler<T: Send + 'static>: Send + Sync {
    async fn handle(&self, task: T) -> Result<()>;
}

/// Fixed worker pool draining a [`TaskQueue`] at a bounded rate.
pub struct RateLimitedScheduler<T> {
    queue: TaskQueue<T>,
    workers: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl<T: Send + 'static> RateLimitedScheduler<T> {
    /// Spawn `workers` workers (at least one) on the current runtime.
    ///
    /// Workers stop dequeuing once `cancel` fires; a task already running is
    /// allowed to finish.
    pub fn start<H>(
        workers: usize,
        interval: Duration,
        queue: TaskQueue<T>,
        handler: Arc<H>,
        cancel: CancellationToken,
    ) -> Self
    where
        H: TaskHandler<T> + 'static,
    {
        let workers = workers.max(1);
        log::info!(
            "Starting {workers} workers, {}ms between tasks per worker",
            interval.as_millis()
        );

        let handles = (0..workers)
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    queue.clone(),
                    Arc::clone(&handler),
                    interval,
                    cancel.clone(),
                ))
            })
            .collect();

        Self {
            queue,
            workers: handles,
            cancel,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Number of queued tasks not yet picked up.
    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    /// Stop the workers, wait for each to exit and close the queue.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for result in join_all(self.workers).await {
            if let Err(e) = result {
                log::error!("Worker exited abnormally: {e}");
            }
        }
        self.queue.close().await;
        log::info!(
            "Scheduler stopped with {} task(s) left in the queue",
            self.queue.pending()
        );
    }
}

async fn worker_loop<T, H>(
    id: usize,
    queue: TaskQueue<T>,
    handler: Arc<H>,
    interval: Duration,
    cancel: CancellationToken,
) where
    T: Send + 'static,
    H: TaskHandler<T> + ?Sized,
{
    loop {
        let task = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            task = queue.next() => match task {
                Some(task) => task,
                None => break,
            },
        };

        match AssertUnwindSafe(handler.handle(task)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::error!("Worker {id}: task failed: {e}"),
            Err(panic) => log::error!("Worker {id}: task panicked: {}", panic_message(&*panic)),
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    log::debug!("Worker {id} stopped");
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    /// Records each task with the instant it started.
    #[derive(Default)]
    struct Recorder {
        seen: std::sync::Mutex<Vec<(u32, Instant)>>,
    }

    impl Recorder {
        fn ids(&self) -> Vec<u32> {
            self.seen.lock().unwrap().iter().map(|(id, _)| *id).collect()
        }

        fn starts(&self) -> Vec<Instant> {
            self.seen.lock().unwrap().iter().map(|(_, at)| *at).collect()
        }
    }

    #[async_trait]
    impl TaskHandler<u32> for Recorder {
        async fn handle(&self, task: u32) -> Result<()> {
            self.seen.lock().unwrap().push((task, Instant::now()));
            match task {
                100 => Err(AppError::validation("bad task")),
                200 => panic!("task exploded"),
                _ => Ok(()),
            }
        }
    }

    /// Submits `task + 1` until it reaches `limit`.
    struct Chain {
        submitter: TaskSender<u32>,
        limit: u32,
        recorder: Recorder,
    }

    #[async_trait]
    impl TaskHandler<u32> for Chain {
        async fn handle(&self, task: u32) -> Result<()> {
            self.recorder.handle(task).await?;
            if task < self.limit {
                self.submitter.submit(task + 1)?;
            }
            Ok(())
        }
    }

    fn start(
        workers: usize,
        interval_secs: u64,
        queue: TaskQueue<u32>,
        recorder: Arc<Recorder>,
    ) -> RateLimitedScheduler<u32> {
        RateLimitedScheduler::start(
            workers,
            Duration::from_secs(interval_secs),
            queue,
            recorder,
            CancellationToken::new(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn single_worker_is_fifo_and_paced() {
        let (tx, queue) = task_queue();
        for id in 0..5 {
            tx.submit(id).unwrap();
        }
        assert_eq!(tx.pending(), 5);

        let recorder = Arc::new(Recorder::default());
        let scheduler = start(1, 3, queue, Arc::clone(&recorder));
        tokio::time::sleep(Duration::from_secs(30)).await;
        scheduler.shutdown().await;

        assert_eq!(recorder.ids(), vec![0, 1, 2, 3, 4]);
        let starts = recorder.starts();
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(3));
        }
        assert_eq!(tx.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pool_never_exceeds_one_task_per_worker_per_interval() {
        let (tx, queue) = task_queue();
        for id in 0..6 {
            tx.submit(id).unwrap();
        }

        let recorder = Arc::new(Recorder::default());
        let origin = Instant::now();
        let scheduler = start(2, 3, queue, Arc::clone(&recorder));
        tokio::time::sleep(Duration::from_secs(30)).await;
        scheduler.shutdown().await;

        let starts = recorder.starts();
        assert_eq!(starts.len(), 6);
        for k in 1..=3u32 {
            let window = Duration::from_secs(3) * k;
            let started = starts.iter().filter(|at| **at - origin < window).count();
            assert!(started <= 2 * k as usize, "{started} starts within {window:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn errors_and_panics_do_not_shrink_the_pool() {
        let (tx, queue) = task_queue();
        for id in [100, 200, 1, 2] {
            tx.submit(id).unwrap();
        }

        let recorder = Arc::new(Recorder::default());
        let scheduler = start(1, 1, queue, Arc::clone(&recorder));
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(recorder.ids(), vec![100, 200, 1, 2]);
        assert_eq!(scheduler.worker_count(), 1);

        tx.submit(3).unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(recorder.ids().last(), Some(&3));
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn running_tasks_can_submit_more_work() {
        let (tx, queue) = task_queue();
        let chain = Arc::new(Chain {
            submitter: tx.clone(),
            limit: 3,
            recorder: Recorder::default(),
        });
        tx.submit(0).unwrap();

        let scheduler = RateLimitedScheduler::start(
            4,
            Duration::from_secs(1),
            queue,
            Arc::clone(&chain),
            CancellationToken::new(),
        );
        tokio::time::sleep(Duration::from_secs(10)).await;
        scheduler.shutdown().await;

        assert_eq!(chain.recorder.ids(), vec![0, 1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_idle_workers_and_rejects_new_work() {
        let (tx, queue) = task_queue::<u32>();
        let recorder = Arc::new(Recorder::default());
        let scheduler = start(3, 1, queue, Arc::clone(&recorder));

        scheduler.shutdown().await;
        assert!(tx.submit(1).is_err());
        assert_eq!(tx.pending(), 0);
        assert!(recorder.ids().is_empty());
    }

    #[tokio::test]
    async fn try_next_drains_without_waiting() {
        let (tx, queue) = task_queue();
        assert_eq!(queue.try_next(), None);
        tx.submit("a").unwrap();
        tx.submit("b").unwrap();
        assert_eq!(queue.try_next(), Some("a"));
        assert_eq!(queue.next().await, Some("b"));
        assert_eq!(queue.pending(), 0);
    }
}
