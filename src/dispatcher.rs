//! Bounded worker pool that fans file transfers out to a fixed number of
//! concurrent workers and folds their outcomes into a single report.
//!
//! All jobs are loaded into a sealed queue before the first worker starts.
//! Workers claim jobs through an atomic cursor, so every job is handed to
//! exactly one worker. Outcomes are sent to a fan-in channel that is only
//! drained after every worker has been joined.

use crate::config::DispatchConfig;
use crate::error::TransferError;
use crate::transfer::{self, Transferrer};
use futures::future::join_all;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// A single file scheduled for transfer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Job {
    path: PathBuf,
}

impl Job {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl From<PathBuf> for Job {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Result of attempting one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub job: Job,
    pub error: Option<TransferError>,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn diagnostic(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.diagnostic.as_str())
    }
}

/// Aggregate tally for a finished batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    /// Jobs handed to the dispatcher
    pub total: usize,

    /// Jobs that did not complete successfully
    pub failed: usize,
}

/// How a batch ended, from the user's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every job succeeded, or there were no jobs
    AllSucceeded,
    /// Some, but not all, jobs failed
    Partial { failed: usize },
    /// Every job failed
    AllFailed { failed: usize },
}

impl BatchReport {
    /// Build a report from the outcomes that were actually recorded. Jobs
    /// without an outcome count as failed.
    pub fn from_outcomes(total: usize, outcomes: &[TransferOutcome]) -> Self {
        let failed_outcomes = outcomes.iter().filter(|o| !o.is_success()).count();
        let missing = total.saturating_sub(outcomes.len());

        Self {
            total,
            failed: (failed_outcomes + missing).min(total),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.total.saturating_sub(self.failed)
    }

    pub fn completion(&self) -> Completion {
        match self.failed {
            0 => Completion::AllSucceeded,
            failed if failed == self.total => Completion::AllFailed { failed },
            failed => Completion::Partial { failed },
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Fixed set of jobs with claim-once semantics. Nothing can be added after
/// construction.
struct JobQueue {
    jobs: Box<[Job]>,
    next: AtomicUsize,
}

impl JobQueue {
    fn sealed(jobs: Vec<Job>) -> Self {
        Self {
            jobs: jobs.into_boxed_slice(),
            next: AtomicUsize::new(0),
        }
    }

    /// Hand out the next unclaimed job, or `None` once exhausted
    fn claim(&self) -> Option<&Job> {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        self.jobs.get(index)
    }

    fn len(&self) -> usize {
        self.jobs.len()
    }
}

/// Runs batches of transfers on a bounded pool of tokio tasks
pub struct Dispatcher<T: ?Sized> {
    transferrer: Arc<T>,
}

impl<T> Dispatcher<T>
where
    T: Transferrer + ?Sized + 'static,
{
    pub fn new(transferrer: Arc<T>) -> Self {
        Self { transferrer }
    }

    /// Attempt every job exactly once and wait for all workers to finish.
    ///
    /// Individual failures are counted, never propagated. There is no retry
    /// and no cancellation: a hung transfer holds its worker until it
    /// returns.
    pub async fn run(&self, jobs: Vec<Job>, config: &DispatchConfig) -> BatchReport {
        let batch_id = Uuid::new_v4();
        let span = info_span!("batch", id = %batch_id, peer = %config.target);

        let queue = Arc::new(JobQueue::sealed(jobs));
        let total = queue.len();
        let (tx, mut rx) = mpsc::unbounded_channel::<TransferOutcome>();

        span.in_scope(|| {
            info!(
                jobs = total,
                workers = config.workers.get(),
                simulate = config.simulate,
                "Starting batch"
            )
        });

        let handles: Vec<_> = (0..config.workers.get())
            .map(|worker_id| {
                let worker = Worker {
                    id: worker_id,
                    queue: Arc::clone(&queue),
                    transferrer: Arc::clone(&self.transferrer),
                    target: config.target.clone(),
                    simulate: config.simulate,
                    outcomes: tx.clone(),
                };
                let worker_span = info_span!(parent: &span, "worker", id = worker_id);
                tokio::spawn(worker.run().instrument(worker_span))
            })
            .collect();

        // Only the workers hold senders from here on.
        drop(tx);

        for (worker_id, joined) in join_all(handles).await.into_iter().enumerate() {
            if let Err(e) = joined {
                span.in_scope(|| error!(worker = worker_id, error = %e, "Worker terminated abnormally"));
            }
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }

        let report = BatchReport::from_outcomes(total, &outcomes);
        span.in_scope(|| info!(total = report.total, failed = report.failed, "Batch finished"));
        report
    }
}

struct Worker<T: ?Sized> {
    id: usize,
    queue: Arc<JobQueue>,
    transferrer: Arc<T>,
    target: String,
    simulate: bool,
    outcomes: mpsc::UnboundedSender<TransferOutcome>,
}

impl<T> Worker<T>
where
    T: Transferrer + ?Sized,
{
    async fn run(self) {
        let mut handled = 0usize;

        while let Some(job) = self.queue.claim() {
            let result =
                transfer::invoke(self.transferrer.as_ref(), job.path(), &self.target, self.simulate).await;

            if let Err(e) = &result {
                eprintln!("Error: {}", e);
                warn!(path = %job, diagnostic = %e.diagnostic, "Transfer failed");
            }

            let outcome = TransferOutcome {
                job: job.clone(),
                error: result.err(),
            };
            // The receiver outlives every worker.
            let _ = self.outcomes.send(outcome);
            handled += 1;
        }

        debug!(worker = self.id, handled, "Job queue exhausted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every call; fails paths containing "bad"
    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<PathBuf>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl Transferrer for Recording {
        async fn transfer(&self, path: &Path, _target: &str) -> Result<(), TransferError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            self.seen.lock().unwrap().push(path.to_path_buf());
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if path.to_string_lossy().contains("bad") {
                Err(TransferError::new(path, "simulated failure"))
            } else {
                Ok(())
            }
        }
    }

    fn jobs(names: &[&str]) -> Vec<Job> {
        names.iter().map(|n| Job::new(*n)).collect()
    }

    fn config(workers: usize, simulate: bool) -> DispatchConfig {
        DispatchConfig::new(workers, "nas", simulate).unwrap()
    }

    #[tokio::test]
    async fn test_all_jobs_succeed() {
        let transferrer = Arc::new(Recording::default());
        let dispatcher = Dispatcher::new(Arc::clone(&transferrer));

        let report = dispatcher
            .run(jobs(&["a.mp3", "b.mp3", "c.mp3"]), &config(5, false))
            .await;

        assert_eq!(report, BatchReport { total: 3, failed: 0 });
        assert_eq!(report.completion(), Completion::AllSucceeded);
        assert_eq!(transferrer.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_all_jobs_fail() {
        let transferrer = Arc::new(Recording::default());
        let dispatcher = Dispatcher::new(transferrer);

        let report = dispatcher
            .run(jobs(&["bad1", "bad2", "bad3"]), &config(5, false))
            .await;

        assert_eq!(report, BatchReport { total: 3, failed: 3 });
        assert_eq!(report.completion(), Completion::AllFailed { failed: 3 });
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_other_jobs() {
        let transferrer = Arc::new(Recording::default());
        let dispatcher = Dispatcher::new(Arc::clone(&transferrer));

        let report = dispatcher
            .run(jobs(&["bad.mp3", "a.mp3", "bad2.mp3", "b.mp3"]), &config(1, false))
            .await;

        assert_eq!(report, BatchReport { total: 4, failed: 2 });
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.completion(), Completion::Partial { failed: 2 });
        assert_eq!(transferrer.seen.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let transferrer = Arc::new(Recording::default());
        let dispatcher = Dispatcher::new(Arc::clone(&transferrer));

        let report = dispatcher.run(Vec::new(), &config(5, false)).await;

        assert_eq!(report, BatchReport { total: 0, failed: 0 });
        assert_eq!(report.completion(), Completion::AllSucceeded);
        assert!(transferrer.seen.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_every_job_claimed_exactly_once() {
        for (workers, count) in [(1, 0), (1, 7), (3, 2), (4, 50), (16, 9)] {
            let transferrer = Arc::new(Recording::default());
            let dispatcher = Dispatcher::new(Arc::clone(&transferrer));
            let batch: Vec<Job> = (0..count).map(|i| Job::new(format!("f{}.mp3", i))).collect();

            let report = dispatcher.run(batch.clone(), &config(workers, false)).await;
            assert_eq!(report.total, count);
            assert_eq!(report.failed, 0);

            let seen = transferrer.seen.lock().unwrap();
            assert_eq!(seen.len(), count);
            let unique: HashSet<_> = seen.iter().collect();
            assert_eq!(unique.len(), count);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded_by_worker_count() {
        let transferrer = Arc::new(Recording {
            delay: Some(Duration::from_millis(20)),
            ..Default::default()
        });
        let dispatcher = Dispatcher::new(Arc::clone(&transferrer));
        let batch: Vec<Job> = (0..12).map(|i| Job::new(format!("f{}.mp3", i))).collect();

        let report = dispatcher.run(batch, &config(3, false)).await;

        assert_eq!(report, BatchReport { total: 12, failed: 0 });
        let max = transferrer.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 3, "observed {} concurrent transfers", max);
        assert!(max >= 2, "workers never overlapped");
    }

    #[tokio::test]
    async fn test_simulation_never_transfers() {
        let transferrer = Arc::new(Recording::default());
        let dispatcher = Dispatcher::new(Arc::clone(&transferrer));

        let report = dispatcher
            .run(jobs(&["bad1", "bad2", "ok"]), &config(2, true))
            .await;

        assert_eq!(report, BatchReport { total: 3, failed: 0 });
        assert!(transferrer.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_missing_outcomes_count_as_failures() {
        let outcomes = vec![TransferOutcome {
            job: Job::new("a.mp3"),
            error: None,
        }];

        let report = BatchReport::from_outcomes(3, &outcomes);
        assert_eq!(report, BatchReport { total: 3, failed: 2 });
    }

    #[test]
    fn test_succeeded_never_underflows() {
        assert_eq!(BatchReport { total: 4, failed: 1 }.succeeded(), 3);
        assert_eq!(BatchReport { total: 2, failed: 5 }.succeeded(), 0);
    }

    #[test]
    fn test_outcome_diagnostic() {
        let outcome = TransferOutcome {
            job: Job::new("a.mp3"),
            error: Some(TransferError::new("a.mp3", "offline")),
        };
        assert!(!outcome.is_success());
        assert_eq!(outcome.diagnostic(), Some("offline"));
    }
}
