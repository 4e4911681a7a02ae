//! Execution strategies for the per-video download pass.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use tracing::warn;

use super::download::DownloadJob;
use super::error::RetrieveError;
use super::state::{ItemResult, Stage};

/// Work performed for a single video.
pub type ItemTask<'a> = dyn Fn(&DownloadJob) -> ItemResult + Sync + 'a;

/// Strategy for running the per-video task over all jobs.
pub trait DownloadStrategy: Send + Sync {
    /// Run `task` once per job. Results are returned in job order, one per job.
    fn execute(&self, jobs: &[DownloadJob], task: &ItemTask<'_>) -> Vec<ItemResult>;
}

/// Downloads one video at a time.
#[derive(Debug, Default)]
pub struct SequentialStrategy;

impl SequentialStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl DownloadStrategy for SequentialStrategy {
    fn execute(&self, jobs: &[DownloadJob], task: &ItemTask<'_>) -> Vec<ItemResult> {
        jobs.iter().map(|job| run_guarded(task, job)).collect()
    }
}

/// Run `task` for `job`, turning a panic into a failure for that item.
fn run_guarded(task: &ItemTask<'_>, job: &DownloadJob) -> ItemResult {
    match panic::catch_unwind(AssertUnwindSafe(|| task(job))) {
        Ok(result) => result,
        Err(payload) => {
            let reason = panic_reason(payload.as_ref());
            warn!(
                class = %job.class,
                item = %job.entry.id,
                reason = %reason,
                "Download task panicked"
            );
            worker_failure(job, reason)
        }
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panic".to_string()
    }
}

pub(crate) fn worker_failure(job: &DownloadJob, reason: impl Into<String>) -> ItemResult {
    ItemResult::Failed(job.failure(
        Stage::Worker,
        RetrieveError::WorkerPanicked {
            reason: reason.into(),
        },
    ))
}

/// Downloads up to `concurrency` videos at once.
///
/// Workers pull the next unclaimed job from a shared index, so a slow video
/// never holds up a whole batch.
#[derive(Debug)]
pub struct ParallelStrategy {
    /// Maximum number of concurrent downloads.
    pub concurrency: usize,
}

impl ParallelStrategy {
    /// Create a parallel strategy (minimum concurrency 1).
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }
}

impl Default for ParallelStrategy {
    fn default() -> Self {
        Self::new(4)
    }
}

impl DownloadStrategy for ParallelStrategy {
    fn execute(&self, jobs: &[DownloadJob], task: &ItemTask<'_>) -> Vec<ItemResult> {
        let next = AtomicUsize::new(0);
        let workers = self.concurrency.min(jobs.len());

        let finished: Vec<(usize, ItemResult)> = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(|| {
                        let mut done = Vec::new();
                        loop {
                            let index = next.fetch_add(1, Ordering::SeqCst);
                            let Some(job) = jobs.get(index) else {
                                break;
                            };
                            done.push((index, run_guarded(task, job)));
                        }
                        done
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|handle| match handle.join() {
                    Ok(done) => done,
                    Err(_) => {
                        warn!("Download worker panicked");
                        Vec::new()
                    }
                })
                .collect()
        });

        let mut slots: Vec<Option<ItemResult>> = jobs.iter().map(|_| None).collect();
        for (index, result) in finished {
            slots[index] = Some(result);
        }
        slots
            .into_iter()
            .zip(jobs)
            .map(|(slot, job)| {
                slot.unwrap_or_else(|| worker_failure(job, "worker exited before reporting"))
            })
            .collect()
    }
}

/// Pick a strategy for `workers` concurrent downloads.
pub fn strategy_for(workers: usize) -> Box<dyn DownloadStrategy> {
    if workers <= 1 {
        Box::new(SequentialStrategy::new())
    } else {
        Box::new(ParallelStrategy::new(workers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ManifestEntry, OcclusionLevels};
    use crate::retriever::download::TransferOutcome;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Mutex;

    fn jobs(n: usize) -> Vec<DownloadJob> {
        (0..n)
            .map(|i| {
                let entry = ManifestEntry {
                    id: format!("{:03}", i),
                    path: format!("apple/{:03}.zip", i),
                    content_hash: "a".repeat(64),
                    download_size: i as u64,
                    install_size: 0,
                    test_split: false,
                    occlusion_levels: OcclusionLevels::default(),
                    tags: Default::default(),
                };
                DownloadJob::new("apple", &entry, Path::new("/dest"))
            })
            .collect()
    }

    fn echo(job: &DownloadJob) -> ItemResult {
        ItemResult::Done {
            transfer: TransferOutcome::Downloaded {
                bytes: job.entry.download_size,
            },
            extracted: false,
        }
    }

    fn bytes(results: &[ItemResult]) -> Vec<u64> {
        results
            .iter()
            .map(|r| match r {
                ItemResult::Done {
                    transfer: TransferOutcome::Downloaded { bytes },
                    ..
                } => *bytes,
                _ => u64::MAX,
            })
            .collect()
    }

    #[test]
    fn test_sequential_preserves_order() {
        let results = SequentialStrategy::new().execute(&jobs(5), &echo);
        assert_eq!(bytes(&results), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_parallel_runs_every_job_once_in_order() {
        let seen = Mutex::new(Vec::new());
        let task = |job: &DownloadJob| {
            seen.lock().unwrap().push(job.entry.id.clone());
            echo(job)
        };

        let results = ParallelStrategy::new(4).execute(&jobs(20), &task);

        assert_eq!(bytes(&results), (0..20).collect::<Vec<_>>());
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 20);
        assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 20);
    }

    fn panic_on_003(job: &DownloadJob) -> ItemResult {
        if job.entry.id == "003" {
            panic!("decoder blew up on {}", job.entry.id);
        }
        echo(job)
    }

    fn assert_only_003_failed(results: &[ItemResult]) {
        assert_eq!(results.len(), 8);
        let failed: Vec<_> = results
            .iter()
            .filter_map(|r| match r {
                ItemResult::Failed(failure) => Some(failure),
                _ => None,
            })
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].item_id, "003");
        assert_eq!(failed[0].stage, Stage::Worker);
        assert!(failed[0].error.to_string().contains("decoder blew up on 003"));

        let mut expected: Vec<u64> = (0..8).collect();
        expected[3] = u64::MAX;
        assert_eq!(bytes(results), expected);
    }

    #[test]
    fn test_parallel_panicking_task_keeps_every_result() {
        let results = ParallelStrategy::new(2).execute(&jobs(8), &panic_on_003);
        assert_only_003_failed(&results);
    }

    #[test]
    fn test_sequential_panicking_task_keeps_every_result() {
        let results = SequentialStrategy::new().execute(&jobs(8), &panic_on_003);
        assert_only_003_failed(&results);
    }

    #[test]
    fn test_parallel_with_no_jobs() {
        let results = ParallelStrategy::new(4).execute(&[], &echo);
        assert!(results.is_empty());
    }

    #[test]
    fn test_parallel_min_concurrency() {
        assert_eq!(ParallelStrategy::new(0).concurrency, 1);
        assert_eq!(ParallelStrategy::default().concurrency, 4);
    }
}
