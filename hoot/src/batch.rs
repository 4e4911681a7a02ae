//! Shared plumbing for the two concurrent per-item passes.
//!
//! Both the packaging pass and the download pass process independent items on
//! a bounded set of workers. This module provides:
//!
//! - [`CancellationToken`]: checked between items so an interrupted run stops
//!   scheduling new work while in-flight items finish their commit sequence.
//! - [`ProgressCounters`]: atomic counters workers update as items complete.
//! - [`BatchProgressCallback`]: the callback the CLI uses to draw progress.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Progress callback for a batch of items.
///
/// # Arguments
///
/// * `items_done` - Items finished so far (successfully or not)
/// * `total_items` - Items in the batch
/// * `bytes` - Bytes processed so far
pub type BatchProgressCallback = Arc<dyn Fn(usize, usize, u64) + Send + Sync>;

/// Cooperative cancellation flag shared between the caller and workers.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Items already running are allowed to finish.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Atomic progress counters for one batch.
#[derive(Debug)]
pub struct ProgressCounters {
    total_items: usize,
    items_done: AtomicUsize,
    bytes: AtomicU64,
}

impl ProgressCounters {
    /// Create counters for a batch of `total_items`.
    pub fn new(total_items: usize) -> Self {
        Self {
            total_items,
            items_done: AtomicUsize::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    /// Record a finished item and report through the callback, if any.
    pub fn item_finished(&self, bytes: u64, callback: Option<&BatchProgressCallback>) {
        let done = self.items_done.fetch_add(1, Ordering::SeqCst) + 1;
        let total_bytes = self.bytes.fetch_add(bytes, Ordering::SeqCst) + bytes;
        if let Some(cb) = callback {
            cb(done, self.total_items, total_bytes);
        }
    }

    /// Items finished so far.
    pub fn items_done(&self) -> usize {
        self.items_done.load(Ordering::SeqCst)
    }

    /// Bytes processed so far.
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::SeqCst)
    }

    /// Items in the batch.
    pub fn total_items(&self) -> usize {
        self.total_items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_cancellation_token_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_progress_counters_accumulate() {
        let counters = ProgressCounters::new(3);
        counters.item_finished(100, None);
        counters.item_finished(50, None);

        assert_eq!(counters.items_done(), 2);
        assert_eq!(counters.bytes(), 150);
        assert_eq!(counters.total_items(), 3);
    }

    #[test]
    fn test_progress_counters_invoke_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let callback: BatchProgressCallback = Arc::new(move |done, total, bytes| {
            seen_clone.lock().unwrap().push((done, total, bytes));
        });

        let counters = ProgressCounters::new(2);
        counters.item_finished(10, Some(&callback));
        counters.item_finished(5, Some(&callback));

        assert_eq!(*seen.lock().unwrap(), vec![(1, 2, 10), (2, 2, 15)]);
    }

    #[test]
    fn test_progress_counters_are_thread_safe() {
        let counters = Arc::new(ProgressCounters::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counters = Arc::clone(&counters);
                std::thread::spawn(move || counters.item_finished(1, None))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counters.items_done(), 8);
        assert_eq!(counters.bytes(), 8);
    }
}
