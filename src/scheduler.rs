// src/scheduler.rs

use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use std::time::{Duration, Instant};

use scheduled_thread_pool::{JobHandle, ScheduledThreadPool};
use tracing::{debug, trace};

/// Runs fixed-period loops on a shared thread pool.
///
/// Each job owns its state (the closure is `FnMut`), receives the instant it
/// actually started, and is skipped once `running` is cleared.
pub struct Scheduler {
    pool: ScheduledThreadPool,
    running: Arc<AtomicBool>,
    jobs: Vec<(&'static str, JobHandle)>,
}

impl Scheduler {
    pub fn new(threads: usize, running: Arc<AtomicBool>) -> Self {
        Self {
            pool: ScheduledThreadPool::with_name("walker-tick-{}", threads),
            running,
            jobs: Vec::new(),
        }
    }

    pub fn every<F>(&mut self, name: &'static str, period: Duration, mut job: F)
    where
        F: FnMut(Instant) + Send + 'static,
    {
        let running = self.running.clone();
        let mut expected_start = Instant::now();

        let handle = self.pool.execute_at_fixed_rate(Duration::ZERO, period, move || {
            if !running.load(Ordering::Relaxed) {
                return;
            }

            let actual_start = Instant::now();
            let drift = actual_start.saturating_duration_since(expected_start);
            trace!(job = name, drift_ms = drift.as_secs_f64() * 1000.0, "SCHEDULING DRIFT");
            expected_start = actual_start + period;

            job(actual_start);
        });

        debug!(job = name, period_ms = period.as_millis() as u64, "scheduled");
        self.jobs.push((name, handle));
    }

    /// Cancels every job. A run already in progress finishes on its own.
    pub fn shutdown(&mut self) {
        for (name, job) in self.jobs.drain(..) {
            job.cancel();
            debug!(job = name, "cancelled");
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn job_runs_repeatedly_until_stopped() {
        let running = Arc::new(AtomicBool::new(true));
        let mut scheduler = Scheduler::new(1, running.clone());
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();

        scheduler.every("count", Duration::from_millis(10), move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        std::thread::sleep(Duration::from_millis(150));
        running.store(false, Ordering::Relaxed);
        assert!(count.load(Ordering::SeqCst) >= 2);

        std::thread::sleep(Duration::from_millis(30));
        let frozen = count.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), frozen);
    }

    #[test]
    fn job_state_persists_between_runs() {
        let running = Arc::new(AtomicBool::new(true));
        let mut scheduler = Scheduler::new(1, running);
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut ticks = 0u32;

        scheduler.every("stateful", Duration::from_millis(5), move |_| {
            ticks += 1;
            let _ = tx.send(ticks);
        });

        let first = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        scheduler.shutdown();
        assert_eq!((first, second), (1, 2));
    }
}
