// SPDX-License-Identifier: GPL-3.0-only

//! Concurrent persistence pool
//!
//! A fixed set of workers draining a bounded job queue. Jobs run in parallel
//! with each other and with the next frame's delivery; completion order is
//! not the submission order. Submission never blocks the frame callback: a
//! full queue drops the job with a warning.
//!
//! Shutdown stops intake, gives in-flight jobs a grace period, then abandons
//! whatever is still queued and detaches any straggling worker.

use crate::pipeline::save_job::{self, SaveJob, SaveQualities};
use crossbeam::channel::{bounded, Sender, TrySendError};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub struct SavePool {
    tx: Option<Sender<SaveJob>>,
    workers: Vec<JoinHandle<()>>,
    cancel: Arc<AtomicBool>,
    grace: Duration,
}

impl SavePool {
    /// Spawn `workers` save workers over a queue of `queue_depth` jobs.
    pub fn new(
        workers: usize,
        queue_depth: usize,
        qualities: SaveQualities,
        grace: Duration,
    ) -> Self {
        let (tx, rx) = bounded::<SaveJob>(queue_depth.max(1));
        let cancel = Arc::new(AtomicBool::new(false));

        let handles = (0..workers.max(1))
            .map(|i| {
                let rx = rx.clone();
                let cancel = Arc::clone(&cancel);
                std::thread::Builder::new()
                    .name(format!("save-worker-{}", i))
                    .spawn(move || {
                        while let Ok(job) = rx.recv() {
                            if cancel.load(Ordering::SeqCst) {
                                debug!(index = job.file_index, "Abandoning queued job");
                                continue;
                            }
                            run_contained(&job, qualities);
                        }
                    })
                    .expect("failed to spawn save worker")
            })
            .collect();

        info!(workers, queue_depth, "Persistence pool started");
        Self {
            tx: Some(tx),
            workers: handles,
            cancel,
            grace,
        }
    }

    /// Hand a job to the pool without blocking.
    ///
    /// Returns false when the queue is full or the pool has shut down; the
    /// frame is dropped either way.
    pub fn submit(&self, job: SaveJob) -> bool {
        let Some(tx) = self.tx.as_ref() else {
            warn!(index = job.file_index, "Pool already shut down, dropping job");
            return false;
        };
        match tx.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                warn!(index = job.file_index, "Save queue full, dropping frame");
                false
            }
            Err(TrySendError::Disconnected(job)) => {
                warn!(index = job.file_index, "Save queue closed, dropping frame");
                false
            }
        }
    }

    /// Stop accepting jobs and wait up to the grace period for in-flight
    /// work, then force-cancel stragglers. Forced cancellation does not
    /// guarantee job completion.
    pub fn shutdown(&mut self) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        drop(tx);

        let deadline = Instant::now() + self.grace;
        for handle in self.workers.drain(..) {
            while !handle.is_finished() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(5));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                self.cancel.store(true, Ordering::SeqCst);
                debug!("Detaching save worker past grace period");
            }
        }
        info!("Persistence pool stopped");
    }
}

impl Drop for SavePool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Run one job with failures contained at the job boundary: errors are
/// logged, and a panicking job must not take the worker down.
fn run_contained(job: &SaveJob, qualities: SaveQualities) {
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| save_job::run(job, qualities)));
    match result {
        Ok(Ok(_path)) => {}
        Ok(Err(e)) => {
            warn!(index = job.file_index, error = %e, "Save job failed");
        }
        Err(_) => {
            error!(index = job.file_index, "Save job panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::synthetic::generate_frame;
    use crate::media::yuv;
    use std::path::PathBuf;

    fn qualities() -> SaveQualities {
        SaveQualities {
            intermediate: 100,
            stored: 95,
        }
    }

    fn temp_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "geoframe-pool-{}-{}",
            label,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn job_for(dir: &PathBuf, index: u64) -> SaveJob {
        let frame = generate_frame(32, 24, index);
        SaveJob {
            nv21: yuv::frame_to_nv21(&frame).unwrap(),
            width: 32,
            height: 24,
            directory: dir.clone(),
            file_index: index,
            latitude: 0.0,
            longitude: 0.0,
            timestamp_ms: 1_700_000_000_000,
            rotation_degrees: 0,
        }
    }

    #[test]
    fn test_concurrent_jobs_produce_distinct_files() {
        let dir = temp_dir("concurrent");
        let mut pool = SavePool::new(4, 32, qualities(), Duration::from_secs(10));

        for index in 1..=8 {
            assert!(pool.submit(job_for(&dir, index)));
        }
        pool.shutdown();

        let mut names: Vec<String> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names.len(), 8);
        assert_eq!(names[0], "frame_001.jpg");
        assert_eq!(names[7], "frame_008.jpg");

        // Each file is individually decodable
        for name in &names {
            let bytes = std::fs::read(dir.join(name)).unwrap();
            assert!(image::load_from_memory(&bytes).is_ok());
        }

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_failed_jobs_do_not_kill_workers() {
        let dir = temp_dir("contained");
        let mut pool = SavePool::new(1, 8, qualities(), Duration::from_secs(10));

        // Job against a missing directory fails inside the worker
        let mut bad = job_for(&dir, 1);
        bad.directory = PathBuf::from("/nonexistent-geoframe-pool-dir");
        assert!(pool.submit(bad));

        // The same worker must still process the next job
        assert!(pool.submit(job_for(&dir, 2)));
        pool.shutdown();

        assert!(dir.join("frame_002.jpg").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_submit_after_shutdown_is_rejected() {
        let dir = temp_dir("after-shutdown");
        let mut pool = SavePool::new(1, 4, qualities(), Duration::from_millis(100));
        pool.shutdown();
        assert!(!pool.submit(job_for(&dir, 1)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let dir = temp_dir("full-queue");
        // One worker, tiny queue, and jobs that take a moment to finish
        let mut pool = SavePool::new(1, 1, qualities(), Duration::from_secs(10));

        let mut accepted = 0;
        for index in 1..=50 {
            if pool.submit(job_for(&dir, index)) {
                accepted += 1;
            }
        }
        // Some submissions must have been rejected rather than blocking
        assert!(accepted < 50);
        pool.shutdown();
        std::fs::remove_dir_all(&dir).ok();
    }
}
