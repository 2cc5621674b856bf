// SPDX-License-Identifier: GPL-3.0-only

//! Dedicated background execution context
//!
//! A single worker thread draining a task queue. All hardware-callback-driven
//! work (frame delivery, device state events) runs here, which guarantees
//! frame delivery and resource-lifecycle events are never concurrent with
//! each other.

use crossbeam::channel::{unbounded, Sender};
use std::thread::JoinHandle;
use tracing::{debug, warn};

type Task = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Task),
    Quit,
}

/// Cloneable handle for posting tasks onto the executor thread
#[derive(Clone)]
pub struct ExecutorHandle {
    tx: Sender<Message>,
}

impl ExecutorHandle {
    /// Enqueue a task; returns false if the executor has already quit
    pub fn post<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx.send(Message::Run(Box::new(task))).is_ok()
    }
}

/// Single dedicated worker thread with its own task queue
pub struct BackgroundExecutor {
    tx: Sender<Message>,
    thread: Option<JoinHandle<()>>,
    name: String,
}

impl BackgroundExecutor {
    /// Start the executor thread
    pub fn start(name: &str) -> Self {
        let (tx, rx) = unbounded::<Message>();
        let thread_name = name.to_string();

        let thread = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                debug!(name = %thread_name, "Background executor started");
                while let Ok(message) = rx.recv() {
                    match message {
                        Message::Run(task) => task(),
                        Message::Quit => break,
                    }
                }
                debug!(name = %thread_name, "Background executor exiting");
            })
            .expect("failed to spawn background executor thread");

        Self {
            tx,
            thread: Some(thread),
            name: name.to_string(),
        }
    }

    /// Get a cloneable posting handle
    pub fn handle(&self) -> ExecutorHandle {
        ExecutorHandle {
            tx: self.tx.clone(),
        }
    }

    /// Process all tasks already queued, then stop the thread.
    ///
    /// Tasks posted after this call are dropped.
    pub fn quit(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.tx.send(Message::Quit);
            if thread.join().is_err() {
                warn!(name = %self.name, "Background executor thread panicked");
            }
        }
    }
}

impl Drop for BackgroundExecutor {
    fn drop(&mut self) {
        self.quit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_tasks_run_in_order() {
        let mut executor = BackgroundExecutor::start("test-exec");
        let handle = executor.handle();
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));

        for i in 0..10u32 {
            let log = Arc::clone(&log);
            handle.post(move || log.lock().unwrap().push(i));
        }

        executor.quit();
        assert_eq!(*log.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_quit_is_idempotent() {
        let counter = Arc::new(AtomicU32::new(0));
        let mut executor = BackgroundExecutor::start("test-exec-quit");
        let handle = executor.handle();
        let c = Arc::clone(&counter);
        handle.post(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        executor.quit();
        executor.quit();
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // Posting after quit is rejected, not a panic
        assert!(!handle.post(|| {}));
    }
}
