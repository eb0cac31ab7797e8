//! Background jobs started with `&`.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

/// Snapshot of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub id: u64,
    pub description: String,
    pub finished: bool,
}

struct Job {
    id: u64,
    description: String,
    handle: JoinHandle<i32>,
}

/// Tracks the threads spawned for background command lines.
#[derive(Default)]
pub struct JobTable {
    next_id: AtomicU64,
    jobs: Mutex<Vec<Job>>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` on a new thread named `console-job-<id>`.
    ///
    /// `work` receives the job id. Returns that id. Jobs that finished
    /// since the last spawn are reaped first, so the table only holds
    /// running jobs and the ones that finished most recently.
    pub fn spawn<F>(&self, description: &str, work: F) -> io::Result<u64>
    where
        F: FnOnce(u64) -> i32 + Send + 'static,
    {
        self.reap();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = thread::Builder::new()
            .name(format!("console-job-{id}"))
            .spawn(move || work(id))?;
        log::debug!("Started job {id}: {description}");
        self.lock().push(Job {
            id,
            description: description.to_string(),
            handle,
        });
        Ok(id)
    }

    /// Every tracked job, oldest first.
    pub fn list(&self) -> Vec<JobInfo> {
        self.lock()
            .iter()
            .map(|j| JobInfo {
                id: j.id,
                description: j.description.clone(),
                finished: j.handle.is_finished(),
            })
            .collect()
    }

    /// Forget finished jobs. Returns how many were dropped.
    pub fn reap(&self) -> usize {
        let finished: Vec<Job> = {
            let mut jobs = self.lock();
            let (done, running): (Vec<Job>, Vec<Job>) =
                jobs.drain(..).partition(|j| j.handle.is_finished());
            *jobs = running;
            done
        };
        for job in &finished {
            log::debug!("Reaped job {}", job.id);
        }
        let count = finished.len();
        for job in finished {
            let _ = job.handle.join();
        }
        count
    }

    /// Wait for every tracked job, returning `(id, result)` pairs. A job
    /// that panicked reports `-1`.
    pub fn wait_all(&self) -> Vec<(u64, i32)> {
        let jobs: Vec<Job> = self.lock().drain(..).collect();
        jobs.into_iter()
            .map(|j| (j.id, j.handle.join().unwrap_or(-1)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Job>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}
