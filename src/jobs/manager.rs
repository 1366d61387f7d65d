//! Bounded background-job thread pool (spec §4.8).
//!
//! Grounded in the teacher's queue worker (`runtime::queue_worker`): a
//! fixed concurrency budget, an `mpsc` completion path, and status
//! reported through a shared map rather than return values. The teacher
//! spawns one thread per task up to a concurrency cap; this manager
//! instead keeps a fixed pool of `max_workers` long-lived threads
//! pulling from a shared queue, since job counts here are small and
//! per-job spawn overhead isn't worth it.

use super::error::JobsError;
use crate::domain::job::{BackgroundJob, JobStatus};
use crate::shared::ids::JobId;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

type Task = Box<dyn FnOnce() -> Result<JsonValue, String> + Send + 'static>;

struct QueueEntry {
    job_id: JobId,
    task: Task,
}

/// Owns a fixed pool of worker threads and the status map they report
/// into. Dropping the manager closes the task channel, which lets every
/// worker thread observe `Disconnected` and exit; in-flight tasks are
/// allowed to finish first.
pub struct JobManager {
    sender: Option<Sender<QueueEntry>>,
    registry: Arc<Mutex<HashMap<JobId, BackgroundJob>>>,
    workers: Vec<JoinHandle<()>>,
}

impl JobManager {
    pub fn new(max_workers: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<QueueEntry>();
        let receiver = Arc::new(Mutex::new(receiver));
        let registry = Arc::new(Mutex::new(HashMap::new()));

        let workers = (0..max_workers.max(1))
            .map(|_| spawn_worker(Arc::clone(&receiver), Arc::clone(&registry)))
            .collect();

        Self {
            sender: Some(sender),
            registry,
            workers,
        }
    }

    /// Enqueues `task`, recording a `Pending` job immediately so
    /// `get_status` is consistent with the caller the instant this
    /// returns (spec §4.8 "submission is synchronous, execution is not").
    pub fn submit<F>(&self, job_id: JobId, task: F) -> Result<(), JobsError>
    where
        F: FnOnce() -> Result<JsonValue, String> + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(JobsError::PoolShutdown)?;
        {
            let mut registry = self.registry.lock().expect("job registry poisoned");
            registry.insert(
                job_id.clone(),
                BackgroundJob::new_pending(job_id.clone(), crate::shared::time::now()),
            );
        }
        sender
            .send(QueueEntry {
                job_id,
                task: Box::new(task),
            })
            .map_err(|_| JobsError::PoolShutdown)
    }

    pub fn get_status(&self, job_id: &JobId) -> Option<BackgroundJob> {
        self.registry
            .lock()
            .expect("job registry poisoned")
            .get(job_id)
            .cloned()
    }

    pub fn list_active(&self) -> Vec<BackgroundJob> {
        self.registry
            .lock()
            .expect("job registry poisoned")
            .values()
            .filter(|job| !job.status.is_terminal())
            .cloned()
            .collect()
    }

    /// Drops terminal jobs whose `completed_at` is older than `max_age`;
    /// returns how many were evicted (spec §4.8 retention policy).
    pub fn cleanup(&self, max_age: Duration) -> usize {
        let now = crate::shared::time::now();
        let mut registry = self.registry.lock().expect("job registry poisoned");
        let before = registry.len();
        registry.retain(|_, job| match job.completed_at {
            Some(completed_at) if job.status.is_terminal() => {
                let age = now.signed_duration_since(completed_at);
                age.to_std().map(|age| age < max_age).unwrap_or(true)
            }
            _ => true,
        });
        before - registry.len()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for JobManager {
    fn drop(&mut self) {
        self.sender.take();
    }
}

fn spawn_worker(
    receiver: Arc<Mutex<Receiver<QueueEntry>>>,
    registry: Arc<Mutex<HashMap<JobId, BackgroundJob>>>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        let entry = {
            let guard = receiver.lock().expect("job queue receiver poisoned");
            guard.recv()
        };
        let Ok(entry) = entry else {
            break;
        };
        run_entry(entry, &registry);
    })
}

fn run_entry(entry: QueueEntry, registry: &Arc<Mutex<HashMap<JobId, BackgroundJob>>>) {
    {
        let mut guard = registry.lock().expect("job registry poisoned");
        if let Some(job) = guard.get_mut(&entry.job_id) {
            let _ = job.start(crate::shared::time::now());
        }
    }

    let outcome = (entry.task)();

    let mut guard = registry.lock().expect("job registry poisoned");
    if let Some(job) = guard.get_mut(&entry.job_id) {
        let now = crate::shared::time::now();
        match outcome {
            Ok(result) => {
                let _ = job.complete(result, now);
            }
            Err(error) => {
                let _ = job.fail(error, now);
            }
        }
    }
}
