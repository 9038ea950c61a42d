//! Async job registry and spawn point, per SPEC_FULL.md §4.7: a
//! `DashMap<Uuid, Job>` (grounded in the teacher's pervasive `dashmap`
//! use for concurrent shared maps) supporting `submit`, `get`,
//! `update_progress`, and `complete`/`fail`. Deliberately small: a
//! registry and a spawn point, not a queue or scheduler.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;
use uuid::Uuid;

use crawl_core::{Job, JobStatus};

struct JobEntry {
    job: Job,
    watch_tx: watch::Sender<Job>,
}

/// Mutates a single job's state from inside its own spawned task.
#[derive(Clone)]
pub struct ProgressHandle {
    registry: Arc<JobRegistry>,
    id: Uuid,
}

impl ProgressHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn update_progress(&self, progress: f64) {
        self.registry.update_progress(self.id, progress);
    }

    pub fn complete(&self, result: serde_json::Value) {
        self.registry.complete(self.id, result);
    }

    pub fn fail(&self, error: impl Into<String>) {
        self.registry.fail(self.id, error);
    }
}

/// Concurrent registry of in-flight and completed jobs. One instance per
/// process, shared via `Arc`.
#[derive(Default)]
pub struct JobRegistry {
    jobs: DashMap<Uuid, JobEntry>,
}

impl JobRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            jobs: DashMap::new(),
        })
    }

    /// Registers a new job and spawns `work` on the runtime. `work`
    /// receives a [`ProgressHandle`] it uses to report progress and
    /// terminal state; the caller is responsible for calling
    /// `complete`/`fail` exactly once.
    pub fn submit<F, Fut>(self: &Arc<Self>, job_type: impl Into<String>, request: serde_json::Value, work: F) -> Uuid
    where
        F: FnOnce(ProgressHandle) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let job = Job::new(job_type, request);
        let id = job.id;
        let (watch_tx, _rx) = watch::channel(job.clone());
        self.jobs.insert(id, JobEntry { job, watch_tx });

        self.mark_running(id);

        let handle = ProgressHandle {
            registry: Arc::clone(self),
            id,
        };
        tokio::spawn(work(handle));

        id
    }

    fn mark_running(&self, id: Uuid) {
        self.mutate(id, |job| job.status = JobStatus::Running);
    }

    pub fn update_progress(&self, id: Uuid, progress: f64) {
        self.mutate(id, |job| job.progress = progress.clamp(0.0, 1.0));
    }

    pub fn complete(&self, id: Uuid, result: serde_json::Value) {
        self.mutate(id, |job| {
            job.status = JobStatus::Completed;
            job.progress = 1.0;
            job.result = Some(result);
        });
    }

    pub fn fail(&self, id: Uuid, error: impl Into<String>) {
        self.mutate(id, |job| {
            job.status = JobStatus::Failed;
            job.error = Some(error.into());
        });
    }

    pub fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.get(&id).map(|entry| entry.job.clone())
    }

    /// A `watch::Receiver` for SSE job-progress streaming (§6), ticking
    /// once per mutation.
    pub fn subscribe(&self, id: Uuid) -> Option<watch::Receiver<Job>> {
        self.jobs.get(&id).map(|entry| entry.watch_tx.subscribe())
    }

    fn mutate(&self, id: Uuid, f: impl FnOnce(&mut Job)) {
        if let Some(mut entry) = self.jobs.get_mut(&id) {
            f(&mut entry.job);
            entry.job.updated_at = chrono::Utc::now();
            let _ = entry.watch_tx.send(entry.job.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submit_runs_job_to_completion() {
        let registry = JobRegistry::new();
        let id = registry.submit("reviews", serde_json::json!({}), |handle| async move {
            handle.update_progress(0.5);
            handle.complete(serde_json::json!({"done": true}));
        });

        for _ in 0..50 {
            if registry.get(id).unwrap().status.is_terminal() {
                break;
            }
            tokio::task::yield_now().await;
        }

        let job = registry.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result, Some(serde_json::json!({"done": true})));
    }

    #[tokio::test]
    async fn failed_job_records_error_message() {
        let registry = JobRegistry::new();
        let id = registry.submit("reviews", serde_json::json!({}), |handle| async move {
            handle.fail("upstream timed out");
        });

        for _ in 0..50 {
            if registry.get(id).unwrap().status.is_terminal() {
                break;
            }
            tokio::task::yield_now().await;
        }

        let job = registry.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("upstream timed out"));
    }

    #[tokio::test]
    async fn subscribe_receives_progress_updates() {
        let registry = JobRegistry::new();
        let id = registry.submit("reviews", serde_json::json!({}), |handle| async move {
            handle.update_progress(0.3);
            handle.complete(serde_json::json!(null));
        });

        let mut rx = registry.subscribe(id).unwrap();
        loop {
            rx.changed().await.unwrap();
            if rx.borrow().status.is_terminal() {
                break;
            }
        }
        assert_eq!(rx.borrow().status, JobStatus::Completed);
    }

    #[test]
    fn unknown_job_id_returns_none() {
        let registry = JobRegistry::new();
        assert!(registry.get(Uuid::new_v4()).is_none());
    }
}
