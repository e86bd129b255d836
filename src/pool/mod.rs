use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::fetch::Fetcher;
use crate::job::{JobError, JobId, JobState};
use crate::registry::JobRegistry;
use crate::transcribe::Transcriber;

/// Deletes a job's audio artifact when dropped, so cleanup runs on success,
/// on failure, and if the transcribe stage panics.
struct ArtifactGuard {
    path: PathBuf,
}

impl ArtifactGuard {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        match fs_err::remove_file(&self.path) {
            Ok(()) => tracing::debug!("cleaned up artifact {}", self.path.display()),
            Err(e) => tracing::warn!("failed to clean up {}: {}", self.path.display(), e),
        }
    }
}

/// Drives one job through `Fetching -> Transcribing -> terminal`, recording
/// every outcome on the job's registry entry. Failures never propagate out of
/// a job: sibling jobs and the pool are unaffected.
pub struct StageRunner {
    fetcher: Arc<dyn Fetcher>,
    transcriber: Arc<dyn Transcriber>,
    scratch_dir: PathBuf,
}

impl StageRunner {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        transcriber: Arc<dyn Transcriber>,
        scratch_dir: &Path,
    ) -> Self {
        Self {
            fetcher,
            transcriber,
            scratch_dir: scratch_dir.to_path_buf(),
        }
    }

    fn record(registry: &JobRegistry, id: &JobId, mutator: impl FnOnce(&mut crate::job::Job)) {
        if let Err(e) = registry.update(id, mutator) {
            tracing::error!("lost registry entry for {}: {}", id, e);
        }
    }

    /// Run the two-stage pipeline for one pending job.
    pub async fn run_job(&self, registry: &JobRegistry, id: &JobId) {
        let job = match registry.get(id) {
            Ok(job) => job,
            Err(e) => {
                tracing::error!("cannot process {}: {}", id, e);
                return;
            }
        };
        if job.state != JobState::Pending {
            tracing::warn!("skipping {}: already {}", id, job.state);
            return;
        }

        tracing::info!("fetching audio for {}", id);
        Self::record(registry, id, |j| j.advance(JobState::Fetching));

        // Artifacts are namespaced by job id so concurrent jobs never collide.
        let dest_base = self.scratch_dir.join(format!("audio_{}", id));

        let artifact = match self
            .fetcher
            .fetch(&job.source, job.format_hint.as_deref(), &dest_base)
            .await
        {
            Ok(path) => path,
            Err(e) => {
                tracing::error!("fetch failed for {}: {}", id, e);
                Self::record(registry, id, |j| j.fail(JobError::Fetch(e.to_string())));
                return;
            }
        };

        Self::record(registry, id, |j| {
            j.artifact_path = Some(artifact.clone());
            j.advance(JobState::Transcribing);
        });

        tracing::info!("transcribing {}", id);
        let _guard = ArtifactGuard::new(artifact.clone());
        let result = self
            .transcriber
            .transcribe(&artifact, &job.language_hint)
            .await;

        match result {
            Ok(text) => {
                tracing::info!("transcription completed for {}", id);
                Self::record(registry, id, |j| j.succeed(text));
            }
            Err(e) => {
                tracing::error!("transcription failed for {}: {}", id, e);
                Self::record(registry, id, |j| j.fail(JobError::Transcribe(e.to_string())));
            }
        }
    }
}

/// Outcome tally for one pool run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl PoolSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Bounded concurrent executor: at most `workers` jobs are in flight at once,
/// jobs start in submission order, and `run` returns only when every job in
/// the batch has reached a terminal state.
pub struct WorkerPool {
    registry: Arc<JobRegistry>,
    runner: Arc<StageRunner>,
    workers: usize,
}

impl WorkerPool {
    pub fn new(registry: Arc<JobRegistry>, runner: Arc<StageRunner>, workers: usize) -> Self {
        Self {
            registry,
            runner,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Process `batch` to completion. Jobs submitted while this runs belong
    /// to a later batch.
    pub async fn run(&self, batch: Vec<JobId>) -> PoolSummary {
        if batch.is_empty() {
            return PoolSummary::default();
        }

        tracing::info!(
            "processing {} job(s) with {} worker(s)",
            batch.len(),
            self.workers
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for id in batch.iter().cloned() {
            // Acquiring before spawning keeps starts FIFO and in-flight
            // count at or below the worker bound.
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break, // semaphore closed, cannot happen
            };
            let runner = self.runner.clone();
            let registry = self.registry.clone();
            tasks.spawn(async move {
                let _permit = permit;
                runner.run_job(&registry, &id).await;
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!("worker task aborted: {}", e);
            }
        }

        // A panicked worker leaves its job non-terminal; close it out so the
        // batch invariant (all terminal on return) holds.
        let mut summary = PoolSummary::default();
        for id in &batch {
            let Ok(job) = self.registry.get(id) else {
                continue;
            };
            if !job.is_terminal() {
                let _ = self.registry.update(id, |j| {
                    j.fail(JobError::Aborted("worker task did not complete".to_string()));
                });
            }
            match self.registry.get(id).map(|j| j.state) {
                Ok(JobState::Succeeded) => summary.succeeded += 1,
                _ => summary.failed += 1,
            }
        }
        summary
    }
}
