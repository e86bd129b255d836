use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::job::{Job, JobId, LanguageHint, Source};
use crate::ScribeError;

/// Process-wide job table: the single source of truth for job state.
///
/// Lives for one session (batch run or interactive loop) and is discarded at
/// session end; there is no persistence across runs. All mutation goes through
/// [`JobRegistry::update`], which is an atomic read-modify-write, so two
/// workers can never interleave writes to the same job. Reads hand out
/// snapshot copies, never live references.
pub struct JobRegistry {
    inner: Mutex<Inner>,
}

struct Inner {
    jobs: Vec<Job>,
    index: HashMap<JobId, usize>,
    next_seq: u64,
    epoch_ms: i64,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                jobs: Vec::new(),
                index: HashMap::new(),
                next_seq: 0,
                epoch_ms: Utc::now().timestamp_millis(),
            }),
        }
    }

    fn locked(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock means a worker panicked mid-update; the job table
        // itself is still usable, so recover the guard.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create a new pending job. Never fails for well-formed input.
    pub fn create(
        &self,
        source: Source,
        format_hint: Option<String>,
        language_hint: LanguageHint,
    ) -> JobId {
        let mut inner = self.locked();
        let id = JobId::new(inner.epoch_ms, inner.next_seq);
        inner.next_seq += 1;

        let job = Job::new(id.clone(), source, format_hint, language_hint);
        let slot = inner.jobs.len();
        inner.jobs.push(job);
        inner.index.insert(id.clone(), slot);

        tracing::debug!("created {}", id);
        id
    }

    /// Snapshot of a single job.
    pub fn get(&self, id: &JobId) -> Result<Job, ScribeError> {
        let inner = self.locked();
        inner
            .index
            .get(id)
            .map(|&slot| inner.jobs[slot].clone())
            .ok_or_else(|| ScribeError::NotFound(id.to_string()))
    }

    /// Snapshots of all jobs, in submission order.
    pub fn list(&self) -> Vec<Job> {
        self.locked().jobs.clone()
    }

    /// Ids of all jobs currently pending, in submission order.
    pub fn pending_ids(&self) -> Vec<JobId> {
        self.locked()
            .jobs
            .iter()
            .filter(|j| j.state == crate::job::JobState::Pending)
            .map(|j| j.id.clone())
            .collect()
    }

    /// Atomic read-modify-write on one job. Used exclusively by the stage
    /// runner; the mutator runs under the registry lock.
    pub fn update<F>(&self, id: &JobId, mutator: F) -> Result<(), ScribeError>
    where
        F: FnOnce(&mut Job),
    {
        let mut inner = self.locked();
        let slot = *inner
            .index
            .get(id)
            .ok_or_else(|| ScribeError::NotFound(id.to_string()))?;
        mutator(&mut inner.jobs[slot]);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.locked().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locked().jobs.is_empty()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobState;

    fn url_source(n: usize) -> Source {
        Source::parse(&format!("https://example.com/{n}"))
    }

    #[test]
    fn create_assigns_unique_ids() {
        let registry = JobRegistry::new();
        let a = registry.create(url_source(1), None, LanguageHint::Auto);
        let b = registry.create(url_source(2), None, LanguageHint::Auto);
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn list_preserves_submission_order() {
        let registry = JobRegistry::new();
        let ids: Vec<_> = (0..5)
            .map(|n| registry.create(url_source(n), None, LanguageHint::Auto))
            .collect();
        let listed: Vec<_> = registry.list().into_iter().map(|j| j.id).collect();
        assert_eq!(ids, listed);
    }

    #[test]
    fn get_unknown_id_is_not_found() {
        let registry = JobRegistry::new();
        let missing = JobId::from("job_0_999");
        assert!(matches!(
            registry.get(&missing),
            Err(ScribeError::NotFound(_))
        ));
        assert!(matches!(
            registry.update(&missing, |_| {}),
            Err(ScribeError::NotFound(_))
        ));
    }

    #[test]
    fn snapshots_do_not_track_later_updates() {
        let registry = JobRegistry::new();
        let id = registry.create(url_source(1), None, LanguageHint::Auto);

        let before = registry.get(&id).unwrap();
        registry
            .update(&id, |j| j.advance(JobState::Fetching))
            .unwrap();

        assert_eq!(before.state, JobState::Pending);
        assert_eq!(registry.get(&id).unwrap().state, JobState::Fetching);
    }

    #[test]
    fn pending_ids_skips_non_pending_jobs() {
        let registry = JobRegistry::new();
        let a = registry.create(url_source(1), None, LanguageHint::Auto);
        let b = registry.create(url_source(2), None, LanguageHint::Auto);
        registry
            .update(&a, |j| j.advance(JobState::Fetching))
            .unwrap();
        assert_eq!(registry.pending_ids(), vec![b]);
    }
}
