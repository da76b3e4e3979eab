// Job Record Store
//
// Authoritative state of every submitted job. Pure data + mutation API, no
// business logic: transition rules live on the Job entity and are enforced
// by the closures the lifecycle manager passes to `update`.
//
// Single-writer discipline per the concurrency model: all mutations funnel
// through the write lock, readers get snapshot clones, never live
// references into the map.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::error::Result as DomainResult;
use crate::domain::{DomainError, Job, JobId, JobKind, JobStatus};
use crate::error::{AppError, Result};

/// Listing filter; the default hides dismissed jobs from active views
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub kind: Option<JobKind>,
    pub status: Option<JobStatus>,
    pub include_dismissed: bool,
}

pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a newly created job
    pub fn insert(&self, job: Job) -> Result<()> {
        let mut jobs = self.jobs.write().expect("job store lock poisoned");
        if jobs.contains_key(&job.id) {
            return Err(AppError::Conflict(format!(
                "job {} already exists",
                job.id
            )));
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    /// Fetch a snapshot copy of one job
    pub fn get(&self, id: &JobId) -> Result<Job> {
        self.jobs
            .read()
            .expect("job store lock poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::Domain(DomainError::JobNotFound(id.clone())))
    }

    /// List snapshot copies, oldest first
    pub fn list(&self, filter: &JobFilter) -> Vec<Job> {
        let jobs = self.jobs.read().expect("job store lock poisoned");
        let mut out: Vec<Job> = jobs
            .values()
            .filter(|job| {
                if !filter.include_dismissed && job.status == JobStatus::Dismissed {
                    return false;
                }
                if let Some(kind) = filter.kind {
                    if job.kind != kind {
                        return false;
                    }
                }
                if let Some(status) = filter.status {
                    if job.status != status {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        out
    }

    /// Apply a transition atomically
    ///
    /// The closure runs under the write lock; if it returns an error the
    /// record is left untouched (transition methods on `Job` check before
    /// mutating). Readers never observe a partially-applied update.
    pub fn update<F>(&self, id: &JobId, mutate: F) -> Result<Job>
    where
        F: FnOnce(&mut Job) -> DomainResult<()>,
    {
        let mut jobs = self.jobs.write().expect("job store lock poisoned");
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| AppError::Domain(DomainError::JobNotFound(id.clone())))?;
        mutate(job).map_err(AppError::Domain)?;
        Ok(job.clone())
    }

    /// Remove a record (retention GC only; dismissal hides, removal forgets)
    pub fn remove(&self, id: &JobId) -> Result<()> {
        self.jobs
            .write()
            .expect("job store lock poisoned")
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| AppError::Domain(DomainError::JobNotFound(id.clone())))
    }

    /// Job counts per status (stats endpoint)
    pub fn counts_by_status(&self) -> HashMap<JobStatus, usize> {
        let jobs = self.jobs.read().expect("job store lock poisoned");
        let mut counts = HashMap::new();
        for job in jobs.values() {
            *counts.entry(job.status).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.jobs.read().expect("job store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
