// Job Lifecycle Manager
//
// Single writer for job state. RPC handlers call the command methods below;
// workers report observations through the `WorkerEvent` channel and the
// `run` loop folds them into the store. No other component mutates a job.
//
// Cancellation of a PROCESSING job is two-phase: the request flags the job
// and signals the worker, and the store transition happens only when the
// worker confirms by terminating. Whatever terminal event the worker races
// in with (completed, failed, or cancelled), a flagged job lands in
// CANCELLED and its late progress reports are discarded.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::application::hub::BroadcastHub;
use crate::application::pool::{ShutdownToken, WorkerEvent, WorkerPool};
use crate::application::store::{JobFilter, JobStore};
use crate::domain::{HostEvent, Job, JobId, JobPayload, JobStatus};
use crate::error::Result;
use crate::port::{IdProvider, ProcessOutcome, SongRepository, TimeProvider};

pub struct JobLifecycleManager {
    store: Arc<JobStore>,
    pool: Arc<WorkerPool>,
    hub: Arc<BroadcastHub>,
    songs: Arc<dyn SongRepository>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,

    /// PROCESSING jobs whose cancellation awaits worker confirmation
    cancel_requested: Mutex<HashSet<JobId>>,
}

impl JobLifecycleManager {
    pub fn new(
        store: Arc<JobStore>,
        pool: Arc<WorkerPool>,
        hub: Arc<BroadcastHub>,
        songs: Arc<dyn SongRepository>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            store,
            pool,
            hub,
            songs,
            id_provider,
            time_provider,
            cancel_requested: Mutex::new(HashSet::new()),
        }
    }

    // ------------------------------------------------------------------
    // Commands (RPC-facing)
    // ------------------------------------------------------------------

    /// Validate and accept a new job
    ///
    /// The job is QUEUED and handed to the pool in one step; saturation
    /// means waiting for a slot, never rejection.
    pub fn submit(&self, payload: JobPayload) -> Result<Job> {
        payload.validate()?;

        let job = Job::new(
            self.id_provider.generate_id(),
            self.time_provider.now_millis(),
            payload,
        );
        self.store.insert(job.clone())?;
        self.pool.submit(&job.id, &job.payload);

        info!(job_id = %job.id, kind = %job.kind, "Job submitted");
        self.hub.publish(HostEvent::JobCreated { job: job.clone() });
        Ok(job)
    }

    pub fn get(&self, id: &JobId) -> Result<Job> {
        self.store.get(id)
    }

    pub fn list(&self, filter: &JobFilter) -> Vec<Job> {
        self.store.list(filter)
    }

    /// Request cancellation
    ///
    /// QUEUED jobs are cancelled synchronously. PROCESSING jobs are flagged
    /// and signalled; the returned record still reads PROCESSING until the
    /// worker confirms. Terminal jobs reject with an invalid transition.
    pub fn cancel(&self, id: &JobId) -> Result<Job> {
        let job = self.store.get(id)?;
        match job.status {
            JobStatus::Queued => {
                self.pool.cancel(id);
                let now = self.time_provider.now_millis();
                let job = self.store.update(id, |j| j.cancel(now))?;
                info!(job_id = %id, "Queued job cancelled");
                self.hub.publish(HostEvent::JobTerminal {
                    job_id: id.clone(),
                    status: job.status,
                    message: job.message.clone(),
                });
                Ok(job)
            }
            JobStatus::Processing => {
                self.cancel_requested
                    .lock()
                    .expect("cancel set lock poisoned")
                    .insert(id.clone());
                self.pool.cancel(id);
                info!(job_id = %id, "Cancellation requested, awaiting worker confirmation");
                Ok(job)
            }
            _ => {
                // Surfaces as an invalid transition through the entity
                let now = self.time_provider.now_millis();
                self.store.update(id, |j| j.cancel(now))
            }
        }
    }

    /// Hide a terminal job from active views
    pub fn dismiss(&self, id: &JobId) -> Result<Job> {
        let now = self.time_provider.now_millis();
        let job = self.store.update(id, |j| j.dismiss(now))?;
        info!(job_id = %id, "Job dismissed");
        self.hub.publish(HostEvent::JobDismissed { job_id: id.clone() });
        Ok(job)
    }

    /// Requeue a failed job under its original id, allowed once per job
    pub fn retry(&self, id: &JobId) -> Result<Job> {
        let now = self.time_provider.now_millis();
        let job = self.store.update(id, |j| j.retry(now))?;
        // A cancel request that raced the failing worker can leave its flag
        // behind after the job already settled in ERROR; the new execution
        // must not inherit it.
        self.take_cancel_request(id);
        self.pool.submit(&job.id, &job.payload);

        info!(job_id = %id, "Job requeued for retry");
        self.hub.publish(HostEvent::JobRequeued { job: job.clone() });
        Ok(job)
    }

    /// Job counts per status plus in-flight worker count (stats endpoint)
    pub fn counts_by_status(&self) -> HashMap<JobStatus, usize> {
        self.store.counts_by_status()
    }

    pub fn in_flight(&self) -> usize {
        self.pool.in_flight()
    }

    /// Snapshot for a freshly opened jobs subscription
    pub fn snapshot(&self) -> HostEvent {
        HostEvent::JobSnapshot {
            jobs: self.store.list(&JobFilter::default()),
        }
    }

    // ------------------------------------------------------------------
    // Worker event loop
    // ------------------------------------------------------------------

    /// Fold worker observations into the store until shutdown
    pub async fn run(
        self: Arc<Self>,
        mut events_rx: mpsc::Receiver<WorkerEvent>,
        mut shutdown: ShutdownToken,
    ) {
        info!("Job lifecycle event loop started");
        loop {
            tokio::select! {
                _ = shutdown.wait() => {
                    info!("Job lifecycle event loop shutting down");
                    break;
                }
                event = events_rx.recv() => match event {
                    Some(event) => self.apply(event).await,
                    None => {
                        warn!("Worker event channel closed, stopping lifecycle loop");
                        break;
                    }
                },
            }
        }
    }

    async fn apply(&self, event: WorkerEvent) {
        let now = self.time_provider.now_millis();
        match event {
            WorkerEvent::Started { job_id } => {
                match self.store.update(&job_id, |j| j.start(now)) {
                    Ok(_) => self.hub.publish(HostEvent::JobStarted { job_id }),
                    // Cancel raced the slot acquisition; the worker will
                    // confirm with a terminal event shortly.
                    Err(err) => debug!(job_id = %job_id, %err, "Late start event ignored"),
                }
            }
            WorkerEvent::Progress {
                job_id,
                percent,
                note,
            } => {
                if self.is_cancel_requested(&job_id) {
                    debug!(job_id = %job_id, "Progress after cancel request discarded");
                    return;
                }
                match self
                    .store
                    .update(&job_id, |j| j.record_progress(percent, note.clone(), now))
                {
                    Ok(job) => self.hub.publish(HostEvent::JobProgress {
                        job_id,
                        progress: job.progress,
                        message: job.message,
                    }),
                    Err(err) => debug!(job_id = %job_id, %err, "Late progress report ignored"),
                }
            }
            WorkerEvent::Completed { job_id, outcome } => {
                if self.take_cancel_request(&job_id) {
                    // The worker finished before it observed the cancel;
                    // the user's request still wins.
                    self.confirm_cancel(&job_id, now);
                    return;
                }
                let result = outcome_json(&outcome);
                match self.store.update(&job_id, |j| {
                    j.complete(now)?;
                    j.result = Some(result.clone());
                    Ok(())
                }) {
                    Ok(job) => {
                        info!(job_id = %job_id, kind = %job.kind, "Job processed");
                        self.hub.publish(HostEvent::JobTerminal {
                            job_id: job_id.clone(),
                            status: job.status,
                            message: job.message.clone(),
                        });
                        self.record_outcome(&job, &outcome).await;
                    }
                    Err(err) => debug!(job_id = %job_id, %err, "Late completion ignored"),
                }
            }
            WorkerEvent::Failed { job_id, reason } => {
                if self.take_cancel_request(&job_id) {
                    self.confirm_cancel(&job_id, now);
                    return;
                }
                match self.store.update(&job_id, |j| j.fail(now, reason.clone())) {
                    Ok(job) => {
                        warn!(job_id = %job_id, %reason, "Job failed");
                        self.hub.publish(HostEvent::JobTerminal {
                            job_id,
                            status: job.status,
                            message: job.message,
                        });
                    }
                    Err(err) => debug!(job_id = %job_id, %err, "Late failure ignored"),
                }
            }
            WorkerEvent::Cancelled { job_id } => {
                self.take_cancel_request(&job_id);
                self.confirm_cancel(&job_id, now);
            }
        }
    }

    fn is_cancel_requested(&self, id: &JobId) -> bool {
        self.cancel_requested
            .lock()
            .expect("cancel set lock poisoned")
            .contains(id)
    }

    fn take_cancel_request(&self, id: &JobId) -> bool {
        self.cancel_requested
            .lock()
            .expect("cancel set lock poisoned")
            .remove(id)
    }

    fn confirm_cancel(&self, id: &JobId, now: i64) {
        match self.store.update(id, |j| j.cancel(now)) {
            Ok(job) => {
                info!(job_id = %id, "Job cancelled");
                self.hub.publish(HostEvent::JobTerminal {
                    job_id: id.clone(),
                    status: job.status,
                    message: job.message,
                });
            }
            // Queued-path cancels transition synchronously; the worker's
            // confirmation then arrives against an already-CANCELLED record.
            Err(err) => debug!(job_id = %id, %err, "Cancel confirmation on settled job"),
        }
    }

    /// Persist separation stems into the song library
    ///
    /// Library errors never fail the job; the stems exist on disk and the
    /// record can be repaired by re-running enrichment.
    async fn record_outcome(&self, job: &Job, outcome: &ProcessOutcome) {
        let (song_id, vocals_path, instrumental_path) = match (&job.payload, outcome) {
            (
                JobPayload::Separation { song_id, .. },
                ProcessOutcome::Separated {
                    vocals_path,
                    instrumental_path,
                },
            ) => (song_id, vocals_path, instrumental_path),
            _ => return,
        };

        match self.songs.get(song_id).await {
            Ok(Some(mut song)) => {
                song.vocals_path = Some(vocals_path.clone());
                song.instrumental_path = Some(instrumental_path.clone());
                if let Err(err) = self.songs.upsert(&song).await {
                    error!(job_id = %job.id, song_id = %song_id, %err, "Failed to record stems");
                } else {
                    info!(song_id = %song_id, "Separation stems recorded in song library");
                }
            }
            Ok(None) => {
                warn!(job_id = %job.id, song_id = %song_id, "Separated song no longer in library")
            }
            Err(err) => {
                error!(job_id = %job.id, song_id = %song_id, %err, "Song lookup failed")
            }
        }
    }
}

fn outcome_json(outcome: &ProcessOutcome) -> serde_json::Value {
    match outcome {
        ProcessOutcome::Separated {
            vocals_path,
            instrumental_path,
        } => json!({
            "vocals_path": vocals_path,
            "instrumental_path": instrumental_path,
        }),
        ProcessOutcome::Downloaded { media_path } => json!({ "media_path": media_path }),
        ProcessOutcome::Enriched { candidates } => json!({ "candidates": candidates }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pool::constants::{BROADCAST_CAPACITY, WORKER_EVENT_CAPACITY};
    use crate::application::pool::shutdown_channel;
    use crate::domain::DomainError;
    use crate::error::AppError;
    use crate::port::media_processor::mocks::{MockBehavior, MockMediaProcessor};
    use crate::port::song_repository::mocks::MockSongRepository;
    use crate::port::{SystemTimeProvider, UuidProvider};
    use std::time::Duration;

    struct Harness {
        manager: Arc<JobLifecycleManager>,
        songs: Arc<MockSongRepository>,
        processor: Arc<MockMediaProcessor>,
        _shutdown: crate::application::pool::ShutdownSender,
    }

    fn harness(slots: usize, behavior: MockBehavior) -> Harness {
        let songs = Arc::new(MockSongRepository::with_songs(&["song-1", "song-2"]));
        let processor = Arc::new(MockMediaProcessor::new(behavior));
        let (events_tx, events_rx) = mpsc::channel(WORKER_EVENT_CAPACITY);
        let pool = Arc::new(WorkerPool::new(
            slots,
            Duration::from_secs(30),
            processor.clone() as Arc<dyn crate::port::MediaProcessor>,
            events_tx,
        ));
        let manager = Arc::new(JobLifecycleManager::new(
            Arc::new(JobStore::new()),
            pool,
            Arc::new(BroadcastHub::new(BROADCAST_CAPACITY)),
            songs.clone(),
            Arc::new(UuidProvider),
            Arc::new(SystemTimeProvider),
        ));

        let (shutdown_tx, shutdown_rx) = shutdown_channel();
        tokio::spawn(manager.clone().run(events_rx, shutdown_rx));

        Harness {
            manager,
            songs,
            processor,
            _shutdown: shutdown_tx,
        }
    }

    fn separation_payload() -> JobPayload {
        JobPayload::Separation {
            song_id: "song-1".into(),
            input_path: "/media/song-1.mp3".into(),
        }
    }

    async fn wait_for_status(
        manager: &JobLifecycleManager,
        id: &JobId,
        status: JobStatus,
    ) -> Job {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let job = manager.get(id).unwrap();
            if job.status == status {
                return job;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("job {} stuck in {:?}, wanted {:?}", id, job.status, status);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_payload() {
        let h = harness(1, MockBehavior::Success);
        let err = h.manager.submit(JobPayload::Download {
            source_url: "ftp://nope".into(),
            title: None,
        });
        assert!(matches!(
            err,
            Err(AppError::Domain(DomainError::Validation(_)))
        ));
        assert!(h.manager.list(&JobFilter::default()).is_empty());
    }

    #[tokio::test]
    async fn test_submit_runs_to_processed_with_progress() {
        let h = harness(1, MockBehavior::SuccessWithProgress(vec![25, 60, 90]));
        let job = h.manager.submit(separation_payload()).unwrap();
        assert_eq!(job.status, JobStatus::Queued);

        let done = wait_for_status(&h.manager, &job.id, JobStatus::Processed).await;
        assert_eq!(done.progress, 100);
        let result = done.result.expect("result attached on completion");
        assert!(result["vocals_path"].as_str().unwrap().contains("vocals"));
    }

    #[tokio::test]
    async fn test_separation_success_records_stems() {
        let h = harness(1, MockBehavior::Success);
        let job = h.manager.submit(separation_payload()).unwrap();
        wait_for_status(&h.manager, &job.id, JobStatus::Processed).await;

        // The library update happens in the same event application
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let song = h.songs.get(&"song-1".to_string()).await.unwrap().unwrap();
            if song.is_separated() {
                break;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("stems never recorded");
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_failure_preserves_progress_and_message() {
        let h = harness(
            1,
            MockBehavior::FailAfterProgress(vec![40, 75], "engine crashed".into()),
        );
        let job = h.manager.submit(separation_payload()).unwrap();

        let failed = wait_for_status(&h.manager, &job.id, JobStatus::Error).await;
        assert_eq!(failed.progress, 75);
        assert_eq!(failed.message.as_deref(), Some("engine crashed"));
    }

    #[tokio::test]
    async fn test_cancel_queued_job_is_synchronous() {
        // Single slot held by a hanging job; the second submission queues
        let h = harness(1, MockBehavior::Hang);
        let holder = h.manager.submit(separation_payload()).unwrap();
        wait_for_status(&h.manager, &holder.id, JobStatus::Processing).await;

        let queued = h.manager.submit(separation_payload()).unwrap();
        let cancelled = h.manager.cancel(&queued.id).unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);

        // The queued job never reached the processor
        wait_for_status(&h.manager, &queued.id, JobStatus::Cancelled).await;
        assert_eq!(h.processor.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_processing_confirms_through_worker() {
        let h = harness(1, MockBehavior::Hang);
        let job = h.manager.submit(separation_payload()).unwrap();
        wait_for_status(&h.manager, &job.id, JobStatus::Processing).await;

        let accepted = h.manager.cancel(&job.id).unwrap();
        // Not yet terminal; the worker must confirm
        assert_eq!(accepted.status, JobStatus::Processing);

        wait_for_status(&h.manager, &job.id, JobStatus::Cancelled).await;
    }

    #[tokio::test]
    async fn test_cancel_terminal_job_rejected() {
        let h = harness(1, MockBehavior::Success);
        let job = h.manager.submit(separation_payload()).unwrap();
        wait_for_status(&h.manager, &job.id, JobStatus::Processed).await;

        assert!(matches!(
            h.manager.cancel(&job.id),
            Err(AppError::Domain(DomainError::InvalidTransition { .. }))
        ));
    }

    #[tokio::test]
    async fn test_retry_exactly_once() {
        let h = harness(1, MockBehavior::Fail("no luck".into()));
        let job = h.manager.submit(separation_payload()).unwrap();
        wait_for_status(&h.manager, &job.id, JobStatus::Error).await;

        let retried = h.manager.retry(&job.id).unwrap();
        assert_eq!(retried.id, job.id);
        assert_eq!(retried.progress, 0);
        assert!(retried.message.is_none());

        wait_for_status(&h.manager, &job.id, JobStatus::Error).await;
        assert!(matches!(
            h.manager.retry(&job.id),
            Err(AppError::Domain(DomainError::InvalidTransition { .. }))
        ));
    }

    #[tokio::test]
    async fn test_retry_sheds_stale_cancel_flag() {
        let h = harness(1, MockBehavior::Fail("first run crashed".into()));
        let job = h.manager.submit(separation_payload()).unwrap();
        wait_for_status(&h.manager, &job.id, JobStatus::Error).await;

        // A cancel request can race the failing worker: the terminal event
        // is applied first, so the flag lands after its consumer already ran
        // and sticks to the ERROR record.
        h.manager
            .cancel_requested
            .lock()
            .expect("cancel set lock poisoned")
            .insert(job.id.clone());

        h.processor
            .set_behavior(MockBehavior::SuccessWithProgress(vec![50]));
        h.manager.retry(&job.id).unwrap();

        // The new execution's progress and completion apply normally
        let done = wait_for_status(&h.manager, &job.id, JobStatus::Processed).await;
        assert_eq!(done.progress, 100);
        assert!(done.result.is_some());
    }

    #[tokio::test]
    async fn test_dismiss_requires_terminal() {
        let h = harness(1, MockBehavior::Success);
        let job = h.manager.submit(separation_payload()).unwrap();
        wait_for_status(&h.manager, &job.id, JobStatus::Processed).await;

        let dismissed = h.manager.dismiss(&job.id).unwrap();
        assert_eq!(dismissed.status, JobStatus::Dismissed);

        // Hidden from the default listing
        assert!(h
            .manager
            .list(&JobFilter::default())
            .iter()
            .all(|j| j.id != job.id));

        let queued = h.manager.submit(JobPayload::Download {
            source_url: "https://example.com/a.mp3".into(),
            title: None,
        });
        let queued = queued.unwrap();
        // QUEUED may already be PROCESSING; either way dismissal is illegal
        assert!(h.manager.dismiss(&queued.id).is_err());
    }

    #[tokio::test]
    async fn test_lifecycle_events_reach_subscribers() {
        let h = harness(1, MockBehavior::SuccessWithProgress(vec![50]));
        let mut rx = h.manager.hub.subscribe(crate::domain::Topic::Jobs);

        let job = h.manager.submit(separation_payload()).unwrap();
        wait_for_status(&h.manager, &job.id, JobStatus::Processed).await;

        let mut saw_created = false;
        let mut saw_started = false;
        let mut saw_progress = false;
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for events")
                .expect("hub closed");
            match event {
                HostEvent::JobCreated { job: j } => {
                    assert_eq!(j.id, job.id);
                    saw_created = true;
                }
                HostEvent::JobStarted { job_id } => {
                    assert_eq!(job_id, job.id);
                    saw_started = true;
                }
                HostEvent::JobProgress { progress, .. } => {
                    assert_eq!(progress, 50);
                    saw_progress = true;
                }
                HostEvent::JobTerminal { status, .. } => {
                    assert_eq!(status, JobStatus::Processed);
                    break;
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert!(saw_created && saw_started && saw_progress);
    }
}
