//! End-to-end job lifecycle scenarios
//!
//! Wires the real lifecycle manager, worker pool, and broadcast hub against
//! the mock media processor and drives jobs through every path a venue host
//! would hit in a session.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use openmic_core::application::pool::constants::{BROADCAST_CAPACITY, WORKER_EVENT_CAPACITY};
use openmic_core::application::pool::{shutdown_channel, ShutdownSender};
use openmic_core::application::store::JobFilter;
use openmic_core::application::{BroadcastHub, JobLifecycleManager, JobStore, WorkerPool};
use openmic_core::domain::{DomainError, Job, JobId, JobPayload, JobStatus};
use openmic_core::error::AppError;
use openmic_core::port::media_processor::mocks::{MockBehavior, MockMediaProcessor};
use openmic_core::port::song_repository::mocks::MockSongRepository;
use openmic_core::port::{MediaProcessor, SongRepository, SystemTimeProvider, UuidProvider};

struct TestStack {
    lifecycle: Arc<JobLifecycleManager>,
    processor: Arc<MockMediaProcessor>,
    songs: Arc<MockSongRepository>,
    _shutdown: ShutdownSender,
}

fn stack(slots: usize, ceiling: Duration, behavior: MockBehavior) -> TestStack {
    let songs = Arc::new(MockSongRepository::with_songs(&["song-1", "song-2"]));
    let processor = Arc::new(MockMediaProcessor::new(behavior));
    let (events_tx, events_rx) = mpsc::channel(WORKER_EVENT_CAPACITY);
    let pool = Arc::new(WorkerPool::new(
        slots,
        ceiling,
        processor.clone() as Arc<dyn MediaProcessor>,
        events_tx,
    ));
    let lifecycle = Arc::new(JobLifecycleManager::new(
        Arc::new(JobStore::new()),
        pool,
        Arc::new(BroadcastHub::new(BROADCAST_CAPACITY)),
        songs.clone(),
        Arc::new(UuidProvider),
        Arc::new(SystemTimeProvider),
    ));

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    tokio::spawn(lifecycle.clone().run(events_rx, shutdown_rx));

    TestStack {
        lifecycle,
        processor,
        songs,
        _shutdown: shutdown_tx,
    }
}

fn separation(song_id: &str) -> JobPayload {
    JobPayload::Separation {
        song_id: song_id.into(),
        input_path: format!("/media/{}.mp3", song_id),
    }
}

async fn wait_for_status(
    lifecycle: &JobLifecycleManager,
    id: &JobId,
    status: JobStatus,
) -> Job {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let job = lifecycle.get(id).unwrap();
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
async fn test_full_session_submit_to_processed() {
    let s = stack(
        2,
        Duration::from_secs(30),
        MockBehavior::SuccessWithProgress(vec![20, 55, 80]),
    );

    let job = s.lifecycle.submit(separation("song-1")).unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.progress, 0);

    let done = wait_for_status(&s.lifecycle, &job.id, JobStatus::Processed).await;
    assert_eq!(done.progress, 100);
    assert!(done.result.is_some());
    assert!(!done.retried);

    // Separation success lands in the song library
    let song = s.songs.get(&"song-1".to_string()).await.unwrap().unwrap();
    assert!(song.is_separated());
}

#[tokio::test]
async fn test_saturated_pool_queues_instead_of_rejecting() {
    // One slot, one hanging holder; further submissions wait, never error
    let s = stack(1, Duration::from_secs(60), MockBehavior::Hang);
    let holder = s.lifecycle.submit(separation("song-1")).unwrap();
    wait_for_status(&s.lifecycle, &holder.id, JobStatus::Processing).await;

    let queued = s.lifecycle.submit(separation("song-2")).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        s.lifecycle.get(&queued.id).unwrap().status,
        JobStatus::Queued
    );

    // Freeing the slot lets the queued job through
    s.lifecycle.cancel(&holder.id).unwrap();
    wait_for_status(&s.lifecycle, &holder.id, JobStatus::Cancelled).await;
    wait_for_status(&s.lifecycle, &queued.id, JobStatus::Processing).await;
}

#[tokio::test]
async fn test_cancel_queued_job_never_runs() {
    let s = stack(1, Duration::from_secs(60), MockBehavior::Hang);
    let holder = s.lifecycle.submit(separation("song-1")).unwrap();
    wait_for_status(&s.lifecycle, &holder.id, JobStatus::Processing).await;

    let queued = s.lifecycle.submit(separation("song-2")).unwrap();
    let cancelled = s.lifecycle.cancel(&queued.id).unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);

    // Give any stray worker a chance to run, then verify it never did
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(s.processor.call_count(), 1);
}

#[tokio::test]
async fn test_cancel_processing_resolves_cancelled_not_resurrected() {
    let s = stack(1, Duration::from_secs(60), MockBehavior::Hang);
    let job = s.lifecycle.submit(separation("song-1")).unwrap();
    wait_for_status(&s.lifecycle, &job.id, JobStatus::Processing).await;

    s.lifecycle.cancel(&job.id).unwrap();
    let settled = wait_for_status(&s.lifecycle, &job.id, JobStatus::Cancelled).await;

    // Stays cancelled; no late event flips it back
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        s.lifecycle.get(&job.id).unwrap().status,
        JobStatus::Cancelled
    );
    assert_eq!(settled.updated_at, s.lifecycle.get(&job.id).unwrap().updated_at);
}

#[tokio::test]
async fn test_processing_ceiling_force_fails_with_reason() {
    let s = stack(1, Duration::from_millis(150), MockBehavior::Hang);
    let job = s.lifecycle.submit(separation("song-1")).unwrap();

    let failed = wait_for_status(&s.lifecycle, &job.id, JobStatus::Error).await;
    assert!(failed
        .message
        .as_deref()
        .unwrap_or_default()
        .contains("ceiling"));
}

#[tokio::test]
async fn test_failure_then_retry_then_permanent_failure() {
    let s = stack(
        1,
        Duration::from_secs(30),
        MockBehavior::FailAfterProgress(vec![40, 75], "separation model crashed".into()),
    );

    let job = s.lifecycle.submit(separation("song-1")).unwrap();
    let failed = wait_for_status(&s.lifecycle, &job.id, JobStatus::Error).await;
    assert_eq!(failed.progress, 75);
    assert_eq!(failed.message.as_deref(), Some("separation model crashed"));

    // First retry is accepted, keeps the id, resets progress
    let retried = s.lifecycle.retry(&job.id).unwrap();
    assert_eq!(retried.id, job.id);
    assert_eq!(retried.progress, 0);
    assert!(retried.retried);

    wait_for_status(&s.lifecycle, &job.id, JobStatus::Error).await;

    // Second retry is rejected
    assert!(matches!(
        s.lifecycle.retry(&job.id),
        Err(AppError::Domain(DomainError::InvalidTransition { .. }))
    ));
}

#[tokio::test]
async fn test_worker_panic_surfaces_as_job_error() {
    let s = stack(
        2,
        Duration::from_secs(30),
        MockBehavior::Panic("model OOM".into()),
    );
    let job = s.lifecycle.submit(separation("song-1")).unwrap();

    let failed = wait_for_status(&s.lifecycle, &job.id, JobStatus::Error).await;
    assert!(failed.message.as_deref().unwrap_or_default().contains("model OOM"));

    // The pool survives; new jobs still run
    s.processor.set_behavior(MockBehavior::Success);
    let next = s.lifecycle.submit(separation("song-2")).unwrap();
    wait_for_status(&s.lifecycle, &next.id, JobStatus::Processed).await;
}

#[tokio::test]
async fn test_dismiss_hides_but_get_still_finds() {
    let s = stack(1, Duration::from_secs(30), MockBehavior::Success);
    let job = s.lifecycle.submit(separation("song-1")).unwrap();
    wait_for_status(&s.lifecycle, &job.id, JobStatus::Processed).await;

    s.lifecycle.dismiss(&job.id).unwrap();

    assert!(s.lifecycle.list(&JobFilter::default()).is_empty());
    let all = s.lifecycle.list(&JobFilter {
        include_dismissed: true,
        ..Default::default()
    });
    assert_eq!(all.len(), 1);
    assert_eq!(
        s.lifecycle.get(&job.id).unwrap().status,
        JobStatus::Dismissed
    );
}

#[tokio::test]
async fn test_invalid_payloads_rejected_before_any_state() {
    let s = stack(1, Duration::from_secs(30), MockBehavior::Success);

    for payload in [
        JobPayload::Separation {
            song_id: "   ".into(),
            input_path: "/a".into(),
        },
        JobPayload::Download {
            source_url: "file:///etc/passwd".into(),
            title: None,
        },
        JobPayload::Enrichment {
            song_id: "song-1".into(),
            search_terms: "".into(),
        },
    ] {
        assert!(matches!(
            s.lifecycle.submit(payload),
            Err(AppError::Domain(DomainError::Validation(_)))
        ));
    }

    assert!(s
        .lifecycle
        .list(&JobFilter {
            include_dismissed: true,
            ..Default::default()
        })
        .is_empty());
    assert_eq!(s.processor.call_count(), 0);
}
