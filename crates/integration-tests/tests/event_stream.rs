//! Broadcast hub delivery guarantees
//!
//! Verifies the contract the push channel is built on: per-topic ordering,
//! snapshot-then-deltas consistency for late joiners, and laggard
//! disconnection instead of publisher stalls.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

use openmic_core::application::pool::constants::{BROADCAST_CAPACITY, WORKER_EVENT_CAPACITY};
use openmic_core::application::pool::{shutdown_channel, ShutdownSender};
use openmic_core::application::{BroadcastHub, JobLifecycleManager, JobStore, WorkerPool};
use openmic_core::domain::{HostEvent, JobPayload, JobStatus, Topic};
use openmic_core::port::media_processor::mocks::{MockBehavior, MockMediaProcessor};
use openmic_core::port::song_repository::mocks::MockSongRepository;
use openmic_core::port::{MediaProcessor, SystemTimeProvider, UuidProvider};

fn stack(behavior: MockBehavior) -> (Arc<JobLifecycleManager>, Arc<BroadcastHub>, ShutdownSender) {
    let hub = Arc::new(BroadcastHub::new(BROADCAST_CAPACITY));
    let (events_tx, events_rx) = mpsc::channel(WORKER_EVENT_CAPACITY);
    let pool = Arc::new(WorkerPool::new(
        2,
        Duration::from_secs(30),
        Arc::new(MockMediaProcessor::new(behavior)) as Arc<dyn MediaProcessor>,
        events_tx,
    ));
    let lifecycle = Arc::new(JobLifecycleManager::new(
        Arc::new(JobStore::new()),
        pool,
        hub.clone(),
        Arc::new(MockSongRepository::with_songs(&["song-1"])),
        Arc::new(UuidProvider),
        Arc::new(SystemTimeProvider),
    ));

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    tokio::spawn(lifecycle.clone().run(events_rx, shutdown_rx));
    (lifecycle, hub, shutdown_tx)
}

fn download(url: &str) -> JobPayload {
    JobPayload::Download {
        source_url: url.into(),
        title: None,
    }
}

async fn recv_event(rx: &mut tokio::sync::broadcast::Receiver<HostEvent>) -> HostEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("hub closed")
}

#[tokio::test]
async fn test_subscriber_sees_full_job_story_in_order() {
    let (lifecycle, hub, _shutdown) = stack(MockBehavior::SuccessWithProgress(vec![30, 60]));
    let mut rx = hub.subscribe(Topic::Jobs);

    let job = lifecycle
        .submit(download("https://example.com/track.mp3"))
        .unwrap();

    // Created -> Started -> Progress... -> Terminal, strictly in this order
    assert!(matches!(recv_event(&mut rx).await, HostEvent::JobCreated { .. }));
    assert!(matches!(recv_event(&mut rx).await, HostEvent::JobStarted { .. }));

    let mut last_progress = 0;
    loop {
        match recv_event(&mut rx).await {
            HostEvent::JobProgress { progress, .. } => {
                assert!(progress >= last_progress, "progress went backwards");
                last_progress = progress;
            }
            HostEvent::JobTerminal { job_id, status, .. } => {
                assert_eq!(job_id, job.id);
                assert_eq!(status, JobStatus::Processed);
                break;
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
    assert_eq!(last_progress, 60);
}

#[tokio::test]
async fn test_late_joiner_snapshot_plus_deltas_is_consistent() {
    let (lifecycle, hub, _shutdown) = stack(MockBehavior::Success);

    // History the late joiner never saw
    let early = lifecycle
        .submit(download("https://example.com/one.mp3"))
        .unwrap();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while lifecycle.get(&early.id).unwrap().status != JobStatus::Processed {
        assert!(tokio::time::Instant::now() < deadline, "job never settled");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // Subscribe-then-snapshot: the receiver is open before the snapshot is
    // taken, so anything published afterwards arrives as a delta.
    let mut rx = hub.subscribe(Topic::Jobs);
    let snapshot = lifecycle.snapshot();

    let late = lifecycle
        .submit(download("https://example.com/two.mp3"))
        .unwrap();

    // The snapshot covers history; deltas cover the new job
    match snapshot {
        HostEvent::JobSnapshot { jobs } => {
            assert!(jobs.iter().any(|j| j.id == early.id));
        }
        other => panic!("expected JobSnapshot, got {:?}", other),
    }

    let mut seen: HashSet<String> = HashSet::new();
    loop {
        match recv_event(&mut rx).await {
            HostEvent::JobCreated { job } => {
                seen.insert(job.id);
            }
            HostEvent::JobTerminal { job_id, .. } if job_id == late.id => break,
            _ => {}
        }
    }
    assert!(seen.contains(&late.id));
    assert!(!seen.contains(&early.id), "history must come from the snapshot, not deltas");
}

#[tokio::test]
async fn test_slow_subscriber_lags_out_while_others_keep_up() {
    let hub = BroadcastHub::new(4);
    let mut slow = hub.subscribe(Topic::Queue);
    let mut fast = hub.subscribe(Topic::Queue);

    for _ in 0..20 {
        hub.publish(HostEvent::QueueChanged { entries: vec![] });
        // The fast consumer drains as it goes
        let _ = fast.try_recv();
    }

    // The fast consumer never lagged; the slow one is told it fell behind
    loop {
        match slow.recv().await {
            Err(RecvError::Lagged(skipped)) => {
                assert!(skipped > 0);
                break;
            }
            Ok(_) => continue,
            Err(other) => panic!("unexpected error {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_topics_are_isolated() {
    let (lifecycle, hub, _shutdown) = stack(MockBehavior::Success);
    let mut queue_rx = hub.subscribe(Topic::Queue);

    let job = lifecycle
        .submit(download("https://example.com/track.mp3"))
        .unwrap();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while lifecycle.get(&job.id).unwrap().status != JobStatus::Processed {
        assert!(tokio::time::Instant::now() < deadline, "job never settled");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // A queue subscriber saw none of the job traffic
    assert!(matches!(
        queue_rx.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));
}
