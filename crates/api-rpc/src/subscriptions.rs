//! Event Subscriptions
//!
//! Serves the `events.subscribe.v1` push channel: snapshot first, then every
//! delta in publish order. The broadcast receivers are opened BEFORE the
//! snapshots are taken, so an event racing the snapshot is delivered as a
//! duplicate delta rather than lost; deltas carry full records and applying
//! one twice is harmless.
//!
//! A consumer that falls behind the per-connection backlog observes a lag
//! error and is disconnected; it is expected to resubscribe for a fresh
//! snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use jsonrpsee::core::StringError;
use jsonrpsee::server::{PendingSubscriptionSink, SubscriptionMessage};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use openmic_core::application::{BroadcastHub, JobLifecycleManager, RotationManager};
use openmic_core::domain::{HostEvent, Topic};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Serve one subscription until the client disconnects or lags out
pub async fn serve(
    pending: PendingSubscriptionSink,
    topics: Vec<Topic>,
    lifecycle: Arc<JobLifecycleManager>,
    rotation: Arc<RotationManager>,
    hub: Arc<BroadcastHub>,
) -> Result<(), StringError> {
    let conn_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);

    // Open receivers before snapshotting: nothing published after this
    // point can be missed.
    let receivers: Vec<_> = topics.iter().map(|t| hub.subscribe(*t)).collect();

    let sink = pending.accept().await?;
    info!(conn_id, topics = ?topics, "Event subscription opened");

    for topic in &topics {
        let snapshot = match topic {
            Topic::Jobs => lifecycle.snapshot(),
            Topic::Queue => HostEvent::QueueSnapshot {
                entries: rotation.snapshot(),
            },
        };
        sink.send(to_message(&snapshot)?).await?;
    }

    let mut merged = futures::stream::select_all(receivers.into_iter().map(BroadcastStream::new));

    loop {
        tokio::select! {
            _ = sink.closed() => {
                debug!(conn_id, "Subscriber disconnected");
                break;
            }
            item = merged.next() => match item {
                Some(Ok(event)) => {
                    sink.send(to_message(&event)?).await?;
                }
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    // Slow consumers are dropped rather than stalling
                    // publishers; missed deltas cannot be recovered.
                    warn!(conn_id, skipped, "Subscriber lagged behind, dropping connection");
                    return Err(StringError::from(format!(
                        "subscription lagged, {} events skipped; resubscribe for a fresh snapshot",
                        skipped
                    )));
                }
                None => break, // hub torn down
            },
        }
    }

    info!(conn_id, "Event subscription closed");
    Ok(())
}

/// Parse the requested topic names; empty means all topics
pub fn parse_topics(names: &[String]) -> Result<Vec<Topic>, StringError> {
    if names.is_empty() {
        return Ok(vec![Topic::Jobs, Topic::Queue]);
    }
    let mut topics = Vec::with_capacity(names.len());
    for name in names {
        let topic: Topic = name
            .parse()
            .map_err(|e: openmic_core::domain::DomainError| StringError::from(e.to_string()))?;
        if !topics.contains(&topic) {
            topics.push(topic);
        }
    }
    Ok(topics)
}

fn to_message(event: &HostEvent) -> Result<SubscriptionMessage, StringError> {
    SubscriptionMessage::from_json(event).map_err(|e| StringError::from(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_topics() {
        assert_eq!(
            parse_topics(&[]).unwrap(),
            vec![Topic::Jobs, Topic::Queue]
        );
        assert_eq!(
            parse_topics(&["queue".to_string()]).unwrap(),
            vec![Topic::Queue]
        );
        // Duplicates collapse
        assert_eq!(
            parse_topics(&["jobs".to_string(), "jobs".to_string()]).unwrap(),
            vec![Topic::Jobs]
        );
        assert!(parse_topics(&["playlists".to_string()]).is_err());
    }
}
