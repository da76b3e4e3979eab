// Outbound Events
//
// Everything pushed to connected observers goes through the broadcast hub
// as one of these, tagged by `event` on the wire.

use serde::{Deserialize, Serialize};

use crate::domain::job::{Job, JobId, JobStatus};
use crate::domain::rotation::SingerEntry;

/// Subscription topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Job lifecycle updates
    Jobs,
    /// Singer rotation updates
    Queue,
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topic::Jobs => write!(f, "jobs"),
            Topic::Queue => write!(f, "queue"),
        }
    }
}

impl std::str::FromStr for Topic {
    type Err = crate::domain::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jobs" => Ok(Topic::Jobs),
            "queue" => Ok(Topic::Queue),
            other => Err(crate::domain::DomainError::Validation(format!(
                "unknown topic '{}', expected 'jobs' or 'queue'",
                other
            ))),
        }
    }
}

/// Event pushed to subscribers
///
/// Snapshot variants are sent once per topic when a subscription opens, so
/// late joiners are consistent without replaying history. Delta variants
/// carry full records; applying one twice is harmless.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    JobSnapshot { jobs: Vec<Job> },
    JobCreated { job: Job },
    JobStarted { job_id: JobId },
    JobProgress {
        job_id: JobId,
        progress: u8,
        message: Option<String>,
    },
    JobTerminal {
        job_id: JobId,
        status: JobStatus,
        message: Option<String>,
    },
    JobRequeued { job: Job },
    JobDismissed { job_id: JobId },

    QueueSnapshot { entries: Vec<SingerEntry> },
    QueueChanged { entries: Vec<SingerEntry> },
}

impl HostEvent {
    pub fn topic(&self) -> Topic {
        match self {
            HostEvent::JobSnapshot { .. }
            | HostEvent::JobCreated { .. }
            | HostEvent::JobStarted { .. }
            | HostEvent::JobProgress { .. }
            | HostEvent::JobTerminal { .. }
            | HostEvent::JobRequeued { .. }
            | HostEvent::JobDismissed { .. } => Topic::Jobs,
            HostEvent::QueueSnapshot { .. } | HostEvent::QueueChanged { .. } => Topic::Queue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_parsing() {
        assert_eq!("jobs".parse::<Topic>().unwrap(), Topic::Jobs);
        assert_eq!("queue".parse::<Topic>().unwrap(), Topic::Queue);
        assert!("playlists".parse::<Topic>().is_err());
    }

    #[test]
    fn test_event_wire_tag() {
        let event = HostEvent::JobTerminal {
            job_id: "job-1".into(),
            status: JobStatus::Error,
            message: Some("engine crashed".into()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "job_terminal");
        assert_eq!(json["status"], "ERROR");
        assert_eq!(event.topic(), Topic::Jobs);
    }
}
