//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results. Jobs and rotation
//! entries cross the wire as their full domain records.

use serde::{Deserialize, Serialize};

use openmic_core::domain::rotation::SingerEntry;
use openmic_core::domain::{Job, JobKind, JobPayload, JobStatus};

/// job.submit.v1 - Submit a background job
#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    /// Kind-tagged payload (`{"kind": "separation", ...}`)
    pub payload: JobPayload,
}

/// job.get.v1 - Fetch one job
#[derive(Debug, Deserialize)]
pub struct GetJobRequest {
    pub job_id: String,
}

/// job.list.v1 - List jobs
#[derive(Debug, Default, Deserialize)]
pub struct ListJobsRequest {
    #[serde(default)]
    pub kind: Option<JobKind>,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub include_dismissed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<Job>,
}

/// job.cancel.v1 / job.dismiss.v1 / job.retry.v1 - Job commands
#[derive(Debug, Deserialize)]
pub struct JobCommandRequest {
    pub job_id: String,
}

/// Single-job result shared by the job commands
#[derive(Debug, Clone, Serialize)]
pub struct JobResponse {
    pub job: Job,
}

/// rotation.add.v1 - Append a singer to the rotation
#[derive(Debug, Deserialize)]
pub struct RotationAddRequest {
    pub song_id: String,
    pub singer_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RotationEntryResponse {
    pub entry: SingerEntry,
}

/// rotation.remove.v1 - Remove one entry
#[derive(Debug, Deserialize)]
pub struct RotationRemoveRequest {
    pub entry_id: String,
}

/// rotation.reorder.v1 - Replace the whole ordering atomically
#[derive(Debug, Deserialize)]
pub struct RotationReorderRequest {
    /// Exactly the current entry ids, in the desired order
    pub ordered_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RotationListResponse {
    pub entries: Vec<SingerEntry>,
}

/// rotation.play_next.v1 - Pop the head entry
#[derive(Debug, Deserialize)]
pub struct PlayNextRequest {
    // No parameters needed
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayNextResponse {
    /// The entry now performing, absent when the rotation is empty
    pub entry: Option<SingerEntry>,
}

/// admin.stats.v1 - Get system statistics
#[derive(Debug, Deserialize)]
pub struct StatsRequest {
    // No parameters needed
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub total_jobs: usize,
    pub queued_jobs: usize,
    pub processing_jobs: usize,
    pub processed_jobs: usize,
    pub error_jobs: usize,
    pub cancelled_jobs: usize,
    pub in_flight_workers: usize,
    pub rotation_entries: usize,
    pub job_subscribers: usize,
    pub queue_subscribers: usize,
    pub uptime_seconds: i64,
}

/// events.subscribe.v1 - Open a push subscription
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    /// Topics to receive ("jobs", "queue"); empty means all
    #[serde(default)]
    pub topics: Vec<String>,
}
