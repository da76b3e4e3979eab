// Job Domain Model
//
// One tracked unit of asynchronous background work. Workers never mutate a
// job directly; every transition goes through the methods below so the
// state machine cannot be bypassed.

use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, Result};

/// Job ID (UUID v4)
pub type JobId = String;

/// Maximum length accepted for enrichment search terms
pub const MAX_SEARCH_TERMS_LEN: usize = 256;

/// Job status
///
/// Legal transitions:
/// `QUEUED -> PROCESSING -> {PROCESSED | ERROR}`,
/// `QUEUED | PROCESSING -> CANCELLED`,
/// any terminal `-> DISMISSED`,
/// `ERROR -> QUEUED` exactly once per job (retry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Processing,
    Processed,
    Error,
    Cancelled,
    Dismissed,
}

impl JobStatus {
    /// A terminal status is one from which no automatic transition occurs
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Processed | JobStatus::Error | JobStatus::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "QUEUED"),
            JobStatus::Processing => write!(f, "PROCESSING"),
            JobStatus::Processed => write!(f, "PROCESSED"),
            JobStatus::Error => write!(f, "ERROR"),
            JobStatus::Cancelled => write!(f, "CANCELLED"),
            JobStatus::Dismissed => write!(f, "DISMISSED"),
        }
    }
}

/// Job kind discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Separation,
    Download,
    Enrichment,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Separation => write!(f, "separation"),
            JobKind::Download => write!(f, "download"),
            JobKind::Enrichment => write!(f, "enrichment"),
        }
    }
}

/// Kind-specific job input, tagged by `kind`
///
/// Opaque to the lifecycle manager; each variant is dispatched to the
/// matching worker entry point by the media processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    /// Split a source recording into vocal and instrumental stems
    Separation { song_id: String, input_path: String },
    /// Fetch source media from a URL into the local media directory
    Download {
        source_url: String,
        #[serde(default)]
        title: Option<String>,
    },
    /// Look up catalog metadata candidates for a library song
    Enrichment { song_id: String, search_terms: String },
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            JobPayload::Separation { .. } => JobKind::Separation,
            JobPayload::Download { .. } => JobKind::Download,
            JobPayload::Enrichment { .. } => JobKind::Enrichment,
        }
    }

    /// Validate the payload before any state mutation
    pub fn validate(&self) -> Result<()> {
        match self {
            JobPayload::Separation {
                song_id,
                input_path,
            } => {
                if song_id.trim().is_empty() {
                    return Err(DomainError::Validation("song_id must not be empty".into()));
                }
                if input_path.trim().is_empty() {
                    return Err(DomainError::Validation(
                        "input_path must not be empty".into(),
                    ));
                }
            }
            JobPayload::Download { source_url, .. } => {
                if !source_url.starts_with("http://") && !source_url.starts_with("https://") {
                    return Err(DomainError::Validation(format!(
                        "source_url must be an http(s) URL, got '{}'",
                        source_url
                    )));
                }
            }
            JobPayload::Enrichment {
                song_id,
                search_terms,
            } => {
                if song_id.trim().is_empty() {
                    return Err(DomainError::Validation("song_id must not be empty".into()));
                }
                let terms = search_terms.trim();
                if terms.is_empty() || terms.len() > MAX_SEARCH_TERMS_LEN {
                    return Err(DomainError::Validation(format!(
                        "search_terms must be 1-{} characters",
                        MAX_SEARCH_TERMS_LEN
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Job Entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,

    /// Percentage, monotonically non-decreasing while PROCESSING
    pub progress: u8,

    pub payload: JobPayload,

    /// Latest human-readable status string (error detail or progress note)
    pub message: Option<String>,

    /// Kind-specific result attached on successful completion (opaque)
    pub result: Option<serde_json::Value>,

    pub created_at: i64, // epoch ms
    pub updated_at: i64,

    /// ERROR -> QUEUED is permitted exactly once per job
    pub retried: bool,
}

impl Job {
    /// Create a new job in QUEUED
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `payload` - Kind-specific input
    pub fn new(id: impl Into<String>, created_at: i64, payload: JobPayload) -> Self {
        Self {
            id: id.into(),
            kind: payload.kind(),
            status: JobStatus::Queued,
            progress: 0,
            payload,
            message: None,
            result: None,
            created_at,
            updated_at: created_at,
            retried: false,
        }
    }

    fn illegal(&self, to: JobStatus) -> DomainError {
        DomainError::InvalidTransition {
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }

    /// Transition to PROCESSING (worker slot acquired)
    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        if self.status != JobStatus::Queued {
            return Err(self.illegal(JobStatus::Processing));
        }
        self.status = JobStatus::Processing;
        self.updated_at = now_millis;
        Ok(())
    }

    /// Transition to PROCESSED (worker reported success)
    pub fn complete(&mut self, now_millis: i64) -> Result<()> {
        if self.status != JobStatus::Processing {
            return Err(self.illegal(JobStatus::Processed));
        }
        self.status = JobStatus::Processed;
        self.progress = 100;
        self.updated_at = now_millis;
        Ok(())
    }

    /// Transition to ERROR with a human-readable message
    ///
    /// Progress is left where it was; clients see where the work stopped.
    pub fn fail(&mut self, now_millis: i64, message: impl Into<String>) -> Result<()> {
        if self.status != JobStatus::Processing {
            return Err(self.illegal(JobStatus::Error));
        }
        self.status = JobStatus::Error;
        self.message = Some(message.into());
        self.updated_at = now_millis;
        Ok(())
    }

    /// Transition to CANCELLED (user-initiated, from QUEUED or PROCESSING)
    pub fn cancel(&mut self, now_millis: i64) -> Result<()> {
        if !matches!(self.status, JobStatus::Queued | JobStatus::Processing) {
            return Err(self.illegal(JobStatus::Cancelled));
        }
        self.status = JobStatus::Cancelled;
        self.updated_at = now_millis;
        Ok(())
    }

    /// Hide a terminal job from active views (retained for the audit window)
    pub fn dismiss(&mut self, now_millis: i64) -> Result<()> {
        if !self.status.is_terminal() {
            return Err(self.illegal(JobStatus::Dismissed));
        }
        self.status = JobStatus::Dismissed;
        self.updated_at = now_millis;
        Ok(())
    }

    /// ERROR -> QUEUED, allowed exactly once per job
    ///
    /// Keeps the id, resets progress, clears the message.
    pub fn retry(&mut self, now_millis: i64) -> Result<()> {
        if self.status != JobStatus::Error || self.retried {
            return Err(self.illegal(JobStatus::Queued));
        }
        self.status = JobStatus::Queued;
        self.progress = 0;
        self.message = None;
        self.result = None;
        self.retried = true;
        self.updated_at = now_millis;
        Ok(())
    }

    /// Record a progress report; must not transition status
    ///
    /// Progress is clamped monotonic: a late or reordered report can never
    /// move the percentage backwards.
    pub fn record_progress(
        &mut self,
        percent: u8,
        note: Option<String>,
        now_millis: i64,
    ) -> Result<()> {
        if self.status != JobStatus::Processing {
            return Err(DomainError::InvalidTransition {
                from: self.status.to_string(),
                to: "PROCESSING (progress)".to_string(),
            });
        }
        self.progress = self.progress.max(percent.min(100));
        if note.is_some() {
            self.message = note;
        }
        self.updated_at = now_millis;
        Ok(())
    }
}
