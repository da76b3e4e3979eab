// Media Processor Port
//
// Abstraction over the long-running media collaborators (separation engine,
// media download, catalog search). The core never interprets what happens
// inside `process`; it only sees progress reports, the outcome, and whether
// the worker honored cancellation.

use crate::domain::JobPayload;
use crate::port::cancellation::CancelToken;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Progress report sent over the side channel while a job is processing
#[derive(Debug, Clone)]
pub struct ProgressReport {
    /// Percentage, 0-100
    pub percent: u8,
    /// Optional human-readable note ("splitting stems", "downloading", ...)
    pub note: Option<String>,
}

/// Kind-specific result of a successful execution
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    Separated {
        vocals_path: String,
        instrumental_path: String,
    },
    Downloaded {
        media_path: String,
    },
    Enriched {
        candidates: Vec<serde_json::Value>,
    },
}

/// Execution errors surfaced by a worker
///
/// None of these unwind into the control plane; the pool converts them into
/// a terminal worker event.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Engine spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Processing cancelled")]
    Cancelled,

    #[error("Engine failure: {0}")]
    EngineFailure(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// Media processor trait
///
/// Implementations dispatch on the payload kind to the matching entry point
/// and must poll `cancel` at safe points, returning `ProcessError::Cancelled`
/// once they have stopped.
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    async fn process(
        &self,
        payload: &JobPayload,
        progress: mpsc::Sender<ProgressReport>,
        cancel: CancelToken,
    ) -> Result<ProcessOutcome, ProcessError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Mock processor behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Succeed immediately
        Success,
        /// Report the given percentages, then succeed
        SuccessWithProgress(Vec<u8>),
        /// Report the given percentages, then fail with message
        FailAfterProgress(Vec<u8>, String),
        /// Fail immediately with message
        Fail(String),
        /// Panic with message (for panic isolation testing)
        Panic(String),
        /// Block until cancelled (or a very long sleep elapses)
        Hang,
    }

    /// Mock media processor for testing
    pub struct MockMediaProcessor {
        behavior: Arc<Mutex<MockBehavior>>,
        call_count: Arc<Mutex<usize>>,
    }

    impl MockMediaProcessor {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                call_count: Arc::new(Mutex::new(0)),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success)
        }

        pub fn new_fail(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Fail(message.into()))
        }

        pub fn new_panic_inducing(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Panic(message.into()))
        }

        pub fn new_hanging() -> Self {
            Self::new(MockBehavior::Hang)
        }

        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap() = behavior;
        }

        /// Number of times `process` was invoked
        pub fn call_count(&self) -> usize {
            *self.call_count.lock().unwrap()
        }

        fn outcome_for(payload: &JobPayload) -> ProcessOutcome {
            match payload {
                JobPayload::Separation { song_id, .. } => ProcessOutcome::Separated {
                    vocals_path: format!("/tmp/mock/{}/vocals.wav", song_id),
                    instrumental_path: format!("/tmp/mock/{}/accompaniment.wav", song_id),
                },
                JobPayload::Download { source_url, .. } => ProcessOutcome::Downloaded {
                    media_path: format!("/tmp/mock/downloads/{}", source_url.len()),
                },
                JobPayload::Enrichment { search_terms, .. } => ProcessOutcome::Enriched {
                    candidates: vec![serde_json::json!({ "match": search_terms })],
                },
            }
        }
    }

    #[async_trait]
    impl MediaProcessor for MockMediaProcessor {
        async fn process(
            &self,
            payload: &JobPayload,
            progress: mpsc::Sender<ProgressReport>,
            mut cancel: CancelToken,
        ) -> Result<ProcessOutcome, ProcessError> {
            *self.call_count.lock().unwrap() += 1;

            let behavior = self.behavior.lock().unwrap().clone();

            match behavior {
                MockBehavior::Success => Ok(Self::outcome_for(payload)),
                MockBehavior::SuccessWithProgress(steps) => {
                    for percent in steps {
                        if cancel.is_cancelled() {
                            return Err(ProcessError::Cancelled);
                        }
                        let _ = progress
                            .send(ProgressReport {
                                percent,
                                note: None,
                            })
                            .await;
                    }
                    Ok(Self::outcome_for(payload))
                }
                MockBehavior::FailAfterProgress(steps, msg) => {
                    for percent in steps {
                        let _ = progress
                            .send(ProgressReport {
                                percent,
                                note: None,
                            })
                            .await;
                    }
                    Err(ProcessError::EngineFailure(msg))
                }
                MockBehavior::Fail(msg) => Err(ProcessError::EngineFailure(msg)),
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg); // Actually panic for panic isolation testing
                }
                MockBehavior::Hang => {
                    tokio::select! {
                        _ = cancel.cancelled() => Err(ProcessError::Cancelled),
                        _ = tokio::time::sleep(Duration::from_secs(3600)) => {
                            Err(ProcessError::EngineFailure("hang elapsed".to_string()))
                        }
                    }
                }
            }
        }
    }
}
