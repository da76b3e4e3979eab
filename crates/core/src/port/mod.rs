// Port Layer - Interfaces for external dependencies

pub mod cancellation;
pub mod id_provider; // For deterministic testing
pub mod media_processor;
pub mod song_repository;
pub mod time_provider;

// Re-exports
pub use cancellation::{cancel_channel, CancelHandle, CancelToken};
pub use id_provider::{IdProvider, UuidProvider};
pub use media_processor::{MediaProcessor, ProcessError, ProcessOutcome, ProgressReport};
pub use song_repository::SongRepository;
pub use time_provider::{SystemTimeProvider, TimeProvider};
