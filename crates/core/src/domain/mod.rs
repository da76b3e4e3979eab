// Domain Layer - entities and pure rules

pub mod error;
pub mod events;
pub mod job;
pub mod rotation;
pub mod song;

pub use error::DomainError;
pub use events::{HostEvent, Topic};
pub use job::{Job, JobId, JobKind, JobPayload, JobStatus};
pub use rotation::{SingerEntry, MAX_SINGER_NAME_LEN};
pub use song::{Song, SongId};
