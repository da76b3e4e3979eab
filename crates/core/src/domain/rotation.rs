// Singer Rotation (performance queue) Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, Result};
use crate::domain::song::SongId;

/// Rotation entry ID (UUID v4)
pub type EntryId = String;

pub const MAX_SINGER_NAME_LEN: usize = 128;

/// One (song, singer) pair awaiting performance
///
/// `position` is a contiguous permutation of `0..n-1` after every mutation;
/// the rotation manager renumbers atomically, entries are never left sparse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingerEntry {
    pub id: EntryId,
    pub song_id: SongId,
    pub singer_name: String,
    pub position: usize,
    pub added_at: i64, // epoch ms
}

/// Validate a singer name, returning the trimmed form
pub fn validate_singer_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_SINGER_NAME_LEN {
        return Err(DomainError::Validation(format!(
            "singer name must be 1-{} characters",
            MAX_SINGER_NAME_LEN
        )));
    }
    Ok(trimmed.to_string())
}
