// Song Library Record
//
// Owned by the song repository; rotation entries hold only the id.

use serde::{Deserialize, Serialize};

/// Song ID (opaque, assigned by the client or derived from the source)
pub type SongId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: SongId,
    pub title: String,
    pub artist: Option<String>,

    /// Source recording as imported
    pub original_path: String,

    /// Stems produced by a separation job, absent until one succeeds
    pub vocals_path: Option<String>,
    pub instrumental_path: Option<String>,

    pub added_at: i64, // epoch ms
}

impl Song {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        original_path: impl Into<String>,
        added_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: None,
            original_path: original_path.into(),
            vocals_path: None,
            instrumental_path: None,
            added_at,
        }
    }

    /// Whether both stems are available for karaoke playback
    pub fn is_separated(&self) -> bool {
        self.vocals_path.is_some() && self.instrumental_path.is_some()
    }
}
