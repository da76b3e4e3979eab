// Song Repository Port (Interface)
//
// The song library is owned externally; the core only needs lookup and the
// ability to record separation results. Rotation entries hold song ids,
// never copies.

use crate::domain::{Song, SongId};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for the song library
#[async_trait]
pub trait SongRepository: Send + Sync {
    /// Find song by ID
    async fn get(&self, id: &SongId) -> Result<Option<Song>>;

    /// Check song existence (rotation add validates against this)
    async fn exists(&self, id: &SongId) -> Result<bool>;

    /// Insert or replace a song record (separation results land here)
    async fn upsert(&self, song: &Song) -> Result<()>;
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory song repository for tests
    #[derive(Default)]
    pub struct MockSongRepository {
        songs: Mutex<HashMap<SongId, Song>>,
    }

    impl MockSongRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed the library with minimal song records for the given ids
        pub fn with_songs(ids: &[&str]) -> Self {
            let repo = Self::new();
            {
                let mut songs = repo.songs.lock().unwrap();
                for id in ids {
                    songs.insert(
                        id.to_string(),
                        Song::new(*id, format!("Title of {}", id), format!("/media/{}.mp3", id), 0),
                    );
                }
            }
            repo
        }
    }

    #[async_trait]
    impl SongRepository for MockSongRepository {
        async fn get(&self, id: &SongId) -> Result<Option<Song>> {
            Ok(self.songs.lock().unwrap().get(id).cloned())
        }

        async fn exists(&self, id: &SongId) -> Result<bool> {
            Ok(self.songs.lock().unwrap().contains_key(id))
        }

        async fn upsert(&self, song: &Song) -> Result<()> {
            self.songs
                .lock()
                .unwrap()
                .insert(song.id.clone(), song.clone());
            Ok(())
        }
    }
}
