// Performance Queue Manager (singer rotation)
//
// Ordered list of (song, singer) entries with contiguous positions 0..n-1.
// Every mutation renumbers and publishes the full entry list under the same
// lock, so observers always see a consistent ordering.

use std::sync::{Arc, Mutex};

use tracing::info;

use crate::application::hub::BroadcastHub;
use crate::domain::rotation::{validate_singer_name, EntryId, SingerEntry};
use crate::domain::{DomainError, HostEvent, SongId};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, SongRepository, TimeProvider};

pub struct RotationManager {
    entries: Mutex<Vec<SingerEntry>>,
    songs: Arc<dyn SongRepository>,
    hub: Arc<BroadcastHub>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl RotationManager {
    pub fn new(
        songs: Arc<dyn SongRepository>,
        hub: Arc<BroadcastHub>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            songs,
            hub,
            id_provider,
            time_provider,
        }
    }

    /// Append an entry at the tail of the rotation
    pub async fn add(&self, song_id: &SongId, singer_name: &str) -> Result<SingerEntry> {
        let singer_name = validate_singer_name(singer_name)?;
        if !self.songs.exists(song_id).await? {
            return Err(AppError::NotFound(format!("song {} not found", song_id)));
        }

        let entry = SingerEntry {
            id: self.id_provider.generate_id(),
            song_id: song_id.clone(),
            singer_name,
            position: 0, // renumbered below
            added_at: self.time_provider.now_millis(),
        };

        let mut entries = self.entries.lock().expect("rotation lock poisoned");
        entries.push(entry.clone());
        renumber(&mut entries);
        let entry = entries
            .last()
            .cloned()
            .unwrap_or(entry);
        info!(entry_id = %entry.id, song_id = %entry.song_id, singer = %entry.singer_name, position = entry.position, "Rotation entry added");
        self.publish_locked(&entries);
        Ok(entry)
    }

    /// Remove one entry; later entries shift up
    pub fn remove(&self, entry_id: &EntryId) -> Result<SingerEntry> {
        let mut entries = self.entries.lock().expect("rotation lock poisoned");
        let index = entries
            .iter()
            .position(|e| &e.id == entry_id)
            .ok_or_else(|| DomainError::EntryNotFound(entry_id.clone()))?;
        let removed = entries.remove(index);
        renumber(&mut entries);
        info!(entry_id = %removed.id, singer = %removed.singer_name, "Rotation entry removed");
        self.publish_locked(&entries);
        Ok(removed)
    }

    /// Replace the entire ordering atomically
    ///
    /// `ordered_ids` must be exactly the current entry id set as a
    /// permutation; anything else (missing, unknown, or duplicated ids)
    /// leaves the rotation untouched.
    pub fn reorder(&self, ordered_ids: &[EntryId]) -> Result<Vec<SingerEntry>> {
        let mut entries = self.entries.lock().expect("rotation lock poisoned");

        if ordered_ids.len() != entries.len() {
            return Err(AppError::Conflict(format!(
                "reorder carries {} ids but rotation holds {} entries",
                ordered_ids.len(),
                entries.len()
            )));
        }

        let mut reordered = Vec::with_capacity(entries.len());
        for id in ordered_ids {
            let index = entries
                .iter()
                .position(|e| &e.id == id)
                .ok_or_else(|| {
                    AppError::Conflict(format!("reorder references unknown or duplicate entry {}", id))
                })?;
            reordered.push(entries.remove(index));
        }

        *entries = reordered;
        renumber(&mut entries);
        info!(count = entries.len(), "Rotation reordered");
        self.publish_locked(&entries);
        Ok(entries.clone())
    }

    /// Pop the head entry (position 0), shifting the rest up
    ///
    /// Empty rotation is not an error; the caller decides what "nothing to
    /// play" means.
    pub fn pop_head(&self) -> Result<Option<SingerEntry>> {
        let mut entries = self.entries.lock().expect("rotation lock poisoned");
        if entries.is_empty() {
            return Ok(None);
        }
        let head = entries.remove(0);
        renumber(&mut entries);
        info!(entry_id = %head.id, singer = %head.singer_name, song_id = %head.song_id, "Rotation head popped");
        self.publish_locked(&entries);
        Ok(Some(head))
    }

    /// Current entries in performance order
    pub fn snapshot(&self) -> Vec<SingerEntry> {
        self.entries.lock().expect("rotation lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("rotation lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn publish_locked(&self, entries: &[SingerEntry]) {
        self.hub.publish(HostEvent::QueueChanged {
            entries: entries.to_vec(),
        });
    }
}

fn renumber(entries: &mut [SingerEntry]) {
    for (position, entry) in entries.iter_mut().enumerate() {
        entry.position = position;
    }
}
