//! Singer rotation scenarios
//!
//! The rotation backed by the real SQLite song library, exercised the way a
//! host runs a night: singers join, drop out, get bumped around, and the
//! head pops when it is their turn.

use std::sync::Arc;

use openmic_core::application::pool::constants::BROADCAST_CAPACITY;
use openmic_core::application::{BroadcastHub, RotationManager};
use openmic_core::domain::{DomainError, Song};
use openmic_core::error::AppError;
use openmic_core::port::song_repository::mocks::MockSongRepository;
use openmic_core::port::{SongRepository, SystemTimeProvider, UuidProvider};
use openmic_infra_sqlite::{create_pool, run_migrations, SqliteSongRepository};

async fn rotation_with_library(song_ids: &[&str]) -> RotationManager {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    let songs = Arc::new(SqliteSongRepository::new(pool));
    for id in song_ids {
        songs
            .upsert(&Song::new(
                *id,
                format!("Title of {}", id),
                format!("/media/{}.mp3", id),
                0,
            ))
            .await
            .unwrap();
    }

    RotationManager::new(
        songs,
        Arc::new(BroadcastHub::new(BROADCAST_CAPACITY)),
        Arc::new(UuidProvider),
        Arc::new(SystemTimeProvider),
    )
}

#[tokio::test]
async fn test_night_of_singers_fifo_with_reorder() {
    let rotation = rotation_with_library(&["song-1", "song-2", "song-3"]).await;

    let alice = rotation.add(&"song-1".to_string(), "Alice").await.unwrap();
    let bob = rotation.add(&"song-2".to_string(), "Bob").await.unwrap();
    let carol = rotation.add(&"song-3".to_string(), "Carol").await.unwrap();
    assert_eq!(
        rotation
            .snapshot()
            .iter()
            .map(|e| e.position)
            .collect::<Vec<_>>(),
        vec![0, 1, 2]
    );

    // Host bumps Bob to the front
    rotation
        .reorder(&[bob.id.clone(), alice.id.clone(), carol.id.clone()])
        .unwrap();

    // Performance order follows the new arrangement
    assert_eq!(rotation.pop_head().unwrap().unwrap().singer_name, "Bob");
    assert_eq!(rotation.pop_head().unwrap().unwrap().singer_name, "Alice");
    assert_eq!(rotation.pop_head().unwrap().unwrap().singer_name, "Carol");
    assert!(rotation.pop_head().unwrap().is_none());
}

#[tokio::test]
async fn test_add_requires_song_in_library() {
    let rotation = rotation_with_library(&["song-1"]).await;

    assert!(matches!(
        rotation.add(&"missing-song".to_string(), "Alice").await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        rotation.add(&"song-1".to_string(), "   ").await,
        Err(AppError::Domain(DomainError::Validation(_)))
    ));
    assert!(rotation.is_empty());
}

#[tokio::test]
async fn test_reorder_conflicts_leave_rotation_untouched() {
    let rotation = rotation_with_library(&["song-1", "song-2"]).await;
    let alice = rotation.add(&"song-1".to_string(), "Alice").await.unwrap();
    let bob = rotation.add(&"song-2".to_string(), "Bob").await.unwrap();
    let before = rotation.snapshot();

    // A second client removed Bob in the meantime: the stale reorder
    // references an entry that no longer matches the current set.
    rotation.remove(&bob.id).unwrap();
    let after_remove = rotation.snapshot();

    assert!(matches!(
        rotation.reorder(&[bob.id.clone(), alice.id.clone()]),
        Err(AppError::Conflict(_))
    ));
    assert_eq!(rotation.snapshot(), after_remove);
    assert_ne!(before, after_remove);
}

#[tokio::test]
async fn test_concurrent_adds_keep_positions_contiguous() {
    // Mock library here: the contention under test is the rotation lock
    let rotation = Arc::new(RotationManager::new(
        Arc::new(MockSongRepository::with_songs(&["song-1"])),
        Arc::new(BroadcastHub::new(BROADCAST_CAPACITY)),
        Arc::new(UuidProvider),
        Arc::new(SystemTimeProvider),
    ));

    let mut handles = Vec::new();
    for i in 0..10 {
        let rotation = rotation.clone();
        handles.push(tokio::spawn(async move {
            rotation
                .add(&"song-1".to_string(), &format!("Singer {}", i))
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let entries = rotation.snapshot();
    assert_eq!(entries.len(), 10);
    let positions: Vec<usize> = entries.iter().map(|e| e.position).collect();
    assert_eq!(positions, (0..10).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_remove_middle_entry_renumbers() {
    let rotation = rotation_with_library(&["song-1", "song-2", "song-3"]).await;
    rotation.add(&"song-1".to_string(), "Alice").await.unwrap();
    let bob = rotation.add(&"song-2".to_string(), "Bob").await.unwrap();
    rotation.add(&"song-3".to_string(), "Carol").await.unwrap();

    let removed = rotation.remove(&bob.id).unwrap();
    assert_eq!(removed.singer_name, "Bob");

    let entries = rotation.snapshot();
    assert_eq!(entries[0].singer_name, "Alice");
    assert_eq!(entries[0].position, 0);
    assert_eq!(entries[1].singer_name, "Carol");
    assert_eq!(entries[1].position, 1);
}
