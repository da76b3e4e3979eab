// Infrastructure - SQLite Adapter
// Implements: SongRepository

mod connection;
mod migration;
mod song_repository;

pub use connection::create_pool;
pub use migration::run_migrations;
pub use song_repository::SqliteSongRepository;

// Note: sqlx::Error conversion is handled by wrapping in helper functions
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
