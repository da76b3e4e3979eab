// SQLite SongRepository Implementation

use async_trait::async_trait;
use openmic_core::domain::{Song, SongId};
use openmic_core::error::{AppError, Result};
use openmic_core::port::SongRepository;
use sqlx::SqlitePool;

// Helper to convert sqlx::Error to AppError with structured information
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "2067" | "1555" => AppError::Database(format!(
                        "Unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "5" => AppError::Database(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    "13" => AppError::Database(format!("Database full: {}", db_err.message())),
                    _ => AppError::Database(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Database(format!("Column not found: {}", col))
        }
        _ => AppError::Database(err.to_string()),
    }
}

#[derive(sqlx::FromRow)]
struct SongRow {
    id: String,
    title: String,
    artist: Option<String>,
    original_path: String,
    vocals_path: Option<String>,
    instrumental_path: Option<String>,
    added_at: i64,
}

impl SongRow {
    fn into_song(self) -> Song {
        Song {
            id: self.id,
            title: self.title,
            artist: self.artist,
            original_path: self.original_path,
            vocals_path: self.vocals_path,
            instrumental_path: self.instrumental_path,
            added_at: self.added_at,
        }
    }
}

pub struct SqliteSongRepository {
    pool: SqlitePool,
}

impl SqliteSongRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SongRepository for SqliteSongRepository {
    async fn get(&self, id: &SongId) -> Result<Option<Song>> {
        let row = sqlx::query_as::<_, SongRow>("SELECT * FROM songs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(|r| r.into_song()))
    }

    async fn exists(&self, id: &SongId) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM songs WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(count > 0)
    }

    async fn upsert(&self, song: &Song) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO songs (
                id, title, artist, original_path,
                vocals_path, instrumental_path, added_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                artist = excluded.artist,
                original_path = excluded.original_path,
                vocals_path = excluded.vocals_path,
                instrumental_path = excluded.instrumental_path
            "#,
        )
        .bind(&song.id)
        .bind(&song.title)
        .bind(&song.artist)
        .bind(&song.original_path)
        .bind(&song.vocals_path)
        .bind(&song.instrumental_path)
        .bind(song.added_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}
