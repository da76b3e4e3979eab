// Media Engine
//
// The production `MediaProcessor`: dispatches each payload kind to its
// collaborator. Cancellation is polled at safe points only; a download is
// abandoned between chunks, the separation subprocess is killed, a catalog
// search is checked before the request goes out.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{info, warn};

use openmic_core::domain::JobPayload;
use openmic_core::port::cancellation::CancelToken;
use openmic_core::port::{MediaProcessor, ProcessError, ProcessOutcome, ProgressReport};

use crate::catalog::CatalogClient;
use crate::separator::SubprocessSeparator;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10 * 60);

pub struct MediaEngine {
    separator: SubprocessSeparator,
    catalog: CatalogClient,
    http: reqwest::Client,
    media_dir: PathBuf,
}

impl MediaEngine {
    pub fn new(
        separator: SubprocessSeparator,
        catalog: CatalogClient,
        media_dir: impl Into<PathBuf>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            separator,
            catalog,
            http,
            media_dir: media_dir.into(),
        }
    }

    async fn download(
        &self,
        source_url: &str,
        title: Option<&str>,
        progress: mpsc::Sender<ProgressReport>,
        cancel: &CancelToken,
    ) -> Result<ProcessOutcome, ProcessError> {
        let file_name = download_file_name(source_url, title);
        let dir = self.media_dir.join("downloads");
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ProcessError::Io(e.to_string()))?;
        let path = dir.join(&file_name);

        info!(url = %source_url, path = %path.display(), "Starting media download");

        let response = self
            .http
            .get(source_url)
            .send()
            .await
            .map_err(|e| ProcessError::EngineFailure(format!("download request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(ProcessError::EngineFailure(format!(
                "download source returned {}",
                response.status()
            )));
        }

        let total = response.content_length();
        let mut stream = response.bytes_stream();
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| ProcessError::Io(e.to_string()))?;

        let mut received: u64 = 0;
        let mut last_percent: u8 = 0;
        while let Some(chunk) = stream.next().await {
            if cancel.is_cancelled() {
                warn!(url = %source_url, "Download cancelled, removing partial file");
                drop(file);
                let _ = tokio::fs::remove_file(&path).await;
                return Err(ProcessError::Cancelled);
            }

            let chunk =
                chunk.map_err(|e| ProcessError::EngineFailure(format!("download stream: {}", e)))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| ProcessError::Io(e.to_string()))?;
            received += chunk.len() as u64;

            if let Some(total) = total.filter(|t| *t > 0) {
                let percent = ((received * 100) / total).min(100) as u8;
                if percent > last_percent {
                    last_percent = percent;
                    let _ = progress
                        .send(ProgressReport {
                            percent,
                            note: Some("downloading".to_string()),
                        })
                        .await;
                }
            }
        }

        file.flush()
            .await
            .map_err(|e| ProcessError::Io(e.to_string()))?;

        info!(path = %path.display(), bytes = received, "Download complete");
        Ok(ProcessOutcome::Downloaded {
            media_path: path.to_string_lossy().into_owned(),
        })
    }
}

#[async_trait]
impl MediaProcessor for MediaEngine {
    async fn process(
        &self,
        payload: &JobPayload,
        progress: mpsc::Sender<ProgressReport>,
        cancel: CancelToken,
    ) -> Result<ProcessOutcome, ProcessError> {
        match payload {
            JobPayload::Separation {
                song_id,
                input_path,
            } => {
                let out_dir = self.media_dir.join("stems").join(song_id);
                let (vocals_path, instrumental_path) = self
                    .separator
                    .separate(input_path, &out_dir, progress, cancel)
                    .await?;
                Ok(ProcessOutcome::Separated {
                    vocals_path,
                    instrumental_path,
                })
            }
            JobPayload::Download { source_url, title } => {
                self.download(source_url, title.as_deref(), progress, &cancel)
                    .await
            }
            JobPayload::Enrichment { search_terms, .. } => {
                if cancel.is_cancelled() {
                    return Err(ProcessError::Cancelled);
                }
                let candidates = self.catalog.search(search_terms).await?;
                Ok(ProcessOutcome::Enriched { candidates })
            }
        }
    }
}

/// Derive a filesystem-safe file name for a download
fn download_file_name(source_url: &str, title: Option<&str>) -> String {
    let base = title
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .or_else(|| {
            source_url
                .split('/')
                .next_back()
                .map(|s| s.split('?').next().unwrap_or(s))
                .filter(|s| !s.is_empty())
                .map(String::from)
        })
        .unwrap_or_else(|| "download".to_string());

    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.contains('.') {
        sanitized
    } else {
        format!("{}.mp3", sanitized)
    }
}
