// Separation Engine Subprocess
//
// Spawns the external stem-separation engine as an isolated child process
// and relays its progress lines. The engine contract: read the source file,
// write `vocals.wav` and `accompaniment.wav` into the output directory, and
// print `progress <0-100>` lines on stdout as it goes.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use openmic_core::port::cancellation::CancelToken;
use openmic_core::port::{ProcessError, ProgressReport};

pub struct SubprocessSeparator {
    bin: PathBuf,
}

impl SubprocessSeparator {
    /// # Arguments
    /// * `bin` - Path to the separation engine executable
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }

    /// Run the engine, returning (vocals_path, instrumental_path)
    pub async fn separate(
        &self,
        input_path: &str,
        out_dir: &Path,
        progress: mpsc::Sender<ProgressReport>,
        mut cancel: CancelToken,
    ) -> Result<(String, String), ProcessError> {
        tokio::fs::create_dir_all(out_dir)
            .await
            .map_err(|e| ProcessError::Io(e.to_string()))?;

        info!(bin = %self.bin.display(), input = %input_path, out_dir = %out_dir.display(), "Starting separation engine");

        let mut child = Command::new(&self.bin)
            .arg("--input")
            .arg(input_path)
            .arg("--out-dir")
            .arg(out_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProcessError::SpawnFailed(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProcessError::SpawnFailed("stdout not captured".to_string()))?;
        let mut lines = BufReader::new(stdout).lines();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!(input = %input_path, "Cancellation requested, killing separation engine");
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    return Err(ProcessError::Cancelled);
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Some(percent) = parse_progress_line(&line) {
                            let _ = progress
                                .send(ProgressReport {
                                    percent,
                                    note: Some("separating stems".to_string()),
                                })
                                .await;
                        } else {
                            debug!(line = %line, "Separation engine output");
                        }
                    }
                    Ok(None) => break, // stdout closed, engine is exiting
                    Err(e) => return Err(ProcessError::Io(e.to_string())),
                },
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| ProcessError::Io(e.to_string()))?;

        if cancel.is_cancelled() {
            return Err(ProcessError::Cancelled);
        }
        if !status.success() {
            return Err(ProcessError::EngineFailure(format!(
                "separation engine exited with {}",
                status
            )));
        }

        let vocals = out_dir.join("vocals.wav");
        let instrumental = out_dir.join("accompaniment.wav");
        info!(vocals = %vocals.display(), instrumental = %instrumental.display(), "Separation complete");
        Ok((
            vocals.to_string_lossy().into_owned(),
            instrumental.to_string_lossy().into_owned(),
        ))
    }
}

/// Parse a `progress <percent>` line from engine stdout
fn parse_progress_line(line: &str) -> Option<u8> {
    let rest = line.trim().strip_prefix("progress ")?;
    rest.trim().parse::<u8>().ok().map(|p| p.min(100))
}
