//! openmic CLI - Command-line interface for the karaoke host daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:7529";

#[derive(Parser)]
#[command(name = "openmic")]
#[command(about = "Karaoke host daemon CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "OPENMIC_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a background job
    Submit {
        #[command(subcommand)]
        job: SubmitJob,
    },

    /// List jobs
    Jobs {
        /// Filter by kind (separation, download, enrichment)
        #[arg(short, long)]
        kind: Option<String>,

        /// Filter by status (QUEUED, PROCESSING, PROCESSED, ERROR, CANCELLED, DISMISSED)
        #[arg(short, long)]
        status: Option<String>,

        /// Include dismissed jobs
        #[arg(long)]
        all: bool,
    },

    /// Cancel a job
    Cancel {
        /// Job ID
        job_id: String,
    },

    /// Retry a failed job (allowed once per job)
    Retry {
        /// Job ID
        job_id: String,
    },

    /// Dismiss a finished job from active views
    Dismiss {
        /// Job ID
        job_id: String,
    },

    /// Manage the singer rotation
    Rotation {
        #[command(subcommand)]
        action: RotationAction,
    },

    /// Show system status
    Status,
}

#[derive(Subcommand)]
enum SubmitJob {
    /// Split a library song into vocal and instrumental stems
    Separation {
        /// Song ID in the library
        #[arg(short, long)]
        song_id: String,

        /// Path to the source recording
        #[arg(short, long)]
        input: String,
    },

    /// Download source media from a URL
    Download {
        /// http(s) URL of the media
        url: String,

        /// Optional title for the downloaded file
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Look up catalog metadata for a library song
    Enrichment {
        /// Song ID in the library
        #[arg(short, long)]
        song_id: String,

        /// Search terms (artist, title, ...)
        #[arg(short = 'q', long)]
        terms: String,
    },
}

#[derive(Subcommand)]
enum RotationAction {
    /// Add a singer to the end of the rotation
    Add {
        /// Song ID in the library
        #[arg(short = 'g', long)]
        song_id: String,

        /// Singer name
        #[arg(short, long)]
        singer: String,
    },

    /// Remove one entry
    Remove {
        /// Entry ID
        entry_id: String,
    },

    /// Show the rotation in performance order
    Show,

    /// Replace the ordering (pass every entry id in the desired order)
    Reorder {
        /// Entry ids, first performs next
        ids: Vec<String>,
    },

    /// Pop the next performer off the head of the rotation
    Next,
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Tabled)]
struct JobRow {
    id: String,
    kind: String,
    status: String,
    progress: String,
    message: String,
}

impl JobRow {
    fn from_value(job: &serde_json::Value) -> Self {
        Self {
            id: job["id"].as_str().unwrap_or("?").to_string(),
            kind: job["kind"].as_str().unwrap_or("?").to_string(),
            status: job["status"].as_str().unwrap_or("?").to_string(),
            progress: format!("{}%", job["progress"].as_u64().unwrap_or(0)),
            message: job["message"].as_str().unwrap_or("").to_string(),
        }
    }
}

#[derive(Tabled)]
struct EntryRow {
    position: u64,
    entry_id: String,
    singer: String,
    song_id: String,
}

impl EntryRow {
    fn from_value(entry: &serde_json::Value) -> Self {
        Self {
            position: entry["position"].as_u64().unwrap_or(0),
            entry_id: entry["id"].as_str().unwrap_or("?").to_string(),
            singer: entry["singer_name"].as_str().unwrap_or("?").to_string(),
            song_id: entry["song_id"].as_str().unwrap_or("?").to_string(),
        }
    }
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

fn print_job_table(jobs: &[serde_json::Value]) {
    let rows: Vec<JobRow> = jobs.iter().map(JobRow::from_value).collect();
    println!("{}", Table::new(rows));
}

fn print_rotation_table(entries: &[serde_json::Value]) {
    if entries.is_empty() {
        println!("{}", "Rotation is empty".yellow());
        return;
    }
    let rows: Vec<EntryRow> = entries.iter().map(EntryRow::from_value).collect();
    println!("{}", Table::new(rows));
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Submit { job } => {
            let payload = match job {
                SubmitJob::Separation { song_id, input } => json!({
                    "kind": "separation",
                    "song_id": song_id,
                    "input_path": input,
                }),
                SubmitJob::Download { url, title } => json!({
                    "kind": "download",
                    "source_url": url,
                    "title": title,
                }),
                SubmitJob::Enrichment { song_id, terms } => json!({
                    "kind": "enrichment",
                    "song_id": song_id,
                    "search_terms": terms,
                }),
            };

            let result = call_rpc(&cli.rpc_url, "job.submit.v1", json!({ "payload": payload }))
                .await?;

            println!("{}", "✓ Job submitted".green().bold());
            println!();
            print_job_table(std::slice::from_ref(&result["job"]));
        }

        Commands::Jobs { kind, status, all } => {
            let result = call_rpc(
                &cli.rpc_url,
                "job.list.v1",
                json!({
                    "kind": kind,
                    "status": status,
                    "include_dismissed": all,
                }),
            )
            .await?;

            let jobs = result["jobs"].as_array().cloned().unwrap_or_default();
            if jobs.is_empty() {
                println!("{}", "No jobs".yellow());
            } else {
                print_job_table(&jobs);
            }
        }

        Commands::Cancel { job_id } => {
            let result = call_rpc(&cli.rpc_url, "job.cancel.v1", json!({ "job_id": job_id }))
                .await?;
            let status = result["job"]["status"].as_str().unwrap_or("?");
            if status == "CANCELLED" {
                println!("{}", format!("✓ Job {} cancelled", job_id).green().bold());
            } else {
                println!(
                    "{}",
                    format!("✓ Cancellation requested for job {} (still {})", job_id, status)
                        .green()
                );
            }
        }

        Commands::Retry { job_id } => {
            call_rpc(&cli.rpc_url, "job.retry.v1", json!({ "job_id": job_id })).await?;
            println!("{}", format!("✓ Job {} requeued", job_id).green().bold());
        }

        Commands::Dismiss { job_id } => {
            call_rpc(&cli.rpc_url, "job.dismiss.v1", json!({ "job_id": job_id })).await?;
            println!("{}", format!("✓ Job {} dismissed", job_id).green().bold());
        }

        Commands::Rotation { action } => match action {
            RotationAction::Add { song_id, singer } => {
                let result = call_rpc(
                    &cli.rpc_url,
                    "rotation.add.v1",
                    json!({ "song_id": song_id, "singer_name": singer }),
                )
                .await?;
                let position = result["entry"]["position"].as_u64().unwrap_or(0);
                println!(
                    "{}",
                    format!("✓ {} added at position {}", singer, position)
                        .green()
                        .bold()
                );
            }

            RotationAction::Remove { entry_id } => {
                call_rpc(
                    &cli.rpc_url,
                    "rotation.remove.v1",
                    json!({ "entry_id": entry_id }),
                )
                .await?;
                println!("{}", format!("✓ Entry {} removed", entry_id).green().bold());
            }

            RotationAction::Show => {
                let result = call_rpc(&cli.rpc_url, "rotation.list.v1", json!({})).await?;
                let entries = result["entries"].as_array().cloned().unwrap_or_default();
                print_rotation_table(&entries);
            }

            RotationAction::Reorder { ids } => {
                let result = call_rpc(
                    &cli.rpc_url,
                    "rotation.reorder.v1",
                    json!({ "ordered_ids": ids }),
                )
                .await?;
                println!("{}", "✓ Rotation reordered".green().bold());
                println!();
                let entries = result["entries"].as_array().cloned().unwrap_or_default();
                print_rotation_table(&entries);
            }

            RotationAction::Next => {
                let result = call_rpc(&cli.rpc_url, "rotation.play_next.v1", json!({})).await?;
                match result["entry"].as_object() {
                    Some(entry) => {
                        println!(
                            "{}",
                            format!(
                                "🎤 Up next: {} singing {}",
                                entry["singer_name"].as_str().unwrap_or("?"),
                                entry["song_id"].as_str().unwrap_or("?")
                            )
                            .cyan()
                            .bold()
                        );
                    }
                    None => println!("{}", "Rotation is empty, nobody to call up".yellow()),
                }
            }
        },

        Commands::Status => {
            println!("{}", "System Status".cyan().bold());
            println!();

            match call_rpc(&cli.rpc_url, "admin.stats.v1", json!({})).await {
                Ok(stats) => {
                    println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!();
                    println!("  {} {}", "Total Jobs:".bold(), stats["total_jobs"]);
                    println!("  {} {}", "Queued:".bold(), stats["queued_jobs"]);
                    println!("  {} {}", "Processing:".bold(), stats["processing_jobs"]);
                    println!("  {} {}", "Processed:".bold(), stats["processed_jobs"]);
                    println!("  {} {}", "Errors:".bold(), stats["error_jobs"]);
                    println!("  {} {}", "Cancelled:".bold(), stats["cancelled_jobs"]);
                    println!();
                    println!("  {} {}", "In-flight workers:".bold(), stats["in_flight_workers"]);
                    println!("  {} {}", "Rotation entries:".bold(), stats["rotation_entries"]);
                    println!(
                        "  {} {} jobs / {} queue",
                        "Subscribers:".bold(),
                        stats["job_subscribers"],
                        stats["queue_subscribers"]
                    );
                    println!("  {} {} seconds", "Uptime:".bold(), stats["uptime_seconds"]);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }
    }

    Ok(())
}
