//! RPC Method Handlers
//!
//! Implements the business logic for each JSON-RPC method. Mutating methods
//! pass through the rate limiter; reads do not.

use std::sync::Arc;

use jsonrpsee::types::ErrorObjectOwned;

use openmic_core::application::store::JobFilter;
use openmic_core::application::{BroadcastHub, JobLifecycleManager, RotationManager};
use openmic_core::domain::{JobStatus, Topic};

use crate::error::{code, to_rpc_error};
use crate::rate_limiter::RateLimiter;
use crate::types::{
    GetJobRequest, JobCommandRequest, JobResponse, ListJobsRequest, ListJobsResponse,
    PlayNextRequest, PlayNextResponse, RotationAddRequest, RotationEntryResponse,
    RotationListResponse, RotationRemoveRequest, RotationReorderRequest, StatsRequest,
    StatsResponse, SubmitJobRequest,
};

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    lifecycle: Arc<JobLifecycleManager>,
    rotation: Arc<RotationManager>,
    hub: Arc<BroadcastHub>,
    rate_limiter: RateLimiter,
    start_time: std::time::Instant,
}

impl RpcHandler {
    pub fn new(
        lifecycle: Arc<JobLifecycleManager>,
        rotation: Arc<RotationManager>,
        hub: Arc<BroadcastHub>,
    ) -> Self {
        // Default: 200 burst, 100 req/sec (configurable via env)
        let max_burst: u32 = std::env::var("OPENMIC_RATE_LIMIT_BURST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(200);

        let rate_per_sec: u32 = std::env::var("OPENMIC_RATE_LIMIT_RATE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100);

        Self {
            lifecycle,
            rotation,
            hub,
            rate_limiter: RateLimiter::new(max_burst, rate_per_sec),
            start_time: std::time::Instant::now(),
        }
    }

    fn check_rate_limit(&self) -> Result<(), ErrorObjectOwned> {
        if self.rate_limiter.check() {
            Ok(())
        } else {
            Err(ErrorObjectOwned::owned(
                code::THROTTLED,
                "Rate limit exceeded. Please slow down.",
                None::<()>,
            ))
        }
    }

    /// job.submit.v1
    pub async fn submit_job(
        &self,
        params: SubmitJobRequest,
    ) -> Result<JobResponse, ErrorObjectOwned> {
        self.check_rate_limit()?;
        let job = self.lifecycle.submit(params.payload).map_err(to_rpc_error)?;
        Ok(JobResponse { job })
    }

    /// job.get.v1
    pub async fn get_job(&self, params: GetJobRequest) -> Result<JobResponse, ErrorObjectOwned> {
        let job = self.lifecycle.get(&params.job_id).map_err(to_rpc_error)?;
        Ok(JobResponse { job })
    }

    /// job.list.v1
    pub async fn list_jobs(
        &self,
        params: ListJobsRequest,
    ) -> Result<ListJobsResponse, ErrorObjectOwned> {
        let filter = JobFilter {
            kind: params.kind,
            status: params.status,
            include_dismissed: params.include_dismissed,
        };
        Ok(ListJobsResponse {
            jobs: self.lifecycle.list(&filter),
        })
    }

    /// job.cancel.v1
    pub async fn cancel_job(
        &self,
        params: JobCommandRequest,
    ) -> Result<JobResponse, ErrorObjectOwned> {
        self.check_rate_limit()?;
        let job = self.lifecycle.cancel(&params.job_id).map_err(to_rpc_error)?;
        Ok(JobResponse { job })
    }

    /// job.dismiss.v1
    pub async fn dismiss_job(
        &self,
        params: JobCommandRequest,
    ) -> Result<JobResponse, ErrorObjectOwned> {
        self.check_rate_limit()?;
        let job = self
            .lifecycle
            .dismiss(&params.job_id)
            .map_err(to_rpc_error)?;
        Ok(JobResponse { job })
    }

    /// job.retry.v1
    pub async fn retry_job(
        &self,
        params: JobCommandRequest,
    ) -> Result<JobResponse, ErrorObjectOwned> {
        self.check_rate_limit()?;
        let job = self.lifecycle.retry(&params.job_id).map_err(to_rpc_error)?;
        Ok(JobResponse { job })
    }

    /// rotation.add.v1
    pub async fn rotation_add(
        &self,
        params: RotationAddRequest,
    ) -> Result<RotationEntryResponse, ErrorObjectOwned> {
        self.check_rate_limit()?;
        let entry = self
            .rotation
            .add(&params.song_id, &params.singer_name)
            .await
            .map_err(to_rpc_error)?;
        Ok(RotationEntryResponse { entry })
    }

    /// rotation.remove.v1
    pub async fn rotation_remove(
        &self,
        params: RotationRemoveRequest,
    ) -> Result<RotationEntryResponse, ErrorObjectOwned> {
        self.check_rate_limit()?;
        let entry = self
            .rotation
            .remove(&params.entry_id)
            .map_err(to_rpc_error)?;
        Ok(RotationEntryResponse { entry })
    }

    /// rotation.reorder.v1
    pub async fn rotation_reorder(
        &self,
        params: RotationReorderRequest,
    ) -> Result<RotationListResponse, ErrorObjectOwned> {
        self.check_rate_limit()?;
        let entries = self
            .rotation
            .reorder(&params.ordered_ids)
            .map_err(to_rpc_error)?;
        Ok(RotationListResponse { entries })
    }

    /// rotation.play_next.v1
    pub async fn play_next(
        &self,
        _params: PlayNextRequest,
    ) -> Result<PlayNextResponse, ErrorObjectOwned> {
        self.check_rate_limit()?;
        let entry = self.rotation.pop_head().map_err(to_rpc_error)?;
        Ok(PlayNextResponse { entry })
    }

    /// rotation.list.v1
    pub async fn rotation_list(&self) -> Result<RotationListResponse, ErrorObjectOwned> {
        Ok(RotationListResponse {
            entries: self.rotation.snapshot(),
        })
    }

    /// admin.stats.v1
    pub async fn stats(&self, _params: StatsRequest) -> Result<StatsResponse, ErrorObjectOwned> {
        let counts = self.lifecycle.counts_by_status();
        let count = |status: JobStatus| counts.get(&status).copied().unwrap_or(0);

        Ok(StatsResponse {
            total_jobs: counts.values().sum(),
            queued_jobs: count(JobStatus::Queued),
            processing_jobs: count(JobStatus::Processing),
            processed_jobs: count(JobStatus::Processed),
            error_jobs: count(JobStatus::Error),
            cancelled_jobs: count(JobStatus::Cancelled),
            in_flight_workers: self.lifecycle.in_flight(),
            rotation_entries: self.rotation.len(),
            job_subscribers: self.hub.subscriber_count(Topic::Jobs),
            queue_subscribers: self.hub.subscriber_count(Topic::Queue),
            uptime_seconds: self.start_time.elapsed().as_secs() as i64,
        })
    }
}
