//! JSON-RPC Server
//!
//! Serves the host control surface on localhost TCP: request/response
//! methods plus the `events.subscribe.v1` push channel.

use std::sync::Arc;

use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use tracing::info;

use openmic_core::application::{BroadcastHub, JobLifecycleManager, RotationManager};

use crate::handler::RpcHandler;
use crate::subscriptions;
use crate::types::{
    GetJobRequest, JobCommandRequest, ListJobsRequest, PlayNextRequest, RotationAddRequest,
    RotationRemoveRequest, RotationReorderRequest, StatsRequest, SubmitJobRequest,
    SubscribeRequest,
};

// Security: binds to localhost only; the venue host UI runs on the same box
const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 7529;

/// RPC Server Configuration
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
    lifecycle: Arc<JobLifecycleManager>,
    rotation: Arc<RotationManager>,
    hub: Arc<BroadcastHub>,
}

impl RpcServer {
    pub fn new(
        config: RpcServerConfig,
        lifecycle: Arc<JobLifecycleManager>,
        rotation: Arc<RotationManager>,
        hub: Arc<BroadcastHub>,
    ) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(
                lifecycle.clone(),
                rotation.clone(),
                hub.clone(),
            )),
            lifecycle,
            rotation,
            hub,
        }
    }

    /// Start the JSON-RPC server
    pub async fn start(self) -> Result<ServerHandle, String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server on TCP (localhost only)"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;

        let mut module = RpcModule::new(());

        // Job methods
        let handler = self.handler.clone();
        module
            .register_async_method("job.submit.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: SubmitJobRequest = params.parse()?;
                    handler.submit_job(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("job.get.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: GetJobRequest = params.parse()?;
                    handler.get_job(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("job.list.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ListJobsRequest = params.parse().unwrap_or_default();
                    handler.list_jobs(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("job.cancel.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: JobCommandRequest = params.parse()?;
                    handler.cancel_job(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("job.dismiss.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: JobCommandRequest = params.parse()?;
                    handler.dismiss_job(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("job.retry.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: JobCommandRequest = params.parse()?;
                    handler.retry_job(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        // Rotation methods
        let handler = self.handler.clone();
        module
            .register_async_method("rotation.add.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: RotationAddRequest = params.parse()?;
                    handler.rotation_add(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("rotation.remove.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: RotationRemoveRequest = params.parse()?;
                    handler.rotation_remove(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("rotation.reorder.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: RotationReorderRequest = params.parse()?;
                    handler.rotation_reorder(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("rotation.play_next.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: PlayNextRequest =
                        params.parse().unwrap_or(PlayNextRequest {});
                    handler.play_next(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("rotation.list.v1", move |_params, _, _| {
                let handler = handler.clone();
                async move { handler.rotation_list().await }
            })
            .map_err(|e| e.to_string())?;

        // Admin APIs
        let handler = self.handler.clone();
        module
            .register_async_method("admin.stats.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: StatsRequest = params.parse().unwrap_or(StatsRequest {});
                    handler.stats(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        // Push channel
        let lifecycle = self.lifecycle.clone();
        let rotation = self.rotation.clone();
        let hub = self.hub.clone();
        module
            .register_subscription(
                "events.subscribe.v1",
                "events.v1",
                "events.unsubscribe.v1",
                move |params, pending, _, _| {
                    let lifecycle = lifecycle.clone();
                    let rotation = rotation.clone();
                    let hub = hub.clone();
                    async move {
                        let req: SubscribeRequest = params.parse().unwrap_or(SubscribeRequest {
                            topics: Vec::new(),
                        });
                        let topics = subscriptions::parse_topics(&req.topics)?;
                        subscriptions::serve(pending, topics, lifecycle, rotation, hub).await
                    }
                },
            )
            .map_err(|e| e.to_string())?;

        info!("JSON-RPC server started successfully");

        let handle = server.start(module);
        Ok(handle)
    }
}
