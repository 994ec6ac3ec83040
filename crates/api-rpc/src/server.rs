//! JSON-RPC Server
//!
//! Serves the bundle methods and the progress subscription over TCP on
//! localhost (no external access).

use crate::handler::RpcHandler;
use crate::types::{CreateBundleRequest, ListRequest, StatusRequest, SubscribeRequest};
use baler_core::application::{BundleService, JobRegistry, ProgressPublisher};
use jsonrpsee::core::SubscriptionResult;
use jsonrpsee::server::{PendingSubscriptionSink, Server, ServerHandle};
use jsonrpsee::types::Params;
use jsonrpsee::{RpcModule, SubscriptionMessage};
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9620;

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
    publisher: Arc<ProgressPublisher>,
}

impl RpcServer {
    pub fn new(
        config: RpcServerConfig,
        bundle_service: Arc<BundleService>,
        registry: Arc<JobRegistry>,
        publisher: Arc<ProgressPublisher>,
    ) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(bundle_service, registry)),
            publisher,
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

        let handler = self.handler.clone();
        module
            .register_async_method("bundle.create.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: CreateBundleRequest = params.parse()?;
                    handler.create(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("bundle.status.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: StatusRequest = params.parse()?;
                    handler.status(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("bundle.list.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ListRequest = params.parse()?;
                    handler.list(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let publisher = self.publisher.clone();
        module
            .register_subscription(
                "bundle.subscribe.v1",
                "bundle.progress.v1",
                "bundle.unsubscribe.v1",
                move |params, pending, _, _| {
                    let publisher = publisher.clone();
                    forward_subscription(publisher, params, pending)
                },
            )
            .map_err(|e| e.to_string())?;

        info!("JSON-RPC server started successfully");

        let handle = server.start(module);
        Ok(handle)
    }
}

/// Forward publisher events into one subscription sink until the stream or
/// the subscriber goes away
async fn forward_subscription(
    publisher: Arc<ProgressPublisher>,
    params: Params<'static>,
    pending: PendingSubscriptionSink,
) -> SubscriptionResult {
    let req: SubscribeRequest = match params.parse() {
        Ok(req) => req,
        Err(e) => {
            pending.reject(e).await;
            return Ok(());
        }
    };

    let mut events = publisher.subscribe(req.job_id);
    let sink = pending.accept().await?;

    // the publisher closes the channel after a terminal event; a dropped
    // sink ends forwarding early
    while let Some(event) = events.recv().await {
        let msg = match SubscriptionMessage::from_json(&event) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "Failed to serialize progress event");
                break;
            }
        };
        if sink.send(msg).await.is_err() {
            break;
        }
    }
    Ok(())
}
