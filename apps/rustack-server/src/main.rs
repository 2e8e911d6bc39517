//! Rustack Server - LocalStack-compatible CloudFormation server.
//!
//! A gateway layer routes requests to the compiled-in services. CloudFormation
//! speaks `awsQuery`: form-encoded `POST /` requests answered with XML.
//!
//! # Usage
//!
//! ```text
//! GATEWAY_LISTEN=0.0.0.0:4566 rustack-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GATEWAY_LISTEN` | `0.0.0.0:4566` | Bind address |
//! | `SERVICES` | *(empty = all)* | Comma-separated list of services to enable |
//! | `DEFAULT_REGION` | `us-east-1` | Region for requests without a credential scope |
//! | `DEFAULT_ACCOUNT` | `000000000000` | Account every stack belongs to |
//! | `CLOUDFORMATION_FAIL_ON_UNRESOLVED_REFS` | `false` | Fail on references the engine cannot resolve |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

mod gateway;
mod service;

#[cfg(feature = "cloudformation")]
use std::sync::Arc;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "cloudformation")]
use rustack_cloudformation_core::config::CloudFormationConfig;
#[cfg(feature = "cloudformation")]
use rustack_cloudformation_core::handler::RustackCloudFormationHandler;
#[cfg(feature = "cloudformation")]
use rustack_cloudformation_core::provider::RustackCloudFormation;
#[cfg(feature = "cloudformation")]
use rustack_cloudformation_http::service::{CloudFormationHttpConfig, CloudFormationHttpService};
use rustack_core::RustackConfig;

use crate::gateway::GatewayService;
use crate::service::ServiceRouter;

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Build the [`CloudFormationHttpConfig`] from the [`CloudFormationConfig`].
#[cfg(feature = "cloudformation")]
fn build_cloudformation_http_config(config: &CloudFormationConfig) -> CloudFormationHttpConfig {
    CloudFormationHttpConfig {
        default_region: config.default_region.clone(),
        default_account: config.default_account.clone(),
    }
}

/// Run the accept loop, serving connections until a shutdown signal is received.
async fn serve(listener: TcpListener, service: GatewayService) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

/// Check whether a service name was compiled into this binary.
fn is_compiled_in(name: &str) -> bool {
    name == "cloudformation" && cfg!(feature = "cloudformation")
}

/// Parse a comma-separated services string into a list of service names.
///
/// If the input is empty, returns all compiled-in services.
fn parse_services_value(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        let mut all = Vec::new();
        if cfg!(feature = "cloudformation") {
            all.push("cloudformation".to_owned());
        }
        all
    } else {
        trimmed
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = RustackConfig::from_env();
    init_tracing(&config.log_level)?;

    let enabled = parse_services_value(&std::env::var("SERVICES").unwrap_or_default());
    for name in &enabled {
        if !is_compiled_in(name) {
            warn!(service = %name, "requested service is not compiled in, skipping");
        }
    }
    let is_enabled = |name: &str| enabled.iter().any(|s| s == name) && is_compiled_in(name);

    let mut services: Vec<Box<dyn ServiceRouter>> = Vec::new();

    #[cfg(feature = "cloudformation")]
    if is_enabled("cloudformation") {
        let cf_config = CloudFormationConfig::from_env();
        info!(
            default_region = %cf_config.default_region,
            fail_on_unresolved_refs = cf_config.fail_on_unresolved_refs,
            "initializing CloudFormation service",
        );
        let cf_provider = RustackCloudFormation::new(cf_config.clone());
        let cf_handler = RustackCloudFormationHandler::new(Arc::new(cf_provider));
        let cf_http_config = build_cloudformation_http_config(&cf_config);
        let cf_service = CloudFormationHttpService::new(Arc::new(cf_handler), cf_http_config);
        services.push(Box::new(service::CloudFormationServiceRouter::new(
            cf_service,
        )));
    }

    if services.is_empty() {
        anyhow::bail!(
            "no services enabled. Check the SERVICES environment variable \
             and compiled feature flags."
        );
    }

    let gateway = GatewayService::new(services);
    let service_names = gateway.service_names();

    let addr = config.listen_addr()?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(
        %addr,
        services = ?service_names,
        version = VERSION,
        "starting Rustack Server",
    );

    serve(listener, gateway).await
}
