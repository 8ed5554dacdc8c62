//! hmacsig server - verifies HMAC-signed HTTP requests.
//!
//! Every request other than a health probe is authenticated against the
//! configured secret-retrieval endpoint. Verified requests are answered with
//! the signer's identity; rejected ones with the status their error maps to.
//!
//! # Usage
//!
//! ```text
//! HMACSIG_SERVICE=s3 HMACSIG_SECRET_RETRIEVAL_URL=http://127.0.0.1:9000/secret hmacsig-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LISTEN_ADDR` | `0.0.0.0:8080` | Bind address |
//! | `HMACSIG_SERVICE` | *(required)* | Service name this server fronts |
//! | `HMACSIG_SECRET_RETRIEVAL_URL` | *(required)* | Secret-retrieval endpoint |
//! | `HMACSIG_ORG` | `AWS` | Organization tag |
//! | `HMACSIG_ABBR` | `amz` | Header abbreviation |
//! | `HMACSIG_MAX_ATTEMPTS` | `3` | Secret-retrieval attempts |
//! | `HMACSIG_ATTEMPT_TIMEOUT_SECS` | `15` | Per-attempt timeout |
//! | `HMACSIG_INITIAL_BACKOFF_MS` | `1000` | First retry delay |
//! | `HMACSIG_MAX_CLOCK_SKEW_SECS` | *(unset)* | Reject requests signed too far from now |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

mod gateway;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use hmacsig_auth::{HttpSecretSource, SigV4Verifier};
use hmacsig_core::VerifierConfig;

use crate::gateway::GatewayService;

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

/// Run the accept loop until a shutdown signal is received.
///
/// On shutdown the `shutdown` token is cancelled, which aborts secret lookups
/// still in flight, and open connections are drained.
async fn serve(
    listener: TcpListener,
    service: GatewayService<HttpSecretSource>,
    shutdown: CancellationToken,
) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let signal = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(signal);

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

            () = &mut signal => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    shutdown.cancel();
    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

/// Probe the health endpoint of a running server.
///
/// Succeeds if the response is 200 OK and reports the server as running.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request = format!("GET /health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.contains("200 OK") && response.contains("\"running\"") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

/// Read the listen address from the environment.
fn listen_addr() -> String {
    std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
}

/// Read the log level from the environment.
fn log_level() -> String {
    std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let listen_addr = listen_addr();

    // Handle --health-check flag for container health probes.
    if std::env::args().any(|a| a == "--health-check") {
        let addr = listen_addr.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    init_tracing(&log_level())?;

    let config = VerifierConfig::from_env().context("invalid verifier configuration")?;
    info!(
        org = %config.org,
        service = %config.service,
        secret_retrieval_url = %config.secret_retrieval_url,
        max_attempts = config.max_attempts,
        max_clock_skew = ?config.max_clock_skew,
        "initializing verifier",
    );
    let verifier = SigV4Verifier::from_config(config).context("failed to build verifier")?;

    let addr: SocketAddr = listen_addr
        .parse()
        .with_context(|| format!("invalid bind address: {listen_addr}"))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, version = env!("CARGO_PKG_VERSION"), "starting hmacsig server");

    let shutdown = CancellationToken::new();
    let gateway = GatewayService::new(Arc::new(verifier), shutdown.clone());
    serve(listener, gateway, shutdown).await
}
