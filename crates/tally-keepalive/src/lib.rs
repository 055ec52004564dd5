//! Liveness keepalive for hosts that sleep idle services.
//!
//! Two independent background tasks:
//! - a tiny HTTP server answering `GET /` and `GET /ping` with static text
//! - a loop that periodically requests `<external_url>/ping`
//!
//! Neither touches the record store. Both stop when the shared
//! `CancellationToken` is cancelled.

use std::{convert::Infallible, net::SocketAddr, time::Duration};

use hyper::{body::Incoming, server::conn::http1, service::service_fn, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use tally_core::{config::Config, errors::Error, Result};

pub const ALIVE_TEXT: &str = "Bot is alive";
pub const PONG_TEXT: &str = "pong";

#[derive(Clone, Debug)]
pub struct KeepaliveConfig {
    pub port: u16,
    pub external_url: Option<String>,
    pub interval: Duration,
}

impl From<&Config> for KeepaliveConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            port: cfg.keepalive_port,
            external_url: cfg.external_url.clone(),
            interval: cfg.keepalive_interval,
        }
    }
}

/// Static routing table: (status, body) for a method + path.
pub fn route(method: &Method, path: &str) -> (StatusCode, &'static str) {
    match (method, path) {
        (&Method::GET | &Method::HEAD, "/") => (StatusCode::OK, ALIVE_TEXT),
        (&Method::GET | &Method::HEAD, "/ping") => (StatusCode::OK, PONG_TEXT),
        _ => (StatusCode::NOT_FOUND, "Not Found"),
    }
}

async fn handle_request(req: Request<Incoming>) -> std::result::Result<Response<String>, Infallible> {
    let (status, body) = route(req.method(), req.uri().path());
    tracing::debug!(method = %req.method(), path = req.uri().path(), status = status.as_u16(), "keepalive request");

    let mut resp = Response::new(body.to_string());
    *resp.status_mut() = status;
    Ok(resp)
}

/// Accept connections until `cancel` fires.
pub async fn serve(listener: TcpListener, cancel: CancellationToken) {
    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, _)) => {
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(io, service_fn(handle_request))
                        .await
                    {
                        tracing::debug!(error = %e, "keepalive connection error");
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "keepalive accept failed");
            }
        }
    }
    tracing::info!("keepalive server stopped");
}

/// Request `url` every `interval` until `cancel` fires. Failures are logged
/// and the loop keeps going.
pub async fn self_ping_loop(
    client: reqwest::Client,
    url: String,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match client.get(&url).send().await {
            Ok(resp) => tracing::debug!(status = resp.status().as_u16(), %url, "self-ping"),
            Err(e) => tracing::warn!(error = %e, %url, "self-ping failed"),
        }
    }
}

/// Bind the liveness server and, when an external URL is configured, start
/// the self-ping loop.
pub async fn spawn(cfg: KeepaliveConfig, cancel: CancellationToken) -> Result<Vec<JoinHandle<()>>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "keepalive server listening");

    let mut handles = vec![tokio::spawn(serve(listener, cancel.clone()))];

    if let Some(base) = cfg.external_url {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::External(format!("failed to build http client: {e}")))?;
        let url = format!("{}/ping", base.trim_end_matches('/'));
        tracing::info!(%url, every_secs = cfg.interval.as_secs(), "self-ping enabled");
        handles.push(tokio::spawn(self_ping_loop(client, url, cfg.interval, cancel)));
    }

    Ok(handles)
}
