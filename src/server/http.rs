//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Each connection gets
//! its own task; request bodies are collected up to the configured limit
//! before routing.

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::ORIGIN;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::{Args, CorsOrigins};
use crate::custody::{KeyGenPolicy, KeyService};
use crate::db::UserDirectory;
use crate::logging::AuditLogger;
use crate::pgp::{OpenPgpEngine, SequoiaEngine};
use crate::routes::{self, response, BoxBody};
use crate::types::Result;

/// Shared application state
pub struct AppState<E: OpenPgpEngine = SequoiaEngine> {
    pub args: Args,
    pub service: Arc<KeyService<E>>,
    /// Parsed `CORS_ORIGINS`
    pub cors: CorsOrigins,
    pub started_at: Instant,
}

impl<E: OpenPgpEngine> AppState<E> {
    pub fn new(
        args: Args,
        engine: Arc<E>,
        directory: Arc<dyn UserDirectory>,
        audit: AuditLogger,
    ) -> Self {
        let policy = KeyGenPolicy::default().with_allow_unprotected(args.allow_unprotected_keys);
        let service = Arc::new(KeyService::new(engine, directory, policy, audit));
        let cors = args.cors_origin_list();

        Self {
            args,
            service,
            cors,
            started_at: Instant::now(),
        }
    }

    /// Backend name of the user directory
    pub fn directory_backend(&self) -> &'static str {
        self.service.directory().backend()
    }
}

/// Why a request body could not be collected
#[derive(Debug, thiserror::Error)]
pub enum ReadBodyError {
    #[error("request body exceeds the size limit")]
    TooLarge,

    #[error("failed to read request body: {0}")]
    Read(String),
}

/// Collect a request body, refusing anything over `limit` bytes
pub async fn read_body<B>(body: B, limit: usize) -> std::result::Result<Bytes, ReadBodyError>
where
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => Err(ReadBodyError::TooLarge),
        Err(e) => Err(ReadBodyError::Read(e.to_string())),
    }
}

/// Accept connections until ctrl-c
pub async fn run<E: OpenPgpEngine>(state: Arc<AppState<E>>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "CryptoLock listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled");
    }

    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, no longer accepting connections");
                return Ok(());
            }
        };

        match accepted {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

async fn handle_request<E: OpenPgpEngine>(
    state: Arc<AppState<E>>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let origin = req
        .headers()
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    info!(peer = %addr, method = %method, path = %path, "Request");

    let limit = state.args.max_body_bytes;
    let body = match read_body(req.into_body(), limit).await {
        Ok(body) => body,
        Err(ReadBodyError::TooLarge) => {
            warn!(peer = %addr, path = %path, limit, "Request body too large");
            let response = response::payload_too_large(limit);
            return Ok(response::with_cors(response, &state.cors, origin.as_deref()));
        }
        Err(e) => {
            warn!(peer = %addr, path = %path, error = %e, "Failed to read request body");
            let response = response::detail_response(StatusCode::BAD_REQUEST, &e.to_string());
            return Ok(response::with_cors(response, &state.cors, origin.as_deref()));
        }
    };

    Ok(routes::dispatch(&state, &method, &path, origin.as_deref(), body).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;

    #[tokio::test]
    async fn test_read_body_within_limit() {
        let body = Full::new(Bytes::from_static(b"hello"));
        assert_eq!(read_body(body, 5).await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_read_body_over_limit() {
        let body = Full::new(Bytes::from(vec![b'x'; 64]));
        assert!(matches!(
            read_body(body, 63).await,
            Err(ReadBodyError::TooLarge)
        ));
    }
}
