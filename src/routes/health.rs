//! Health, version and welcome endpoints
//!
//! - `/` - welcome message
//! - `/health`, `/healthz` - liveness probe (200 whenever the process serves)
//! - `/version` - build information for deployment verification

use hyper::{Response, StatusCode};
use serde::Serialize;

use super::response::{json_response, BoxBody};
use crate::pgp::OpenPgpEngine;
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    /// User directory backend (`memory` or `mongodb`)
    pub directory: &'static str,
    pub node_id: String,
    pub uptime_secs: u64,
}

/// Version information for deployment verification
#[derive(Serialize)]
pub struct VersionResponse {
    /// Cargo package version
    pub version: &'static str,
    /// Git commit hash (short)
    pub git_commit: &'static str,
    /// Git commit hash (full)
    pub git_commit_full: &'static str,
    pub build_timestamp: &'static str,
}

pub fn welcome() -> Response<BoxBody> {
    json_response(
        StatusCode::OK,
        &serde_json::json!({ "message": "Welcome to CryptoLock" }),
    )
}

pub fn health_check<E: OpenPgpEngine>(state: &AppState<E>) -> Response<BoxBody> {
    let response = HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        directory: state.directory_backend(),
        node_id: state.args.node_id.to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    };
    json_response(StatusCode::OK, &response)
}

pub fn version_info() -> Response<BoxBody> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        git_commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        git_commit_full: option_env!("GIT_COMMIT_FULL").unwrap_or("unknown"),
        build_timestamp: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
    };
    json_response(StatusCode::OK, &response)
}
