//! HTTP routes for CryptoLock
//!
//! | Method | Path | Handler |
//! |---|---|---|
//! | GET | `/` | welcome message |
//! | GET | `/health`, `/healthz` | liveness |
//! | GET | `/version` | build information |
//! | POST | `/users`, `/users/` | register a username |
//! | POST | `/users/{username}/upload_pubkey` | store an uploaded public key |
//! | GET | `/users/{username}/public_key` | fetch a stored public key |
//! | POST | `/users/{username}/generate_keys` | generate a keypair |
//! | POST | `/encrypt` | encrypt to a stored public key |
//! | POST | `/decrypt` | decrypt with a caller-supplied private key |
//!
//! `OPTIONS` on any path answers a CORS preflight.

pub mod health;
pub mod messages;
pub mod response;
pub mod users;

use std::borrow::Cow;

use bytes::Bytes;
use hyper::{Method, Response};
use serde::de::DeserializeOwned;

use crate::pgp::OpenPgpEngine;
use crate::server::AppState;
use crate::types::{CryptoLockError, Result};

pub use response::BoxBody;

/// A matched route, with the decoded username for per-user paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<'a> {
    Root,
    Health,
    Version,
    Users,
    UploadPublicKey(Cow<'a, str>),
    PublicKey(Cow<'a, str>),
    GenerateKeys(Cow<'a, str>),
    Encrypt,
    Decrypt,
}

impl Route<'_> {
    fn allowed_method(&self) -> Method {
        match self {
            Self::Root | Self::Health | Self::Version | Self::PublicKey(_) => Method::GET,
            _ => Method::POST,
        }
    }
}

/// Match `path` to a route.
///
/// `Ok(None)` is an unknown path; `Err` a username that does not
/// percent-decode to UTF-8.
pub fn match_route(path: &str) -> Result<Option<Route<'_>>> {
    let route = match path {
        "/" => Route::Root,
        "/health" | "/healthz" => Route::Health,
        "/version" => Route::Version,
        "/users" | "/users/" => Route::Users,
        "/encrypt" => Route::Encrypt,
        "/decrypt" => Route::Decrypt,
        _ => {
            let Some(rest) = path.strip_prefix("/users/") else {
                return Ok(None);
            };
            let Some((raw_username, action)) = rest.split_once('/') else {
                return Ok(None);
            };
            if raw_username.is_empty() {
                return Ok(None);
            }
            let username = urlencoding::decode(raw_username).map_err(|_| {
                CryptoLockError::BadRequest("Username is not valid UTF-8".into())
            })?;
            match action {
                "upload_pubkey" => Route::UploadPublicKey(username),
                "public_key" => Route::PublicKey(username),
                "generate_keys" => Route::GenerateKeys(username),
                _ => return Ok(None),
            }
        }
    };
    Ok(Some(route))
}

/// Deserialize a JSON request body
pub(crate) fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(body)?)
}

/// Route a fully read request and attach CORS headers to the response.
pub async fn dispatch<E: OpenPgpEngine>(
    state: &AppState<E>,
    method: &Method,
    path: &str,
    origin: Option<&str>,
    body: Bytes,
) -> Response<BoxBody> {
    let response = if method == Method::OPTIONS {
        response::preflight()
    } else {
        route(state, method, path, body).await
    };
    response::with_cors(response, &state.cors, origin)
}

async fn route<E: OpenPgpEngine>(
    state: &AppState<E>,
    method: &Method,
    path: &str,
    body: Bytes,
) -> Response<BoxBody> {
    let route = match match_route(path) {
        Ok(Some(route)) => route,
        Ok(None) => return response::not_found(),
        Err(e) => return response::error_response(e),
    };

    let allowed = route.allowed_method();
    if method != allowed {
        return response::method_not_allowed(if allowed == Method::GET {
            "GET, OPTIONS"
        } else {
            "POST, OPTIONS"
        });
    }

    match route {
        Route::Root => health::welcome(),
        Route::Health => health::health_check(state),
        Route::Version => health::version_info(),
        Route::Users => users::create_user(state, &body).await,
        Route::UploadPublicKey(username) => users::upload_public_key(state, &username, &body).await,
        Route::PublicKey(username) => users::public_key(state, &username).await,
        Route::GenerateKeys(username) => users::generate_keys(state, &username, &body).await,
        Route::Encrypt => messages::encrypt(state, &body).await,
        Route::Decrypt => messages::decrypt(state, &body).await,
    }
}
