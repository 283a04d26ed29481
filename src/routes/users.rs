//! User registration and key management endpoints

use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::parse_json;
use super::response::{error_response, json_response, key_attachment, text_response, BoxBody};
use crate::pgp::OpenPgpEngine;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
}

#[derive(Deserialize)]
pub struct GenerateKeysRequest {
    /// Empty means "no protection requested"
    #[serde(default)]
    pub passphrase: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub imported_keys: u32,
}

/// POST /users
pub async fn create_user<E: OpenPgpEngine>(state: &AppState<E>, body: &[u8]) -> Response<BoxBody> {
    let request: CreateUserRequest = match parse_json(body) {
        Ok(request) => request,
        Err(e) => return error_response(e),
    };

    match state.service.create_user(&request.username).await {
        Ok(user) => json_response(StatusCode::OK, &user),
        Err(e) => error_response(e),
    }
}

/// POST /users/{username}/upload_pubkey
///
/// The request body is the key file itself.
pub async fn upload_public_key<E: OpenPgpEngine>(
    state: &AppState<E>,
    username: &str,
    body: &[u8],
) -> Response<BoxBody> {
    match state.service.upload_public_key(username, body).await {
        Ok(()) => json_response(
            StatusCode::OK,
            &UploadResponse {
                status: "ok",
                imported_keys: 1,
            },
        ),
        Err(e) => error_response(e),
    }
}

/// GET /users/{username}/public_key
pub async fn public_key<E: OpenPgpEngine>(state: &AppState<E>, username: &str) -> Response<BoxBody> {
    match state.service.public_key(username).await {
        Ok(armored) => text_response(armored),
        Err(e) => error_response(e),
    }
}

/// POST /users/{username}/generate_keys
///
/// Answers with the armored private key as a file download.
pub async fn generate_keys<E: OpenPgpEngine>(
    state: &AppState<E>,
    username: &str,
    body: &[u8],
) -> Response<BoxBody> {
    let request: GenerateKeysRequest = match parse_json(body) {
        Ok(request) => request,
        Err(e) => return error_response(e),
    };
    let passphrase = Zeroizing::new(request.passphrase);

    match state.service.generate_keys(username, passphrase).await {
        Ok(keys) => key_attachment(
            &format!("{username}_private.asc"),
            keys.private.as_bytes().to_vec(),
        ),
        Err(e) => error_response(e),
    }
}
