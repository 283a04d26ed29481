//! Encrypt and decrypt endpoints

use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::parse_json;
use super::response::{error_response, json_response, no_store, BoxBody};
use crate::custody::service::DecryptInput;
use crate::pgp::OpenPgpEngine;
use crate::server::AppState;

#[derive(Deserialize)]
pub struct EncryptRequest {
    pub recipient_username: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct EncryptResponse {
    pub ciphertext: String,
}

/// Missing armor fields deserialize as empty and are reported by the
/// decrypt pipeline as "Missing ciphertext" / "Missing private key".
#[derive(Deserialize)]
pub struct DecryptRequestBody {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub ciphertext_armored: String,
    #[serde(default)]
    pub private_key_armored: String,
    /// Absent and empty are different: only absence means "no passphrase"
    #[serde(default)]
    pub passphrase: Option<String>,
}

#[derive(Serialize)]
pub struct DecryptResponse<'a> {
    pub plaintext: &'a str,
}

/// POST /encrypt
pub async fn encrypt<E: OpenPgpEngine>(state: &AppState<E>, body: &[u8]) -> Response<BoxBody> {
    let request: EncryptRequest = match parse_json(body) {
        Ok(request) => request,
        Err(e) => return error_response(e),
    };

    match state
        .service
        .encrypt(&request.recipient_username, request.message)
        .await
    {
        Ok(ciphertext) => json_response(StatusCode::OK, &EncryptResponse { ciphertext }),
        Err(e) => error_response(e),
    }
}

/// POST /decrypt
pub async fn decrypt<E: OpenPgpEngine>(state: &AppState<E>, body: &[u8]) -> Response<BoxBody> {
    let request: DecryptRequestBody = match parse_json(body) {
        Ok(request) => request,
        Err(e) => return error_response(e),
    };

    let input = DecryptInput {
        username: request.username,
        ciphertext_armored: request.ciphertext_armored,
        private_key_armored: Zeroizing::new(request.private_key_armored),
        passphrase: request.passphrase.map(Zeroizing::new),
    };

    match state.service.decrypt(input).await {
        Ok(plaintext) => no_store(json_response(
            StatusCode::OK,
            &DecryptResponse {
                plaintext: &plaintext,
            },
        )),
        Err(e) => no_store(error_response(e)),
    }
}
