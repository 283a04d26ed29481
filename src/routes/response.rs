//! Response construction shared by all routes

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{self, HeaderName, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::{error, warn};

use crate::config::CorsOrigins;
use crate::types::CryptoLockError;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

fn response(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response<BoxBody> {
    let mut response = Response::new(full_body(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|e| {
        error!("Failed to serialize response: {}", e);
        "{}".to_string()
    });
    response(status, "application/json", json)
}

/// `{"detail": ...}` body with the given status
pub fn detail_response(status: StatusCode, detail: &str) -> Response<BoxBody> {
    json_response(status, &serde_json::json!({ "detail": detail }))
}

pub fn error_response(err: CryptoLockError) -> Response<BoxBody> {
    let (status, detail) = err.into_status_code_and_detail();
    if status.is_server_error() {
        error!(status = status.as_u16(), detail = %detail, "Request failed");
    } else {
        warn!(status = status.as_u16(), detail = %detail, "Request rejected");
    }
    detail_response(status, &detail)
}

pub fn text_response(body: String) -> Response<BoxBody> {
    response(StatusCode::OK, "text/plain; charset=utf-8", body)
}

/// `attachment` disposition with an ASCII fallback name and the exact name
/// as RFC 5987 `filename*`. The result is always a valid header value.
pub fn attachment_disposition(filename: &str) -> HeaderValue {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let value = format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    );
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// A downloadable armored key that must not be cached anywhere.
pub fn key_attachment(filename: &str, body: Vec<u8>) -> Response<BoxBody> {
    let mut response = response(StatusCode::OK, "application/pgp-keys", body);
    response
        .headers_mut()
        .insert(header::CONTENT_DISPOSITION, attachment_disposition(filename));
    no_store(response)
}

pub fn no_store(mut response: Response<BoxBody>) -> Response<BoxBody> {
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

pub fn not_found() -> Response<BoxBody> {
    detail_response(StatusCode::NOT_FOUND, "Not Found")
}

pub fn method_not_allowed(allowed: &'static str) -> Response<BoxBody> {
    let mut response = detail_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static(allowed));
    response
}

pub fn payload_too_large(limit: usize) -> Response<BoxBody> {
    detail_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        &format!("Request body exceeds {limit} bytes"),
    )
}

pub fn preflight() -> Response<BoxBody> {
    let mut response = Response::new(full_body(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    response.headers_mut().insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static("86400"),
    );
    response
}

/// Attach CORS headers for a request carrying `origin`.
///
/// Disallowed origins get no `Access-Control-Allow-Origin`, which makes the
/// browser refuse the response.
pub fn with_cors(
    mut response: Response<BoxBody>,
    cors: &CorsOrigins,
    origin: Option<&str>,
) -> Response<BoxBody> {
    let Some(allowed) = cors.allow(origin) else {
        return response;
    };
    let credentials = allowed != "*";
    let Ok(allowed) = HeaderValue::from_str(&allowed) else {
        return response;
    };

    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allowed);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("Content-Disposition"),
    );
    if credentials {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }
    response
}

/// Header lookup helper for tests and logging
pub fn header_str<'a>(response: &'a Response<BoxBody>, name: &HeaderName) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}
