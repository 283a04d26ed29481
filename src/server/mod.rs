//! HTTP server for CryptoLock

pub mod http;

pub use http::{read_body, run, AppState};
