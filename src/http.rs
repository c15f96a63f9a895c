//! The upstream HTTP transport contract and a `reqwest`-backed default.
//!
//! `spec.md` §6 names the HTTP client as a consumed upstream interface;
//! `HttpClient` is that contract. `ReqwestHttpClient` is a concrete,
//! synchronous implementation so this crate runs standalone without an
//! async runtime, matching the teacher's own `tokio`-free concurrency
//! model (`rayon` + `parking_lot` only).

use std::time::Duration;

use bytes::Bytes;

use crate::error::{CoreError, CoreResult};

/// A fetched response: status code and body bytes.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The external upstream-fetch contract consumed by `WMSClient`/`TiledSource`.
pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str) -> CoreResult<HttpResponse>;
}

/// A blocking `reqwest`-backed `HttpClient`.
pub struct ReqwestHttpClient {
    client: reqwest::blocking::Client,
}

impl ReqwestHttpClient {
    pub fn new(timeout: Duration) -> CoreResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::TileSource(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestHttpClient {
    fn get(&self, url: &str) -> CoreResult<HttpResponse> {
        tracing::debug!(url, "fetching tile source");
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| CoreError::TileSource(format!("{url}: {e}")))?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .map_err(|e| CoreError::TileSource(format!("{url}: {e}")))?;
        if !(200..300).contains(&status) {
            tracing::warn!(url, status, "upstream returned non-success status");
        }
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_success_true_for_2xx() {
        let r = HttpResponse { status: 204, body: Bytes::new() };
        assert!(r.is_success());
    }

    #[test]
    fn is_success_false_for_4xx() {
        let r = HttpResponse { status: 404, body: Bytes::new() };
        assert!(!r.is_success());
    }
}
