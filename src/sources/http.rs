//! Blocking HTTP client shared by the data sources.

#![allow(missing_docs)]

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::core::errors::{BtmError, Result};

/// Per-request timeout for every data source call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const USER_AGENT: &str = concat!("btcmon/", env!("CARGO_PKG_VERSION"));

/// Thin wrapper over `reqwest::blocking::Client` with the daemon's timeout
/// and user agent. Cloning shares the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::blocking::Client,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let inner = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { inner })
    }

    /// GET `url` and return the trimmed body. Non-2xx statuses are errors.
    pub fn get_text(&self, url: &str) -> Result<String> {
        let body = self
            .inner
            .get(url)
            .send()?
            .error_for_status()?
            .text()?;
        Ok(body.trim().to_string())
    }

    /// GET `url` and decode the JSON body into `T`.
    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get_text(url)?;
        serde_json::from_str(&body).map_err(|e| BtmError::http(url, e))
    }
}
