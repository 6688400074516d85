// src/resolver/http.rs
//
// HTTP(S) resolver: identifiers are absolute URLs fetched with a blocking
// client under a deadline and a body-size ceiling.

use super::{Resource, ResourceResolver, LOOP_DETECTION_HEADER};
use crate::error::{IiifError, Result};
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use std::io::{Cursor, Read};
use std::time::Duration;
use tracing::{info, instrument};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct HttpResolver {
    client: Client,
    max_body_bytes: u64,
}

impl HttpResolver {
    pub fn new(timeout: Duration, max_body_bytes: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("iiif-pipe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IiifError::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            max_body_bytes,
        })
    }

    pub fn max_body_bytes(&self) -> u64 {
        self.max_body_bytes
    }
}

/// Parses an identifier as an http(s) URL.
pub(crate) fn parse_identifier(identifier: &str) -> Result<Url> {
    let trimmed = identifier.trim();
    let url = Url::parse(trimmed)
        .map_err(|_| IiifError::invalid_identifier(identifier, "not a valid URL"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(IiifError::invalid_identifier(
            identifier,
            format!("not a valid scheme: {scheme:?}"),
        )),
    }
}

fn map_reqwest_error(err: reqwest::Error, url: &Url) -> IiifError {
    if err.is_timeout() {
        IiifError::timeout(url.as_str())
    } else {
        IiifError::fetch_failed(url.as_str(), err.to_string())
    }
}

fn map_read_error(err: std::io::Error, url: &Url) -> IiifError {
    let timed_out = err.kind() == std::io::ErrorKind::TimedOut
        || err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
            .is_some_and(reqwest::Error::is_timeout);
    if timed_out {
        IiifError::timeout(url.as_str())
    } else {
        IiifError::fetch_failed(url.as_str(), format!("failed to read body: {err}"))
    }
}

impl ResourceResolver for HttpResolver {
    #[instrument(skip(self), level = "debug")]
    fn get_resource(&self, identifier: &str) -> Result<Resource> {
        let url = parse_identifier(identifier)?;

        let response = self
            .client
            .get(url.clone())
            .header(LOOP_DETECTION_HEADER, "1")
            .send()
            .map_err(|e| map_reqwest_error(e, &url))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(IiifError::upstream_status(url.as_str(), status.as_u16()));
        }

        // Cheap rejection before reading anything
        if response
            .content_length()
            .is_some_and(|len| len > self.max_body_bytes)
        {
            return Err(IiifError::body_too_large(url.as_str(), self.max_body_bytes));
        }

        let mut body = Vec::new();
        response
            .take(self.max_body_bytes.saturating_add(1))
            .read_to_end(&mut body)
            .map_err(|e| map_read_error(e, &url))?;

        if body.len() as u64 > self.max_body_bytes {
            return Err(IiifError::body_too_large(url.as_str(), self.max_body_bytes));
        }
        if body.is_empty() {
            return Err(IiifError::empty_body(url.as_str()));
        }

        info!(url = %url, bytes = body.len(), "fetched resource");
        Ok(Cursor::new(body))
    }
}
