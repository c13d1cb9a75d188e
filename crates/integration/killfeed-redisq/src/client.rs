//! RedisQ long-poll client
//!
//! `GET listen.php?queueID=<id>&ttw=<secs>` holds the connection open until a
//! kill is queued or the wait hint runs out, then answers
//! `{"package": {...}}` or `{"package": null}`.

use crate::{Error, Result};
use async_trait::async_trait;
use killfeed_config::FeedConfig;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA};
use std::time::Duration;
use url::Url;

/// One long-poll round trip against some feed
#[async_trait]
pub trait PollSource: Send + Sync {
    /// `Ok(Some(package))` for a kill, `Ok(None)` for an empty tick
    async fn poll(&self) -> Result<Option<serde_json::Value>>;
}

/// Decode a response body into its package, if any.
///
/// The body must be a JSON object; `{}` and `{"package": null}` are empty ticks.
/// Some relays put the market block beside the package, so a sibling `zkb`
/// is moved inside unless the package already carries one.
pub fn parse_envelope(body: &[u8]) -> Result<Option<serde_json::Value>> {
    let envelope: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| Error::MalformedEnvelope(e.to_string()))?;

    let mut envelope = match envelope {
        serde_json::Value::Object(map) => map,
        other => {
            return Err(Error::MalformedEnvelope(format!(
                "expected an object, got {}",
                json_kind(&other)
            )))
        }
    };

    let mut package = match envelope.remove("package") {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(package) => package,
    };

    if let (Some(zkb), Some(object)) = (envelope.remove("zkb"), package.as_object_mut()) {
        object.entry("zkb").or_insert(zkb);
    }

    Ok(Some(package))
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// HTTP client bound to one queue
#[derive(Debug, Clone)]
pub struct RedisQClient {
    client: reqwest::Client,
    url: Url,
}

impl RedisQClient {
    /// `timeout` bounds the whole request and should exceed `wait_secs`
    pub fn new(
        endpoint: &str,
        queue_id: &str,
        wait_secs: u64,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self> {
        let ttw = wait_secs.to_string();
        let url = Url::parse_with_params(endpoint, &[("queueID", queue_id), ("ttw", ttw.as_str())])
            .map_err(|e| Error::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(timeout)
            .user_agent(user_agent)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::ClientSetup(e.to_string()))?;

        Ok(Self { client, url })
    }

    pub fn from_config(config: &FeedConfig, queue_id: &str) -> Result<Self> {
        Self::new(
            &config.endpoint,
            queue_id,
            config.wait_secs,
            config.request_timeout(),
            &config.user_agent,
        )
    }

    /// Full request URL, query included
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl PollSource for RedisQClient {
    async fn poll(&self) -> Result<Option<serde_json::Value>> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| Error::TransientNetwork(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::TransientNetwork(e.to_string()))?;

        parse_envelope(&body)
    }
}
