//! HTTP webhook notifications (homebridge-http-webhooks style).
//!
//! Each notification is a single GET with the accessory id and either a value
//! or a state in the query string. Delivery is fire-and-forget: failures are
//! reported to the caller, who logs them and moves on.

use log::info;
use reqwest::Url;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// The payload of one notification.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// A sensor value, sent as `value=...`
    Value(String),
    /// An accessory state, sent as `state=...`
    State(bool),
}

impl Param {
    /// A numeric sensor value, always rendered with a decimal point.
    pub fn number(value: f64) -> Self {
        Param::Value(format_number(value))
    }

    fn query_pair(&self) -> (&'static str, String) {
        match self {
            Param::Value(value) => ("value", value.clone()),
            Param::State(state) => ("state", state.to_string()),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (key, value) = self.query_pair();
        write!(f, "{key}={value}")
    }
}

/// Render a float like `21.5`, `-2.3` or `33.0`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// Errors from a single webhook call.
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("invalid webhook url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("HTTP request failed for url='{url}': {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("bad status={status} for url='{url}'")]
    Status { url: String, status: u16 },
}

/// Something that can deliver notifications.
///
/// The dispatch cycle only talks to this trait so it can be tested without a
/// webhook receiver.
pub trait Notifier: Send + Sync {
    fn notify<'a>(
        &'a self,
        accessory_id: &'a str,
        param: &'a Param,
    ) -> Pin<Box<dyn Future<Output = Result<(), WebhookError>> + Send + 'a>>;
}

/// Webhook client for a receiver at `http://{host}:{port}/`.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    http: reqwest::Client,
    base_url: Url,
}

impl WebhookClient {
    /// Create a client. `timeout` bounds every call so one unresponsive
    /// receiver cannot stall the dispatch loop.
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self, WebhookError> {
        let base_url = base_url(host, port)?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("bt-temp-webhook/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(WebhookError::Client)?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Request URL for one notification.
    ///
    /// Components are percent-encoded with nothing left unescaped but the
    /// unreserved characters, so a space is sent as `%20` rather than the
    /// form encoding `+`.
    pub fn url_for(&self, accessory_id: &str, param: &Param) -> Url {
        let (key, value) = param.query_pair();
        let mut url = self.base_url.clone();
        url.set_query(Some(&format!(
            "accessoryId={}&{key}={}",
            urlencoding::encode(accessory_id),
            urlencoding::encode(&value)
        )));
        url
    }

    /// Issue one GET. Anything but HTTP 200 is an error.
    pub async fn send(&self, accessory_id: &str, param: &Param) -> Result<(), WebhookError> {
        let url = self.url_for(accessory_id, param);

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|source| WebhookError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(WebhookError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        info!("updated url='{url}'");
        Ok(())
    }
}

impl Notifier for WebhookClient {
    fn notify<'a>(
        &'a self,
        accessory_id: &'a str,
        param: &'a Param,
    ) -> Pin<Box<dyn Future<Output = Result<(), WebhookError>> + Send + 'a>> {
        Box::pin(self.send(accessory_id, param))
    }
}

fn base_url(host: &str, port: u16) -> Result<Url, WebhookError> {
    let raw = format!("http://{host}:{port}/");
    let url = Url::parse(&raw).map_err(|e| WebhookError::InvalidUrl {
        url: raw.clone(),
        reason: e.to_string(),
    })?;
    // A host containing '/' or '?' would parse but point somewhere else
    if url.path() != "/" || url.query().is_some() || url.host_str().is_none() {
        return Err(WebhookError::InvalidUrl {
            url: raw,
            reason: "host must be a bare hostname or address".to_string(),
        });
    }
    Ok(url)
}
