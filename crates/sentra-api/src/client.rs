// Cloud API HTTP client
//
// Wraps `reqwest::Client` with URL construction and response
// classification. Authentication lives in `auth.rs`; this module is
// transport mechanics and the typed endpoint surface.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{
    BaseStationRecord, ElementsRoot, EventsPage, HealthRecord, MaintenanceStatus,
};

/// Default cloud API host.
pub const DEFAULT_BASE_URL: &str = "https://api.sentra-home.io";
/// Default status host used for the maintenance probe.
pub const DEFAULT_STATUS_URL: &str = "https://status.sentra-home.io";

/// Maximum events fetched per page.
const EVENT_PAGE_LIMIT: u32 = 500;

/// Connection parameters for the cloud client.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: Url,
    pub status_url: Url,
    pub email: String,
    pub password: SecretString,
    /// Hours before the session is proactively renewed.
    pub authorize_hours: u64,
}

/// Typed client for the security cloud.
///
/// Cheaply cloneable. The session cookie lives in the underlying
/// `reqwest` cookie jar; [`authorize()`](ApiClient::authorize) must
/// succeed before any data endpoint is called, and the client renews
/// the session itself once it grows older than `authorize_hours`.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) http: reqwest::Client,
    pub(crate) config: ApiConfig,
    /// Set on successful login; `None` until first authorization.
    pub(crate) authorized_at: RwLock<Option<Instant>>,
}

impl ApiClient {
    /// Create a new client. Does not touch the network.
    pub fn new(config: ApiConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(Error::Transport)?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                config,
                authorized_at: RwLock::new(None),
            }),
        })
    }

    pub(crate) fn inner(&self) -> &ClientInner {
        &self.inner
    }

    /// Build a URL under the API host.
    fn api_url(&self, path: &str) -> Result<Url, Error> {
        self.inner.config.base_url.join(path).map_err(Error::InvalidUrl)
    }

    // ── Maintenance probe ────────────────────────────────────────────

    /// Whether the cloud is in maintenance mode.
    ///
    /// Queries the dedicated status host; does not require an
    /// authorized session.
    pub async fn is_maintenance(&self) -> Result<bool, Error> {
        let url = self
            .inner
            .config
            .status_url
            .join("/api/v1/status")
            .map_err(Error::InvalidUrl)?;
        debug!("GET {url}");

        let resp = self
            .inner
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(Error::Transport)?;
        let status: MaintenanceStatus = decode(resp, "GET", &url).await?;
        Ok(status.is_maintenance)
    }

    // ── Data endpoints ───────────────────────────────────────────────

    /// Fetch all base stations.
    pub async fn get_base_stations(&self) -> Result<Vec<BaseStationRecord>, Error> {
        self.get_json("/api/v1/me/basestations").await
    }

    /// Fetch elements and phone-like endpoints, grouped by base station.
    pub async fn get_elements(&self) -> Result<ElementsRoot, Error> {
        self.get_json("/api/v2/me/elements").await
    }

    /// Fetch events newer than `from_ts` (epoch milliseconds).
    pub async fn get_recent_events(&self, from_ts: i64) -> Result<EventsPage, Error> {
        self.get_json(&format!(
            "/api/v2/me/events?from_ts={from_ts}&limit={EVENT_PAGE_LIMIT}"
        ))
        .await
    }

    /// Fetch events in a closed range of epoch milliseconds.
    pub async fn get_events_range(
        &self,
        from_ts: i64,
        to_ts: Option<i64>,
    ) -> Result<EventsPage, Error> {
        let path = match to_ts {
            Some(to) => format!(
                "/api/v2/me/events?from_ts={from_ts}&to_ts={to}&limit={EVENT_PAGE_LIMIT}"
            ),
            None => format!("/api/v2/me/events?from_ts={from_ts}&limit={EVENT_PAGE_LIMIT}"),
        };
        self.get_json(&path).await
    }

    /// Fetch the account-wide system health summary.
    pub async fn get_health(&self) -> Result<HealthRecord, Error> {
        self.get_json("/api/v2/me/health").await
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Send a named command (`"on"`, `"off"`, `"press"`) to an element.
    pub async fn send_element_command(
        &self,
        base_id: &str,
        endnode_id: &str,
        name: &str,
    ) -> Result<(), Error> {
        let path = format!("/api/v1/me/basestations/{base_id}/endnodes/{endnode_id}/cmd");
        self.post_command(&path, &json!({ "name": name })).await
    }

    /// Switch the active intrusion mode of a base station.
    pub async fn set_intrusion_mode(&self, base_id: &str, mode: &str) -> Result<(), Error> {
        let path = format!("/api/v1/me/basestations/{base_id}");
        self.post_command(&path, &json!({ "intrusion_settings": { "active_mode": mode } }))
            .await
    }

    /// Start or stop the manual user alarm.
    pub async fn set_user_alarm(&self, base_id: &str, active: bool) -> Result<(), Error> {
        let path = format!("/api/v1/me/basestations/{base_id}/useralarm");
        self.post_command(&path, &json!({ "active": active })).await
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.ensure_authorized().await?;
        let url = self.api_url(path)?;
        debug!("GET {url}");

        let resp = self
            .inner
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(Error::Transport)?;
        decode(resp, "GET", &url).await
    }

    async fn post_command(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<(), Error> {
        self.ensure_authorized().await?;
        let url = self.api_url(path)?;
        debug!("POST {url}");

        let resp = self
            .inner
            .http
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(rejected(status, "POST", &url))
        }
    }
}

/// Classify a non-success status into [`Error::Rejected`].
pub(crate) fn rejected(status: reqwest::StatusCode, method: &'static str, url: &Url) -> Error {
    Error::Rejected {
        status: status.as_u16(),
        method,
        target: url.path().to_owned(),
    }
}

/// Check the status, then decode the body into `T`.
pub(crate) async fn decode<T: DeserializeOwned>(
    resp: reqwest::Response,
    method: &'static str,
    url: &Url,
) -> Result<T, Error> {
    let status = resp.status();
    if !status.is_success() {
        return Err(rejected(status, method, url));
    }
    resp.json().await.map_err(Error::Decode)
}
