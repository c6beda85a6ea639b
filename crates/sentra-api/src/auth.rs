// Cloud authentication
//
// Cookie-based session login plus timed proactive renewal. The login
// endpoint sets a session cookie in the client's jar; data requests
// carry it automatically.

use std::time::{Duration, Instant};

use secrecy::ExposeSecret;
use serde_json::json;
use tracing::debug;

use crate::client::ApiClient;
use crate::error::Error;

impl ApiClient {
    /// Authenticate with the cloud using the configured credentials.
    ///
    /// On success the session cookie is stored in the cookie jar and the
    /// renewal clock restarts. A refused login maps to
    /// [`Error::Authentication`] — the caller treats this as fatal.
    pub async fn authorize(&self) -> Result<(), Error> {
        let inner = self.inner();
        let url = inner
            .config
            .base_url
            .join("/api/v1/auth/login")
            .map_err(Error::InvalidUrl)?;
        debug!("logging in at {url}");

        let body = json!({
            "email": inner.config.email,
            "password": inner.config.password.expose_secret(),
        });

        let resp = inner
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status}): {body}"),
            });
        }

        *inner
            .authorized_at
            .write()
            .expect("authorization clock lock poisoned") = Some(Instant::now());
        debug!("login successful");
        Ok(())
    }

    /// Re-authorize when the session is missing or older than the
    /// configured renewal interval. Called before every data request.
    pub(crate) async fn ensure_authorized(&self) -> Result<(), Error> {
        let max_age = Duration::from_secs(self.inner().config.authorize_hours * 3600);
        let stale = self
            .inner()
            .authorized_at
            .read()
            .expect("authorization clock lock poisoned")
            .map_or(true, |at| at.elapsed() >= max_age);

        if stale {
            debug!("session missing or expired, renewing authorization");
            self.authorize().await?;
        }
        Ok(())
    }
}
