// ── API error taxonomy ──
//
// Every failure leaving this crate is classified so the sync engine can
// decide between backoff, reconnect, and termination without inspecting
// transport details.

use thiserror::Error;

/// Errors raised by the cloud API client.
#[derive(Debug, Error)]
pub enum Error {
    /// Network-level failure reaching the cloud (DNS, TCP, TLS, timeout).
    #[error("error connecting to the cloud service: {0}")]
    Transport(#[source] reqwest::Error),

    /// The cloud answered with a non-success status.
    #[error("cloud rejected request: {status}, {method} {target}")]
    Rejected {
        status: u16,
        method: &'static str,
        target: String,
    },

    /// Login was refused — bad credentials or locked account.
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// The response body did not match the expected payload shape.
    #[error("failed to decode cloud response")]
    Decode(#[source] reqwest::Error),

    /// A request URL could not be constructed.
    #[error("invalid URL")]
    InvalidUrl(#[source] url::ParseError),
}

impl Error {
    /// Whether this error means the session has expired and the whole
    /// connection sequence must be re-run.
    pub fn is_authorization_expired(&self) -> bool {
        matches!(self, Self::Rejected { status: 401, .. })
    }
}
