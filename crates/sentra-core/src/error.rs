// ── Engine error taxonomy ──

use thiserror::Error;

use crate::tree::TreeError;

/// Errors raised by the sync engine.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Classified cloud API failure (transport or rejected request).
    #[error(transparent)]
    Api(#[from] sentra_api::Error),

    /// Failure reported by the host state tree.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// An unrecognized remote enumeration value during conversion.
    /// Fatal only for the single field write it occurred in.
    #[error("unknown enum value: {0}")]
    UnknownEnumValue(String),

    /// A raw record matched none of the three known shapes.
    #[error("unsupported record shape: {0}")]
    UnsupportedRecordShape(String),

    /// Inbound diagnostic message with an unrecognized command.
    #[error("unsupported command: {0}")]
    UnsupportedCommand(String),

    /// Inbound diagnostic message with an unrecognized action.
    #[error("unsupported action: {0}")]
    UnsupportedAction(String),

    /// Credentials were refused during the initial authorize step.
    /// Unrecoverable — the engine terminates.
    #[error("authorization with the cloud failed")]
    AuthorizationFailed(#[source] sentra_api::Error),
}
