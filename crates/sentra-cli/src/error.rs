//! CLI error types with miette diagnostics.

use miette::Diagnostic;
use thiserror::Error;

use sentra_core::CoreError;

/// Exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("No cloud credentials configured")]
    #[diagnostic(
        code(sentra::no_credentials),
        help(
            "Provide --email and --password, set SENTRA_EMAIL / SENTRA_PASSWORD,\n\
             or add them to the config file."
        )
    )]
    NoCredentials,

    #[error("Could not load configuration")]
    #[diagnostic(code(sentra::config), help("Check the config file syntax: {path}"))]
    Config {
        path: String,
        #[source]
        source: Box<figment::Error>,
    },

    #[error("Authorization with the cloud failed")]
    #[diagnostic(
        code(sentra::auth_failed),
        help("Verify the account email and password.")
    )]
    Auth(#[source] CoreError),

    #[error(transparent)]
    #[diagnostic(code(sentra::core))]
    Core(CoreError),

    #[error(transparent)]
    #[diagnostic(code(sentra::api))]
    Api(#[from] sentra_api::Error),
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthorizationFailed(_) => Self::Auth(err),
            other => Self::Core(other),
        }
    }
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoCredentials | Self::Config { .. } => exit_code::USAGE,
            Self::Auth(_) => exit_code::AUTH,
            Self::Api(sentra_api::Error::Transport(_)) => exit_code::CONNECTION,
            _ => exit_code::GENERAL,
        }
    }
}
