//! CLI error types with miette diagnostics.
//!
//! Maps `clinica_api::Error` variants into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use clinica_api::Error as ApiError;
use clinica_config::ConfigError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the backend: {message}")]
    #[diagnostic(
        code(clinica::unreachable),
        help(
            "Check that the server is running and reachable from this machine.\n\
             Self-signed certificate? Try --insecure (-k) or set ca_cert in your profile."
        )
    )]
    Unreachable { message: String },

    #[error("{message}")]
    #[diagnostic(
        code(clinica::gateway),
        help("The gateway answered HTTP {status} after every retry. Try again shortly.")
    )]
    Gateway { status: u16, message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Session expired: {message}")]
    #[diagnostic(code(clinica::session_expired), help("Sign in again with: clinica login"))]
    SessionExpired { message: String },

    #[error("Not signed in")]
    #[diagnostic(
        code(clinica::not_signed_in),
        help("Run: clinica login --profile {profile}")
    )]
    NotSignedIn { profile: String },

    #[error("Login failed: {message}")]
    #[diagnostic(code(clinica::login_rejected), help("Check the username and password."))]
    LoginRejected { message: String },

    #[error("The server accepted the login but returned no token")]
    #[diagnostic(
        code(clinica::missing_token),
        help("The backend may be misconfigured; contact the administrator.")
    )]
    MissingToken,

    #[error("Access denied: {message}")]
    #[diagnostic(code(clinica::forbidden))]
    Forbidden { message: String },

    // ── Backend replies ──────────────────────────────────────────────
    #[error("Not found: {message}")]
    #[diagnostic(code(clinica::not_found))]
    NotFound { message: String },

    #[error("Request failed (HTTP {status}): {message}")]
    #[diagnostic(code(clinica::api_error))]
    Api { status: u16, message: String },

    #[error("Unexpected response: {message}")]
    #[diagnostic(code(clinica::invalid_response))]
    InvalidResponse { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(clinica::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(clinica::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: clinica config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No server configured")]
    #[diagnostic(
        code(clinica::no_config),
        help(
            "Create a profile with: clinica config init\n\
             Or pass --server / set CLINICA_SERVER.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(clinica::config))]
    Config(#[from] ConfigError),

    #[error("Session storage failed: {message}")]
    #[diagnostic(code(clinica::storage))]
    Storage { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {message}")]
    #[diagnostic(code(clinica::render))]
    Render { message: String },
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unreachable { .. } | Self::Gateway { .. } => exit_code::CONNECTION,
            Self::SessionExpired { .. }
            | Self::NotSignedIn { .. }
            | Self::LoginRejected { .. }
            | Self::MissingToken => exit_code::AUTH,
            Self::Forbidden { .. } => exit_code::PERMISSION,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ApiError → CliError mapping ──────────────────────────────────────

impl From<ApiError> for CliError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Network { message, .. } => Self::Unreachable { message },
            ApiError::Gateway { status, message } => Self::Gateway { status, message },
            ApiError::Authentication { message } => Self::SessionExpired { message },
            ApiError::LoginRejected { message, .. } => Self::LoginRejected { message },
            ApiError::MissingToken => Self::MissingToken,
            ApiError::Client {
                status: 403,
                message,
                ..
            } => Self::Forbidden { message },
            ApiError::Client {
                status: 404,
                message,
                ..
            } => Self::NotFound { message },
            ApiError::Client {
                status, message, ..
            }
            | ApiError::Server {
                status, message, ..
            } => Self::Api { status, message },
            ApiError::Parse { message, .. } => Self::InvalidResponse { message },
            ApiError::Storage(e) => Self::Storage {
                message: e.to_string(),
            },
            ApiError::InvalidUrl(e) => Self::Validation {
                field: "server".into(),
                reason: e.to_string(),
            },
            ApiError::HttpClient(message) => Self::Validation {
                field: "transport".into(),
                reason: message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_map_to_exit_codes() {
        let cases = [
            (
                ApiError::Gateway {
                    status: 503,
                    message: "down".into(),
                },
                exit_code::CONNECTION,
            ),
            (
                ApiError::Authentication {
                    message: "jwt expired".into(),
                },
                exit_code::AUTH,
            ),
            (ApiError::MissingToken, exit_code::AUTH),
            (
                ApiError::Client {
                    status: 404,
                    message: "no existe".into(),
                    body: None,
                },
                exit_code::NOT_FOUND,
            ),
            (
                ApiError::Client {
                    status: 403,
                    message: "solo admin".into(),
                    body: None,
                },
                exit_code::PERMISSION,
            ),
            (
                ApiError::Server {
                    status: 500,
                    message: "boom".into(),
                    body: None,
                },
                exit_code::GENERAL,
            ),
        ];

        for (api, code) in cases {
            let label = api.to_string();
            assert_eq!(CliError::from(api).exit_code(), code, "{label}");
        }
    }
}
