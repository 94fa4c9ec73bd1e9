// ── Core error types ──
//
// User-facing errors from alertdeck-core. These are NOT transport-specific:
// consumers never see HTTP status codes or JSON parse failures directly.
// The `From<alertdeck_api::Error>` impl translates transport-layer errors
// into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
///
/// Nothing here is fatal to the process: query and command failures leave
/// the view model consistent and are surfaced for a retry affordance.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Session / channel errors ─────────────────────────────────────
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Push channel unavailable: {reason}")]
    ChannelUnavailable { reason: String },

    // ── Query / command errors ───────────────────────────────────────
    #[error("Alert query failed: {message}")]
    QueryFailed { message: String },

    #[error("Acknowledgment failed: {message}")]
    CommandFailed { message: String },

    #[error("Alert not found: {id}")]
    AlertNotFound { id: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Wrap a transport error raised by a paginated query.
    /// Auth expiry passes through so the session layer can react.
    pub(crate) fn query(err: alertdeck_api::Error) -> Self {
        if err.is_auth_expired() {
            return Self::SessionExpired;
        }
        Self::QueryFailed {
            message: err.to_string(),
        }
    }

    /// Wrap a transport error raised by an acknowledgment command.
    pub(crate) fn command(err: alertdeck_api::Error) -> Self {
        if err.is_auth_expired() {
            return Self::SessionExpired;
        }
        Self::CommandFailed {
            message: err.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<alertdeck_api::Error> for CoreError {
    fn from(err: alertdeck_api::Error) -> Self {
        match err {
            alertdeck_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            alertdeck_api::Error::SessionExpired => CoreError::SessionExpired,
            alertdeck_api::Error::WebSocketConnect(reason) => {
                CoreError::ChannelUnavailable { reason }
            }
            alertdeck_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            alertdeck_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS error: {msg}"),
            },
            alertdeck_api::Error::Transport(e) => CoreError::Internal(e.to_string()),
            alertdeck_api::Error::Api { message, status } => {
                CoreError::Internal(format!("API error (HTTP {status}): {message}"))
            }
            alertdeck_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
