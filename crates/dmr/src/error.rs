//! Error types for dispatching and configuration.

use thiserror::Error;

/// A dispatch that never produced a usable management response.
///
/// The display form is the human readable message; the status code, when
/// known, is available through [`DispatchError::status`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The endpoint answered with a status other than 200.
    #[error("{message}")]
    Status { message: String, status: u16 },

    /// The request never completed (connection refused, timeout, ...).
    #[error("{message}")]
    Transport { message: String },

    /// The operation could not be turned into a request.
    #[error("Failed to encode operation: {message}")]
    Encode { message: String },
}

impl DispatchError {
    pub(crate) fn status(message: impl Into<String>, status: u16) -> Self {
        DispatchError::Status {
            message: message.into(),
            status,
        }
    }

    pub(crate) fn transport(message: impl Into<String>) -> Self {
        DispatchError::Transport { message: message.into() }
    }

    /// HTTP status associated with the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            DispatchError::Status { status, .. } => Some(*status),
            DispatchError::Transport { .. } | DispatchError::Encode { .. } => None,
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write configuration file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid management URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid value '{value}' for {name}")]
    InvalidValue { name: &'static str, value: String },

    #[error("could not build the HTTP client: {reason}")]
    Client { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_the_plain_message() {
        let error = DispatchError::status("Authentication required.", 401);
        assert_eq!(error.to_string(), "Authentication required.");
        assert_eq!(error.status_code(), Some(401));
        assert_eq!(DispatchError::transport("Network error: refused").status_code(), None);
    }
}
