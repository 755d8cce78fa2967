//! Error types for fetching a URL and observing its TLS handshake.
//!
//! Only transport and input problems are errors. A handshake that completes
//! with parameters outside the ATS allow-lists is a negative verdict, not an
//! error, and never shows up here.

use std::io;
use thiserror::Error;

/// Error returned when the URL could not be fetched.
///
/// Every variant is fatal for a single run: the checker never sees a
/// handshake, so no verdict can be produced.
#[derive(Debug, Error)]
pub enum AtsError {
    /// DNS resolution failed for the given hostname
    #[error("Failed to resolve hostname: {hostname}. Check that the hostname is spelled correctly and your DNS configuration is working.")]
    DnsResolution {
        /// The hostname that failed to resolve
        hostname: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// TCP connection failed to every resolved address
    #[error("Connection failed to: {address}. Verify the host is running and is reachable.")]
    ConnectionFailed {
        /// The address (host:port) that connection failed to
        address: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// TLS handshake failed
    #[error("TLS handshake failed: {details}")]
    HandshakeFailed {
        /// Details about why the handshake failed
        details: String,
    },

    /// Network operation timeout
    #[error("Operation timed out: {operation}")]
    Timeout {
        /// Description of which operation timed out
        operation: String,
    },

    /// Invalid input provided to the API
    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput {
        /// Which field/parameter was invalid
        field: String,
        /// Why it was invalid
        reason: String,
    },

    /// The server answered with something that is not an HTTP response
    #[error("Invalid HTTP response: {reason}")]
    InvalidResponse {
        /// What was wrong with the response head
        reason: String,
    },

    /// OpenSSL error occurred while configuring the client
    #[error("OpenSSL error: {details}")]
    OpenSSLError {
        /// The underlying OpenSSL error
        details: String,
    },

    /// Generic I/O error
    #[error("I/O error: {source}")]
    IoError {
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl From<io::Error> for AtsError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::Timeout {
                operation: e.to_string(),
            },
            _ => Self::IoError { source: e },
        }
    }
}

impl From<url::ParseError> for AtsError {
    fn from(e: url::ParseError) -> Self {
        Self::InvalidInput {
            field: "url".to_string(),
            reason: e.to_string(),
        }
    }
}

impl From<openssl::error::ErrorStack> for AtsError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Self::OpenSSLError {
            details: e.to_string(),
        }
    }
}

impl<S: std::fmt::Debug> From<openssl::ssl::HandshakeError<S>> for AtsError {
    fn from(e: openssl::ssl::HandshakeError<S>) -> Self {
        Self::HandshakeFailed {
            details: format!("{}", e),
        }
    }
}
