//! Standardized mapping of HTTP and network failures into `MirrorError`

use crate::error::MirrorError;
use reqwest::StatusCode;

/// Standard error handler for registry HTTP responses
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Handle registry-related HTTP errors
    pub fn handle_registry_error(
        status: StatusCode,
        error_text: &str,
        operation: &str,
    ) -> MirrorError {
        match status.as_u16() {
            401 => MirrorError::Unauthorized(format!(
                "Unauthorized to perform {} operation: {}",
                operation, error_text
            )),
            403 => MirrorError::Auth(format!(
                "Forbidden: insufficient permissions for {}: {}",
                operation, error_text
            )),
            404 => MirrorError::NotFound(format!(
                "Resource not found for {}: {}",
                operation, error_text
            )),
            429 => MirrorError::Registry(format!("Rate limited during {}: {}", operation, error_text)),
            500 => MirrorError::Registry(format!(
                "Registry server error during {}: {}",
                operation, error_text
            )),
            502 | 503 => MirrorError::Registry(format!(
                "Registry unavailable for {}: {}",
                operation, error_text
            )),
            _ => MirrorError::Registry(format!(
                "{} failed (status {}): {}",
                operation, status, error_text
            )),
        }
    }

    /// Handle token endpoint failures
    pub fn handle_auth_error(status: StatusCode, error_text: &str) -> MirrorError {
        let error_msg = match status.as_u16() {
            400 => "Invalid token request parameters".to_string(),
            401 => "Invalid credentials provided".to_string(),
            403 => "Access denied - insufficient permissions".to_string(),
            404 => "Authentication endpoint not found".to_string(),
            _ => format!("Authentication failed (status {}): {}", status, error_text),
        };

        MirrorError::Auth(error_msg)
    }

    /// Handle blob upload errors
    pub fn handle_upload_error(status: StatusCode, error_text: &str, context: &str) -> MirrorError {
        match status.as_u16() {
            400 if error_text.contains("DIGEST_INVALID") => MirrorError::Registry(format!(
                "Digest validation failed during {} - uploaded content does not match: {}",
                context, error_text
            )),
            401 => MirrorError::Unauthorized(format!(
                "Authentication failed during {}: {}",
                context, error_text
            )),
            404 => MirrorError::Registry(format!(
                "Repository not found or {} session expired: {}",
                context, error_text
            )),
            413 => MirrorError::Registry(format!("Blob too large for {}: {}", context, error_text)),
            _ => Self::handle_registry_error(status, error_text, context),
        }
    }
}

/// Network error categorization and handling
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    /// Categorize and format network errors with helpful context
    pub fn handle_network_error(error: &reqwest::Error, context: &str) -> MirrorError {
        if error.is_timeout() {
            MirrorError::Timeout(format!("{} timeout: {}", context, error))
        } else if error.is_connect() {
            MirrorError::Network(format!("Connection error during {}: {}", context, error))
        } else if error.to_string().contains("dns") {
            MirrorError::Network(format!("DNS resolution error for {}: {}", context, error))
        } else if error.to_string().contains("certificate") {
            MirrorError::Network(format!(
                "TLS certificate error during {}: {}",
                context, error
            ))
        } else {
            MirrorError::Network(format!("{} network error: {}", context, error))
        }
    }
}
