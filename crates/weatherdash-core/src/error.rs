//! Centralized error types for the weather dashboard.
//!
//! This module provides a typed error hierarchy that:
//! - Enables precise error handling throughout the codebase
//! - Provides user-friendly messages suitable for notices
//! - Preserves full error context for debugging/logging

use thiserror::Error;

/// Top-level application error type.
///
/// Use `user_message()` to get a notice-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Widget error: {0}")]
    Widget(#[from] WidgetError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display in a notice.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Storage(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Widget(e) => e.user_message(),
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }

    /// Recover the typed cause from an `anyhow` error, falling back to `Other`.
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        let err = match err.downcast::<ConfigError>() {
            Ok(e) => return AppError::Config(e),
            Err(err) => err,
        };
        let err = match err.downcast::<StorageError>() {
            Ok(e) => return AppError::Storage(e),
            Err(err) => err,
        };
        match err.downcast::<WidgetError>() {
            Ok(e) => AppError::Widget(e),
            Err(err) => AppError::Other(err),
        }
    }
}

/// Transport failure classes, kept for logging the cause behind a lookup
/// that is reported to the user as "City not found".
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Local persistence errors (storage slots on disk).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),

    #[error("Failed to encode data: {0}")]
    Encode(String),
}

impl StorageError {
    pub fn user_message(&self) -> &'static str {
        match self {
            StorageError::Io(_) => "Unable to access saved cities. Please try again.",
            StorageError::Corrupt(_) => "Saved cities could not be read.",
            StorageError::Encode(_) => "Unable to save cities. Please try again.",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::MissingSetting(_) => "A required setting is missing. Check your settings.",
        }
    }
}

/// Errors surfaced to the user as transient notices by the dashboard views.
#[derive(Debug, Error)]
pub enum WidgetError {
    /// The city could not be resolved, or the request failed in transit.
    #[error("City not found: {0}")]
    NotFound(String),

    /// A search was started without selecting a city.
    #[error("No city selected")]
    NoCitySelected,

    /// Every widget offered for saving names a city that is already saved.
    #[error("City already saved: {0}")]
    DuplicateCity(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl WidgetError {
    pub fn user_message(&self) -> &'static str {
        match self {
            WidgetError::NotFound(_) => "City not found",
            WidgetError::NoCitySelected => "Please Select City",
            WidgetError::DuplicateCity(_) => "This city already exists!",
            WidgetError::Storage(e) => e.user_message(),
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            StorageError::Corrupt(err.to_string())
        } else {
            StorageError::Encode(err.to_string())
        }
    }
}
