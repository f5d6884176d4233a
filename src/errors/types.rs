//! # Error Types
//!
//! Error types for the upgrade test harness using `thiserror`.

/// Custom result type for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Main error type for the upgrade test harness
#[derive(thiserror::Error, Debug)]
pub enum HarnessError {
    /// The isolated source database could not be provisioned
    #[error("Provisioning error: {message}")]
    Provisioning {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// A fixture could not be read or decompressed
    #[error("Fixture load error: {message} ({path})")]
    FixtureLoad {
        message: String,
        path: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// An operation was invoked out of sequence
    #[error("Invalid state: {operation} is not allowed while {state}")]
    InvalidState { operation: String, state: String },

    /// Post-upgrade verification found unexpected entity counts
    #[error("Verification failed: {}", mismatches.join("; "))]
    Verification { mismatches: Vec<String> },

    /// The external upgrade process failed
    #[error("Upgrade failed: {source}")]
    Upgrade {
        #[source]
        source: anyhow::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Database and storage errors
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },
}

impl HarnessError {
    /// Create a provisioning error
    pub fn provisioning<S: Into<String>>(message: S) -> Self {
        Self::Provisioning {
            message: message.into(),
            source: None,
        }
    }

    /// Create a provisioning error caused by a filesystem failure
    pub fn provisioning_io<S: Into<String>>(message: S, source: std::io::Error) -> Self {
        Self::Provisioning {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a fixture load error for the given path
    pub fn fixture_load<S: Into<String>, P: AsRef<std::path::Path>>(
        message: S,
        path: P,
        source: Option<std::io::Error>,
    ) -> Self {
        Self::FixtureLoad {
            message: message.into(),
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Create an invalid state error
    pub fn invalid_state<O: Into<String>, S: Into<String>>(operation: O, state: S) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            state: state.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a database error with context
    pub fn database<S: Into<String>>(source: sqlx::Error, context: S) -> Self {
        Self::Database {
            source,
            context: context.into(),
        }
    }

    pub fn is_provisioning(&self) -> bool {
        matches!(self, Self::Provisioning { .. })
    }

    pub fn is_fixture_load(&self) -> bool {
        matches!(self, Self::FixtureLoad { .. })
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }

    /// Add context to an error
    pub(crate) fn add_context(mut self, context: &str) -> Self {
        match &mut self {
            Self::Io { context: ctx, .. } | Self::Database { context: ctx, .. } => {
                *ctx = format!("{}: {}", context, ctx);
            }
            _ => {}
        }
        self
    }
}

// Error conversions for common external error types
impl From<sqlx::Error> for HarnessError {
    fn from(error: sqlx::Error) -> Self {
        Self::Database {
            source: error,
            context: "Database operation failed".to_string(),
        }
    }
}

impl From<std::io::Error> for HarnessError {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            source: error,
            context: "I/O operation failed".to_string(),
        }
    }
}

impl From<config::ConfigError> for HarnessError {
    fn from(error: config::ConfigError) -> Self {
        Self::config_with_source("Configuration loading failed", Box::new(error))
    }
}

impl From<validator::ValidationErrors> for HarnessError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| e.message.as_deref().unwrap_or("Invalid value").to_string())
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("Validation failed: {}", message))
    }
}
