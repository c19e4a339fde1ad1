//! Layered error definitions
//!
//! Categorized by source: usage / runtime / timeline / config

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ObserverError {
    // ===== Usage Errors =====
    /// `observe` was called without `entry_types` or `type`
    #[error("failed to execute 'observe': required member entryTypes is undefined")]
    MissingCategorySpec,

    /// `observe` was called with both `entry_types` and `type`
    #[error("failed to execute 'observe': entryTypes and type arguments can't both be present")]
    ConflictingCategorySpec,

    /// Name does not belong to the observable entry types
    #[error("unknown entry type '{name}'")]
    UnknownEntryType { name: String },

    // ===== Runtime Errors =====
    /// Tokio-backed collaborators were built outside a runtime
    #[error("no tokio runtime available: {message}")]
    NoRuntime { message: String },

    /// The process-wide default dispatcher was already initialized
    #[error("default dispatcher is already initialized")]
    DefaultAlreadyInitialized,

    // ===== Timeline Errors =====
    /// `measure` referenced a mark that was never recorded
    #[error("the mark '{name}' does not exist")]
    UnknownMark { name: String },

    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ObserverError {
    /// Create unknown entry type error
    pub fn unknown_entry_type(name: impl Into<String>) -> Self {
        Self::UnknownEntryType { name: name.into() }
    }

    /// Create missing runtime error
    pub fn no_runtime(message: impl Into<String>) -> Self {
        Self::NoRuntime {
            message: message.into(),
        }
    }

    /// Create unknown mark error
    pub fn unknown_mark(name: impl Into<String>) -> Self {
        Self::UnknownMark { name: name.into() }
    }

    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// True for errors caused by a malformed `observe` call
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::MissingCategorySpec | Self::ConflictingCategorySpec
        )
    }
}
