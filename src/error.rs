//! Error types for flakeload
//!
//! This module defines the error hierarchy for the whole pipeline.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// The main error type for flakeload
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse config file: {0}")]
    IniParse(#[from] ini::ParseError),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // ============================================================================
    // Input Errors
    // ============================================================================
    #[error("Input error: {message}")]
    Input { message: String },

    #[error("Input file not found: {path}")]
    InputNotFound { path: String },

    #[error("Malformed JSON in {path} at line {line}: {message}")]
    MalformedLine {
        path: String,
        line: usize,
        message: String,
    },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Upload Errors
    // ============================================================================
    #[error("Upload of '{key}' failed: {message}")]
    Upload { key: String, message: String },

    #[error("{failed} of {attempted} uploads failed")]
    UploadIncomplete { failed: usize, attempted: usize },

    // ============================================================================
    // Connection Errors
    // ============================================================================
    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Credential error: {message}")]
    Credential { message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    // ============================================================================
    // SQL Errors
    // ============================================================================
    #[error("SQL execution failed: {message}\n  statement: {statement}")]
    SqlExecution { statement: String, message: String },

    // ============================================================================
    // Template Errors
    // ============================================================================
    #[error("Template error: {message}")]
    Template { message: String },

    #[error("Undefined variable in template: {variable}")]
    UndefinedVariable { variable: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an input error
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
        }
    }

    /// Create an upload error for a single object key
    pub fn upload(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upload {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a credential error
    pub fn credential(message: impl Into<String>) -> Self {
        Self::Credential {
            message: message.into(),
        }
    }

    /// Create a SQL execution error
    pub fn sql(statement: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SqlExecution {
            statement: statement.into(),
            message: message.into(),
        }
    }

    /// Create a template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Create an undefined variable error
    pub fn undefined_var(variable: impl Into<String>) -> Self {
        Self::UndefinedVariable {
            variable: variable.into(),
        }
    }

    /// True for errors raised before any I/O side effect (config and input)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::Config { .. }
                | Error::MissingConfigField { .. }
                | Error::InvalidConfigValue { .. }
                | Error::IniParse(_)
                | Error::YamlParse(_)
                | Error::Input { .. }
                | Error::InputNotFound { .. }
                | Error::MalformedLine { .. }
        )
    }
}

/// Result type alias for flakeload
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::missing_field("STAGING.no_of_lines");
        assert_eq!(
            err.to_string(),
            "Missing required config field: STAGING.no_of_lines"
        );

        let err = Error::MalformedLine {
            path: "in.json".to_string(),
            line: 3,
            message: "expected value".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Malformed JSON in in.json at line 3: expected value"
        );

        let err = Error::UploadIncomplete {
            failed: 1,
            attempted: 10,
        };
        assert_eq!(err.to_string(), "1 of 10 uploads failed");
    }

    #[test]
    fn test_is_validation() {
        assert!(Error::config("x").is_validation());
        assert!(Error::invalid_value("no_of_lines", "not an integer").is_validation());
        assert!(Error::input("bad name").is_validation());

        assert!(!Error::connection("refused").is_validation());
        assert!(!Error::sql("SELECT 1", "boom").is_validation());
        assert!(!Error::upload("k", "denied").is_validation());
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
