//! Error types for confchain
//!
//! Absence of a value is never an error in this crate; lookups report it as
//! `None`. Errors carry a kind, the config path or file they concern, and an
//! actionable help line.

use std::fmt;
use std::path::Path;

/// Result type alias for confchain operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for confchain operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Config path or file the error concerns (e.g., "database.port")
    pub path: Option<String>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Error parsing YAML/JSON input
    Parse,
    /// A required path resolved to nothing
    PathNotFound,
    /// Type coercion failed
    TypeCoercion,
    /// An env file exists but could not be read
    Io,
}

impl Error {
    /// Create a new parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Parse,
            path: None,
            help: None,
            cause: Some(message.into()),
        }
    }

    /// Create a path not found error
    pub fn path_not_found(path: impl Into<String>) -> Self {
        let path_str = path.into();
        Self {
            kind: ErrorKind::PathNotFound,
            path: Some(path_str.clone()),
            help: Some(format!(
                "Set '{}' in the configuration or the environment, or supply a default",
                path_str
            )),
            cause: None,
        }
    }

    /// Create a type coercion error
    pub fn type_coercion(
        path: impl Into<String>,
        expected: impl Into<String>,
        got: impl Into<String>,
    ) -> Self {
        Self {
            kind: ErrorKind::TypeCoercion,
            path: Some(path.into()),
            help: Some(format!(
                "Ensure the value can be converted to {}",
                expected.into()
            )),
            cause: Some(format!("Got: {}", got.into())),
        }
    }

    /// Create an I/O error for an env file that exists but cannot be read
    pub fn io(file: &Path, err: &std::io::Error) -> Self {
        Self {
            kind: ErrorKind::Io,
            path: Some(file.display().to_string()),
            help: Some("Check the file's permissions".into()),
            cause: Some(err.to_string()),
        }
    }

    /// Add path context to the error
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Parse => write!(f, "Parse error")?,
            ErrorKind::PathNotFound => write!(f, "Path not found")?,
            ErrorKind::TypeCoercion => write!(f, "Type coercion failed")?,
            ErrorKind::Io => write!(f, "I/O error")?,
        }

        if let Some(path) = &self.path {
            write!(f, "\n  Path: {}", path)?;
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}
