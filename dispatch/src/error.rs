//! Error types for application building and dispatch.
//!
//! Build-time problems surface as [`ConfigError`], bad command lines as
//! [`UsageError`] (exit 2) and handler failures as [`HandlerError`] (exit 1).

use autocli_core::{FieldError, SchemaError};
use thiserror::Error;

/// Fatal problems found while building an application.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A schema failed definition-time validation.
    #[error("invalid schema '{schema}': {source}")]
    Schema {
        schema: String,
        #[source]
        source: SchemaError,
    },

    /// Two schemas were registered under one name.
    #[error("schema '{0}' is registered more than once")]
    DuplicateSchema(String),

    /// A handler name lacks the `run_` prefix or contains invalid characters.
    #[error("handler name '{0}' must start with 'run_' and contain only letters, digits and '_'")]
    InvalidHandlerName(String),

    /// A handler name was registered twice.
    #[error("handler '{0}' is registered more than once")]
    DuplicateHandler(String),

    /// The subcommand token derived from a handler is unusable.
    #[error("handler '{handler}' produces an invalid subcommand token {token:?}")]
    InvalidCommandToken { handler: String, token: String },

    /// The subcommand token derived from a handler is reserved.
    #[error("handler '{handler}' produces the reserved subcommand '{token}'")]
    ReservedCommand { handler: String, token: String },

    /// Two handlers produce the same subcommand token.
    #[error("subcommand '{token}' is produced by both '{first}' and '{second}'")]
    DuplicateCommand {
        token: String,
        first: String,
        second: String,
    },

    /// Config file I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Config file parsing failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// A command line that cannot be turned into a validated argument record.
#[derive(Debug, Error)]
pub enum UsageError {
    /// Rejected by the synthesized parser (unknown flag, missing value, bad choice).
    #[error("{0}")]
    Parse(clap::Error),

    /// The first token names no subcommand and no default handler exists.
    #[error("unrecognized subcommand '{token}' (available: {})", .available.join(", "))]
    UnknownCommand {
        token: String,
        available: Vec<String>,
    },

    /// Coercion or constraint failure in the record layer.
    #[error(transparent)]
    Field(#[from] FieldError),

    /// A process argument that is not valid UTF-8, shown lossily.
    #[error("invalid UTF-8 in argument '{0}'")]
    InvalidUtf8(String),
}

impl UsageError {
    /// Renders the error as printed on the error stream.
    pub fn render(&self) -> String {
        match self {
            Self::Parse(err) => err.render().to_string().trim_end().to_string(),
            other => format!("error: {other}"),
        }
    }

    /// Returns `true` when this is clap's rendering of a help or version request.
    pub fn is_display_request(&self) -> bool {
        matches!(
            self,
            Self::Parse(err) if matches!(
                err.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            )
        )
    }
}

impl From<clap::Error> for UsageError {
    fn from(err: clap::Error) -> Self {
        Self::Parse(err)
    }
}

/// A handler that did not complete normally.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler reported an error or returned an unsupported value.
    #[error("handler '{handler}' failed: {message}")]
    Failed { handler: String, message: String },

    /// The handler panicked.
    #[error("handler '{handler}' panicked: {message}")]
    Panicked { handler: String, message: String },

    /// The handler returned an integer outside the process exit code range.
    #[error("handler '{handler}' returned exit code {code}, outside 0..=255")]
    ExitCodeOutOfRange { handler: String, code: i64 },

    /// The async runtime could not be created.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_command_lists_available() {
        let err = UsageError::UnknownCommand {
            token: "nope".into(),
            available: vec!["file".into(), "greet".into()],
        };
        assert_eq!(
            err.render(),
            "error: unrecognized subcommand 'nope' (available: file, greet)"
        );
    }

    #[test]
    fn test_field_error_is_transparent() {
        let err = UsageError::from(FieldError::Missing {
            field: "name".into(),
            flag: "--name".into(),
        });
        assert!(err.render().starts_with("error: "));
        assert!(err.render().contains("name"));
        assert!(!err.is_display_request());
    }

    #[test]
    fn test_handler_error_names_handler() {
        let err = HandlerError::ExitCodeOutOfRange {
            handler: "run_big".into(),
            code: 300,
        };
        assert!(err.to_string().contains("run_big"));
        assert!(err.to_string().contains("300"));
    }
}
