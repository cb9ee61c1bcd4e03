//! Definition-time schema validation.
//!
//! Catches schema mistakes before any input is parsed: reserved names,
//! malformed or colliding flags, invalid patterns, constraints that do not
//! apply to a field's type and defaults of the wrong type.
//!
//! # Examples
//!
//! ```
//! use autocli_core::*;
//!
//! let schema = ArgsSchema::new("GreetArgs")
//!     .with_field(FieldSpec::string("name").default("World").short("-n"));
//! assert!(validate_schema(&schema).is_empty());
//!
//! // Invalid: `help` collides with the reserved --help flag
//! let bad = ArgsSchema::new("BadArgs").with_field(FieldSpec::boolean("help"));
//! assert!(!validate_schema(&bad).is_empty());
//! ```

use std::collections::HashSet;

use serde_json::Value;
use thiserror::Error;

use crate::{ArgsSchema, FieldKind, FieldSpec, ScalarKind};

/// Field name that may never be declared.
pub const RESERVED_FIELD: &str = "help";

/// Flags injected by the dispatcher on every command.
pub const RESERVED_FLAGS: [&str; 2] = ["--help", "-h"];

/// Schema definition errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Schema name is empty or whitespace-only.
    #[error("schema name cannot be empty")]
    EmptySchemaName,
    /// Field name is not a snake_case identifier.
    #[error("invalid field name: {0:?}")]
    InvalidFieldName(String),
    /// Two fields share a name.
    #[error("duplicate field: {0}")]
    DuplicateField(String),
    /// Field uses the reserved `help` name.
    #[error("field '{0}' collides with the reserved --help option")]
    ReservedField(String),
    /// Field declares `--help` or `-h`.
    #[error("flag '{flag}' on field '{field}' is reserved for help")]
    ReservedFlag { field: String, flag: String },
    /// Short flag is not a dash followed by one character.
    #[error("invalid short flag format: {0}")]
    InvalidShortFlag(String),
    /// Long flag does not start with `--` or contains spaces.
    #[error("invalid long flag format: {0}")]
    InvalidLongFlag(String),
    /// Two fields answer to the same flag.
    #[error("duplicate flag in schema: {0}")]
    DuplicateFlag(String),
    /// Pattern does not compile.
    #[error("invalid pattern on field '{field}': {message}")]
    InvalidPattern { field: String, message: String },
    /// Constraint declared on a type it cannot apply to.
    #[error("constraint '{constraint}' does not apply to {kind} field '{field}'")]
    IncompatibleConstraint {
        field: String,
        constraint: &'static str,
        kind: &'static str,
    },
    /// Choice restriction or enum without members.
    #[error("field '{0}' declares an empty set of choices")]
    EmptyChoices(String),
    /// Default value does not match the field's type.
    #[error("default for field '{field}' must be {expected}")]
    InvalidDefault {
        field: String,
        expected: &'static str,
    },
}

/// Validates a schema, returning the first problem found.
///
/// Like the rest of the validators the result is a list so callers can
/// treat "no errors" uniformly; validation stops at the first error.
pub fn validate_schema(schema: &ArgsSchema) -> Vec<SchemaError> {
    let mut errors = Vec::new();

    if schema.name.trim().is_empty() {
        errors.push(SchemaError::EmptySchemaName);
        return errors;
    }

    let mut names = HashSet::new();
    for field in &schema.fields {
        if let Some(err) = check_field(field) {
            errors.push(err);
            return errors;
        }
        if !names.insert(field.name.as_str()) {
            errors.push(SchemaError::DuplicateField(field.name.clone()));
            return errors;
        }
    }

    errors.extend(validate_flags(&schema.fields));
    errors
}

fn check_field(field: &FieldSpec) -> Option<SchemaError> {
    let name = field.name.as_str();
    if name == RESERVED_FIELD {
        return Some(SchemaError::ReservedField(field.name.clone()));
    }
    let valid_ident = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid_ident {
        return Some(SchemaError::InvalidFieldName(field.name.clone()));
    }

    if let FieldKind::Enum(values) = &field.kind {
        if values.is_empty() {
            return Some(SchemaError::EmptyChoices(field.name.clone()));
        }
    }
    if let Some(choices) = &field.choices {
        if field.kind == FieldKind::Bool {
            return Some(incompatible(field, "choices"));
        }
        if choices.is_empty() {
            return Some(SchemaError::EmptyChoices(field.name.clone()));
        }
    }
    if !field.bounds.is_empty() && !field.kind.is_numeric() {
        return Some(incompatible(field, "bounds"));
    }
    if let Some(pattern) = &field.pattern {
        if !field.kind.is_text() {
            return Some(incompatible(field, "pattern"));
        }
        if let Err(err) = regex::Regex::new(pattern) {
            return Some(SchemaError::InvalidPattern {
                field: field.name.clone(),
                message: err.to_string(),
            });
        }
    }
    let has_length = field.min_length.is_some() || field.max_length.is_some();
    if has_length && !(field.kind.is_text() || field.kind.is_list()) {
        return Some(incompatible(field, "length"));
    }

    field
        .default
        .as_ref()
        .and_then(|default| check_default(field, default))
}

fn incompatible(field: &FieldSpec, constraint: &'static str) -> SchemaError {
    SchemaError::IncompatibleConstraint {
        field: field.name.clone(),
        constraint,
        kind: field.kind.name(),
    }
}

fn check_default(field: &FieldSpec, default: &Value) -> Option<SchemaError> {
    let scalar_ok = |scalar: ScalarKind, value: &Value| match scalar {
        ScalarKind::Str => value.is_string(),
        ScalarKind::Int => value.is_i64() || value.is_u64(),
        ScalarKind::Float => value.is_number(),
    };
    let (ok, expected) = match &field.kind {
        FieldKind::Bool => (default.is_boolean(), "a boolean"),
        FieldKind::List(scalar) => (
            default
                .as_array()
                .is_some_and(|items| items.iter().all(|item| scalar_ok(*scalar, item))),
            "an array",
        ),
        kind => {
            // Non-list kinds always have a scalar.
            let scalar = kind.scalar().unwrap_or(ScalarKind::Str);
            (scalar_ok(scalar, default), scalar.describe())
        }
    };
    (!ok).then(|| SchemaError::InvalidDefault {
        field: field.name.clone(),
        expected,
    })
}

fn validate_flags(fields: &[FieldSpec]) -> Vec<SchemaError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for field in fields {
        if let Some(short) = &field.flag.short {
            let mut chars = short.chars();
            let well_formed = chars.next() == Some('-')
                && chars.next().is_some_and(|c| c != '-' && !c.is_whitespace())
                && chars.next().is_none();
            if !well_formed {
                errors.push(SchemaError::InvalidShortFlag(short.clone()));
                return errors;
            }
        }

        let long = field.long_flag();
        let body = long.strip_prefix("--").unwrap_or_default();
        if body.is_empty() || body.starts_with('-') || body.contains(char::is_whitespace) {
            errors.push(SchemaError::InvalidLongFlag(long));
            return errors;
        }

        for form in field.flag_forms() {
            if RESERVED_FLAGS.contains(&form.as_str()) {
                errors.push(SchemaError::ReservedFlag {
                    field: field.name.clone(),
                    flag: form,
                });
                return errors;
            }
            if !seen.insert(form.clone()) {
                errors.push(SchemaError::DuplicateFlag(form));
                return errors;
            }
        }
    }

    errors
}
