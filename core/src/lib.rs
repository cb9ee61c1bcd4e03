//! Argument schema types and the record layer behind autocli.
//!
//! This crate defines how a command's parameters are declared and how raw
//! command-line text becomes a validated record:
//!
//! - [`ArgsSchema`]: a named set of fields, optionally extending a base
//!   schema and opting into positional/remainder capture.
//! - [`FieldSpec`]: a single field with its semantic type, default, flag forms, choices,
//!   numeric bounds, pattern, length bounds and help text.
//! - [`Validator`]: a compiled schema that coerces raw strings into a
//!   [`ParsedArgs`] or reports a [`FieldError`] naming field and constraint.
//! - [`Args`]: implemented by record types that can be deserialized from a
//!   [`ParsedArgs`].
//!
//! Definition-time checks ([`validate_schema`]) catch reserved names,
//! malformed or duplicate flags and constraints that do not fit a field.
//!
//! # Example
//!
//! ```
//! use autocli_core::*;
//!
//! let common = ArgsSchema::new("CommonArgs")
//!     .with_field(FieldSpec::boolean("verbose").with_description("Enable verbose output"));
//! let schema = ArgsSchema::new("GreetArgs")
//!     .extends(&common)
//!     .with_field(FieldSpec::string("name").default("World").short("-n"))
//!     .with_field(FieldSpec::int("count").default(1).short("-c").ge(1.0));
//!
//! assert!(validate_schema(&schema).is_empty());
//! assert_eq!(schema.find_flag("-c").unwrap().name, "count");
//!
//! let mut raw = RawArgs::new();
//! raw.insert("name".into(), RawValue::Single("Ada".into()));
//! let parsed = Validator::compile(&schema).unwrap().instantiate(&raw, None).unwrap();
//! assert_eq!(parsed.str("name"), Some("Ada"));
//! assert_eq!(parsed.int("count"), Some(1));
//! ```

pub mod naming;
mod record;
mod types;
mod validate;

pub use record::{
    Args, Bound, ExtraArgs, FieldError, LengthBound, ParsedArgs, RawArgs, RawValue, Validator,
    raw_text,
};
pub use types::*;
pub use validate::{RESERVED_FIELD, RESERVED_FLAGS, SchemaError, validate_schema};
