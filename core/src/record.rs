//! Record instantiation: coercion and constraint validation.
//!
//! A [`Validator`] is compiled once per schema (patterns included) and turns
//! the raw strings collected by a parser into a validated, immutable
//! [`ParsedArgs`]. Typed access goes through [`serde::Deserialize`].
//!
//! # Examples
//!
//! ```
//! use autocli_core::*;
//!
//! let schema = ArgsSchema::new("CountArgs")
//!     .with_field(FieldSpec::int("count").ge(1.0).le(100.0));
//! let validator = Validator::compile(&schema).unwrap();
//!
//! let mut raw = RawArgs::new();
//! raw.insert("count".into(), RawValue::Single("7".into()));
//! let parsed = validator.instantiate(&raw, None).unwrap();
//! assert_eq!(parsed.int("count"), Some(7));
//!
//! raw.insert("count".into(), RawValue::Single("0".into()));
//! let err = validator.instantiate(&raw, None).unwrap_err();
//! assert!(err.to_string().contains("ge=1"));
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{ArgsSchema, FieldKind, FieldSpec, ScalarKind, SchemaError, validate_schema};

/// A record type that can be instantiated from parsed arguments.
///
/// Implementors describe their fields once in [`schema`](Args::schema); the
/// dispatcher parses and validates input against it and deserializes the
/// result into `Self`.
///
/// # Examples
///
/// ```
/// use autocli_core::{Args, ArgsSchema, FieldSpec};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct GreetArgs {
///     name: String,
/// }
///
/// impl Args for GreetArgs {
///     fn schema() -> ArgsSchema {
///         ArgsSchema::new("GreetArgs").with_field(FieldSpec::string("name").default("World"))
///     }
/// }
///
/// assert_eq!(GreetArgs::schema().field_names(), vec!["name"]);
/// ```
pub trait Args: DeserializeOwned + Send + 'static {
    /// Field declarations of this record.
    fn schema() -> ArgsSchema;
}

/// Raw input collected for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    /// Toggle flag; `false` when the negated form was given.
    Switch(bool),
    /// One value.
    Single(String),
    /// Several values, in input order.
    Multiple(Vec<String>),
}

/// Raw input keyed by field name. Absent fields are not present.
pub type RawArgs = BTreeMap<String, RawValue>;

/// A numeric bound that was violated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Ge(f64),
    Gt(f64),
    Le(f64),
    Lt(f64),
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ge(b) => write!(f, "ge={b}"),
            Self::Gt(b) => write!(f, "gt={b}"),
            Self::Le(b) => write!(f, "le={b}"),
            Self::Lt(b) => write!(f, "lt={b}"),
        }
    }
}

/// A length bound that was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthBound {
    Min(usize),
    Max(usize),
}

impl fmt::Display for LengthBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Min(n) => write!(f, "min_length={n}"),
            Self::Max(n) => write!(f, "max_length={n}"),
        }
    }
}

/// Field-level coercion and validation failures.
///
/// Every variant names the offending field and the violated constraint.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    /// A required field was not supplied.
    #[error("missing required argument '{flag}' for field '{field}'")]
    Missing { field: String, flag: String },
    /// Text could not be coerced to the field's type.
    #[error("invalid value '{value}' for field '{field}': expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: &'static str,
    },
    /// Value outside the declared choices.
    #[error("invalid value '{value}' for field '{field}' (choose from {})", .choices.join(", "))]
    InvalidChoice {
        field: String,
        value: String,
        choices: Vec<String>,
    },
    /// Numeric bound violated.
    #[error("field '{field}' must satisfy {bound}, got {value}")]
    OutOfRange {
        field: String,
        bound: Bound,
        value: String,
    },
    /// Pattern did not match.
    #[error("field '{field}' does not match pattern '{pattern}': {value:?}")]
    PatternMismatch {
        field: String,
        pattern: String,
        value: String,
    },
    /// Length bound violated.
    #[error("field '{field}' must satisfy {bound}, got length {actual}")]
    Length {
        field: String,
        bound: LengthBound,
        actual: usize,
    },
}

/// Positional and remainder tokens captured for extra-args schemas.
///
/// # Examples
///
/// ```
/// use autocli_core::ExtraArgs;
///
/// let extra = ExtraArgs::new(
///     vec!["file1.py".into()],
///     vec!["python".into(), "-m".into(), "pytest".into()],
/// );
/// assert_eq!(extra.positional(), ["file1.py"]);
/// assert_eq!(extra.remainder(), "python -m pytest");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraArgs {
    positional: Vec<String>,
    remainder: Vec<String>,
}

impl ExtraArgs {
    /// Creates the capture from positional tokens and tokens after `--`.
    pub fn new(positional: Vec<String>, remainder: Vec<String>) -> Self {
        Self {
            positional,
            remainder,
        }
    }

    /// Tokens before `--` that were neither flags nor flag values.
    pub fn positional(&self) -> &[String] {
        &self.positional
    }

    /// Tokens after `--`, uninterpreted.
    pub fn remainder_list(&self) -> &[String] {
        &self.remainder
    }

    /// Tokens after `--` joined with single spaces.
    pub fn remainder(&self) -> String {
        self.remainder.join(" ")
    }
}

/// A validated instance of an [`ArgsSchema`].
///
/// Values are kept in schema field order and cannot be modified once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedArgs {
    schema: String,
    values: Vec<(String, Value)>,
    extra: Option<ExtraArgs>,
}

impl ParsedArgs {
    /// Name of the schema this instance was validated against.
    pub fn schema_name(&self) -> &str {
        &self.schema
    }

    /// Raw JSON value of a field.
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Field values in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the schema declares no fields.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Deserializes one field, `None` if absent or of another type.
    pub fn get<T: DeserializeOwned>(&self, field: &str) -> Option<T> {
        self.value(field)
            .and_then(|value| T::deserialize(value).ok())
    }

    /// Text field value.
    pub fn str(&self, field: &str) -> Option<&str> {
        self.value(field).and_then(Value::as_str)
    }

    /// Integer field value.
    pub fn int(&self, field: &str) -> Option<i64> {
        self.value(field).and_then(Value::as_i64)
    }

    /// Float field value.
    pub fn float(&self, field: &str) -> Option<f64> {
        self.value(field).and_then(Value::as_f64)
    }

    /// Boolean field value; absent fields read as `false`.
    pub fn flag(&self, field: &str) -> bool {
        self.value(field).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Extra-argument capture, present only for extra-args schemas.
    pub fn extra(&self) -> Option<&ExtraArgs> {
        self.extra.as_ref()
    }

    /// All fields as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.values.iter().cloned().collect::<Map<_, _>>())
    }

    /// Instantiates a typed record from the validated values.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_json())
    }
}

/// Compiled validator for one schema.
#[derive(Debug, Clone)]
pub struct Validator {
    schema: ArgsSchema,
    patterns: Vec<Option<Regex>>,
}

impl Validator {
    /// Validates the schema definition and compiles its patterns.
    pub fn compile(schema: &ArgsSchema) -> Result<Self, SchemaError> {
        if let Some(err) = validate_schema(schema).into_iter().next() {
            return Err(err);
        }
        let patterns = schema
            .fields
            .iter()
            .map(|field| {
                field
                    .pattern
                    .as_deref()
                    .map(Regex::new)
                    .transpose()
                    .map_err(|err| SchemaError::InvalidPattern {
                        field: field.name.clone(),
                        message: err.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut schema = schema.clone();
        for field in &mut schema.fields {
            if let (Some(default), Some(ScalarKind::Float)) = (&mut field.default, field.kind.scalar()) {
                normalize_float(default);
            }
        }
        Ok(Self { schema, patterns })
    }

    /// The schema this validator checks against.
    pub fn schema(&self) -> &ArgsSchema {
        &self.schema
    }

    /// Coerces and validates raw input into a [`ParsedArgs`].
    ///
    /// Absent fields take their default; defaults are trusted and not
    /// re-validated. Extra-argument capture is attached only when the schema
    /// opted into it.
    pub fn instantiate(
        &self,
        raw: &RawArgs,
        extra: Option<ExtraArgs>,
    ) -> Result<ParsedArgs, FieldError> {
        let values = self
            .schema
            .fields
            .iter()
            .zip(&self.patterns)
            .map(|(field, pattern)| {
                let value = match raw.get(&field.name) {
                    Some(raw_value) => self.coerce(field, pattern.as_ref(), raw_value)?,
                    None => absent_value(field)?,
                };
                Ok::<_, FieldError>((field.name.clone(), value))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ParsedArgs {
            schema: self.schema.name.clone(),
            values,
            extra: if self.schema.extra_args {
                Some(extra.unwrap_or_default())
            } else {
                None
            },
        })
    }

    fn coerce(
        &self,
        field: &FieldSpec,
        pattern: Option<&Regex>,
        raw: &RawValue,
    ) -> Result<Value, FieldError> {
        let scalar = match field.kind.scalar() {
            Some(scalar) => scalar,
            None => return coerce_bool(field, raw),
        };

        if field.kind.is_list() {
            let items: Vec<&str> = match raw {
                RawValue::Single(text) => vec![text.as_str()],
                RawValue::Multiple(texts) => texts.iter().map(String::as_str).collect(),
                RawValue::Switch(on) => return Err(invalid(field, &on.to_string(), "a list")),
            };
            let values = items
                .into_iter()
                .map(|text| coerce_scalar(field, scalar, pattern, text))
                .collect::<Result<Vec<_>, _>>()?;
            check_length(field, values.len())?;
            return Ok(Value::Array(values));
        }

        let text = match raw {
            RawValue::Single(text) => text.as_str(),
            // Repeated scalar flags keep the last value.
            RawValue::Multiple(texts) => match texts.last() {
                Some(text) => text.as_str(),
                None => return absent_value(field),
            },
            RawValue::Switch(on) => {
                return Err(invalid(field, &on.to_string(), scalar.describe()));
            }
        };
        coerce_scalar(field, scalar, pattern, text)
    }
}

/// Stores integral defaults of float fields as floats, matching parsed input.
fn normalize_float(value: &mut Value) {
    match value {
        Value::Array(items) => items.iter_mut().for_each(normalize_float),
        Value::Number(n) => {
            if let Some(float) = n.as_f64() {
                *value = Value::from(float);
            }
        }
        _ => {}
    }
}

fn absent_value(field: &FieldSpec) -> Result<Value, FieldError> {
    match (&field.default, &field.kind) {
        (Some(default), _) => Ok(default.clone()),
        (None, FieldKind::Bool) => Ok(Value::Bool(false)),
        (None, _) => Err(FieldError::Missing {
            field: field.name.clone(),
            flag: field.long_flag(),
        }),
    }
}

fn invalid(field: &FieldSpec, value: &str, expected: &'static str) -> FieldError {
    FieldError::InvalidValue {
        field: field.name.clone(),
        value: value.to_string(),
        expected,
    }
}

fn coerce_bool(field: &FieldSpec, raw: &RawValue) -> Result<Value, FieldError> {
    let text = match raw {
        RawValue::Switch(on) => return Ok(Value::Bool(*on)),
        RawValue::Single(text) => text.as_str(),
        RawValue::Multiple(texts) => texts.last().map(String::as_str).unwrap_or_default(),
    };
    match text.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
        "false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
        _ => Err(invalid(field, text, "a boolean")),
    }
}

fn coerce_scalar(
    field: &FieldSpec,
    scalar: ScalarKind,
    pattern: Option<&Regex>,
    text: &str,
) -> Result<Value, FieldError> {
    if let Some(allowed) = field.allowed_values() {
        if !allowed.iter().any(|choice| choice == text) {
            return Err(FieldError::InvalidChoice {
                field: field.name.clone(),
                value: text.to_string(),
                choices: allowed.to_vec(),
            });
        }
    }

    match scalar {
        ScalarKind::Str => {
            if let Some(regex) = pattern {
                if !regex.is_match(text) {
                    return Err(FieldError::PatternMismatch {
                        field: field.name.clone(),
                        pattern: regex.as_str().to_string(),
                        value: text.to_string(),
                    });
                }
            }
            check_length(field, text.chars().count())?;
            Ok(Value::String(text.to_string()))
        }
        ScalarKind::Int => {
            let n: i64 = text
                .trim()
                .parse()
                .map_err(|_| invalid(field, text, scalar.describe()))?;
            check_bounds(field, text, |bound| compare_int(n, bound))?;
            Ok(Value::from(n))
        }
        ScalarKind::Float => {
            let n: f64 = text
                .trim()
                .parse()
                .map_err(|_| invalid(field, text, scalar.describe()))?;
            if !n.is_finite() {
                return Err(invalid(field, text, "a finite number"));
            }
            check_bounds(field, text, |bound| n.partial_cmp(&bound))?;
            Ok(Value::from(n))
        }
    }
}

/// Orders `n` against `bound`, exactly when the bound is a whole number in
/// `i64` range.
fn compare_int(n: i64, bound: f64) -> Option<Ordering> {
    if bound.fract() == 0.0 && bound >= i64::MIN as f64 && bound < i64::MAX as f64 {
        Some(n.cmp(&(bound as i64)))
    } else {
        (n as f64).partial_cmp(&bound)
    }
}

/// `compare` orders the value against a bound.
fn check_bounds(
    field: &FieldSpec,
    text: &str,
    compare: impl Fn(f64) -> Option<Ordering>,
) -> Result<(), FieldError> {
    use Ordering::{Equal, Greater, Less};

    let bounds = &field.bounds;
    let violated = [
        bounds.ge.filter(|b| compare(*b) == Some(Less)).map(Bound::Ge),
        bounds.gt.filter(|b| matches!(compare(*b), Some(Less | Equal))).map(Bound::Gt),
        bounds.le.filter(|b| compare(*b) == Some(Greater)).map(Bound::Le),
        bounds.lt.filter(|b| matches!(compare(*b), Some(Greater | Equal))).map(Bound::Lt),
    ]
    .into_iter()
    .flatten()
    .next();

    match violated {
        Some(bound) => Err(FieldError::OutOfRange {
            field: field.name.clone(),
            bound,
            value: text.trim().to_string(),
        }),
        None => Ok(()),
    }
}

fn check_length(field: &FieldSpec, actual: usize) -> Result<(), FieldError> {
    let violated = field
        .min_length
        .filter(|min| actual < *min)
        .map(LengthBound::Min)
        .or_else(|| field.max_length.filter(|max| actual > *max).map(LengthBound::Max));

    match violated {
        Some(bound) => Err(FieldError::Length {
            field: field.name.clone(),
            bound,
            actual,
        }),
        None => Ok(()),
    }
}

/// Renders a value back into the text a user would type for it.
///
/// Returns `None` for values with no single-token form (arrays, objects, null).
pub fn raw_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
