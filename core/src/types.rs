//! Argument schema type definitions.
//!
//! An [`ArgsSchema`] is the declarative description of one command's
//! parameters. Each [`FieldSpec`] carries its semantic type, default,
//! flag forms and constraints. The types serialize with [`serde`] so schemas
//! can be stored or shipped alongside the binary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::naming;

/// Element type of a sequence field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    /// UTF-8 text.
    Str,
    /// Signed 64-bit integer.
    Int,
    /// 64-bit float.
    Float,
}

impl ScalarKind {
    /// Human-readable name used in error messages and help.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Str => "a string",
            Self::Int => "an integer",
            Self::Float => "a number",
        }
    }

    /// Placeholder shown after a flag in help output.
    pub fn value_name(self) -> &'static str {
        match self {
            Self::Str => "TEXT",
            Self::Int => "INT",
            Self::Float => "FLOAT",
        }
    }
}

/// Semantic type of a field.
///
/// # Examples
///
/// ```
/// use autocli_core::{FieldKind, ScalarKind};
///
/// assert_eq!(FieldKind::Int.scalar(), Some(ScalarKind::Int));
/// assert_eq!(FieldKind::List(ScalarKind::Float).scalar(), Some(ScalarKind::Float));
/// assert_eq!(FieldKind::Bool.scalar(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text.
    Str,
    /// Integer.
    Int,
    /// Floating point number.
    Float,
    /// Zero-argument toggle.
    Bool,
    /// Text restricted to the listed values.
    Enum(Vec<String>),
    /// One or more scalars.
    List(ScalarKind),
}

impl FieldKind {
    /// Returns the scalar each value is coerced to, `None` for booleans.
    pub fn scalar(&self) -> Option<ScalarKind> {
        match self {
            Self::Str | Self::Enum(_) => Some(ScalarKind::Str),
            Self::Int => Some(ScalarKind::Int),
            Self::Float => Some(ScalarKind::Float),
            Self::List(scalar) => Some(*scalar),
            Self::Bool => None,
        }
    }

    /// Whether the field collects more than one value.
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Whether numeric bounds apply to the field's values.
    pub fn is_numeric(&self) -> bool {
        matches!(self.scalar(), Some(ScalarKind::Int | ScalarKind::Float))
    }

    /// Whether a regex pattern applies to the field's values.
    pub fn is_text(&self) -> bool {
        matches!(self.scalar(), Some(ScalarKind::Str))
    }

    /// Short name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Enum(_) => "enum",
            Self::List(_) => "list",
        }
    }
}

/// Command-line forms of a field.
///
/// Both forms are stored with their dashes (`--name`, `-n`). A missing long
/// form is derived from the field name; the short form is never inferred.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagSpec {
    /// Long form override (e.g. "--file")
    pub long: Option<String>,
    /// Short form (e.g. "-f")
    pub short: Option<String>,
}

/// Numeric bounds of a field. Bounds on a list apply to every element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Inclusive lower bound.
    pub ge: Option<f64>,
    /// Exclusive lower bound.
    pub gt: Option<f64>,
    /// Inclusive upper bound.
    pub le: Option<f64>,
    /// Exclusive upper bound.
    pub lt: Option<f64>,
}

impl Bounds {
    /// Whether no bound is set.
    pub fn is_empty(&self) -> bool {
        self.ge.is_none() && self.gt.is_none() && self.le.is_none() && self.lt.is_none()
    }

    /// Renders the bounds as `ge=1, le=100` for help output.
    pub fn summary(&self) -> String {
        [
            ("ge", self.ge),
            ("gt", self.gt),
            ("le", self.le),
            ("lt", self.lt),
        ]
        .iter()
        .filter_map(|(name, bound)| bound.map(|b| format!("{name}={b}")))
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// Declaration of one schema field.
///
/// Use the typed constructors ([`string`](FieldSpec::string),
/// [`int`](FieldSpec::int), [`boolean`](FieldSpec::boolean), ...) and chain
/// the builder methods to attach metadata.
///
/// # Examples
///
/// ```
/// use autocli_core::FieldSpec;
///
/// let count = FieldSpec::int("count").default(1).short("-c").ge(1.0).le(100.0);
/// assert_eq!(count.long_flag(), "--count");
/// assert!(!count.is_required());
///
/// let file = FieldSpec::string("filename").long("--file");
/// assert_eq!(file.long_flag(), "--file");
/// assert!(file.is_required());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name as seen by the record type (snake_case)
    pub name: String,
    /// Semantic type
    pub kind: FieldKind,
    /// Default value; `None` makes the field required (booleans default to false)
    pub default: Option<Value>,
    /// Flag forms
    pub flag: FlagSpec,
    /// Allowed raw values
    pub choices: Option<Vec<String>>,
    /// Numeric bounds
    pub bounds: Bounds,
    /// Regex every text value must match
    pub pattern: Option<String>,
    /// Minimum length (characters for text, items for lists)
    pub min_length: Option<usize>,
    /// Maximum length (characters for text, items for lists)
    pub max_length: Option<usize>,
    /// Help text
    pub description: Option<String>,
}

impl FieldSpec {
    /// Creates a field of the given kind with no metadata.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            flag: FlagSpec::default(),
            choices: None,
            bounds: Bounds::default(),
            pattern: None,
            min_length: None,
            max_length: None,
            description: None,
        }
    }

    /// Creates a text field.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Str)
    }

    /// Creates an integer field.
    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Int)
    }

    /// Creates a float field.
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Float)
    }

    /// Creates a boolean toggle.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    /// Creates an enum field restricted to `values`.
    ///
    /// # Examples
    ///
    /// ```
    /// use autocli_core::FieldSpec;
    ///
    /// let mode = FieldSpec::choice("mode", ["read", "write"]);
    /// assert_eq!(mode.allowed_values().unwrap(), ["read", "write"]);
    /// ```
    pub fn choice<I, T>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::new(
            name,
            FieldKind::Enum(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Creates a sequence field.
    pub fn list(name: impl Into<String>, element: ScalarKind) -> Self {
        Self::new(name, FieldKind::List(element))
    }

    /// Sets the default value.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Overrides the long flag (`--name`).
    pub fn long(mut self, flag: impl Into<String>) -> Self {
        self.flag.long = Some(flag.into());
        self
    }

    /// Sets the short flag (`-n`).
    pub fn short(mut self, flag: impl Into<String>) -> Self {
        self.flag.short = Some(flag.into());
        self
    }

    /// Restricts raw values to `values`.
    pub fn choices<I, T>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.choices = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Inclusive lower bound.
    pub fn ge(mut self, bound: f64) -> Self {
        self.bounds.ge = Some(bound);
        self
    }

    /// Exclusive lower bound.
    pub fn gt(mut self, bound: f64) -> Self {
        self.bounds.gt = Some(bound);
        self
    }

    /// Inclusive upper bound.
    pub fn le(mut self, bound: f64) -> Self {
        self.bounds.le = Some(bound);
        self
    }

    /// Exclusive upper bound.
    pub fn lt(mut self, bound: f64) -> Self {
        self.bounds.lt = Some(bound);
        self
    }

    /// Requires text values to match `pattern`.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Minimum length.
    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    /// Maximum length.
    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    /// Adds help text.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// A field is required when it has no default and is not a toggle.
    pub fn is_required(&self) -> bool {
        self.default.is_none() && self.kind != FieldKind::Bool
    }

    /// Long flag, explicit or derived from the field name.
    pub fn long_flag(&self) -> String {
        self.flag
            .long
            .clone()
            .unwrap_or_else(|| naming::flag_for_field(&self.name))
    }

    /// Short flag, if declared.
    pub fn short_flag(&self) -> Option<&str> {
        self.flag.short.as_deref()
    }

    /// Negated long form, present only for booleans defaulting to `true`.
    ///
    /// # Examples
    ///
    /// ```
    /// use autocli_core::FieldSpec;
    ///
    /// let color = FieldSpec::boolean("color").default(true);
    /// assert_eq!(color.negated_flag().as_deref(), Some("--no-color"));
    /// assert_eq!(FieldSpec::boolean("verbose").negated_flag(), None);
    /// ```
    pub fn negated_flag(&self) -> Option<String> {
        (self.kind == FieldKind::Bool && self.default == Some(Value::Bool(true)))
            .then(|| naming::negated_flag(&self.long_flag()))
    }

    /// Every flag form this field answers to.
    pub fn flag_forms(&self) -> Vec<String> {
        let mut forms = vec![self.long_flag()];
        forms.extend(self.flag.short.clone());
        forms.extend(self.negated_flag());
        forms
    }

    /// Values a raw token may take: enum members or explicit choices.
    pub fn allowed_values(&self) -> Option<&[String]> {
        match &self.kind {
            FieldKind::Enum(values) => Some(values),
            _ => self.choices.as_deref(),
        }
    }
}

/// Declaration of a command's parameters.
///
/// # Examples
///
/// ```
/// use autocli_core::{ArgsSchema, FieldSpec};
///
/// let common = ArgsSchema::new("CommonArgs")
///     .with_field(FieldSpec::boolean("verbose"));
/// let greet = ArgsSchema::new("GreetArgs")
///     .extends(&common)
///     .with_field(FieldSpec::string("name").default("World").short("-n"));
///
/// assert_eq!(greet.base.as_deref(), Some("CommonArgs"));
/// assert_eq!(greet.field_names(), vec!["verbose", "name"]);
/// assert!(greet.find_flag("-n").is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArgsSchema {
    /// Schema name (e.g. "GreetArgs")
    pub name: String,
    /// Short description
    pub description: Option<String>,
    /// Name of the schema this one extends
    pub base: Option<String>,
    /// Fields in declaration order, inherited fields first
    pub fields: Vec<FieldSpec>,
    /// Whether positional and `--` remainder tokens are captured
    pub extra_args: bool,
}

impl ArgsSchema {
    /// Creates an empty schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Adds a field, replacing a same-named one in place.
    pub fn with_field(mut self, field: FieldSpec) -> Self {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    /// Adds a description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Opts into positional and remainder capture.
    pub fn with_extra_args(mut self) -> Self {
        self.extra_args = true;
        self
    }

    /// Inherits the fields of `base`.
    ///
    /// Base fields come first; fields already declared on `self` override
    /// same-named base fields. Extra-argument capture is inherited.
    pub fn extends(mut self, base: &ArgsSchema) -> Self {
        let own = std::mem::take(&mut self.fields);
        self.fields = base.fields.clone();
        for field in own {
            self = self.with_field(field);
        }
        self.base = Some(base.name.clone());
        self.extra_args |= base.extra_args;
        self
    }

    /// Finds a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Finds the field answering to a flag form.
    pub fn find_flag(&self, flag: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|f| f.flag_forms().iter().any(|form| form == flag))
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}
