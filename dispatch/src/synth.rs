//! Parser synthesis: projects an [`ArgsSchema`] onto a `clap::Command`.
//!
//! Each field becomes one flag (plus a `--no-<long>` form for toggles that
//! default to `true`). clap handles tokenization, required flags, choices and
//! help rendering; coercion and constraint checks are delegated to the
//! record layer's [`Validator`].

use autocli_core::{
    ArgsSchema, ExtraArgs, FieldKind, FieldSpec, ParsedArgs, RawArgs, RawValue, SchemaError,
    Validator, raw_text,
};
use clap::builder::PossibleValuesParser;
use clap::{Arg, ArgAction, Command, value_parser};
use serde_json::Value;
use tracing::{debug, warn};

use crate::UsageError;

/// Separator after which tokens are passed through uninterpreted.
pub const REMAINDER_SEPARATOR: &str = "--";

const POSITIONAL_ID: &str = "positional-args";

/// A synthesized parser for one resolved command.
///
/// # Examples
///
/// ```
/// use autocli_core::{ArgsSchema, FieldSpec};
/// use autocli_dispatch::CommandParser;
///
/// let schema = ArgsSchema::new("GreetArgs")
///     .with_field(FieldSpec::string("name").default("World").short("-n"))
///     .with_field(FieldSpec::int("count").default(1).ge(1.0));
/// let parser = CommandParser::new("demo greet", &schema, false).unwrap();
///
/// let args: Vec<String> = ["-n", "Ada", "--count", "3"].map(String::from).to_vec();
/// let parsed = parser.parse(&args).unwrap();
/// assert_eq!(parsed.str("name"), Some("Ada"));
/// assert_eq!(parsed.int("count"), Some(3));
///
/// let err = parser.parse(&["--count".to_string(), "0".to_string()]).unwrap_err();
/// assert!(err.render().contains("ge=1"));
/// ```
#[derive(Debug, Clone)]
pub struct CommandParser {
    command: Command,
    validator: Validator,
    discard_positional: bool,
}

impl CommandParser {
    /// Builds the parser for `schema`.
    ///
    /// `bin_name` is the usage prefix (`prog` or `prog greet`). With
    /// `discard_positional` set, stray positional tokens are accepted but
    /// never reach the handler.
    ///
    /// # Errors
    ///
    /// Returns the first definition error found in the schema.
    pub fn new(
        bin_name: &str,
        schema: &ArgsSchema,
        discard_positional: bool,
    ) -> Result<Self, SchemaError> {
        let validator = Validator::compile(schema)?;

        let mut command = Command::new(schema.name.clone())
            .bin_name(bin_name.to_string())
            .no_binary_name(true)
            .disable_version_flag(true);
        if let Some(description) = &schema.description {
            command = command.about(description.clone());
        }
        for field in &schema.fields {
            command = command.args(field_args(field));
        }

        let capture = schema.extra_args && !discard_positional;
        command = command.arg(
            Arg::new(POSITIONAL_ID)
                .value_name("ARGS")
                .help("Positional arguments")
                .num_args(1..)
                .action(ArgAction::Append)
                .value_parser(value_parser!(String))
                .hide(!capture),
        );
        if schema.extra_args {
            command = command.after_help("Tokens after `--` are passed to the command unchanged.");
        }

        Ok(Self {
            command,
            validator,
            discard_positional,
        })
    }

    /// Replaces the text shown below the option list.
    pub fn with_after_help(mut self, text: impl Into<String>) -> Self {
        self.command = self.command.after_help(text.into());
        self
    }

    pub fn with_about(mut self, text: impl Into<String>) -> Self {
        self.command = self.command.about(text.into());
        self
    }

    pub fn schema(&self) -> &ArgsSchema {
        self.validator.schema()
    }

    /// Parses the tokens following the subcommand (program name excluded).
    ///
    /// Everything after the first `--` becomes the remainder.
    ///
    /// # Errors
    ///
    /// [`UsageError::Parse`] for anything clap rejects (unknown flag, missing
    /// required flag, bad choice), [`UsageError::Field`] for coercion and
    /// constraint failures.
    pub fn parse(&self, args: &[String]) -> Result<ParsedArgs, UsageError> {
        let (head, remainder) = split_remainder(args);
        let matches = self.command.clone().try_get_matches_from(head)?;

        let mut raw = RawArgs::new();
        for field in &self.schema().fields {
            if let Some(value) = raw_value(&matches, field) {
                raw.insert(field.name.clone(), value);
            }
        }

        let positional: Vec<String> = if self.discard_positional {
            Vec::new()
        } else {
            matches
                .get_many::<String>(POSITIONAL_ID)
                .map(|values| values.cloned().collect())
                .unwrap_or_default()
        };
        if !self.schema().extra_args && (!positional.is_empty() || !remainder.is_empty()) {
            warn!(
                schema = %self.schema().name,
                positional = ?positional,
                remainder = ?remainder,
                "Ignoring extra tokens"
            );
        }

        let parsed = self
            .validator
            .instantiate(&raw, Some(ExtraArgs::new(positional, remainder.to_vec())))?;
        debug!(schema = %parsed.schema_name(), fields = parsed.len(), "Parsed arguments");
        Ok(parsed)
    }

    /// Serializes a parsed instance back into tokens that re-parse to it.
    ///
    /// Positional tokens come first, then every flag, then `--` and the
    /// remainder.
    pub fn to_tokens(&self, args: &ParsedArgs) -> Vec<String> {
        let mut tokens = Vec::new();
        if let Some(extra) = args.extra() {
            if !self.discard_positional {
                tokens.extend(extra.positional().iter().cloned());
            }
        }

        for field in &self.schema().fields {
            let Some(value) = args.value(&field.name) else {
                continue;
            };
            match (&field.kind, value) {
                (FieldKind::Bool, Value::Bool(true)) => tokens.push(field.long_flag()),
                (FieldKind::Bool, Value::Bool(false)) => tokens.extend(field.negated_flag()),
                // Attached `=` values keep `-x` and `--` from reading as flags.
                (_, Value::Array(items)) => {
                    let long = field.long_flag();
                    tokens.extend(
                        items
                            .iter()
                            .filter_map(raw_text)
                            .map(|text| format!("{long}={text}")),
                    );
                }
                (_, other) => {
                    if let Some(text) = raw_text(other) {
                        tokens.push(format!("{}={text}", field.long_flag()));
                    }
                }
            }
        }

        if let Some(extra) = args.extra() {
            if !extra.remainder_list().is_empty() {
                tokens.push(REMAINDER_SEPARATOR.to_string());
                tokens.extend(extra.remainder_list().iter().cloned());
            }
        }
        tokens
    }

    /// Renders this command's help screen.
    pub fn render_help(&self) -> String {
        self.command.clone().render_help().to_string()
    }
}

/// Splits tokens at the first `--`.
pub fn split_remainder(args: &[String]) -> (&[String], &[String]) {
    match args.iter().position(|arg| arg == REMAINDER_SEPARATOR) {
        Some(idx) => (&args[..idx], &args[idx + 1..]),
        None => (args, &[]),
    }
}

fn negation_id(field: &FieldSpec) -> String {
    format!("no-{}", field.name)
}

fn field_args(field: &FieldSpec) -> Vec<Arg> {
    let long = field.long_flag();
    let mut arg = Arg::new(field.name.clone())
        .long(long.trim_start_matches('-').to_string())
        .help(help_text(field));
    if let Some(short) = field.short_flag().and_then(|s| s.chars().nth(1)) {
        arg = arg.short(short);
    }

    if field.kind == FieldKind::Bool {
        arg = arg.action(ArgAction::SetTrue);
    } else {
        arg = arg
            .value_name(value_name(field))
            .required(field.is_required())
            .allow_negative_numbers(field.kind.is_numeric());
        arg = if field.kind.is_list() {
            arg.action(ArgAction::Append).num_args(1..)
        } else {
            arg.action(ArgAction::Set)
        };
        arg = match field.allowed_values() {
            Some(values) => arg.value_parser(PossibleValuesParser::new(values.iter().cloned())),
            None => arg.value_parser(value_parser!(String)),
        };
    }

    let mut args = vec![arg];
    if let Some(negated) = field.negated_flag() {
        args.push(
            Arg::new(negation_id(field))
                .long(negated.trim_start_matches('-').to_string())
                .action(ArgAction::SetTrue)
                .help(format!("Turn off {long}"))
                .conflicts_with(field.name.clone()),
        );
    }
    args
}

fn raw_value(matches: &clap::ArgMatches, field: &FieldSpec) -> Option<RawValue> {
    if field.kind == FieldKind::Bool {
        if field.negated_flag().is_some() && matches.get_flag(&negation_id(field)) {
            return Some(RawValue::Switch(false));
        }
        return matches.get_flag(&field.name).then_some(RawValue::Switch(true));
    }

    let mut values: Vec<String> = matches.get_many::<String>(&field.name)?.cloned().collect();
    if field.kind.is_list() {
        Some(RawValue::Multiple(values))
    } else {
        values.pop().map(RawValue::Single)
    }
}

fn value_name(field: &FieldSpec) -> String {
    if field.allowed_values().is_some() {
        return field.name.to_uppercase();
    }
    field
        .kind
        .scalar()
        .map(|scalar| scalar.value_name().to_string())
        .unwrap_or_else(|| field.name.to_uppercase())
}

fn help_text(field: &FieldSpec) -> String {
    let mut parts: Vec<String> = field.description.iter().cloned().collect();
    if let Some(default) = &field.default {
        let shown = match default {
            Value::Array(items) => items.iter().filter_map(raw_text).collect::<Vec<_>>().join(" "),
            other => raw_text(other).unwrap_or_default(),
        };
        parts.push(format!("[default: {shown}]"));
    }
    if !field.bounds.is_empty() {
        parts.push(format!("[{}]", field.bounds.summary()));
    }
    if let Some(pattern) = &field.pattern {
        parts.push(format!("[pattern: {pattern}]"));
    }
    let length: Vec<String> = [
        field.min_length.map(|n| format!("min_length={n}")),
        field.max_length.map(|n| format!("max_length={n}")),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !length.is_empty() {
        parts.push(format!("[{}]", length.join(", ")));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use autocli_core::{FieldError, ScalarKind};

    use super::*;

    fn tokens(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn file_schema() -> ArgsSchema {
        ArgsSchema::new("FileArgs")
            .with_field(
                FieldSpec::string("filename")
                    .long("--file")
                    .short("-f")
                    .with_description("File to operate on"),
            )
            .with_field(FieldSpec::boolean("write_mode").long("--write").short("-w"))
            .with_field(
                FieldSpec::string("mode")
                    .default("read")
                    .choices(["read", "write"]),
            )
    }

    #[test]
    fn test_required_flag_missing() {
        let parser = CommandParser::new("demo file", &file_schema(), false).unwrap();
        let err = parser.parse(&[]).unwrap_err();
        assert!(matches!(err, UsageError::Parse(_)));
        assert!(err.render().contains("--file"));
    }

    #[test]
    fn test_explicit_long_and_short_flags() {
        let parser = CommandParser::new("demo file", &file_schema(), false).unwrap();
        let parsed = parser.parse(&tokens(&["-f", "a.txt", "-w"])).unwrap();
        assert_eq!(parsed.str("filename"), Some("a.txt"));
        assert!(parsed.flag("write_mode"));
        assert_eq!(parsed.str("mode"), Some("read"));

        let parsed = parser.parse(&tokens(&["--file", "b.txt"])).unwrap();
        assert!(!parsed.flag("write_mode"));
    }

    #[test]
    fn test_choice_error_lists_choices() {
        let parser = CommandParser::new("demo file", &file_schema(), false).unwrap();
        let err = parser
            .parse(&tokens(&["--file", "a", "--mode", "delete"]))
            .unwrap_err();
        let text = err.render();
        assert!(text.contains("delete"));
        assert!(text.contains("read"));
        assert!(text.contains("write"));
    }

    #[test]
    fn test_list_accepts_spread_and_repeated() {
        let schema =
            ArgsSchema::new("SumArgs").with_field(FieldSpec::list("count", ScalarKind::Int));
        let parser = CommandParser::new("demo sum", &schema, false).unwrap();

        let spread = parser.parse(&tokens(&["--count", "1", "2", "3"])).unwrap();
        let repeated = parser
            .parse(&tokens(&["--count", "1", "--count", "2", "--count", "3"]))
            .unwrap();
        assert_eq!(spread.get::<Vec<i64>>("count"), Some(vec![1, 2, 3]));
        assert_eq!(spread, repeated);
    }

    #[test]
    fn test_negative_numbers() {
        let schema = ArgsSchema::new("ShiftArgs").with_field(FieldSpec::float("offset").default(0.0));
        let parser = CommandParser::new("demo shift", &schema, false).unwrap();
        let parsed = parser.parse(&tokens(&["--offset", "-2.5"])).unwrap();
        assert_eq!(parsed.float("offset"), Some(-2.5));
    }

    #[test]
    fn test_negated_toggle() {
        let schema = ArgsSchema::new("ColorArgs").with_field(FieldSpec::boolean("color").default(true));
        let parser = CommandParser::new("demo paint", &schema, false).unwrap();
        assert!(parser.parse(&[]).unwrap().flag("color"));
        assert!(!parser.parse(&tokens(&["--no-color"])).unwrap().flag("color"));
        assert!(parser.parse(&tokens(&["--color", "--no-color"])).is_err());
    }

    #[test]
    fn test_bounds_are_field_errors() {
        let schema = ArgsSchema::new("CountArgs")
            .with_field(FieldSpec::int("count").default(1).ge(1.0).le(100.0));
        let parser = CommandParser::new("demo count", &schema, false).unwrap();
        assert_eq!(parser.parse(&tokens(&["--count", "100"])).unwrap().int("count"), Some(100));
        match parser.parse(&tokens(&["--count", "101"])).unwrap_err() {
            UsageError::Field(FieldError::OutOfRange { field, bound, .. }) => {
                assert_eq!(field, "count");
                assert_eq!(bound.to_string(), "le=100");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_pattern_mismatch_names_field() {
        let schema =
            ArgsSchema::new("TagArgs").with_field(FieldSpec::string("tag").pattern("^v[0-9]+$"));
        let parser = CommandParser::new("demo tag", &schema, false).unwrap();
        let err = parser.parse(&tokens(&["--tag", "latest"])).unwrap_err();
        let text = err.render();
        assert!(text.contains("tag"));
        assert!(text.contains("^v[0-9]+$"));
    }

    #[test]
    fn test_extra_args_capture() {
        let schema = ArgsSchema::new("ExecArgs")
            .with_field(FieldSpec::boolean("dry_run"))
            .with_extra_args();
        let parser = CommandParser::new("demo exec", &schema, false).unwrap();
        let parsed = parser
            .parse(&tokens(&[
                "file1.py", "--dry-run", "file2.py", "--", "python", "-m", "pytest", "--tb=short",
            ]))
            .unwrap();
        let extra = parsed.extra().unwrap();
        assert_eq!(extra.positional(), ["file1.py", "file2.py"]);
        assert_eq!(extra.remainder_list(), ["python", "-m", "pytest", "--tb=short"]);
        assert_eq!(extra.remainder(), "python -m pytest --tb=short");
        assert!(parsed.flag("dry_run"));
    }

    #[test]
    fn test_extras_ignored_without_capture() {
        let schema = ArgsSchema::new("PlainArgs").with_field(FieldSpec::boolean("verbose"));
        let parser = CommandParser::new("demo plain", &schema, false).unwrap();
        let parsed = parser.parse(&tokens(&["stray", "--", "tail"])).unwrap();
        assert!(parsed.extra().is_none());
    }

    #[test]
    fn test_default_parser_discards_positional() {
        let schema = ArgsSchema::new("DefaultArgs").with_extra_args();
        let parser = CommandParser::new("demo", &schema, true).unwrap();
        let parsed = parser.parse(&tokens(&["stray", "--", "tail"])).unwrap();
        let extra = parsed.extra().unwrap();
        assert!(extra.positional().is_empty());
        assert_eq!(extra.remainder_list(), ["tail"]);
    }

    #[test]
    fn test_to_tokens_round_trip() {
        let schema = file_schema()
            .with_field(FieldSpec::list("level", ScalarKind::Int).default(vec![1, 2]))
            .with_field(FieldSpec::boolean("color").default(true))
            .with_field(FieldSpec::float("ratio").default(0.5))
            .with_field(FieldSpec::float("scale").default(2))
            .with_extra_args();
        let parser = CommandParser::new("demo file", &schema, false).unwrap();
        let parsed = parser
            .parse(&tokens(&[
                "-f", "a.txt", "--no-color", "--level", "3", "4", "pos", "--ratio", "-1.5", "--",
                "x", "y",
            ]))
            .unwrap();

        let reparsed = parser.parse(&parser.to_tokens(&parsed)).unwrap();
        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn test_to_tokens_round_trip_hyphen_values() {
        let schema = ArgsSchema::new("EchoArgs")
            .with_field(FieldSpec::string("name"))
            .with_field(FieldSpec::list("words", ScalarKind::Str).default(Vec::<String>::new()))
            .with_extra_args();
        let parser = CommandParser::new("demo echo", &schema, false).unwrap();

        for value in ["-x", "--", "--name", "-"] {
            let parsed = parser
                .parse(&tokens(&[
                    &format!("--name={value}"),
                    &format!("--words={value}"),
                    "--words=plain",
                ]))
                .unwrap();
            assert_eq!(parsed.str("name"), Some(value));

            let serialized = parser.to_tokens(&parsed);
            assert!(!serialized.iter().any(|token| token == REMAINDER_SEPARATOR));
            let reparsed = parser.parse(&serialized).unwrap();
            assert_eq!(parsed, reparsed, "tokens: {serialized:?}");
        }
    }

    #[test]
    fn test_help_lists_flags_defaults_and_constraints() {
        let schema = ArgsSchema::new("GreetArgs")
            .with_description("Say hello")
            .with_field(
                FieldSpec::string("name")
                    .default("World")
                    .short("-n")
                    .with_description("Who to greet"),
            )
            .with_field(FieldSpec::int("count").default(1).ge(1.0).le(100.0));
        let parser = CommandParser::new("demo greet", &schema, false).unwrap();
        let help = parser.render_help();
        assert!(help.contains("Say hello"));
        assert!(help.contains("demo greet"));
        assert!(help.contains("-n, --name <TEXT>"));
        assert!(help.contains("Who to greet"));
        assert!(help.contains("[default: World]"));
        assert!(help.contains("[ge=1, le=100]"));
        assert!(!help.contains("ARGS"));
    }

    #[test]
    fn test_invalid_schema_is_rejected() {
        let schema = ArgsSchema::new("BadArgs").with_field(FieldSpec::string("x").short("-h"));
        assert!(matches!(
            CommandParser::new("demo bad", &schema, false),
            Err(SchemaError::ReservedFlag { .. })
        ));
    }
}
