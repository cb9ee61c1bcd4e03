//! Naming conventions shared by handlers, subcommand tokens and schemas.
//!
//! A handler named `run_show_file` produces the subcommand token `show-file`,
//! and that token maps back to the conventional schema name `ShowFileArgs`.
//!
//! # Examples
//!
//! ```
//! use autocli_core::naming::*;
//!
//! assert_eq!(command_token("run_show_file").as_deref(), Some("show-file"));
//! assert_eq!(schema_name_for_token("show-file"), "ShowFileArgs");
//! assert_eq!(flag_for_field("dry_run"), "--dry-run");
//! ```

/// Prefix every command handler name starts with.
pub const COMMAND_PREFIX: &str = "run_";

/// Name of the handler invoked when no subcommand token is given.
pub const DEFAULT_HANDLER: &str = "run_default";

/// Schema name the default handler resolves against by convention.
pub const DEFAULT_SCHEMA: &str = "DefaultArgs";

/// Name of the shared schema every command falls back to.
pub const COMMON_SCHEMA: &str = "CommonArgs";

/// Suffix appended to the Pascal-cased command name to form a schema name.
pub const SCHEMA_SUFFIX: &str = "Args";

/// Converts `snake_case` to `PascalCase`.
///
/// Each underscore-separated word is capitalized and the remainder of the word
/// lowercased, so `show_FILE` becomes `ShowFile`.
///
/// # Examples
///
/// ```
/// use autocli_core::naming::snake_to_pascal;
///
/// assert_eq!(snake_to_pascal("greet"), "Greet");
/// assert_eq!(snake_to_pascal("show_file"), "ShowFile");
/// ```
pub fn snake_to_pascal(s: &str) -> String {
    s.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Converts `snake_case` to `kebab-case`.
pub fn snake_to_kebab(s: &str) -> String {
    s.replace('_', "-")
}

/// Converts `kebab-case` to `snake_case`.
pub fn kebab_to_snake(s: &str) -> String {
    s.replace('-', "_")
}

/// Derives the subcommand token for a handler name.
///
/// Returns `None` when the name does not carry [`COMMAND_PREFIX`].
pub fn command_token(handler: &str) -> Option<String> {
    handler
        .strip_prefix(COMMAND_PREFIX)
        .map(|rest| snake_to_kebab(rest).to_lowercase())
}

/// Synthesizes the conventional schema name for a subcommand token.
pub fn schema_name_for_token(token: &str) -> String {
    format!("{}{SCHEMA_SUFFIX}", snake_to_pascal(&kebab_to_snake(token)))
}

/// Derives the long flag for a field that declares none.
pub fn flag_for_field(field: &str) -> String {
    format!("--{}", snake_to_kebab(field))
}

/// Derives the negated long form of a boolean flag (`--verbose` → `--no-verbose`).
pub fn negated_flag(long: &str) -> String {
    format!("--no-{}", long.trim_start_matches('-'))
}
