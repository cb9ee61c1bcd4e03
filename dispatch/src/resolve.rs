//! Command resolution: which schema governs which handler.
//!
//! Priority for every handler:
//!
//! 1. an explicit annotation (typed handler record or attached schema),
//! 2. the registered schema named after the subcommand token (`greet` → `GreetArgs`),
//! 3. the common schema, or an empty built-in `CommonArgs`.
//!
//! When (1) and (2) both exist but differ, (1) wins and one
//! [`ResolutionWarning`] is produced.

use std::collections::BTreeMap;
use std::fmt;

use autocli_core::ArgsSchema;
use autocli_core::naming::{
    COMMAND_PREFIX, DEFAULT_HANDLER, DEFAULT_SCHEMA, command_token, schema_name_for_token,
};
use tracing::{debug, warn};

use crate::{ConfigError, SchemaRegistry};

/// Subcommand tokens the dispatcher keeps for itself.
pub const RESERVED_COMMANDS: &[&str] = &["help"];

/// Which rule selected a handler's schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionSource {
    Annotation,
    Convention,
    Fallback,
}

/// A handler as declared on the application, before resolution.
#[derive(Debug, Clone, Copy)]
pub struct HandlerDecl<'a> {
    pub name: &'a str,
    pub annotation: Option<&'a ArgsSchema>,
    pub about: Option<&'a str>,
}

impl<'a> HandlerDecl<'a> {
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            annotation: None,
            about: None,
        }
    }

    pub fn annotated(mut self, schema: &'a ArgsSchema) -> Self {
        self.annotation = Some(schema);
        self
    }

    pub fn about(mut self, about: &'a str) -> Self {
        self.about = Some(about);
        self
    }
}

/// A handler paired with the schema that governs it.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub handler: String,
    /// `None` for the default handler.
    pub token: Option<String>,
    pub schema: ArgsSchema,
    pub source: ResolutionSource,
    pub about: Option<String>,
}

impl Binding {
    pub fn is_default(&self) -> bool {
        self.token.is_none()
    }

    /// Name used in banners and diagnostics: the token, or `default`.
    pub fn display_name(&self) -> &str {
        self.token.as_deref().unwrap_or("default")
    }
}

/// An annotation that overrides a different convention-named schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionWarning {
    pub handler: String,
    pub annotated: String,
    pub convention: String,
}

impl fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "handler '{}' is annotated with '{}' but convention selects '{}'; using '{}'",
            self.handler, self.annotated, self.convention, self.annotated
        )
    }
}

/// Output of [`resolve`]: bindings in deterministic order plus any warnings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub default: Option<Binding>,
    /// Named commands sorted by token.
    pub commands: Vec<Binding>,
    pub warnings: Vec<ResolutionWarning>,
}

/// Applies the priority rule to one handler.
///
/// `expected` is the conventional schema name (`GreetArgs`, or `DefaultArgs`
/// for the default handler). Pure: logging is left to the caller.
pub fn resolve_schema(
    handler: &str,
    annotation: Option<&ArgsSchema>,
    expected: &str,
    registry: &SchemaRegistry,
) -> (ArgsSchema, ResolutionSource, Option<ResolutionWarning>) {
    let convention = registry.get(expected);
    match (annotation, convention) {
        (Some(annotated), convention) => {
            let warning = convention
                .filter(|conv| conv.name != annotated.name)
                .map(|conv| ResolutionWarning {
                    handler: handler.to_string(),
                    annotated: annotated.name.clone(),
                    convention: conv.name.clone(),
                });
            (annotated.clone(), ResolutionSource::Annotation, warning)
        }
        (None, Some(conv)) => (conv.clone(), ResolutionSource::Convention, None),
        (None, None) => (registry.fallback(), ResolutionSource::Fallback, None),
    }
}

/// Resolves every declared handler into a binding.
///
/// Handlers are processed in name order, so the result does not depend on
/// declaration order.
///
/// # Errors
///
/// Returns a [`ConfigError`] for malformed or duplicate handler names,
/// unusable or reserved tokens, and tokens produced by two handlers.
pub fn resolve(
    registry: &SchemaRegistry,
    handlers: &[HandlerDecl<'_>],
) -> Result<Resolution, ConfigError> {
    let mut by_name: BTreeMap<&str, &HandlerDecl<'_>> = BTreeMap::new();
    for decl in handlers {
        if !is_valid_handler_name(decl.name) {
            return Err(ConfigError::InvalidHandlerName(decl.name.to_string()));
        }
        if by_name.insert(decl.name, decl).is_some() {
            return Err(ConfigError::DuplicateHandler(decl.name.to_string()));
        }
    }

    let mut resolution = Resolution::default();
    let mut tokens: BTreeMap<String, Binding> = BTreeMap::new();

    for (name, decl) in by_name {
        let token = if name == DEFAULT_HANDLER {
            None
        } else {
            let token = command_token(name)
                .ok_or_else(|| ConfigError::InvalidHandlerName(name.to_string()))?;
            check_token(name, &token)?;
            if let Some(first) = tokens.get(&token) {
                return Err(ConfigError::DuplicateCommand {
                    token,
                    first: first.handler.clone(),
                    second: name.to_string(),
                });
            }
            Some(token)
        };

        let expected = match &token {
            Some(token) => schema_name_for_token(token),
            None => DEFAULT_SCHEMA.to_string(),
        };
        let (schema, source, warning) = resolve_schema(name, decl.annotation, &expected, registry);
        debug!(handler = name, token = ?token, schema = %schema.name, source = ?source, "Resolved handler");
        if let Some(warning) = warning {
            warn!(
                handler = %warning.handler,
                annotated = %warning.annotated,
                convention = %warning.convention,
                "Annotation overrides convention-named schema"
            );
            resolution.warnings.push(warning);
        }

        let binding = Binding {
            handler: name.to_string(),
            token: token.clone(),
            schema,
            source,
            about: decl.about.map(str::to_string),
        };
        match token {
            Some(token) => {
                tokens.insert(token, binding);
            }
            None => resolution.default = Some(binding),
        }
    }

    resolution.commands = tokens.into_values().collect();
    Ok(resolution)
}

fn is_valid_handler_name(name: &str) -> bool {
    name.starts_with(COMMAND_PREFIX)
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_token(handler: &str, token: &str) -> Result<(), ConfigError> {
    if token.is_empty() || token.starts_with('-') || token.ends_with('-') || token.contains("--") {
        return Err(ConfigError::InvalidCommandToken {
            handler: handler.to_string(),
            token: token.to_string(),
        });
    }
    if RESERVED_COMMANDS.contains(&token) {
        return Err(ConfigError::ReservedCommand {
            handler: handler.to_string(),
            token: token.to_string(),
        });
    }
    Ok(())
}
