//! The immutable command table produced when an application is built.

use std::collections::BTreeMap;

use clap::Command;

use crate::resolve::{Binding, HandlerDecl, Resolution, ResolutionWarning, resolve};
use crate::{AppConfig, CommandParser, ConfigError, SchemaRegistry, UsageError};

/// A resolved command together with its synthesized parser.
#[derive(Debug, Clone)]
pub struct ResolvedCommand {
    binding: Binding,
    parser: CommandParser,
}

impl ResolvedCommand {
    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn parser(&self) -> &CommandParser {
        &self.parser
    }

    pub fn handler(&self) -> &str {
        &self.binding.handler
    }

    pub fn name(&self) -> &str {
        self.binding.display_name()
    }
}

/// The command a token stream was routed to.
#[derive(Debug)]
pub(crate) enum Selection<'t, 'a> {
    /// Tokens left for the command's parser.
    Command(&'t ResolvedCommand, &'a [String]),
    /// No tokens and no default handler.
    GlobalHelp,
}

/// Token → command bindings, built once and read-only afterwards.
#[derive(Debug, Clone)]
pub struct CommandTable {
    commands: BTreeMap<String, ResolvedCommand>,
    default: Option<ResolvedCommand>,
    warnings: Vec<ResolutionWarning>,
    global: Command,
}

impl CommandTable {
    /// Resolves every handler and synthesizes its parser.
    ///
    /// # Errors
    ///
    /// Any resolution error, or [`ConfigError::Schema`] when an annotation
    /// schema fails definition-time validation.
    pub fn build(
        config: &AppConfig,
        registry: &SchemaRegistry,
        handlers: &[HandlerDecl<'_>],
    ) -> Result<Self, ConfigError> {
        let Resolution {
            default,
            commands,
            warnings,
        } = resolve(registry, handlers)?;

        let mut table = BTreeMap::new();
        for binding in commands {
            let bin_name = format!("{} {}", config.name, binding.display_name());
            let command = resolved(binding, &bin_name, false)?;
            table.insert(command.name().to_string(), command);
        }

        let mut default = default
            .map(|binding| resolved(binding, &config.name, true))
            .transpose()?;
        let listing = listing(&table, default.as_ref());
        if let Some(command) = default.as_mut() {
            if !table.is_empty() {
                command.parser = command.parser.clone().with_after_help(command_list(&listing));
            }
        }

        Ok(Self {
            global: global_command(config, &listing),
            commands: table,
            default,
            warnings,
        })
    }

    pub fn command(&self, token: &str) -> Option<&ResolvedCommand> {
        self.commands.get(token)
    }

    pub fn default_command(&self) -> Option<&ResolvedCommand> {
        self.default.as_ref()
    }

    /// Subcommand tokens in sorted order.
    pub fn tokens(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }

    /// Every binding, default first, then named commands by token.
    pub fn bindings(&self) -> Vec<&Binding> {
        self.default
            .iter()
            .chain(self.commands.values())
            .map(ResolvedCommand::binding)
            .collect()
    }

    /// Conflict warnings recorded during resolution.
    pub fn warnings(&self) -> &[ResolutionWarning] {
        &self.warnings
    }

    /// The application-wide help screen listing every command.
    pub fn global_help(&self) -> String {
        self.global.clone().render_help().to_string()
    }

    /// Help for a token stream: the named command's if the first token is
    /// one, else the default handler's, else the global help.
    pub fn help_for(&self, args: &[String]) -> String {
        let command = args
            .first()
            .and_then(|token| self.command(token))
            .or(self.default.as_ref());
        match command {
            Some(command) => command.parser.render_help(),
            None => self.global_help(),
        }
    }

    /// Routes a token stream to a command.
    pub(crate) fn select<'t, 'a>(&'t self, args: &'a [String]) -> Result<Selection<'t, 'a>, UsageError> {
        if let Some((first, rest)) = args.split_first() {
            if let Some(command) = self.command(first) {
                return Ok(Selection::Command(command, rest));
            }
        }
        match (&self.default, args.first()) {
            (Some(default), _) => Ok(Selection::Command(default, args)),
            (None, None) => Ok(Selection::GlobalHelp),
            (None, Some(token)) => Err(UsageError::UnknownCommand {
                token: token.clone(),
                available: self.commands.keys().cloned().collect(),
            }),
        }
    }
}

fn resolved(binding: Binding, bin_name: &str, is_default: bool) -> Result<ResolvedCommand, ConfigError> {
    let mut parser =
        CommandParser::new(bin_name, &binding.schema, is_default).map_err(|source| ConfigError::Schema {
            schema: binding.schema.name.clone(),
            source,
        })?;
    if let Some(about) = &binding.about {
        parser = parser.with_about(about.clone());
    }
    Ok(ResolvedCommand { binding, parser })
}

/// Help text shown for the default handler in command listings.
const DEFAULT_ABOUT: &str = "Run when no command is given";

/// `(token, about)` rows for help screens, `default` first when present.
fn listing(
    commands: &BTreeMap<String, ResolvedCommand>,
    default: Option<&ResolvedCommand>,
) -> Vec<(String, String)> {
    let default = default.map(|command| {
        let about = describe(command).unwrap_or(DEFAULT_ABOUT);
        (command.name().to_string(), about.to_string())
    });
    default
        .into_iter()
        .chain(commands.iter().map(|(token, command)| {
            (token.clone(), describe(command).unwrap_or_default().to_string())
        }))
        .collect()
}

fn describe(command: &ResolvedCommand) -> Option<&str> {
    command
        .binding
        .about
        .as_deref()
        .or(command.binding.schema.description.as_deref())
}

fn command_list(listing: &[(String, String)]) -> String {
    let width = listing.iter().map(|(token, _)| token.len()).max().unwrap_or(0);
    let mut text = String::from("Commands:");
    for (token, about) in listing {
        text.push_str(&format!("\n  {token:<width$}  {about}"));
    }
    text
}

fn global_command(config: &AppConfig, listing: &[(String, String)]) -> Command {
    let mut global = Command::new(config.name.clone())
        .bin_name(config.name.clone())
        .disable_help_subcommand(true)
        .subcommand_value_name("COMMAND")
        .after_help(
            "Commands are derived from the application's run_* handlers; \
             options come from each command's argument schema.\n\
             Run '<COMMAND> --help' for the options of one command.",
        );
    if let Some(about) = &config.about {
        global = global.about(about.clone());
    }
    if let Some(version) = &config.version {
        global = global.version(version.clone());
    }
    for (token, about) in listing {
        let mut sub = Command::new(token.clone());
        if !about.is_empty() {
            sub = sub.about(about.clone());
        }
        global = global.subcommand(sub);
    }
    global
}
