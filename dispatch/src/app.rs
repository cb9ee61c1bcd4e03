//! Application assembly and per-invocation dispatch.
//!
//! An [`App`] is built once from schemas and handlers and then dispatches any
//! number of token streams:
//!
//! ```text
//! START → HELP_CHECK → { help → exit 0 | SUBCOMMAND_MATCH }
//!       → PARSE → { usage error → exit 2 | PREPARE }
//!       → INVOKE → { error / panic → exit 1 | RETURN_MAP → exit }
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};

use autocli_core::naming::DEFAULT_HANDLER;
use autocli_core::{Args, ArgsSchema, ParsedArgs, raw_text};
use tracing::{debug, error};

use crate::resolve::HandlerDecl;
use crate::synth::split_remainder;
use crate::table::Selection;
use crate::{
    AppConfig, CommandTable, ConfigError, ExitOutcome, Handler, HandlerError, Outcome,
    ResolvedCommand, SchemaRegistry, UsageError,
};

type PrepareHook<S> = dyn Fn(&mut S, &ParsedArgs) + Send + Sync;

/// Tokens that request help before any `--`.
pub const HELP_FLAGS: &[&str] = &["--help", "-h"];

/// Collects the pieces of an application. Errors surface from [`build`](Self::build).
pub struct AppBuilder<S> {
    config: AppConfig,
    common: Option<ArgsSchema>,
    schemas: Vec<ArgsSchema>,
    handlers: Vec<(String, Handler<S>)>,
    prepare: Option<Box<PrepareHook<S>>>,
}

impl<S: 'static> AppBuilder<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(AppConfig::new(name))
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self {
            config,
            common: None,
            schemas: Vec::new(),
            handlers: Vec::new(),
            prepare: None,
        }
    }

    pub fn about(mut self, text: impl Into<String>) -> Self {
        self.config.about = Some(text.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = Some(version.into());
        self
    }

    /// Suppresses the invocation banners.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.config.quiet = quiet;
        self
    }

    /// Sets the shared schema used by commands with no schema of their own.
    pub fn common_args(mut self, schema: ArgsSchema) -> Self {
        self.common = Some(schema);
        self
    }

    /// Registers a schema for lookup by name.
    pub fn schema(mut self, schema: ArgsSchema) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Registers the schema of record type `A`.
    pub fn args<A: Args>(self) -> Self {
        self.schema(A::schema())
    }

    /// Registers a handler under `name` (`run_<command>`).
    pub fn command(mut self, name: impl Into<String>, handler: Handler<S>) -> Self {
        self.handlers.push((name.into(), handler));
        self
    }

    /// Registers the handler invoked when no subcommand is given.
    pub fn default_command(self, handler: Handler<S>) -> Self {
        self.command(DEFAULT_HANDLER, handler)
    }

    /// Runs `hook` with the parsed arguments before every handler.
    pub fn prepare<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut S, &ParsedArgs) + Send + Sync + 'static,
    {
        self.prepare = Some(Box::new(hook));
        self
    }

    /// Validates every declaration and freezes the command table.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found: invalid or duplicate schemas,
    /// malformed or duplicate handler names, reserved or colliding tokens.
    pub fn build(self) -> Result<App<S>, ConfigError> {
        let mut registry = SchemaRegistry::new();
        if let Some(common) = self.common {
            registry.register_common(common)?;
        }
        for schema in self.schemas {
            registry.register(schema)?;
        }

        let decls: Vec<HandlerDecl<'_>> = self
            .handlers
            .iter()
            .map(|(name, handler)| HandlerDecl {
                name,
                annotation: handler.annotation(),
                about: handler.description(),
            })
            .collect();
        let table = CommandTable::build(&self.config, &registry, &decls)?;

        debug!(
            app = %self.config.name,
            commands = ?table.tokens(),
            has_default = table.default_command().is_some(),
            "Built command table"
        );

        Ok(App {
            config: self.config,
            registry,
            table,
            handlers: self.handlers.into_iter().collect(),
            prepare: self.prepare,
        })
    }
}

/// A built application over state `S`.
///
/// # Examples
///
/// ```
/// use autocli_core::{ArgsSchema, FieldSpec};
/// use autocli_dispatch::{App, Handler};
///
/// let app = App::builder("demo")
///     .quiet(true)
///     .schema(ArgsSchema::new("GreetArgs").with_field(FieldSpec::string("name").default("World")))
///     .command(
///         "run_greet",
///         Handler::new(|greeted: &mut Vec<String>, args| {
///             greeted.push(args.str("name").unwrap_or_default().to_string());
///         }),
///     )
///     .build()
///     .unwrap();
///
/// let mut greeted = Vec::new();
/// let (mut out, mut err) = (Vec::new(), Vec::new());
/// let code = app.run_with(&mut greeted, ["greet", "--name", "Ada"], &mut out, &mut err);
/// assert!(code.is_success());
/// assert_eq!(greeted, ["Ada"]);
/// ```
pub struct App<S> {
    config: AppConfig,
    registry: SchemaRegistry,
    table: CommandTable,
    handlers: HashMap<String, Handler<S>>,
    prepare: Option<Box<PrepareHook<S>>>,
}

impl<S: 'static> App<S> {
    pub fn builder(name: impl Into<String>) -> AppBuilder<S> {
        AppBuilder::new(name)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    /// Dispatches the process arguments against the real output streams and
    /// exits with the resulting code.
    pub fn main(&self, state: &mut S) -> ! {
        let code = self.run_os(state, std::env::args_os().skip(1));
        std::process::exit(i32::from(code.code()))
    }

    /// Like [`run`](Self::run) for raw OS arguments. An argument that is not
    /// valid UTF-8 is a usage error.
    pub fn run_os<I>(&self, state: &mut S, args: I) -> ExitOutcome
    where
        I: IntoIterator<Item = OsString>,
    {
        let args = args
            .into_iter()
            .map(OsString::into_string)
            .collect::<Result<Vec<_>, _>>();
        match args {
            Ok(args) => self.run(state, args),
            Err(arg) => {
                let usage = UsageError::InvalidUtf8(arg.to_string_lossy().into_owned());
                debug!(error = %usage, "Rejected process arguments");
                emit(&mut io::stderr().lock(), &usage.render());
                ExitOutcome::USAGE
            }
        }
    }

    /// Dispatches `args` (program name excluded) against stdout and stderr.
    pub fn run<I, T>(&self, state: &mut S, args: I) -> ExitOutcome
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let stdout = io::stdout();
        let stderr = io::stderr();
        self.run_with(state, args, &mut stdout.lock(), &mut stderr.lock())
    }

    /// Dispatches `args` on a fresh current-thread runtime.
    pub fn run_with<I, T>(
        &self,
        state: &mut S,
        args: I,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> ExitOutcome
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(source) => {
                let failure = HandlerError::from(source);
                error!(error = %failure, "Cannot dispatch");
                emit(err, &format!("error: {failure}"));
                return ExitOutcome::FAILURE;
            }
        };
        runtime.block_on(self.dispatch(state, args, out, err))
    }

    /// Dispatches one invocation. Use from code already running inside a
    /// tokio runtime.
    pub async fn dispatch(
        &self,
        state: &mut S,
        args: Vec<String>,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> ExitOutcome {
        debug!(args = ?args, "Dispatch started");

        let (head, _) = split_remainder(&args);
        if head.iter().any(|token| HELP_FLAGS.contains(&token.as_str())) {
            debug!("Help requested");
            emit(out, &self.table.help_for(head));
            return ExitOutcome::SUCCESS;
        }

        let (command, rest) = match self.table.select(&args) {
            Ok(Selection::Command(command, rest)) => (command, rest),
            Ok(Selection::GlobalHelp) => {
                debug!("No command given");
                emit(out, &self.table.global_help());
                return ExitOutcome::SUCCESS;
            }
            Err(usage) => {
                debug!(error = %usage, "Command selection failed");
                emit(err, &usage.render());
                return ExitOutcome::USAGE;
            }
        };
        debug!(command = command.name(), handler = command.handler(), "Command selected");

        let parsed = match command.parser().parse(rest) {
            Ok(parsed) => parsed,
            Err(usage) if usage.is_display_request() => {
                emit(out, &usage.render());
                return ExitOutcome::SUCCESS;
            }
            Err(usage) => {
                debug!(command = command.name(), error = %usage, "Parse failed");
                emit(err, &usage.render());
                return ExitOutcome::USAGE;
            }
        };

        if let Some(prepare) = &self.prepare {
            debug!(command = command.name(), "Running prepare hook");
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| prepare(state, &parsed)))
            {
                let failure = HandlerError::Panicked {
                    handler: command.handler().to_string(),
                    message: format!("prepare hook: {}", panic_message(payload.as_ref())),
                };
                return fail(command, failure, err);
            }
        }

        match self.invoke(command, state, parsed, out).await {
            Ok(code) => {
                debug!(command = command.name(), code = code.code(), "Dispatch finished");
                code
            }
            Err(failure) => fail(command, failure, err),
        }
    }

    async fn invoke(
        &self,
        command: &ResolvedCommand,
        state: &mut S,
        parsed: ParsedArgs,
        out: &mut dyn Write,
    ) -> Result<ExitOutcome, HandlerError> {
        let name = command.handler();
        let Some(handler) = self.handlers.get(name) else {
            return Err(HandlerError::Failed {
                handler: name.to_string(),
                message: "no handler registered".into(),
            });
        };

        if !self.config.quiet {
            emit(out, &banner(command.name(), &parsed));
        }

        let pending = panic::catch_unwind(AssertUnwindSafe(|| handler.invoke(state, parsed)))
            .map_err(|payload| HandlerError::Panicked {
                handler: name.to_string(),
                message: panic_message(payload.as_ref()),
            })?;
        let outcome = if handler.is_async() {
            debug!(handler = name, "Awaiting async handler");
            tokio::spawn(pending).await.map_err(|join| HandlerError::Panicked {
                handler: name.to_string(),
                message: if join.is_panic() {
                    panic_message(join.into_panic().as_ref())
                } else {
                    join.to_string()
                },
            })?
        } else {
            pending.await
        };

        if !self.config.quiet {
            emit(out, &format!("Done <{}>", command.name()));
        }
        exit_outcome(name, outcome)
    }
}

impl<S> fmt::Debug for App<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("table", &self.table)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("prepare", &self.prepare.is_some())
            .finish()
    }
}

/// Maps a handler outcome onto a process exit code.
pub fn exit_outcome(handler: &str, outcome: Outcome) -> Result<ExitOutcome, HandlerError> {
    match outcome {
        Outcome::Success => Ok(ExitOutcome::SUCCESS),
        Outcome::Failure => Ok(ExitOutcome::FAILURE),
        Outcome::ExitCode(code) => {
            ExitOutcome::from_code(code).ok_or_else(|| HandlerError::ExitCodeOutOfRange {
                handler: handler.to_string(),
                code,
            })
        }
        Outcome::Internal(message) => Err(HandlerError::Failed {
            handler: handler.to_string(),
            message,
        }),
    }
}

fn banner(name: &str, parsed: &ParsedArgs) -> String {
    let mut text = format!("Starting <{name}>");
    if parsed.is_empty() {
        text.push_str("\nNo args");
        return text;
    }
    text.push_str("\nArgs");
    let width = parsed.iter().map(|(field, _)| field.len()).max().unwrap_or(0) + 1;
    for (field, value) in parsed.iter() {
        let shown = raw_text(value).unwrap_or_else(|| value.to_string());
        text.push_str(&format!("\n\t{field:<width$}: {shown}"));
    }
    text
}

fn fail(command: &ResolvedCommand, failure: HandlerError, err: &mut dyn Write) -> ExitOutcome {
    error!(command = command.name(), error = %failure, "Handler failed");
    emit(err, &format!("error: {failure}"));
    ExitOutcome::FAILURE
}

fn emit(stream: &mut dyn Write, text: &str) {
    if let Err(err) = writeln!(stream, "{}", text.trim_end()) {
        debug!(error = %err, "Cannot write output");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

#[cfg(test)]
mod tests {
    use autocli_core::{FieldSpec, RawArgs, Validator};

    use super::*;

    #[test]
    fn test_exit_outcome_mapping() {
        assert_eq!(exit_outcome("run_x", Outcome::Success).unwrap(), ExitOutcome::SUCCESS);
        assert_eq!(exit_outcome("run_x", Outcome::Failure).unwrap(), ExitOutcome::FAILURE);
        assert_eq!(exit_outcome("run_x", Outcome::ExitCode(7)).unwrap().code(), 7);
        assert!(matches!(
            exit_outcome("run_x", Outcome::ExitCode(256)),
            Err(HandlerError::ExitCodeOutOfRange { code: 256, .. })
        ));
        assert!(matches!(
            exit_outcome("run_x", Outcome::Internal("boom".into())),
            Err(HandlerError::Failed { handler, .. }) if handler == "run_x"
        ));
    }

    #[test]
    fn test_banner_aligns_fields() {
        let schema = ArgsSchema::new("GreetArgs")
            .with_field(FieldSpec::string("name").default("World"))
            .with_field(FieldSpec::int("count").default(1));
        let parsed = Validator::compile(&schema)
            .unwrap()
            .instantiate(&RawArgs::new(), None)
            .unwrap();
        assert_eq!(
            banner("greet", &parsed),
            "Starting <greet>\nArgs\n\tname  : World\n\tcount : 1"
        );

        let parsed = Validator::compile(&ArgsSchema::new("EmptyArgs"))
            .unwrap()
            .instantiate(&RawArgs::new(), None)
            .unwrap();
        assert_eq!(banner("status", &parsed), "Starting <status>\nNo args");
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn counter_app() -> AppBuilder<u32> {
        App::builder("demo").command(
            "run_bump",
            Handler::new(|count: &mut u32, _: ParsedArgs| {
                *count += 1;
            }),
        )
    }

    #[test]
    fn test_prepare_panic_is_internal_error() {
        let app = counter_app()
            .prepare(|_: &mut u32, _: &ParsedArgs| panic!("prepare boom"))
            .build()
            .unwrap();
        let mut count = 0;
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let code = app.run_with(&mut count, ["bump"], &mut out, &mut err);

        assert_eq!(code, ExitOutcome::FAILURE);
        assert_eq!(count, 0);
        let err = String::from_utf8(err).unwrap();
        assert!(err.contains("run_bump"), "stderr: {err}");
        assert!(err.contains("prepare boom"), "stderr: {err}");
    }

    #[test]
    fn test_closed_streams_keep_exit_code() {
        let app = counter_app().build().unwrap();
        let mut count = 0;
        let code = app.run_with(&mut count, ["bump"], &mut FailingWriter, &mut FailingWriter);
        assert_eq!(code, ExitOutcome::SUCCESS);
        assert_eq!(count, 1);

        let code = app.run_with(&mut count, ["nope"], &mut FailingWriter, &mut FailingWriter);
        assert_eq!(code, ExitOutcome::USAGE);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_argument_is_usage_error() {
        use std::os::unix::ffi::OsStringExt;

        let app = counter_app().build().unwrap();
        let mut count = 0;
        let args = vec![OsString::from("bump"), OsString::from_vec(vec![0xff])];
        assert_eq!(app.run_os(&mut count, args), ExitOutcome::USAGE);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
