//! Command resolution, parser synthesis and dispatch for autocli applications.
//!
//! An application declares argument schemas and `run_*` handlers. When built,
//! every handler is bound to exactly one schema (explicit annotation, then
//! naming convention, then the common schema) and gets a synthesized `clap`
//! parser. Each invocation is parsed, validated by the record layer in
//! [`autocli_core`], handed to its handler, and the return value mapped to an
//! exit code.
//!
//! # Examples
//!
//! ```
//! use autocli_core::{Args, ArgsSchema, FieldSpec};
//! use autocli_dispatch::{App, Handler};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct GreetArgs {
//!     name: String,
//!     count: i64,
//! }
//!
//! impl Args for GreetArgs {
//!     fn schema() -> ArgsSchema {
//!         ArgsSchema::new("GreetArgs")
//!             .with_field(FieldSpec::string("name").default("World").short("-n"))
//!             .with_field(FieldSpec::int("count").default(1).ge(1.0).le(100.0))
//!     }
//! }
//!
//! let app = App::builder("demo")
//!     .quiet(true)
//!     .command(
//!         "run_greet",
//!         Handler::typed(|lines: &mut Vec<String>, args: GreetArgs| {
//!             for _ in 0..args.count {
//!                 lines.push(format!("Hello, {}!", args.name));
//!             }
//!         }),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let mut lines = Vec::new();
//! let (mut out, mut err) = (Vec::new(), Vec::new());
//! let code = app.run_with(&mut lines, ["greet", "-n", "Ada", "--count", "2"], &mut out, &mut err);
//! assert_eq!(code.code(), 0);
//! assert_eq!(lines, ["Hello, Ada!", "Hello, Ada!"]);
//!
//! let code = app.run_with(&mut lines, ["greet", "--count", "0"], &mut out, &mut err);
//! assert_eq!(code.code(), 2);
//! assert!(String::from_utf8_lossy(&err).contains("ge=1"));
//! ```

mod app;
mod config;
mod error;
mod handler;
mod outcome;
mod registry;
mod resolve;
mod synth;
mod table;

pub use app::{App, AppBuilder, HELP_FLAGS, exit_outcome};
pub use config::AppConfig;
pub use error::{ConfigError, HandlerError, UsageError};
pub use handler::{Handler, HandlerFuture};
pub use outcome::{ExitOutcome, IntoOutcome, Outcome};
pub use registry::SchemaRegistry;
pub use resolve::{
    Binding, HandlerDecl, RESERVED_COMMANDS, Resolution, ResolutionSource, ResolutionWarning,
    resolve, resolve_schema,
};
pub use synth::{CommandParser, REMAINDER_SEPARATOR, split_remainder};
pub use table::{CommandTable, ResolvedCommand};
