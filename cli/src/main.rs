use std::fs;
use std::process::Command;
use std::time::Duration;

use autocli_core::{Args, ArgsSchema, FieldSpec, ParsedArgs};
use autocli_dispatch::{App, AppBuilder, AppConfig, ConfigError, Handler};
use serde::Deserialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable naming an optional YAML config file.
const CONFIG_ENV: &str = "AUTOCLI_DEMO_CONFIG";

/// State shared by every command of one run.
#[derive(Debug, Default)]
struct Session {
    verbose: bool,
}

fn common_args() -> ArgsSchema {
    ArgsSchema::new("CommonArgs").with_field(
        FieldSpec::boolean("verbose")
            .short("-v")
            .with_description("Enable verbose output"),
    )
}

#[derive(Debug, Deserialize)]
struct GreetArgs {
    name: String,
    count: i64,
}

impl Args for GreetArgs {
    fn schema() -> ArgsSchema {
        ArgsSchema::new("GreetArgs")
            .extends(&common_args())
            .with_description("Print a greeting")
            .with_field(
                FieldSpec::string("name")
                    .default("World")
                    .short("-n")
                    .with_description("Who to greet"),
            )
            .with_field(
                FieldSpec::int("count")
                    .default(1)
                    .short("-c")
                    .ge(1.0)
                    .le(100.0)
                    .with_description("How many times"),
            )
    }
}

#[derive(Debug, Deserialize)]
struct FileArgs {
    filename: String,
    write_mode: bool,
    mode: String,
}

impl Args for FileArgs {
    fn schema() -> ArgsSchema {
        ArgsSchema::new("FileArgs")
            .extends(&common_args())
            .with_description("Read or write a file")
            .with_field(
                FieldSpec::string("filename")
                    .long("--file")
                    .short("-f")
                    .min_length(1)
                    .with_description("Path of the file"),
            )
            .with_field(
                FieldSpec::boolean("write_mode")
                    .long("--write")
                    .short("-w")
                    .with_description("Write instead of read"),
            )
            .with_field(
                FieldSpec::choice("mode", ["text", "binary", "append"])
                    .default("text")
                    .short("-m"),
            )
    }
}

fn exec_args() -> ArgsSchema {
    ArgsSchema::new("ExecArgs")
        .extends(&common_args())
        .with_description("Run the command after `--` once per positional argument")
        .with_field(
            FieldSpec::boolean("dry_run").with_description("Print the commands without running them"),
        )
        .with_extra_args()
}

#[derive(Debug, Deserialize)]
struct SleepArgs {
    millis: u64,
}

impl Args for SleepArgs {
    fn schema() -> ArgsSchema {
        ArgsSchema::new("SleepArgs")
            .extends(&common_args())
            .with_description("Wait asynchronously")
            .with_field(
                FieldSpec::int("millis")
                    .default(100)
                    .ge(0.0)
                    .le(10_000.0)
                    .with_description("Milliseconds to wait"),
            )
    }
}

#[derive(Debug, Deserialize)]
struct CheckArgs {
    code: i64,
}

impl Args for CheckArgs {
    fn schema() -> ArgsSchema {
        ArgsSchema::new("CheckArgs")
            .with_description("Exit with the given code")
            .with_field(FieldSpec::int("code").default(0))
    }
}

fn default_args() -> ArgsSchema {
    ArgsSchema::new("DefaultArgs")
        .extends(&common_args())
        .with_field(FieldSpec::string("target").default(".").with_description("Directory to report on"))
}

fn run_greet(session: &mut Session, args: GreetArgs) {
    for _ in 0..args.count {
        println!("Hello, {}!", args.name);
    }
    if session.verbose {
        println!("Greeted {} {} times", args.name, args.count);
    }
}

fn run_file(session: &mut Session, args: FileArgs) -> Result<bool, String> {
    if args.write_mode {
        fs::write(&args.filename, "Hello from autocli!\n")
            .map_err(|err| format!("cannot write {}: {err}", args.filename))?;
        println!("Wrote to file: {} in {} mode", args.filename, args.mode);
    } else {
        match fs::read_to_string(&args.filename) {
            Ok(content) => println!("File content: {}", content.trim()),
            Err(_) => {
                println!("File not found: {}", args.filename);
                return Ok(false);
            }
        }
    }
    if session.verbose {
        println!("File operation complete on {}", args.filename);
    }
    Ok(true)
}

fn run_exec(session: &mut Session, args: ParsedArgs) -> Result<i32, String> {
    let Some(extra) = args.extra() else {
        return Ok(0);
    };
    let Some((program, base)) = extra.remainder_list().split_first() else {
        println!("Nothing to run; pass a command after `--`");
        return Ok(1);
    };

    let targets: Vec<Option<&String>> = if extra.positional().is_empty() {
        vec![None]
    } else {
        extra.positional().iter().map(Some).collect()
    };
    for target in targets {
        let mut argv: Vec<&str> = base.iter().map(String::as_str).collect();
        argv.extend(target.map(String::as_str));
        let line: Vec<&str> = std::iter::once(program.as_str()).chain(argv.iter().copied()).collect();
        println!("$ {}", line.join(" "));
        if args.flag("dry_run") {
            continue;
        }
        let status = Command::new(program)
            .args(&argv)
            .status()
            .map_err(|err| format!("cannot run {program}: {err}"))?;
        if session.verbose {
            println!("exit status: {status}");
        }
        if !status.success() {
            return Ok(status.code().unwrap_or(1));
        }
    }
    Ok(0)
}

async fn sleep_for(millis: u64) -> bool {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    println!("Slept {millis}ms");
    true
}

fn run_default(_session: &mut Session, args: ParsedArgs) {
    println!(
        "Nothing to do for {}; run with --help to list commands",
        args.str("target").unwrap_or(".")
    );
}

fn load_config() -> Result<AppConfig, ConfigError> {
    let mut config = match std::env::var_os(CONFIG_ENV) {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::new("autocli-demo"),
    };
    config.about.get_or_insert_with(|| "Demo commands built with autocli".to_string());
    config.version.get_or_insert_with(|| PACKAGE_VERSION.to_string());
    Ok(config)
}

fn build_app(config: AppConfig) -> Result<App<Session>, ConfigError> {
    AppBuilder::with_config(config)
        .common_args(common_args())
        .args::<GreetArgs>()
        .args::<FileArgs>()
        .args::<SleepArgs>()
        .schema(exec_args())
        .schema(default_args())
        .prepare(|session: &mut Session, args: &ParsedArgs| {
            session.verbose = args.flag("verbose");
            debug!(schema = args.schema_name(), verbose = session.verbose, "Prepared session");
        })
        .command("run_greet", Handler::typed(run_greet))
        .command("run_file", Handler::typed(run_file))
        .command("run_exec", Handler::new(run_exec))
        .command(
            "run_sleep",
            Handler::typed_future(|_: &mut Session, args: SleepArgs| sleep_for(args.millis)),
        )
        .command("run_check", Handler::typed(|_: &mut Session, args: CheckArgs| args.code))
        .default_command(Handler::new(run_default).about("Report on the target directory"))
        .build()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let app = match load_config().and_then(build_app) {
        Ok(app) => app,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };
    info!(name = %app.config().name, version = PACKAGE_VERSION, "Starting demo");

    let mut session = Session::default();
    app.main(&mut session)
}
