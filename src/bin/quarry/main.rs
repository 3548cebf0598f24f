//! Command-line front end for running and inspecting quarry queries.
#![forbid(unsafe_code)]

mod config;
mod ui;

use std::error::Error;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use quarry::expr::Engine;
use quarry::query::profile::profile_snapshot;
use quarry::{Graph, QuarryError, Schema, Store, StoreOptions};
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use config::{CliConfig, Profile, ProfileUpdate};
use ui::{format_duration, Theme, Ui};

#[derive(Parser, Debug)]
#[command(
    name = "quarry",
    version,
    about = "Run schema-aware queries over JSON resource graphs",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "QUARRY_CONFIG",
        value_name = "FILE",
        help = "Path to the CLI config file"
    )]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Config profile supplying default documents")]
    profile: Option<String>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(long, global = true, value_enum, default_value_t = ThemeArg::Auto)]
    theme: ThemeArg,

    #[arg(short, long, global = true, help = "Suppress decorations and notices")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct DocumentArgs {
    #[arg(long, value_name = "FILE", help = "Schema document (JSON)")]
    schema: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct QueryCmd {
    #[command(flatten)]
    docs: DocumentArgs,

    #[arg(long, value_name = "FILE", help = "Graph document (JSON)")]
    graph: Option<PathBuf>,

    #[arg(
        value_name = "QUERY",
        help = "Query as a file path, inline JSON, or '-' for stdin"
    )]
    query: String,

    #[arg(long, action = ArgAction::SetTrue, help = "Resolve dangling refs to null")]
    tolerant: bool,

    #[arg(long, help = "Skip structural validation")]
    no_validate: bool,

    #[arg(long, help = "Print stage timings (requires QUARRY_PROFILE)")]
    stats: bool,
}

#[derive(Args, Debug)]
struct SchemaQueryCmd {
    #[command(flatten)]
    docs: DocumentArgs,

    #[arg(
        value_name = "QUERY",
        help = "Query as a file path, inline JSON, or '-' for stdin"
    )]
    query: String,
}

#[derive(Args, Debug)]
struct EvalCmd {
    #[arg(
        value_name = "EXPR",
        help = "Expression as a file path, inline JSON, or '-' for stdin"
    )]
    expr: String,

    #[arg(long, value_name = "JSON", help = "Input value the expression runs against")]
    input: Option<String>,

    #[arg(long, value_enum, default_value_t = VocabularyArg::Select)]
    vocabulary: VocabularyArg,
}

#[derive(Subcommand, Debug)]
enum ProfileCmd {
    #[command(about = "List configured profiles")]
    List,

    #[command(about = "Create or update a profile")]
    Set {
        name: String,

        #[arg(long, value_name = "FILE")]
        schema: Option<PathBuf>,

        #[arg(long, value_name = "FILE")]
        graph: Option<PathBuf>,

        #[arg(long, value_name = "BOOL")]
        tolerant: Option<bool>,

        #[arg(long, value_name = "BOOL")]
        validate: Option<bool>,

        #[arg(long, help = "Also make this the default profile")]
        default: bool,
    },

    #[command(about = "Remove a profile")]
    Delete { name: String },

    #[command(about = "Select the default profile")]
    Use { name: String },
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Validate, normalize, and run a query")]
    Query(QueryCmd),

    #[command(about = "Print the normal form of a query")]
    Normalize(SchemaQueryCmd),

    #[command(about = "Report structural problems in a query")]
    Validate(SchemaQueryCmd),

    #[command(about = "Evaluate a standalone expression")]
    Eval(EvalCmd),

    #[command(subcommand, about = "Manage config profiles")]
    Profile(ProfileCmd),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ThemeArg {
    Auto,
    Light,
    Dark,
    Plain,
}

impl From<ThemeArg> for Theme {
    fn from(theme: ThemeArg) -> Self {
        match theme {
            ThemeArg::Auto => Theme::Auto,
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
            ThemeArg::Plain => Theme::Plain,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum VocabularyArg {
    Where,
    Select,
    All,
}

impl VocabularyArg {
    fn engine(self) -> Engine {
        match self {
            VocabularyArg::Where => Engine::for_where(),
            VocabularyArg::Select => Engine::for_select(),
            VocabularyArg::All => Engine::standard(),
        }
    }
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            match err.downcast_ref::<QuarryError>() {
                Some(quarry_err) => eprintln!("error[{}]: {quarry_err}", quarry_err.code()),
                None => eprintln!("error: {err}"),
            }
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quarry=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run() -> Result<i32, Box<dyn Error>> {
    let cli = Cli::parse();
    let ui = Ui::new(cli.theme.into(), cli.quiet);
    let mut config = CliConfig::load(cli.config.clone())?;
    let profile = config.active_profile(cli.profile.as_deref())?.cloned();
    if let Some(profile) = &profile {
        debug!(profile = %profile.name, "using config profile");
    }

    match cli.command {
        Command::Query(cmd) => {
            let schema = load_schema(cmd.docs.schema.as_deref(), &config, profile.as_ref())?;
            let graph_path = resolve_path(
                "graph",
                cmd.graph.as_deref(),
                profile.as_ref().and_then(|p| p.graph.as_deref()),
                config.default_graph().map(PathBuf::as_path),
            )?;
            let graph = Graph::from_value(&read_json_file(&graph_path)?)?;
            let options = StoreOptions {
                tolerate_missing_refs: cmd.tolerant
                    || profile.as_ref().is_some_and(|p| p.tolerate_missing_refs),
                validate: !cmd.no_validate && profile.as_ref().map_or(true, |p| p.validate),
            };
            let query = load_document(&cmd.query)?;
            let store = Store::new(schema, graph, options);

            let start = Instant::now();
            let result = store.query(&query);
            let elapsed = start.elapsed();
            let result = match result {
                Err(QuarryError::Validation(issues)) => {
                    report_issues(&ui, cli.format, &issues)?;
                    return Ok(2);
                }
                other => other?,
            };
            emit(&ui, cli.format, &result)?;
            ui.info(&format!("{} in {}", describe(&result), format_duration(elapsed)));
            if cmd.stats {
                match profile_snapshot(true) {
                    Some(snapshot) => {
                        let value = serde_json::to_value(snapshot)?;
                        if let Value::Object(map) = &value {
                            ui.section(
                                "Stage timings",
                                map.iter().map(|(key, value)| (key.as_str(), value)),
                            );
                        }
                    }
                    None => ui.warn("stage timings need QUARRY_PROFILE=1"),
                }
            }
        }
        Command::Normalize(cmd) => {
            let schema = load_schema(cmd.docs.schema.as_deref(), &config, profile.as_ref())?;
            let normal = quarry::normalize(&schema, &load_document(&cmd.query)?)?;
            emit(&ui, cli.format, &normal.to_value())?;
        }
        Command::Validate(cmd) => {
            let schema = load_schema(cmd.docs.schema.as_deref(), &config, profile.as_ref())?;
            let query = load_document(&cmd.query)?;
            let store = Store::new(schema, Graph::new(), StoreOptions::default());
            let issues = store.validate(&query);
            if !issues.is_empty() {
                report_issues(&ui, cli.format, &issues)?;
                return Ok(2);
            }
            match cli.format {
                OutputFormat::Json => println!("[]"),
                OutputFormat::Text => ui.success("query is valid"),
            }
        }
        Command::Eval(cmd) => {
            let engine = cmd.vocabulary.engine();
            let expr = load_document(&cmd.expr)?;
            let result = match cmd.input.as_deref() {
                Some(input) => engine.apply(&expr, &load_document(input)?)?,
                None => engine.evaluate(&expr)?,
            };
            emit(&ui, cli.format, &result)?;
        }
        Command::Profile(cmd) => run_profile(&ui, &mut config, cmd)?,
    }
    Ok(0)
}

fn run_profile(ui: &Ui, config: &mut CliConfig, cmd: ProfileCmd) -> Result<(), Box<dyn Error>> {
    match cmd {
        ProfileCmd::List => {
            let default = config.default_profile_name().map(str::to_owned);
            let entries = config.profiles().map(|profile| {
                let marker = if default.as_deref() == Some(profile.name.as_str()) {
                    " (default)"
                } else {
                    ""
                };
                format!("{}{marker}: {}", profile.name, describe_profile(profile))
            });
            let entries: Vec<String> = entries.collect();
            if entries.is_empty() {
                ui.info("no profiles configured");
            }
            ui.list("Profiles", entries);
        }
        ProfileCmd::Set {
            name,
            schema,
            graph,
            tolerant,
            validate,
            default,
        } => {
            config.upsert_profile(
                &name,
                ProfileUpdate {
                    schema,
                    graph,
                    tolerate_missing_refs: tolerant,
                    validate,
                },
            )?;
            if default {
                config.set_default_profile(Some(&name))?;
            }
            let path = config.persist()?;
            ui.success(&format!("saved profile '{name}' to {}", path.display()));
        }
        ProfileCmd::Delete { name } => {
            config.delete_profile(&name)?;
            let path = config.persist()?;
            ui.success(&format!("removed profile '{name}' from {}", path.display()));
        }
        ProfileCmd::Use { name } => {
            config.set_default_profile(Some(&name))?;
            let path = config.persist()?;
            ui.success(&format!("default profile is now '{name}' ({})", path.display()));
        }
    }
    Ok(())
}

fn describe_profile(profile: &Profile) -> String {
    let show = |path: &Option<PathBuf>| {
        path.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_owned())
    };
    format!(
        "schema={} graph={} tolerant={} validate={}",
        show(&profile.schema),
        show(&profile.graph),
        profile.tolerate_missing_refs,
        profile.validate
    )
}

fn describe(result: &Value) -> String {
    match result {
        Value::Array(rows) => format!("{} row(s)", rows.len()),
        Value::Null => "no match".to_owned(),
        _ => "1 record".to_owned(),
    }
}

fn load_schema(
    explicit: Option<&Path>,
    config: &CliConfig,
    profile: Option<&Profile>,
) -> Result<Schema, Box<dyn Error>> {
    let path = resolve_path(
        "schema",
        explicit,
        profile.and_then(|p| p.schema.as_deref()),
        config.default_schema().map(PathBuf::as_path),
    )?;
    Ok(Schema::from_value(&read_json_file(&path)?)?)
}

/// Command-line flag first, then the active profile, then the config defaults.
fn resolve_path(
    what: &str,
    explicit: Option<&Path>,
    profile: Option<&Path>,
    fallback: Option<&Path>,
) -> Result<PathBuf, Box<dyn Error>> {
    explicit
        .or(profile)
        .or(fallback)
        .map(Path::to_path_buf)
        .ok_or_else(|| format!("no {what} document given; pass --{what} or configure a profile").into())
}

fn read_json_file(path: &Path) -> Result<Value, Box<dyn Error>> {
    let text = fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    serde_json::from_str(&text)
        .map_err(|err| format!("failed to parse {}: {err}", path.display()).into())
}

/// Reads a JSON argument given as `-` (stdin), an existing file, or inline text.
fn load_document(arg: &str) -> Result<Value, Box<dyn Error>> {
    if arg == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(serde_json::from_str(&text)?);
    }
    let path = Path::new(arg);
    if path.is_file() {
        return read_json_file(path);
    }
    serde_json::from_str(arg).map_err(|err| format!("'{arg}' is neither a file nor JSON: {err}").into())
}

fn report_issues(
    ui: &Ui,
    format: OutputFormat,
    issues: &[quarry::ValidationIssue],
) -> Result<(), Box<dyn Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(issues)?),
        OutputFormat::Text => {
            ui.warn(&format!("query has {} problem(s)", issues.len()));
            ui.list("Issues", issues.iter().map(ToString::to_string));
        }
    }
    Ok(())
}

fn emit(ui: &Ui, format: OutputFormat, value: &Value) -> Result<(), Box<dyn Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => ui.document(value),
    }
    Ok(())
}
