#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use fest_core::config::{EffectiveConfig, resolve_config};
use fest_core::root::find_root;
use output::{CliError, OutputMode, render_error};
use std::env;
use std::path::Path;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "fest: numbered festival plans with lifecycle moves",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Create a festivals root",
        after_help = "EXAMPLES:\n    # Initialize the current directory\n    fest init\n\n    # Initialize a new directory\n    fest init festivals"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        about = "Create a festival with a fresh ID",
        after_help = "EXAMPLES:\n    fest create \"guild usable\"\n    fest create \"guild ui\" --status active"
    )]
    Create(cmd::create::CreateArgs),

    #[command(
        about = "Insert a numbered phase, sequence, or task",
        after_help = "EXAMPLES:\n    # First phase of the festival in the current directory\n    fest insert phase PLANNING --after 0\n\n    # Third task of a sequence\n    fest insert task \"write tests\" --after 2 --dir 001_PLANNING/01_requirements"
    )]
    Insert(cmd::insert::InsertArgs),

    #[command(
        about = "Remove a numbered entry and close the gap",
        after_help = "EXAMPLES:\n    fest remove sequence 2 --dir 001_PLANNING"
    )]
    Remove(cmd::remove::RemoveArgs),

    #[command(
        about = "Renumber entries to 1..N after hand edits",
        after_help = "EXAMPLES:\n    fest renumber task --dir 001_PLANNING/01_requirements"
    )]
    Renumber(cmd::renumber::RenumberArgs),

    #[command(
        about = "Move a festival to another lifecycle status",
        after_help = "EXAMPLES:\n    fest status GU0001 active\n    fest status guild-usable_GU0001 completed --note \"shipped\""
    )]
    Status(cmd::status::StatusArgs),

    #[command(about = "Show a festival's location, registry entry, and history")]
    Show(cmd::show::ShowArgs),

    #[command(about = "List festivals by status")]
    List(cmd::list::ListArgs),

    #[command(about = "Repair the ID registry from the directory tree")]
    Reconcile(cmd::reconcile::ReconcileArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("FEST_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "fest=debug,info"
        } else {
            "fest=info,warn"
        })
    });

    let format = env::var("FEST_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn load_config(cwd: &Path, json: bool) -> anyhow::Result<EffectiveConfig> {
    let root = find_root(cwd).ok();
    resolve_config(root.as_deref(), json)
}

fn run(cli: &Cli, output: OutputMode, config: &EffectiveConfig, cwd: &Path) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, output, cwd),
        Commands::Create(args) => cmd::create::run_create(args, output, cwd),
        Commands::Insert(args) => cmd::insert::run_insert(args, output, cwd),
        Commands::Remove(args) => cmd::remove::run_remove(args, output, cwd),
        Commands::Renumber(args) => cmd::renumber::run_renumber(args, output, cwd),
        Commands::Status(args) => cmd::status::run_status(args, output, &config.project, cwd),
        Commands::Show(args) => cmd::show::run_show(args, output, cwd),
        Commands::List(args) => cmd::list::run_list(args, output, cwd),
        Commands::Reconcile(args) => cmd::reconcile::run_reconcile(args, output, cwd),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let fallback = if cli.json { OutputMode::Json } else { OutputMode::Text };
    let cwd = match env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            report(fallback, &e.into());
            return ExitCode::FAILURE;
        }
    };
    let config = match load_config(&cwd, cli.json) {
        Ok(config) => config,
        Err(e) => {
            report(fallback, &e);
            return ExitCode::FAILURE;
        }
    };
    let output = OutputMode::from_resolved(&config.resolved_output);

    match run(&cli, output, &config, &cwd) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(output, &e);
            ExitCode::FAILURE
        }
    }
}

fn report(output: OutputMode, err: &anyhow::Error) {
    tracing::debug!(error = %format!("{err:#}"), "command failed");
    if let Err(render_err) = render_error(output, &CliError::from(err)) {
        eprintln!("error: {err:#} (and failed to render: {render_err})");
    }
}
