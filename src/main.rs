use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tempo::error::Error;
use tempo::manifest::{self, Manifest};
use tempo::report::format_tree;

#[derive(Parser)]
#[command(
    name = "tempo",
    about = "Call-level instrumentation profiler with whole and isolated time attribution",
    version
)]
struct Cli {
    /// Log setup details (overrides RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run instrumentation setup for a manifest without executing anything.
    Check {
        /// Manifest file (defaults to $TEMPO_MANIFEST or ./tempo.toml).
        manifest: Option<PathBuf>,
    },
    /// Print the container tree a manifest produces.
    Tree {
        /// Manifest file (defaults to $TEMPO_MANIFEST or ./tempo.toml).
        manifest: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), Error> {
    match cli.command {
        Commands::Check { manifest } => cmd_check(manifest),
        Commands::Tree { manifest } => cmd_tree(manifest),
    }
}

fn load(path: Option<PathBuf>) -> Result<Manifest, Error> {
    let path = path.unwrap_or_else(manifest::default_path);
    Manifest::load(&path)
}

fn cmd_check(path: Option<PathBuf>) -> Result<(), Error> {
    let inst = load(path)?.instrument()?;
    let skipped = inst.skipped().len();
    anstream::println!(
        "instrumented {} functions in {} containers",
        inst.functions().len(),
        inst.registry().container_count()
    );
    if skipped > 0 {
        eprintln!("skipped {skipped} untimed targets (excluded or class-like)");
    }
    Ok(())
}

fn cmd_tree(path: Option<PathBuf>) -> Result<(), Error> {
    let inst = load(path)?.instrument()?;
    anstream::print!("{}", format_tree(inst.registry()));
    Ok(())
}
