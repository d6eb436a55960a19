use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use treetuples::config::{RunConfig, load_configs};
use treetuples::miner::Miner;
use treetuples::stats::{DEFAULT_ROLES, read_tuples, score, write_profiles};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Debug, Parser)]
#[command(name = "treetuples")]
#[command(about = "Mine noun-feature tuples from dependency parses", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Extract tuples from CoNLL-U files, one JSON file per document
    Extract(ExtractArgs),
    /// Score noun-feature associations from extracted tuples
    Score(ScoreArgs),
}

#[derive(Debug, Args)]
struct ExtractArgs {
    /// Run configuration file (one object or an array of runs)
    #[arg(short, long, conflicts_with_all = ["input", "output"])]
    config: Option<PathBuf>,

    /// Glob of CoNLL-U files, possibly gzipped
    #[arg(short, long, required_unless_present = "config")]
    input: Option<String>,

    /// Output directory
    #[arg(short, long, required_unless_present = "config")]
    output: Option<PathBuf>,

    /// Pattern catalogue; the built-in English catalogue by default
    #[arg(short, long)]
    patterns: Option<PathBuf>,

    /// Library to apply, in order (repeatable)
    #[arg(short, long = "library")]
    libraries: Vec<String>,

    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Leave documents whose output already exists
    #[arg(long)]
    skip_existing: bool,
}

impl ExtractArgs {
    fn runs(self) -> Result<Vec<RunConfig>, Box<dyn std::error::Error>> {
        if let Some(path) = &self.config {
            return Ok(load_configs(path)?);
        }
        let (Some(input), Some(output)) = (self.input, self.output) else {
            return Err("--input and --output are required without --config".into());
        };
        let mut run = RunConfig::new(&input, output);
        run.patterns = self.patterns;
        if !self.libraries.is_empty() {
            run.libraries = self.libraries;
        }
        run.threads = self.threads;
        run.skip_existing = self.skip_existing;
        Ok(vec![run])
    }
}

#[derive(Debug, Args)]
struct ScoreArgs {
    /// Directory of extracted `*.json` files
    #[arg(short, long)]
    input: PathBuf,

    /// Directory for `<role>.json` score files
    #[arg(short, long)]
    output: PathBuf,

    /// Role to score (repeatable); adj, agent and patient by default
    #[arg(short, long = "role")]
    roles: Vec<String>,
}

fn extract(args: ExtractArgs) -> Result<bool, Box<dyn std::error::Error>> {
    let mut clean = true;
    for (index, run) in args.runs()?.into_iter().enumerate() {
        if !run.enabled {
            tracing::info!(run = index, "run disabled, skipping");
            continue;
        }
        let catalog = run.catalog()?;
        let miner = Arc::new(Miner::new(&catalog, &run.libraries)?);
        let documents = run.corpus()?.documents();
        if documents.is_empty() {
            tracing::warn!(run = index, input = %run.input, "no input files");
        }

        let summary = miner.run(documents, &run.output_dir, run.skip_existing, run.threads)?;
        tracing::info!(
            run = index,
            written = summary.written,
            skipped = summary.skipped,
            failed = summary.failed,
            tuples = summary.tuples,
            "run finished"
        );
        clean &= summary.failed == 0;
    }
    Ok(clean)
}

fn score_roles(args: ScoreArgs) -> Result<bool, Box<dyn std::error::Error>> {
    let roles: Vec<String> = if args.roles.is_empty() {
        DEFAULT_ROLES.iter().map(|r| r.to_string()).collect()
    } else {
        args.roles
    };
    let tuples = read_tuples(&args.input)?;
    let profiles = score(&tuples, &roles);
    write_profiles(&args.output, &profiles)?;
    Ok(true)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Extract(args) => extract(args),
        Command::Score(args) => score_roles(args),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            tracing::error!(error = %e, "failed");
            ExitCode::FAILURE
        }
    }
}
