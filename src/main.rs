use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use parsr_batch::{Config, ParsrClient, SkipMatch};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Batch-parse a directory of documents with a Parsr container.
#[derive(Debug, Parser)]
#[command(name = "parsr-batch", version, about)]
struct Cli {
    /// TOML settings file; CLI flags override its values.
    #[arg(global = true, long, value_name = "TOML")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the service, parse every document under the input directory, stop the service.
    Run(RunArgs),
    /// Print the dependency report of an already running service.
    Check,
    /// Fetch the service's default parser configuration.
    DefaultConfig {
        /// Write to this file instead of stdout.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Directory tree containing the documents.
    #[arg(long, value_name = "DIR")]
    input: Option<PathBuf>,
    /// Directory receiving one folder per parsed document.
    #[arg(long, value_name = "DIR")]
    output: Option<PathBuf>,
    /// Parser configuration sent with every submission.
    #[arg(long, value_name = "FILE")]
    parser_config: Option<PathBuf>,
    /// Accepted input extension (repeatable).
    #[arg(long = "ext", value_name = "EXT")]
    extensions: Vec<String>,
    /// Submissions per file before giving up.
    #[arg(long)]
    attempts: Option<u32>,
    /// Per-attempt poll deadline in seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
    /// How existing output folders are matched against file stems.
    #[arg(long, value_enum)]
    skip_match: Option<SkipMatchArg>,
    /// Leave an empty output folder for files that failed for good.
    #[arg(long)]
    mark_failed: bool,
    /// Skip the structured JSON artifact.
    #[arg(long)]
    no_json: bool,
    /// Skip the zipped Markdown artifact.
    #[arg(long)]
    no_markdown: bool,
    /// Skip the plain text artifact.
    #[arg(long)]
    no_text: bool,
    /// Skip the CSV artifact.
    #[arg(long)]
    no_csv: bool,
    /// Print the per-file summary as JSON on stdout.
    #[arg(long)]
    json_summary: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SkipMatchArg {
    Exact,
    Substring,
}

impl From<SkipMatchArg> for SkipMatch {
    fn from(arg: SkipMatchArg) -> Self {
        match arg {
            SkipMatchArg::Exact => SkipMatch::Exact,
            SkipMatchArg::Substring => SkipMatch::Substring,
        }
    }
}

impl RunArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(input) = &self.input {
            config.batch.input_dir = input.clone();
        }
        if let Some(output) = &self.output {
            config.batch.output_dir = output.clone();
        }
        if let Some(parser_config) = &self.parser_config {
            config.batch.parser_config = parser_config.clone();
        }
        if !self.extensions.is_empty() {
            config.batch.allowed_extensions = self
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .collect();
        }
        if let Some(attempts) = self.attempts {
            config.processing.attempt_limit = attempts;
        }
        if let Some(timeout) = self.timeout {
            config.processing.poll_timeout = Duration::from_secs(timeout);
        }
        if let Some(mode) = self.skip_match {
            config.batch.skip_match = mode.into();
        }
        config.batch.mark_failed |= self.mark_failed;
        config.artifacts.json &= !self.no_json;
        config.artifacts.markdown &= !self.no_markdown;
        config.artifacts.text &= !self.no_text;
        config.artifacts.csv &= !self.no_csv;
    }
}

fn init_tracing() {
    // LOG_LEVEL is honoured for compatibility when RUST_LOG is unset
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(settings: Option<&PathBuf>) -> parsr_batch::Result<Config> {
    match settings {
        Some(path) => Config::from_file(path),
        None => Ok(Config::default()),
    }
}

async fn execute(cli: Cli) -> parsr_batch::Result<()> {
    let mut config = load_config(cli.settings.as_ref())?;

    match cli.command {
        Command::Run(args) => {
            args.apply(&mut config);
            config.validate()?;

            let Some(summary) = parsr_batch::run_with_shutdown(&config).await? else {
                return Ok(());
            };
            info!(
                succeeded = summary.succeeded(),
                failed = summary.failed(),
                skipped = summary.skipped(),
                "Batch finished"
            );
            if args.json_summary {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
        }
        Command::Check => {
            let client = ParsrClient::from_config(&config.service)?;
            let report = client.check_installation().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::DefaultConfig { out } => {
            let client = ParsrClient::from_config(&config.service)?;
            let parser_config = serde_json::to_string_pretty(&client.default_config().await?)?;
            match out {
                Some(path) => {
                    tokio::fs::write(&path, parser_config).await?;
                    info!(path = %path.display(), "Default parser configuration written");
                }
                None => println!("{parser_config}"),
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, code = e.error_code(), "parsr-batch failed");
            ExitCode::FAILURE
        }
    }
}
