use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use locale_sync::changes::{GitRevisionSource, SnapshotRevisionSource};
use locale_sync::config::Config;
use locale_sync::pipeline::{Pipeline, RunOptions};
use locale_sync::provider::ChatCompletionProvider;
use locale_sync::validator::ConsistencyValidator;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "locale-sync")]
#[command(about = "Keep locale files in sync with the source locale")]
struct Cli {
    /// Project root holding the localizations directory and index manifest
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate keys changed in the last commit of the source locale
    Translate {
        /// Do not write files; only show what would be translated
        #[arg(long)]
        dry_run: bool,
        /// Translate only this locale code (e.g. de_DE)
        #[arg(long, short = 'l', value_name = "CODE")]
        locale: Option<String>,
        /// Diff against this snapshot of the source file instead of git
        #[arg(long, value_name = "FILE")]
        previous: Option<PathBuf>,
    },
    /// Check locale files and the index manifest for consistency
    Check,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file (ignored in CI)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("locale_sync=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?.with_root(&cli.root);

    match cli.command {
        Commands::Translate {
            dry_run,
            locale,
            previous,
        } => {
            let api_key = config.require_api_key()?;
            let provider = ChatCompletionProvider::from_config(&config, api_key)
                .context("Failed to build HTTP client")?;
            let options = RunOptions {
                dry_run,
                only_locale: locale,
            };

            let summary = match previous {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    let revisions = SnapshotRevisionSource::new(Some(text));
                    Pipeline::new(&config, &provider, &revisions).run(&options).await?
                }
                None => {
                    let revisions = GitRevisionSource::new(&cli.root);
                    Pipeline::new(&config, &provider, &revisions).run(&options).await?
                }
            };

            info!(
                "Translated {} locale(s), skipped {}",
                summary.translated_count(),
                summary.skipped.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check => {
            let report = ConsistencyValidator::new(&config).validate()?;
            for line in report.lines() {
                println!("{}", line);
            }

            if report.is_success() {
                info!("All locale files are consistent");
                Ok(ExitCode::SUCCESS)
            } else {
                warn!("Found {} problem(s)", report.diagnostics.len());
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
