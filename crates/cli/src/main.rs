use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use cli::logging;
use cli::prompt::{self, Preset};
use std::io;
use vidprep_core::candidates::load_candidate_tags;
use vidprep_core::config::{self, AppConfig};
use vidprep_core::pipeline::{Pipeline, RunSummary};
use vidprep_core::report::Reporter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;
    logging::init(&cfg.logging)?;

    match cli.command.unwrap_or_default() {
        Commands::Run(args) => run(cfg, args).await,
        Commands::Candidates { json } => candidates(cfg, json),
    }
}

#[derive(Parser)]
#[command(name = "vidprep")]
#[command(about = "Incremental video thumbnail, preview clip and tag pipeline", long_about = None)]
struct Cli {
    /// Path to a config file (defaults to config/default.* when present)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate missing previews and tags, then reconcile against the video directory
    Run(RunArgs),
    /// Print the candidate tag vocabulary the classifier would be offered
    Candidates {
        /// Output a JSON array
        #[arg(long)]
        json: bool,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Run(RunArgs::default())
    }
}

#[derive(Args, Default)]
struct RunArgs {
    /// Generate thumbnails and GIF previews (asked when omitted)
    #[arg(long, value_name = "BOOL")]
    thumbnails: Option<bool>,
    /// Generate tags (asked when omitted)
    #[arg(long, value_name = "BOOL")]
    tags: Option<bool>,
    /// Back up, then clear generated previews and the tag ledger (asked when omitted)
    #[arg(long, value_name = "BOOL")]
    clear_cache: Option<bool>,
    /// Answer yes to generation and no to clearing without asking
    #[arg(short, long)]
    yes: bool,
    /// Output JSON summary
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    fn preset(&self) -> Preset {
        Preset {
            thumbnails: self.thumbnails,
            tags: self.tags,
            clear_cache: self.clear_cache,
            yes: self.yes,
        }
    }
}

async fn run(cfg: AppConfig, args: RunArgs) -> Result<()> {
    let options = {
        let mut input = io::stdin().lock();
        let mut output = io::stderr();
        prompt::resolve_options(args.preset(), &mut input, &mut output)?
    };

    let pb = if args.json {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )?
            .progress_chars("#>-"),
        );
        pb
    };

    let pipeline = Pipeline::with_defaults(cfg, Reporter::new("pipeline")).with_progress(pb);
    let summary = pipeline
        .run(options)
        .await
        .context("media processing aborted")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "processed {}/{} videos in {:.2}s: {} completed, {} skipped, {} failed",
        summary.tagged,
        summary.total,
        summary.elapsed_secs,
        summary.completed,
        summary.skipped,
        summary.failed
    );
    if summary.pruned_artifacts > 0 || summary.pruned_ledger_rows > 0 {
        println!(
            "removed {} orphaned files and {} orphaned tag rows",
            summary.pruned_artifacts, summary.pruned_ledger_rows
        );
    }
    if let Some(backup) = &summary.backup {
        println!("backup: {}", backup.display());
    }
    if summary.warnings > 0 || summary.errors > 0 {
        println!("{} warnings, {} errors", summary.warnings, summary.errors);
    }
}

fn candidates(cfg: AppConfig, json: bool) -> Result<()> {
    let tags = load_candidate_tags(
        &cfg.paths.candidate_tags_file,
        &cfg.paths.exclusions_file,
        &Reporter::new("candidates"),
    );
    if json {
        println!("{}", serde_json::to_string_pretty(tags.as_slice())?);
    } else {
        for tag in tags.iter() {
            println!("{tag}");
        }
    }
    Ok(())
}
