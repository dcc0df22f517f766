use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use metaimport_core::config::{CONFIG_FILENAME, ImportConfig, load_config};
use metaimport_core::import::run_batch;
use metaimport_core::loader::load_batch;
use metaimport_core::output;
use metaimport_core::store::WordPressClient;

#[derive(Debug, Parser)]
#[command(
    name = "metaimport",
    version,
    about = "Bulk import post metadata for URLs from CSV or JSON files"
)]
struct Cli {
    #[arg(
        value_name = "FILE",
        help = "Input file to parse (.csv or .json), relative to the configured root"
    )]
    file: PathBuf,
    #[arg(
        long,
        overrides_with = "no_dry_run",
        help = "Report on changes without saving them (default)"
    )]
    dry_run: bool,
    #[arg(long, help = "Save changes to the store")]
    no_dry_run: bool,
    #[arg(long, help = "Confirm running without prompt")]
    yes: bool,
    #[arg(
        long,
        value_name = "PATH",
        help = "Directory input file paths are resolved against"
    )]
    root: Option<PathBuf>,
    #[arg(
        long,
        value_name = "PATH",
        help = "Config file path (default: <root>/metaimport.toml)"
    )]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let dry_run = cli.dry_run || !cli.no_dry_run;

    // The config file may itself name the root, so it is located with the
    // flag/env root first and its [paths] section then refines the result.
    let flag_root = cli.root.as_deref();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| ImportConfig::default().root(flag_root).join(CONFIG_FILENAME));
    let config = load_config(&config_path)?;
    let root = config.root(flag_root);
    let input_path = root.join(&cli.file);

    let batch = load_batch(&input_path)?;
    output::log(&format!("{} detected records to process", batch.len()));

    if !cli.yes {
        confirm(&format!(
            "Are you ready to process {} records?",
            batch.len()
        ))?;
    }

    if dry_run {
        output::warning("Executing as dry run");
    } else {
        output::warning("Executing WITHOUT dry run.");
    }

    let mut store = WordPressClient::from_config(&config)?;
    if !dry_run && !store.has_credentials() {
        bail!("live mode requires WP_APP_USER and WP_APP_PASS (or [store] credentials in {CONFIG_FILENAME})");
    }

    output::log(&format!("Processing {} records...", batch.len()));
    let counters = run_batch(&batch, &mut store, dry_run);

    println!("{}", "Finished.".green());
    output::log(&counters.summary(dry_run));
    if counters.meta_updated > 400 {
        output::log("Please allow some time for post-execution cleanup.");
    }

    Ok(())
}

fn confirm(question: &str) -> Result<()> {
    print!("{question} [y/n] ");
    io::stdout().flush().context("failed to flush stdout")?;
    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .context("failed to read confirmation answer")?;
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Ok(()),
        _ => bail!("aborted"),
    }
}
