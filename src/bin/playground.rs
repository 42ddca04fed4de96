use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use playgrounds::client::ApiClient;
use playgrounds::config::PlaygroundConfig;
use playgrounds::highlight::{self, DEFAULT_PREVIEW_FILE};
use playgrounds::logging;
use playgrounds::race::{self, Mode, RaceReport};
use playgrounds::value_semantics::{copy_then_rename, ObjectKind};

#[derive(Parser)]
#[command(name = "playground", about = "Concurrency and copy-semantics playgrounds")]
struct Cli {
    /// Path to a TOML config file (defaults to ./playgrounds.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Two threads appending into one shared sequence
    Race {
        #[arg(long, value_enum, default_value_t = Mode::Synchronized)]
        mode: Mode,

        /// Appends per task
        #[arg(long)]
        count: Option<usize>,

        /// Length of the pre-seeded sequence
        #[arg(long)]
        seed: Option<usize>,

        /// Read after a fixed delay instead of waiting for both tasks
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Copy an object, rename the copy, print both names
    Copy {
        #[arg(long, value_enum, default_value = "value")]
        kind: ObjectKind,

        #[arg(long, default_value = "what")]
        name: String,
    },

    /// Log in against the configured API
    Login {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,

        #[arg(long)]
        base_url: Option<String>,
    },

    /// Render a code snippet to an HTML preview page
    Preview {
        code: String,

        #[arg(long, default_value = DEFAULT_PREVIEW_FILE)]
        out: PathBuf,
    },
}

fn print_report(report: &RaceReport) {
    println!("{} {}", "Mode:".bold(), report.mode);
    println!("  initial length:  {}", report.initial_len);
    println!("  expected length: {}", report.expected_len);
    println!("  final length:    {}", report.final_len);

    if report.invariant_holds() {
        println!("  {}", "no updates lost".green());
    } else {
        println!(
            "  {}",
            format!("{} updates lost", report.lost_updates).red().bold()
        );
    }
    println!("  {:?}", report.contents);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = PlaygroundConfig::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;
    logging::init(cli.verbose, &config.log);

    match cli.command {
        Commands::Race {
            mode,
            count,
            seed,
            delay_ms,
            json,
        } => {
            if let Some(count) = count {
                config.race.count = count;
            }
            if let Some(seed) = seed {
                config.race.seed_len = seed;
            }
            if delay_ms.is_some() {
                config.race.delay_ms = delay_ms;
            }

            let race_config = config.race.clone();
            let report = tokio::task::spawn_blocking(move || race::run(mode, &race_config))
                .await
                .context("race demo task failed")??;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }

        Commands::Copy { kind, name } => {
            let (first, second) = copy_then_rename(kind, &name);
            println!("{first} {second}");
        }

        Commands::Login {
            email,
            password,
            base_url,
        } => {
            if let Some(base_url) = base_url {
                config.client.base_url = base_url;
            }
            let client = ApiClient::from_settings(&config.client)?;

            match client.login(&email, &password).await {
                Ok(()) => println!("{}", "logged in successfully!".green()),
                Err(e) => println!("{} {}", "there was an error:".red(), e),
            }
        }

        Commands::Preview { code, out } => {
            highlight::write_preview(&code, &out)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("{} {}", "Preview written to".green(), out.display());
        }
    }

    Ok(())
}
