use academic_tracker::{
    report::{DEFAULT_RECENT_DAYS, DEFAULT_TOP_INSTITUTIONS},
    run_health_check, run_scan, Config, HttpFetcher, Store,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;

#[derive(Debug, Parser)]
#[command(version, about = "Tracks PhD and postdoc openings on career pages and LinkedIn")]
struct Cli {
    /// TOML config; built-in defaults are used when the file does not exist
    #[arg(short, long, default_value = "tracker.toml")]
    config: PathBuf,

    /// Overrides the database path from the config
    #[arg(short, long)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check every site, extract postings and store them
    Scan {
        /// Only scan the site with this name
        #[arg(long)]
        site: Option<String>,
        #[arg(long)]
        skip_linkedin: bool,
    },
    /// Only record website health
    Check,
    /// Print aggregate counts as JSON
    Summary {
        #[arg(long, default_value_t = DEFAULT_TOP_INSTITUTIONS)]
        top: u32,
        #[arg(long, default_value_t = DEFAULT_RECENT_DAYS)]
        days: i64,
    },
    /// Print the overall store status as JSON
    Health,
    /// Print the most recently posted opportunities
    Recent {
        #[arg(long, default_value_t = 20)]
        limit: u32,
        #[arg(long)]
        json: bool,
    },
    /// Write the default config to the config path
    InitConfig {
        #[arg(long)]
        force: bool,
    },
}

async fn load_config(path: &Path) -> Result<Config, academic_tracker::TrackerError> {
    if path.is_file() {
        Config::load(path).await
    } else {
        warn!("{} not found, using built-in defaults", path.display());
        Ok(Config::default())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| {
                "info,html5ever=error,selectors=error,hyper=warn,reqwest=info,sqlx=warn".into()
            }),
        )
        .with(ErrorLayer::default())
        .init();

    let cli = Cli::parse();

    let mut config = match cli.command {
        Command::InitConfig { .. } => Config::default(),
        _ => load_config(&cli.config).await?,
    };
    if let Some(database) = cli.database {
        config.database = database;
    }

    match cli.command {
        Command::Scan {
            site,
            skip_linkedin,
        } => {
            if let Some(name) = site {
                config.sites = vec![config.site(&name)?.clone()];
            }
            if skip_linkedin {
                config.linkedin.enabled = false;
            }
            let store = Store::open(&config.database).await?;
            let fetcher = HttpFetcher::new(&config.http)?;
            run_scan(&fetcher, &store, &config).await?;
        }
        Command::Check => {
            let store = Store::open(&config.database).await?;
            let fetcher = HttpFetcher::new(&config.http)?;
            let report = run_health_check(&fetcher, &store, &config).await?;
            info!("{}", report);
        }
        Command::Summary { top, days } => {
            let store = Store::open(&config.database).await?;
            let summary = store.summary(top, days).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Health => {
            let store = Store::open(&config.database).await?;
            let health = store.system_health().await;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Command::Recent { limit, json } => {
            let store = Store::open(&config.database).await?;
            let postings = store.recent_postings(limit).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&postings)?);
            } else {
                for posting in postings {
                    println!("{}\n", posting);
                }
            }
        }
        Command::InitConfig { force } => {
            if cli.config.exists() && !force {
                return Err(format!("{} already exists, pass --force", cli.config.display()).into());
            }
            tokio::fs::write(&cli.config, Config::default().to_toml()?).await?;
            info!("Wrote {}", cli.config.display());
        }
    }

    Ok(())
}
