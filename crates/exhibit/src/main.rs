use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use exhibit::{Exhibit, ExhibitError, WeatherConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "exhibit")]
#[command(about = "Weather exhibit: show forecasts for configured cities")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the configured selections
    List,
    /// Select each key in order and print the resulting display text
    Show {
        /// Selection keys, e.g. `tokyo`
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Press the power button a number of times
    Toggle {
        /// Number of presses
        #[arg(long, default_value_t = 1)]
        times: u32,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<WeatherConfig, ExhibitError> {
    match path {
        Some(path) => Ok(WeatherConfig::from_path(path)?),
        None => Ok(WeatherConfig::default()),
    }
}

async fn run(cli: Cli) -> Result<(), ExhibitError> {
    let config = load_config(cli.config.as_ref())?;
    let exhibit = Exhibit::from_config(&config)?;

    match cli.command {
        Commands::List => {
            if exhibit.catalog().is_empty() {
                println!("No selections configured.");
            }
            for entity in exhibit.catalog() {
                println!(
                    "{:<12} {:<20} {:>9.4} {:>9.4}",
                    entity.key, entity.label, entity.latitude, entity.longitude
                );
            }
        }
        Commands::Show { keys } => {
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                exhibit.select_key(key).await?;
                println!("{}", exhibit.display_text().get());
            }
        }
        Commands::Toggle { times } => {
            let _printer = exhibit.power().power_on().subscribe_scoped(|on| {
                println!("power: {}", if *on { "on" } else { "off" });
            });
            for _ in 0..times {
                exhibit.request_toggle();
            }
        }
    }

    exhibit.shutdown();
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(target: "exhibit", error = %e, "exhibit failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
