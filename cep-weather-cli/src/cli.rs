use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use cep_weather_core::{Config, Orchestrator, RequestScope};
use clap::{Parser, Subcommand};
use inquire::Password;

use crate::{client, report, web};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "cep-weather", version, about = "Current weather for a Brazilian postal code")]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the lookup over HTTP.
    Serve {
        /// Port to listen on; overrides the config file and PORT.
        #[arg(long)]
        port: Option<u16>,
    },

    /// Resolve a postal code in process and print address and climate.
    Lookup {
        /// Postal code, separators allowed (e.g. 01001-000).
        cep: String,
    },

    /// Print the current temperatures for a city.
    Weather {
        city: String,
    },

    /// Ask a running server for a postal code.
    Query {
        cep: String,

        #[arg(long, default_value = "http://localhost:8080")]
        server: String,

        /// Overall time allowed for the server to answer.
        #[arg(long, default_value_t = 5_000)]
        timeout_ms: u64,
    },

    /// Store the weather API key in the config file.
    Configure,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config_path = self.config;

        match self.command {
            Command::Serve { port } => {
                let config = load_config(config_path.as_deref())?;
                let orchestrator = Orchestrator::from_config(&config)?;
                web::run(orchestrator, port.unwrap_or(config.server.port)).await?;
            }
            Command::Lookup { cep } => {
                let orchestrator = Orchestrator::from_config(&load_config(config_path.as_deref())?)?;
                let merged = orchestrator
                    .lookup(&RequestScope::new(), &cep)
                    .await
                    .context("Lookup failed")?;
                println!("{}", report::merged(&merged));
            }
            Command::Weather { city } => {
                let orchestrator = Orchestrator::from_config(&load_config(config_path.as_deref())?)?;
                let weather = orchestrator
                    .weather_for_city(&RequestScope::new(), &city)
                    .await
                    .context("Weather lookup failed")?;
                println!("{}", report::weather(&city, &weather));
            }
            Command::Query { cep, server, timeout_ms } => {
                let merged = client::query(&server, &cep, Duration::from_millis(timeout_ms)).await?;
                println!("{}", report::merged(&merged));
            }
            Command::Configure => configure(config_path.as_deref())?,
        }

        Ok(())
    }
}

/// File (or platform default) first, then environment overrides.
fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.with_env_overrides()
}

fn configure(path: Option<&Path>) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::config_file_path()?,
    };
    let mut config = Config::load_from(&path)?;

    let api_key = Password::new("WeatherAPI key:")
        .without_confirmation()
        .with_help_message("Get one at https://www.weatherapi.com/")
        .prompt()
        .context("Failed to read API key")?;
    config.set_weather_api_key(api_key.trim().to_string());

    config.save_to(&path)?;
    println!("Configuration saved to {}", path.display());
    Ok(())
}
