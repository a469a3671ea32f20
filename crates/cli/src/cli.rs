// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::helpers::telemetry::setup_tracing;
use crate::{config_print, simulate};
use anyhow::Result;
use ciphersum_config::{load_config, AppConfig};
use ciphersum_data::SledDb;
use clap::{ArgAction, Parser, Subcommand};
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "ciphersum")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_SHA"), ")"))]
#[command(
    about = "Encrypted gradient aggregation with oracle verified decryption",
    long_about = None
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,

    /// Indicate error levels by adding additional `-v` arguments. Eg. `ciphersum -vvv` will give
    /// you trace level output
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true
    )]
    pub verbose: u8,

    /// Silence all output. This argument cannot be used alongside `-v`
    #[arg(
        short,
        long,
        action = ArgAction::SetTrue,
        conflicts_with = "verbose",
        global = true
    )]
    quiet: bool,
}

impl Cli {
    pub fn log_level(&self) -> Level {
        if self.quiet {
            Level::ERROR
        } else {
            match self.verbose {
                0 => Level::WARN,  //
                1 => Level::INFO,  // -v
                2 => Level::DEBUG, // -vv
                _ => Level::TRACE, // -vvv
            }
        }
    }

    pub async fn execute(self) -> Result<()> {
        setup_tracing(self.log_level());
        let config = self.load_config()?;
        info!("Config loaded from: {:?}", config.config_file());

        match self.command {
            Commands::Simulate { values, samples } => {
                simulate::execute(&config, values, samples).await?
            }
            Commands::Config => config_print::execute(&config)?,
        }

        SledDb::close_all_connections();
        Ok(())
    }

    pub fn load_config(&self) -> Result<AppConfig> {
        load_config(self.config.clone())
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a full aggregation round in process and print the decrypted aggregate
    Simulate {
        /// One plaintext value per provider, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        values: Vec<u64>,

        /// Sample count for each provider, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        samples: Vec<u64>,
    },

    /// Print the resolved configuration
    Config,
}
