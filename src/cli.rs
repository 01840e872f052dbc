//! Command line interface.

use crate::config::{CONFIG_ENV, CONFIG_FILE, DB_ENV, DB_FILE};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fip-hunter", version, about = "Allocate floating IPs until one lands in a target subnet")]
pub struct Cli {
    /// Config file
    #[arg(short, long, global = true, env = CONFIG_ENV, default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// Stats database
    #[arg(long, global = true, env = DB_ENV, default_value = DB_FILE)]
    pub db: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the allocation loop (default)
    Hunt {
        /// Give up after this many allocations
        #[arg(long)]
        max_attempts: Option<u64>,
        /// Keep hunting after a successful bind
        #[arg(long)]
        no_stop: bool,
    },
    /// Classify addresses against the configured target subnets
    Check {
        #[arg(required = true)]
        ips: Vec<String>,
    },
    /// List the external subnets each account can allocate from
    Subnets,
    /// Allocation counts per target subnet
    Stats,
    /// Recently captured addresses
    Captures {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Write an example config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Hunt {
            max_attempts: None,
            no_stop: false,
        })
    }
}
