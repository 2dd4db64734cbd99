use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};

use crate::log;

type LogLevelDefault = InfoLevel;

/// DNS forwarding resolver with database backed zones.
#[derive(Parser, Debug)]
#[command(author, version=crate::version(), about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    verbose: Verbosity<LogLevelDefault>,
}

impl Cli {
    pub fn log_level(&self) -> Option<log::Level> {
        self.verbose
            .log_level()
            .map(|s| s.to_string())
            .and_then(|s| log::Level::from_str(&s).ok())
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load the configuration, open the zone providers and print a summary.
    Check {
        /// Config file
        #[arg(short = 'c', long)]
        conf: PathBuf,
    },

    /// Answer one query through the zones and the forwarding resolvers.
    Resolve {
        /// Config file
        #[arg(short = 'c', long)]
        conf: PathBuf,

        /// Domain name to look up
        name: String,

        /// Record type
        #[arg(default_value = "A")]
        record_type: String,

        /// Forward over TCP regardless of the resolver settings
        #[arg(long)]
        tcp: bool,
    },
}
