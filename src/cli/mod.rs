//! Command-line interface.

pub mod doctor;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use self::doctor::run_doctor_command;

#[derive(Parser, Debug)]
#[command(name = "pyra", version, about = "Guarded voice-command pipeline for on-chain transfers")]
pub struct Cli {
    /// TOML config file (default: ~/.pyra/config.toml)
    #[arg(long, short, global = true, env = "PYRA_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Interactive session in the terminal (default)
    Repl,
    /// Run the HTTP gateway
    Serve {
        /// Override the configured bind address, e.g. 0.0.0.0:3000
        #[arg(long)]
        bind: Option<String>,
    },
    /// Check configuration and provider connectivity
    Doctor {
        /// Exit non-zero when any check fails
        #[arg(long)]
        strict: bool,
    },
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Repl)
    }
}
