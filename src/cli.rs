use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::BridgeConfig;

#[derive(Parser, Debug)]
#[command(name = "docbridge")]
#[command(version)]
#[command(about = "Blocking save/load/unzip calls served by a document picker", long_about = None)]
#[command(after_help = "Examples:\n  \
  docbridge save pilot.txt --input pilot.txt      ask where to save pilot.txt\n  \
  docbridge --pick saves/pilot.txt load           load a file without prompting\n  \
  docbridge unzip plugins/                        pick an archive and extract it")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Answer every picker request with this document instead of prompting
    #[arg(long, value_name = "HANDLE", global = true, conflicts_with = "cancel")]
    pub pick: Option<String>,

    /// Cancel every picker request instead of prompting
    #[arg(long, global = true)]
    pub cancel: bool,

    /// Name used in failure notices
    #[arg(long, value_name = "NAME", global = true)]
    pub app_name: Option<String>,

    /// Verbose logging
    #[arg(short = 'v', global = true)]
    pub verbose: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count, global = true)]
    pub quiet: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ask for a destination and save data there
    Save {
        /// Suggested document name
        #[arg(value_name = "NAME")]
        name: String,

        /// Read the data from this file instead of stdin
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// MIME type announced to the picker
        #[arg(long, value_name = "TYPE")]
        mime: Option<String>,
    },

    /// Ask for a document and print its contents
    Load {
        /// Text shown by the picker
        #[arg(long, default_value = "Choose a file")]
        prompt: String,

        /// MIME type filter
        #[arg(long, value_name = "TYPE", default_value = "*/*")]
        mime: String,

        /// Write the contents here instead of stdout
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Ask for a ZIP archive and extract it into a directory
    Unzip {
        /// Destination directory
        #[arg(value_name = "DIR")]
        destination: PathBuf,

        /// Text shown by the picker
        #[arg(long, default_value = "Choose an archive")]
        prompt: String,
    },
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Default `tracing` filter for the chosen verbosity.
    pub fn log_filter(&self) -> &'static str {
        if self.is_very_quiet() {
            "error"
        } else if self.is_quiet() {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        let mut config = BridgeConfig::default();
        if let Some(name) = &self.app_name {
            config = config.with_app_name(name.clone());
        }
        if let Command::Save { mime: Some(mime), .. } = &self.command {
            config = config.with_save_mime_type(mime.clone());
        }
        config
    }
}
