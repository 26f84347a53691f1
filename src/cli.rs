use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dvfix")]
#[command(
    author,
    version,
    about = "Repair Dolby Vision RPU metadata after transcoding"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Copy the RPU of the original file into a transcoded copy
    Fix {
        /// Transcoded file to repair
        #[arg(required = true)]
        working: PathBuf,

        /// Source file with the intact Dolby Vision RPU
        #[arg(long, required = true)]
        original: PathBuf,

        /// Where to write the repaired file (default: the working file, as .mkv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory for intermediate files (default: a fresh temp directory)
        #[arg(long)]
        temp_dir: Option<PathBuf>,

        /// Remove HDR10+ metadata (fixes black screens on some devices)
        #[arg(long)]
        remove_hdr10plus: bool,

        /// Keep the file being replaced, renamed to this extension
        #[arg(long, value_name = "EXT")]
        backup: Option<String>,
    },

    /// Probe a media file and show what the pipeline would see
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },
}
