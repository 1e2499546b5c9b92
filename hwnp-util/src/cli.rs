use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "hwnp-util")]
#[command(about = "HWNP firmware image utility", long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Display header information
    Info {
        /// Path to the firmware image
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,
    },

    /// List the sections of an image
    List {
        /// Path to the firmware image
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,
    },

    /// Extract every section to a directory
    Extract {
        /// Path to the firmware image
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        /// Output directory (defaults to the image name without extension)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Hex dump the header or a section payload
    Dump {
        /// Path to the firmware image
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        /// Section index to dump instead of the header
        #[arg(short, long, value_name = "INDEX")]
        section: Option<usize>,

        /// Maximum number of bytes to print
        #[arg(short, long, value_name = "N", default_value_t = 512)]
        max_bytes: usize,
    },

    /// Modify an image and write the result
    Edit {
        /// Path to the firmware image
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        /// Output path for the modified image
        #[arg(short, long, value_name = "OUT")]
        output: PathBuf,

        /// Replace the product ID list, e.g. "120|130"
        #[arg(long, value_name = "IDS")]
        product_ids: Option<String>,

        /// Replace a section payload with the contents of a file
        #[arg(long, value_name = "INDEX=FILE")]
        replace: Vec<String>,

        /// Set a flag section to hex bytes, e.g. "1=01"
        #[arg(long, value_name = "INDEX=HEX")]
        flag: Vec<String>,

        /// Toggle a single upgrade check
        #[arg(long, value_name = "NAME=on|off")]
        check: Vec<String>,

        /// Toggle every upgrade check
        #[arg(long, value_name = "on|off")]
        all_checks: Option<String>,
    },
}
