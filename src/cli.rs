use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "slidecache")]
#[command(version)]
#[command(about = "Offline library for zip-packaged HTML presentations", long_about = None)]
#[command(after_help = "Examples:\n  \
  slidecache --base-url https://example.test/lib list\n  \
  slidecache --base-url https://example.test/lib fetch demo.zip\n  \
  slidecache --base-url https://example.test/lib export demo.zip -o demo.html")]
pub struct Cli {
    /// Base URL of the remote catalog and archives
    #[arg(long, env = "SLIDECACHE_BASE_URL", value_name = "URL")]
    pub base_url: String,

    /// Directory for downloaded archives
    #[arg(long, env = "SLIDECACHE_STORE_DIR", value_name = "DIR", default_value = ".slidecache")]
    pub store_dir: PathBuf,

    /// Quiet mode (no progress output)
    #[arg(short = 'q')]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List catalog entries with their local status
    List,
    /// Download a presentation into the local store
    Fetch {
        /// Catalog key (the manifest's `file` value)
        key: String,
    },
    /// Delete a downloaded presentation
    Remove {
        /// Catalog key of the stored archive
        key: String,
    },
    /// Resolve a stored presentation into a self-contained HTML file
    Export {
        /// Catalog key of the stored archive
        key: String,

        /// Output file for the rewritten document
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },
}
