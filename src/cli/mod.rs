use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tuberip",
    about = "Tuberip - Convert video URLs into tagged MP3 files",
    version,
    long_about = "A web service and CLI for converting video URLs to MP3. Resolves the best \
available audio stream with yt-dlp, transcodes it with ffmpeg at the requested bitrate and \
writes title/artist/cover-art tags into the result."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP conversion service
    Serve {
        /// Bind address, e.g. 0.0.0.0:5000 (overrides the config file)
        #[arg(short, long, value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Convert a single URL to MP3 from the command line
    Convert {
        /// URL to convert (YouTube or a direct media URL)
        #[arg(value_name = "URL")]
        url: String,

        /// Target bitrate, e.g. 128k, 192k or 320k
        #[arg(short = 'Q', long, value_name = "BITRATE")]
        quality: Option<String>,

        /// Output file path (defaults to the track title in the current directory)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show the resolved configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List supported platforms
    Platforms,
}
