use anyhow::Result;
use clap::Parser;
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tuberip::{server, utils, Cli, Commands, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "tuberip=debug,tower_http=debug"
    } else {
        "tuberip=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Check for required external tools (non-fatal, they may appear later in PATH)
    let missing_deps = utils::check_dependencies().await;
    if !missing_deps.is_empty() && !cli.quiet {
        eprintln!("{}", style("Dependency check warnings:").yellow().bold());
        for dep in missing_deps {
            eprintln!("   {} {}", style("•").yellow(), dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }

    let config = Config::load().await?;

    match cli.command {
        Commands::Serve { bind } => {
            let mut config = config;
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            server::serve(config).await?;
        }
        Commands::Convert {
            url,
            quality,
            output,
        } => {
            commands::convert(&config, &url, quality.as_deref(), output, cli.quiet).await?;
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                println!("Edit config.yaml (next to the binary or under your config directory) to change settings.");
                config.display();
            }
        }
        Commands::Platforms => {
            println!("Supported platforms:");
            println!("  • YouTube (youtube.com, youtu.be)");
            println!("  • Direct audio/video URLs (mp3, m4a, wav, flac, ogg, webm, mp4, ...)");
        }
    }

    Ok(())
}

mod commands {
    use std::path::PathBuf;

    use anyhow::{Context, Result};
    use indicatif::{ProgressBar, ProgressStyle};

    use tuberip::pipeline::{ConversionPipeline, Converter};
    use tuberip::{utils, Config};

    /// One-shot conversion using the same pipeline as the HTTP service, with
    /// a temporary directory as scratch storage
    pub async fn convert(
        config: &Config,
        url: &str,
        quality: Option<&str>,
        output: Option<PathBuf>,
        quiet: bool,
    ) -> Result<()> {
        utils::validate_and_normalize_url(url)?;

        let quality = quality.unwrap_or(&config.conversion.default_quality);

        let scratch = tempfile::TempDir::new().context("Failed to create temporary directory")?;
        let mut scratch_config = config.clone();
        scratch_config.storage.download_dir = scratch.path().to_path_buf();

        let pipeline = ConversionPipeline::new(&scratch_config);

        let progress = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .unwrap(),
            );
            bar.enable_steady_tick(std::time::Duration::from_millis(100));
            bar.set_message(format!("Converting {url} at {quality}..."));
            bar
        };

        let artifact = pipeline.process_url(url, quality).await?;

        let destination = output.unwrap_or_else(|| PathBuf::from(&artifact.display_name));
        let size = fs_err::copy(&artifact.path, &destination)?;
        fs_err::remove_file(&artifact.path)?;

        progress.finish_with_message("Conversion complete");
        println!(
            "Saved to: {} ({})",
            destination.display(),
            utils::format_file_size(size)
        );

        Ok(())
    }
}
