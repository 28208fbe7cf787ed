use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Storage settings
    pub storage: StorageConfig,

    /// Conversion settings
    pub conversion: ConversionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding transient download and conversion artifacts
    pub download_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Bitrate used when the request does not specify one
    pub default_quality: String,

    /// Hard limit on a single ffmpeg invocation
    pub transcode_timeout_secs: u64,

    /// Timeout for fetching cover-art thumbnails
    pub artwork_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind: "0.0.0.0:5000".to_string(),
            },
            storage: StorageConfig {
                download_dir: PathBuf::from("downloads"),
            },
            conversion: ConversionConfig {
                default_quality: "192k".to_string(),
                transcode_timeout_secs: 300,
                artwork_timeout_secs: 10,
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("tuberip").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            anyhow::bail!("server.bind must be a socket address like 0.0.0.0:5000");
        }

        if !crate::transcode::is_valid_quality(&self.conversion.default_quality) {
            anyhow::bail!(
                "conversion.default_quality must look like \"128k\", \"192k\" or \"320k\""
            );
        }

        if self.conversion.transcode_timeout_secs == 0 {
            anyhow::bail!("conversion.transcode_timeout_secs must be greater than zero");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Bind Address: {}", self.server.bind);
        println!("  Download Dir: {}", self.storage.download_dir.display());
        println!("  Default Quality: {}", self.conversion.default_quality);
        println!(
            "  Transcode Timeout: {}s",
            self.conversion.transcode_timeout_secs
        );
        println!(
            "  Artwork Timeout: {}s",
            self.conversion.artwork_timeout_secs
        );
    }
}
