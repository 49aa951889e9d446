//! Configuration for the donation tracker

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::constants;

// =============================================================================
// File-based Configuration (config.toml)
// =============================================================================

/// Configuration loaded from config.toml
#[derive(Debug, Deserialize)]
pub struct FileConfig {
    pub paypal: PayPalConfig,
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub upload: Option<UploadConfig>,
    #[serde(default)]
    pub data: DataConfig,
}

/// PayPal NVP API credentials
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayPalConfig {
    pub endpoint: String,
    pub user: String,
    pub password: String,
    pub signature: String,
}

/// Exchange rate API settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExchangeConfig {
    pub access_key: String,
    /// Override for the rate endpoint (defaults to fixer.io)
    #[serde(default)]
    pub url: Option<String>,
}

/// Object storage settings for publishing donations.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

/// Locations of the side files kept next to the batch data
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataConfig {
    /// Adjustments CSV pattern, `{year}` is substituted
    #[serde(default)]
    pub adjustments_pattern: Option<String>,
    #[serde(default)]
    pub donors_file: Option<String>,
}

impl FileConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Config file '{}' not found.\n\n\
                To get started:\n\
                1. Copy config.toml.example to config.toml\n\
                2. Fill in your PayPal, fixer.io and CDN credentials\n\n\
                See config.toml.example for the required format.",
                path.display()
            );
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| {
            "Failed to parse config.toml. Check for:\n\
             - Missing sections ([paypal], [exchange])\n\
             - Invalid TOML syntax (missing quotes, brackets, etc.)\n\n\
             See config.toml.example for the expected format."
        })
    }

    /// Check that every credential needed for a run is present.
    ///
    /// All problems are reported together so a broken config can be fixed in
    /// one pass. Upload credentials are only required when `needs_upload`.
    pub fn validate(&self, needs_upload: bool) -> Result<()> {
        let mut problems = Vec::new();

        let paypal = &self.paypal;
        if paypal.endpoint.is_empty() {
            problems.push("no PayPal endpoint was provided");
        }
        if paypal.user.is_empty() {
            problems.push("no PayPal user was provided");
        }
        if paypal.password.is_empty() {
            problems.push("no PayPal password was provided");
        }
        if paypal.signature.is_empty() {
            problems.push("no PayPal signature was provided");
        }
        if self.exchange.access_key.is_empty() {
            problems.push("no fixer.io access key was provided");
        }

        if needs_upload {
            match &self.upload {
                None => problems.push("no [upload] section was provided"),
                Some(upload) => {
                    if upload.access_key_id.is_empty() {
                        problems.push("no upload access key ID was provided");
                    }
                    if upload.secret_access_key.is_empty() {
                        problems.push("no upload secret access key was provided");
                    }
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("Invalid configuration: {}", problems.join(", "))
        }
    }
}

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Resolved upload target
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub host: String,
    pub bucket: String,
    pub key: String,
    pub region: String,
}

/// Configuration handed to the reconciliation driver and its collaborators
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding batch files, summary snapshots and side files
    pub data_dir: PathBuf,
    pub paypal: PayPalConfig,
    /// Full exchange rate URL without the access key
    pub exchange_url: String,
    pub exchange_access_key: String,
    pub upload: Option<UploadTarget>,
    adjustments_pattern: String,
    donors_file: String,
}

impl Config {
    /// Create config from file config and the data directory chosen on the command line
    pub fn from_file(file_config: &FileConfig, data_dir: PathBuf) -> Self {
        let upload = file_config.upload.as_ref().map(|u| UploadTarget {
            access_key_id: u.access_key_id.clone(),
            secret_access_key: u.secret_access_key.clone(),
            host: u
                .host
                .clone()
                .unwrap_or_else(|| constants::DEFAULT_UPLOAD_HOST.to_string()),
            bucket: u
                .bucket
                .clone()
                .unwrap_or_else(|| constants::DEFAULT_UPLOAD_BUCKET.to_string()),
            key: u
                .key
                .clone()
                .unwrap_or_else(|| constants::DEFAULT_UPLOAD_KEY.to_string()),
            region: u
                .region
                .clone()
                .unwrap_or_else(|| constants::DEFAULT_UPLOAD_REGION.to_string()),
        });

        Self {
            data_dir,
            paypal: file_config.paypal.clone(),
            exchange_url: file_config
                .exchange
                .url
                .clone()
                .unwrap_or_else(|| constants::FIXER_IO_URL.to_string()),
            exchange_access_key: file_config.exchange.access_key.clone(),
            upload,
            adjustments_pattern: file_config
                .data
                .adjustments_pattern
                .clone()
                .unwrap_or_else(|| constants::DEFAULT_ADJUSTMENTS_PATTERN.to_string()),
            donors_file: file_config
                .data
                .donors_file
                .clone()
                .unwrap_or_else(|| constants::DEFAULT_DONORS_FILE.to_string()),
        }
    }

    /// Config rooted at a data directory with no credentials, for offline use and tests
    #[cfg(test)]
    pub fn offline(data_dir: PathBuf) -> Self {
        Self::from_file(
            &FileConfig {
                paypal: PayPalConfig::default(),
                exchange: ExchangeConfig::default(),
                upload: None,
                data: DataConfig::default(),
            },
            data_dir,
        )
    }

    /// Path of the one-off adjustments CSV for a year
    pub fn adjustments_path(&self, year: i32) -> PathBuf {
        self.data_dir
            .join(self.adjustments_pattern.replace("{year}", &year.to_string()))
    }

    /// Path of the donor preferences file
    pub fn donors_path(&self) -> PathBuf {
        self.data_dir.join(&self.donors_file)
    }

    /// Path of the persisted monthly summary snapshot for a year
    pub fn summary_path(&self, year: i32) -> PathBuf {
        self.data_dir
            .join(format!("{}-{}.json", constants::SUMMARY_FILE_PREFIX, year))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r#"
        [paypal]
        endpoint = "https://api-3t.paypal.com/nvp"
        user = "api_user"
        password = "secret"
        signature = "sig"

        [exchange]
        access_key = "fixer-key"

        [upload]
        access_key_id = "AKID"
        secret_access_key = "SECRET"
        bucket = "other-bucket"
    "#;

    #[test]
    fn test_parse_full_config() {
        let config = FileConfig::parse(FULL_CONFIG).unwrap();
        assert_eq!(config.paypal.user, "api_user");
        assert_eq!(config.exchange.access_key, "fixer-key");
        assert!(config.validate(true).is_ok());
    }

    #[test]
    fn test_runtime_defaults() {
        let file_config = FileConfig::parse(FULL_CONFIG).unwrap();
        let config = Config::from_file(&file_config, PathBuf::from("data"));

        let upload = config.upload.as_ref().unwrap();
        assert_eq!(upload.host, constants::DEFAULT_UPLOAD_HOST);
        assert_eq!(upload.bucket, "other-bucket");
        assert_eq!(upload.key, constants::DEFAULT_UPLOAD_KEY);
        assert_eq!(config.exchange_url, constants::FIXER_IO_URL);
        assert_eq!(
            config.adjustments_path(2024),
            PathBuf::from("data/transactions-2024.csv")
        );
        assert_eq!(config.summary_path(2024), PathBuf::from("data/summary-2024.json"));
        assert_eq!(config.donors_path(), PathBuf::from("data/donors.json"));
    }

    #[test]
    fn test_validate_reports_every_missing_credential() {
        let config = FileConfig::parse(
            r#"
            [paypal]
            endpoint = "https://api-3t.paypal.com/nvp"
            user = ""
            password = ""
            signature = "sig"

            [exchange]
            access_key = ""
            "#,
        )
        .unwrap();

        let err = config.validate(false).unwrap_err().to_string();
        assert!(err.contains("PayPal user"));
        assert!(err.contains("PayPal password"));
        assert!(err.contains("fixer.io access key"));
        assert!(!err.contains("upload"));
    }

    #[test]
    fn test_validate_upload_only_when_needed() {
        let config = FileConfig::parse(
            r#"
            [paypal]
            endpoint = "e"
            user = "u"
            password = "p"
            signature = "s"

            [exchange]
            access_key = "k"
            "#,
        )
        .unwrap();

        assert!(config.validate(false).is_ok());
        let err = config.validate(true).unwrap_err().to_string();
        assert!(err.contains("[upload]"));
    }

    #[test]
    fn test_missing_section_fails_to_parse() {
        assert!(FileConfig::parse("[paypal]\nendpoint = \"e\"").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = FileConfig::load(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
