use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub source: SourceConfig,
    pub data: DataConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// Local path of the published flat-file workbook.
    pub workbook: PathBuf,
    /// Where the workbook is published; used by `fetch` and recorded in
    /// artifact metadata.
    pub url: String,
    #[serde(default = "default_sheet")]
    pub sheet: String,
    /// Rows to skip before data starts: the pre-header banner plus the
    /// header row itself.
    #[serde(default = "default_header_rows")]
    pub header_rows: usize,
    pub description: String,
    pub year: i32,
}

fn default_sheet() -> String {
    "Factors by Category".to_string()
}

fn default_header_rows() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    pub factors: PathBuf,
    #[serde(default)]
    pub changes: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    #[serde(default = "default_per_page")]
    pub default_per_page: usize,
    #[serde(default = "default_max_per_page")]
    pub max_per_page: usize,
}

fn default_per_page() -> usize {
    50
}

fn default_max_per_page() -> usize {
    1000
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.source.year < 1990 {
        anyhow::bail!("source.year must be a plausible publication year");
    }

    if config.source.sheet.trim().is_empty() {
        anyhow::bail!("source.sheet must not be empty");
    }

    if config.server.default_per_page == 0 {
        anyhow::bail!("server.default_per_page must be >= 1");
    }

    if config.server.max_per_page < config.server.default_per_page {
        anyhow::bail!("server.max_per_page must be >= server.default_per_page");
    }

    Ok(config)
}
