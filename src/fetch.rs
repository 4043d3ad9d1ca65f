//! Source workbook download.
//!
//! Fetches the published flat file to the configured local path. The HTTP
//! call uses `reqwest::blocking` on a blocking thread so the async runtime
//! stays unblocked.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

use crate::config::Config;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

pub async fn run_fetch(config: &Config) -> Result<()> {
    let url = config.source.url.clone();
    let dest = config.source.workbook.clone();
    tokio::task::spawn_blocking(move || fetch_workbook(&url, &dest)).await??;
    Ok(())
}

fn fetch_workbook(url: &str, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let client = reqwest::blocking::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()?;
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("Failed to fetch {}", url))?
        .error_for_status()
        .with_context(|| format!("Source returned an error status for {}", url))?;
    let bytes = response.bytes()?;

    std::fs::write(dest, &bytes)
        .with_context(|| format!("Failed to write workbook: {}", dest.display()))?;

    println!("fetch {}", url);
    println!("  written: {} ({} bytes)", dest.display(), bytes.len());
    println!("ok");
    Ok(())
}
