//! Dataset artifact loading.
//!
//! The query service loads the factors artifact exactly once and treats it
//! as immutable for the process lifetime. A missing or corrupt factors
//! artifact is fatal; the optional changes artifact degrades to a
//! placeholder instead.

use anyhow::{Context, Result};
use std::path::Path;

use crate::models::{ChangesDataset, Dataset};

/// Loads the factors artifact. Fails loudly: the service must never start
/// against partial or absent data.
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Dataset artifact not readable: {}", path.display()))?;
    let dataset: Dataset = serde_json::from_str(&content)
        .with_context(|| format!("Dataset artifact not parseable: {}", path.display()))?;
    Ok(dataset)
}

/// Loads the optional changes artifact. Absence yields a placeholder; a
/// present-but-unreadable file yields an error placeholder and a warning.
pub fn load_changes(path: Option<&Path>) -> ChangesDataset {
    let Some(path) = path else {
        return ChangesDataset::placeholder();
    };
    if !path.exists() {
        return ChangesDataset::placeholder();
    }
    match std::fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|content| serde_json::from_str::<ChangesDataset>(&content).map_err(Into::into))
    {
        Ok(changes) => changes,
        Err(e) => {
            eprintln!("warning: failed to load changes artifact {}: {}", path.display(), e);
            ChangesDataset::load_error()
        }
    }
}
