//! Conversion-factor extraction.
//!
//! Turns workbook rows into [`Factor`] records plus aggregate metadata, and
//! persists the result as the dataset artifact. Row-level problems are
//! warned about and skipped; only structural problems (unreadable workbook,
//! missing sheet, missing columns) abort the run.
//!
//! Tag derivation and metadata aggregation are compatibility-critical: the
//! artifact replaces one that downstream consumers already parse, so the
//! token rules (including the `"nan"` category quirk inherited from the
//! source data) must not drift.

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::path::Path;

use crate::config::Config;
use crate::models::{Category, Dataset, DatasetMetadata, Factor, Units};
use crate::workbook::{self, SheetRow};

/// Fixed column layout of the flat file: ID, Scope, Level1..Level4,
/// Column_Text, UOM, GHG_Unit, conversion factor.
pub const SOURCE_COLUMNS: usize = 10;

const COL_ID: usize = 0;
const COL_SCOPE: usize = 1;
const COL_LEVEL1: usize = 2;
const COL_LEVEL4: usize = 5;
const COL_COLUMN_TEXT: usize = 6;
const COL_ACTIVITY_UNIT: usize = 7;
const COL_EMISSION_UNIT: usize = 8;
const COL_FACTOR: usize = 9;

/// Outcome of mapping one data row.
enum RowOutcome {
    Factor(Box<Factor>),
    /// All ten cells empty: sheet padding, skipped without noise.
    Blank,
    /// Content present but the row fails acceptance; carries the reason.
    Rejected(String),
}

/// CLI entry point for `ghgf parse`: read the workbook, extract, write the
/// artifact, print a status block.
pub fn run_parse(config: &Config) -> Result<()> {
    let workbook_path = &config.source.workbook;
    let bytes = std::fs::read(workbook_path)
        .with_context(|| format!("Failed to read workbook: {}", workbook_path.display()))?;

    let rows = workbook::read_sheet(&bytes, &config.source.sheet)
        .with_context(|| format!("Failed to read sheet '{}'", config.source.sheet))?;
    let scanned = rows.len();
    let data_rows = rows
        .iter()
        .filter(|r| r.number as usize > config.source.header_rows)
        .count();

    let dataset = extract_dataset(&rows, config)?;
    let skipped = data_rows.saturating_sub(dataset.metadata.total_factors);

    write_artifact(&dataset, &config.data.factors)?;

    println!("parse {}", config.source.sheet);
    println!("  rows scanned: {}", scanned);
    println!("  factors extracted: {}", dataset.metadata.total_factors);
    println!("  rows skipped: {}", skipped);
    println!("  artifact: {}", config.data.factors.display());
    println!("ok");
    Ok(())
}

/// Extracts the full dataset from sheet rows: the first `header_rows` sheet
/// rows are skipped, every following row maps to zero or one record.
pub fn extract_dataset(rows: &[SheetRow], config: &Config) -> Result<Dataset> {
    let data_rows: Vec<&SheetRow> = rows
        .iter()
        .filter(|r| r.number as usize > config.source.header_rows)
        .collect();

    if data_rows.is_empty() {
        bail!(
            "sheet '{}' has no data rows after the {}-row header",
            config.source.sheet,
            config.source.header_rows
        );
    }

    if data_rows.iter().all(|r| r.cells.len() < SOURCE_COLUMNS) {
        bail!(
            "sheet '{}' has fewer than {} columns; not a flat-file factors sheet",
            config.source.sheet,
            SOURCE_COLUMNS
        );
    }

    let mut factors = Vec::new();
    for row in data_rows {
        match factor_from_row(row, config.source.year) {
            RowOutcome::Factor(factor) => factors.push(*factor),
            RowOutcome::Blank => {}
            RowOutcome::Rejected(reason) => {
                eprintln!("warning: skipping row {}: {}", row.number, reason);
            }
        }
    }

    let metadata = aggregate_metadata(&factors, config);
    Ok(Dataset {
        metadata,
        conversion_factors: factors,
    })
}

/// Row acceptance: a non-empty ID and a finite, parseable conversion factor
/// are required; everything else is optional and becomes `None` when blank.
fn factor_from_row(row: &SheetRow, year: i32) -> RowOutcome {
    let cell = |col: usize| clean_text(row.cell(col));

    if (0..SOURCE_COLUMNS).all(|col| cell(col).is_none()) {
        return RowOutcome::Blank;
    }

    let id = match cell(COL_ID) {
        Some(id) => id,
        None => return RowOutcome::Rejected("missing id".to_string()),
    };

    let raw_factor = match cell(COL_FACTOR) {
        Some(v) => v,
        None => return RowOutcome::Rejected("missing conversion factor".to_string()),
    };
    let conversion_factor = match raw_factor.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => {
            return RowOutcome::Rejected(format!(
                "conversion factor '{}' is not a finite number",
                raw_factor
            ))
        }
    };

    let category = Category {
        level1: cell(COL_LEVEL1),
        level2: cell(COL_LEVEL1 + 1),
        level3: cell(COL_LEVEL1 + 2),
        level4: cell(COL_LEVEL4),
    };
    let units = Units {
        activity_unit: cell(COL_ACTIVITY_UNIT),
        emission_unit: cell(COL_EMISSION_UNIT),
    };
    let scope = cell(COL_SCOPE);

    let tags = derive_tags(scope.as_deref(), &category, units.activity_unit.as_deref());

    RowOutcome::Factor(Box::new(Factor {
        id,
        scope,
        category,
        units,
        conversion_factor,
        column_text: cell(COL_COLUMN_TEXT),
        year,
        tags,
    }))
}

/// Trims a cell; empty-after-trim becomes `None`.
fn clean_text(cell: Option<&str>) -> Option<String> {
    cell.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Derives the search tag set for one record.
///
/// The rules mirror the artifact this one replaces, token for token:
/// scope lowercased with spaces as underscores; each populated category
/// level (except the literal `"nan"`, a quirk of the published data) split
/// into lowercase tokens on whitespace after `(`/`)`/`-` are blanked; the
/// activity unit lowercased as a single token. Tokens are trimmed, tokens of
/// length <= 1 dropped, duplicates removed. Output is sorted so repeated
/// runs produce identical artifacts.
pub fn derive_tags(
    scope: Option<&str>,
    category: &Category,
    activity_unit: Option<&str>,
) -> Vec<String> {
    let mut raw: Vec<String> = Vec::new();

    if let Some(scope) = scope {
        raw.push(scope.to_lowercase().replace(' ', "_"));
    }

    for level in category.levels().into_iter().flatten() {
        let lower = level.to_lowercase();
        if lower == "nan" {
            continue;
        }
        let spaced = lower.replace(['(', ')', '-'], " ");
        raw.extend(spaced.split_whitespace().map(str::to_string));
    }

    if let Some(unit) = activity_unit {
        raw.push(unit.to_lowercase());
    }

    let tags: BTreeSet<String> = raw
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| t.chars().count() > 1)
        .collect();
    tags.into_iter().collect()
}

/// Dataset-level statistics over the surviving records.
///
/// `scopes` counts in first-encountered order; `categories` counts level-1
/// values and is sorted descending by count. The sort is stable, so equal
/// counts keep first-encountered order (tie order is not contractual).
fn aggregate_metadata(factors: &[Factor], config: &Config) -> DatasetMetadata {
    let mut scopes: IndexMap<String, usize> = IndexMap::new();
    let mut categories: IndexMap<String, usize> = IndexMap::new();

    for factor in factors {
        if let Some(scope) = &factor.scope {
            *scopes.entry(scope.clone()).or_insert(0) += 1;
        }
        if let Some(level1) = &factor.category.level1 {
            *categories.entry(level1.clone()).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = categories.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    let categories: IndexMap<String, usize> = ranked.into_iter().collect();

    DatasetMetadata {
        source: config.source.description.clone(),
        source_url: config.source.url.clone(),
        year: config.source.year,
        parsed_at: chrono::Utc::now().to_rfc3339(),
        total_factors: factors.len(),
        categories,
        scopes,
    }
}

/// Writes the artifact as pretty-printed JSON, creating parent directories.
/// Nothing is written unless extraction fully succeeded.
pub fn write_artifact(dataset: &Dataset, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(dataset)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write artifact: {}", path.display()))?;
    Ok(())
}

/// CLI entry point for `ghgf summary`: print totals, top categories, and
/// scope counts from an existing artifact.
pub fn run_summary(config: &Config) -> Result<()> {
    let dataset = crate::dataset::load_dataset(&config.data.factors)?;
    let meta = &dataset.metadata;

    println!("{}", meta.source);
    println!("  year: {}", meta.year);
    println!("  parsed at: {}", meta.parsed_at);
    println!("  total factors: {}", meta.total_factors);
    println!("  top categories:");
    for (category, count) in meta.categories.iter().take(10) {
        println!("    {:<40} {}", category, count);
    }
    println!("  scopes:");
    for (scope, count) in &meta.scopes {
        println!("    {:<40} {}", scope, count);
    }
    Ok(())
}
