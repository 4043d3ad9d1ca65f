//! Core data models for the conversion-factor pipeline.
//!
//! These types define both the in-memory record set and the on-disk dataset
//! artifact. The JSON shape of [`Dataset`] is a compatibility contract:
//! existing consumers read the artifact directly, so field names and nesting
//! must not change.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One greenhouse-gas conversion-factor entry.
///
/// Multiplying an activity quantity expressed in `units.activity_unit` by
/// `conversion_factor` yields emissions in `units.emission_unit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Factor {
    /// Stable identifier from the source sheet. Never empty.
    pub id: String,
    /// GHG Protocol scope ("Scope 1", "Scope 2", "Scope 3"), when present.
    pub scope: Option<String>,
    pub category: Category,
    pub units: Units,
    /// Required and finite; rows without a parseable value are dropped.
    pub conversion_factor: f64,
    /// Free-text label of the source column, when present.
    pub column_text: Option<String>,
    /// Publication year, constant across one artifact build.
    pub year: i32,
    /// Lowercase search tokens derived from scope, categories, and activity
    /// unit. Deduplicated, no token of length <= 1, sorted.
    pub tags: Vec<String>,
}

/// Category hierarchy, up to four levels deep. Deeper levels may be absent
/// while shallower ones are populated; the source treats the reverse as
/// malformed but this is not enforced here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Category {
    pub level1: Option<String>,
    pub level2: Option<String>,
    pub level3: Option<String>,
    pub level4: Option<String>,
}

impl Category {
    /// Levels in level1..level4 order, for tag derivation and search.
    pub fn levels(&self) -> [Option<&str>; 4] {
        [
            self.level1.as_deref(),
            self.level2.as_deref(),
            self.level3.as_deref(),
            self.level4.as_deref(),
        ]
    }
}

/// Measurement units for a factor. `activity_unit` is the denominator
/// (e.g. "kWh", "km"), `emission_unit` the numerator (e.g. "kg CO2e").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Units {
    pub activity_unit: Option<String>,
    pub emission_unit: Option<String>,
}

/// Dataset-level statistics and provenance, computed once at extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub source: String,
    pub source_url: String,
    pub year: i32,
    /// RFC 3339 timestamp of the extraction run.
    pub parsed_at: String,
    pub total_factors: usize,
    /// Level-1 category -> record count, sorted descending by count.
    /// Serialized as a JSON object in that order.
    pub categories: IndexMap<String, usize>,
    /// Scope -> record count, in first-encountered order.
    pub scopes: IndexMap<String, usize>,
}

/// The persisted dataset artifact: metadata plus records in source row
/// order. Immutable once written; the query service only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub metadata: DatasetMetadata,
    pub conversion_factors: Vec<Factor>,
}

/// Year-over-year changes artifact. The pipeline does not interpret its
/// contents; it is loaded and passed through as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangesDataset {
    pub metadata: serde_json::Value,
    pub major_changes: Vec<serde_json::Value>,
}

impl ChangesDataset {
    /// Stand-in returned when no changes artifact exists on disk.
    pub fn placeholder() -> Self {
        Self {
            metadata: serde_json::json!({ "title": "No major changes data available" }),
            major_changes: Vec::new(),
        }
    }

    /// Stand-in returned when the changes artifact exists but cannot be read.
    pub fn load_error() -> Self {
        Self {
            metadata: serde_json::json!({ "title": "Error loading changes" }),
            major_changes: Vec::new(),
        }
    }
}
