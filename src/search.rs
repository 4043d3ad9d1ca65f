//! Query operations over the in-memory record set.
//!
//! All operations are pure linear scans over an immutable slice: a chain of
//! conjunctive predicate filters, exact-id lookup, a fixed composite quick
//! lookup, and slice pagination. Nothing here allocates beyond the result
//! vectors, and nothing mutates the dataset, so concurrent callers need no
//! locking.

use anyhow::{bail, Result};
use serde::Deserialize;
use std::collections::HashSet;

use crate::config::Config;
use crate::models::Factor;

/// Optional filter criteria. Every present criterion must hold (AND);
/// string criteria are case-insensitive substring matches. Doubles as the
/// JSON body of the advanced-search endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchCriteria {
    pub scope: Option<String>,
    pub category_level1: Option<String>,
    pub category_level2: Option<String>,
    pub category_level3: Option<String>,
    pub activity_unit: Option<String>,
    pub emission_unit: Option<String>,
    /// Free text: matches any tag OR any populated category level.
    pub search_term: Option<String>,
    /// Inclusive lower bound on `conversion_factor`.
    pub min_factor: Option<f64>,
    /// Inclusive upper bound on `conversion_factor`.
    pub max_factor: Option<f64>,
}

impl SearchCriteria {
    pub fn is_empty(&self) -> bool {
        self.scope.is_none()
            && self.category_level1.is_none()
            && self.category_level2.is_none()
            && self.category_level3.is_none()
            && self.activity_unit.is_none()
            && self.emission_unit.is_none()
            && self.search_term.is_none()
            && self.min_factor.is_none()
            && self.max_factor.is_none()
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// A record with a null field fails any criterion targeting that field.
fn matches(factor: &Factor, criteria: &SearchCriteria) -> bool {
    if let Some(q) = &criteria.scope {
        if !factor.scope.as_deref().is_some_and(|s| contains_ci(s, q)) {
            return false;
        }
    }
    let category_queries = [
        (&criteria.category_level1, factor.category.level1.as_deref()),
        (&criteria.category_level2, factor.category.level2.as_deref()),
        (&criteria.category_level3, factor.category.level3.as_deref()),
    ];
    for (query, value) in category_queries {
        if let Some(q) = query {
            if !value.is_some_and(|v| contains_ci(v, q)) {
                return false;
            }
        }
    }
    if let Some(q) = &criteria.activity_unit {
        if !factor
            .units
            .activity_unit
            .as_deref()
            .is_some_and(|u| contains_ci(u, q))
        {
            return false;
        }
    }
    if let Some(q) = &criteria.emission_unit {
        if !factor
            .units
            .emission_unit
            .as_deref()
            .is_some_and(|u| contains_ci(u, q))
        {
            return false;
        }
    }
    if let Some(term) = &criteria.search_term {
        let in_tags = factor.tags.iter().any(|t| contains_ci(t, term));
        let in_categories = factor
            .category
            .levels()
            .into_iter()
            .flatten()
            .any(|v| contains_ci(v, term));
        if !in_tags && !in_categories {
            return false;
        }
    }
    if let Some(min) = criteria.min_factor {
        if factor.conversion_factor < min {
            return false;
        }
    }
    if let Some(max) = criteria.max_factor {
        if factor.conversion_factor > max {
            return false;
        }
    }
    true
}

/// Filters the record set, preserving source order. No criteria means every
/// record passes.
pub fn search_factors<'a>(factors: &'a [Factor], criteria: &SearchCriteria) -> Vec<&'a Factor> {
    factors.iter().filter(|f| matches(f, criteria)).collect()
}

/// Exact-id lookup; zero or one result.
pub fn find_by_id<'a>(factors: &'a [Factor], id: &str) -> Option<&'a Factor> {
    factors.iter().find(|f| f.id == id)
}

/// Parameters of the quick-lookup composite.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuickLookup {
    #[serde(default)]
    pub electricity: bool,
    pub fuel_type: Option<String>,
    pub transport_mode: Option<String>,
}

/// Result of the quick-lookup composite: the capped result list plus the
/// deduplicated match count before capping.
#[derive(Debug)]
pub struct QuickLookupResult<'a> {
    pub results: Vec<&'a Factor>,
    pub total: usize,
}

/// Runs up to three fixed sub-searches (electricity, fuel, transport, in
/// that order), keeps the first 10 matches of each, deduplicates by id
/// keeping first occurrence, and caps the combined list at 20. `total`
/// reports the deduplicated count before the cap.
pub fn quick_lookup<'a>(factors: &'a [Factor], query: &QuickLookup) -> QuickLookupResult<'a> {
    let mut results: Vec<&Factor> = Vec::new();

    if query.electricity {
        results.extend(
            factors
                .iter()
                .filter(|f| {
                    f.tags
                        .iter()
                        .any(|t| matches!(t.as_str(), "electricity" | "uk" | "grid"))
                        && matches!(f.scope.as_deref(), Some("Scope 1") | Some("Scope 2"))
                })
                .take(10),
        );
    }

    if let Some(fuel) = &query.fuel_type {
        let needle = fuel.to_lowercase();
        results.extend(
            factors
                .iter()
                .filter(|f| {
                    f.tags.iter().any(|t| t.contains(&needle))
                        && f.category.level1.as_deref() == Some("Fuels")
                })
                .take(10),
        );
    }

    if let Some(mode) = &query.transport_mode {
        let needle = mode.to_lowercase();
        results.extend(
            factors
                .iter()
                .filter(|f| {
                    f.tags.iter().any(|t| t.contains(&needle))
                        && f.category.level1.as_deref().is_some_and(|level1| {
                            let level1 = level1.to_lowercase();
                            ["travel", "vehicle", "freight"]
                                .iter()
                                .any(|c| level1.contains(c))
                        })
                })
                .take(10),
        );
    }

    let mut seen: HashSet<&str> = HashSet::new();
    results.retain(|f| seen.insert(f.id.as_str()));
    let total = results.len();
    results.truncate(20);
    QuickLookupResult { results, total }
}

/// The `[(page-1)*per_page, page*per_page)` slice; empty when out of range.
/// Callers validate `page >= 1` and `per_page >= 1`.
pub fn paginate<T>(items: &[T], page: usize, per_page: usize) -> &[T] {
    let start = (page - 1).saturating_mul(per_page).min(items.len());
    let end = start.saturating_add(per_page).min(items.len());
    &items[start..end]
}

/// CLI entry point for `ghgf search`: run the criteria chain over the
/// artifact and print matches.
pub fn run_search(config: &Config, criteria: &SearchCriteria, limit: usize) -> Result<()> {
    if criteria.is_empty() {
        bail!("at least one search criterion is required");
    }
    let dataset = crate::dataset::load_dataset(&config.data.factors)?;
    let matches = search_factors(&dataset.conversion_factors, criteria);

    if matches.is_empty() {
        println!("No results.");
        return Ok(());
    }

    println!(
        "{} of {} factors match",
        matches.len(),
        dataset.metadata.total_factors
    );
    for factor in matches.iter().take(limit) {
        let levels: Vec<&str> = factor.category.levels().into_iter().flatten().collect();
        println!(
            "  {:<10} {:>14}  {:<10} {}",
            factor.id,
            factor.conversion_factor,
            factor.units.activity_unit.as_deref().unwrap_or("-"),
            levels.join(" > "),
        );
    }
    if matches.len() > limit {
        println!("  ... {} more (raise --limit to see them)", matches.len() - limit);
    }
    Ok(())
}
