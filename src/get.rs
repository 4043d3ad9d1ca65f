//! Record retrieval by id.
//!
//! Exact-match lookup against the loaded artifact. Used by the `ghgf get`
//! CLI command; the HTTP equivalent lives in the server's `/factors/{id}`
//! handler.

use anyhow::Result;

use crate::config::Config;
use crate::dataset;
use crate::search;

/// CLI entry point — prints the full record, exits nonzero when absent.
pub fn run_get(config: &Config, id: &str) -> Result<()> {
    let loaded = dataset::load_dataset(&config.data.factors)?;

    let factor = match search::find_by_id(&loaded.conversion_factors, id) {
        Some(f) => f,
        None => {
            eprintln!("Error: conversion factor {} not found", id);
            std::process::exit(1);
        }
    };

    println!("--- Conversion factor ---");
    println!("id:                {}", factor.id);
    println!("scope:             {}", factor.scope.as_deref().unwrap_or("-"));
    for (label, value) in [
        ("level1", &factor.category.level1),
        ("level2", &factor.category.level2),
        ("level3", &factor.category.level3),
        ("level4", &factor.category.level4),
    ] {
        if let Some(value) = value {
            println!("{}:            {}", label, value);
        }
    }
    println!("conversion_factor: {}", factor.conversion_factor);
    println!(
        "activity_unit:     {}",
        factor.units.activity_unit.as_deref().unwrap_or("-")
    );
    println!(
        "emission_unit:     {}",
        factor.units.emission_unit.as_deref().unwrap_or("-")
    );
    if let Some(ref text) = factor.column_text {
        println!("column_text:       {}", text);
    }
    println!("year:              {}", factor.year);
    println!("tags:              {}", factor.tags.join(", "));

    Ok(())
}
