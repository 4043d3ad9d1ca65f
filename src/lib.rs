//! # GHG Factors
//!
//! A parse-and-serve pipeline for UK Government greenhouse-gas conversion
//! factors.
//!
//! The published flat-file workbook is parsed once into a structured JSON
//! dataset artifact; a read-only HTTP API and a CLI answer queries over
//! that artifact from memory.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌───────────┐
//! │ flat-file    │──▶│  Extractor   │──▶│  dataset  │
//! │ workbook     │   │ rows→factors │   │ artifact  │
//! └──────────────┘   └─────────────┘   └────┬──────┘
//!                                           │ load once
//!                        ┌──────────────────┤
//!                        ▼                  ▼
//!                   ┌──────────┐      ┌──────────┐
//!                   │   CLI    │      │   HTTP   │
//!                   │  (ghgf)  │      │  (axum)  │
//!                   └──────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ghgf fetch                    # download the published workbook
//! ghgf parse                    # extract into the dataset artifact
//! ghgf summary                  # dataset statistics
//! ghgf search --category fuels  # query from the CLI
//! ghgf serve                    # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and the artifact shape |
//! | [`workbook`] | OOXML (xlsx) sheet reading |
//! | [`extract`] | Row mapping, tag derivation, aggregation |
//! | [`dataset`] | Artifact loading |
//! | [`search`] | Predicate filtering, quick lookup, pagination |
//! | [`fetch`] | Source workbook download |
//! | [`get`] | Record lookup by id |
//! | [`server`] | HTTP API |

pub mod config;
pub mod dataset;
pub mod extract;
pub mod fetch;
pub mod get;
pub mod models;
pub mod search;
pub mod server;
pub mod workbook;
