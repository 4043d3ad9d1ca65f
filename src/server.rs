//! Read-only HTTP API over the dataset artifact.
//!
//! The artifact is loaded eagerly at startup and injected into the router
//! state as an immutable handle; a missing or corrupt artifact fails the
//! process before it ever binds. Handlers are pure reads over that snapshot,
//! so concurrent requests share nothing mutable.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Root info: version, total factors, dataset year |
//! | `GET`  | `/health` | Health check for monitoring |
//! | `GET`  | `/metadata` | Dataset + changes metadata |
//! | `GET`  | `/categories` | Category and scope counts |
//! | `GET`  | `/factors` | Paged list with scope/category/search filters |
//! | `POST` | `/search` | Advanced multi-criterion search, paged |
//! | `GET`  | `/factors/{id}` | Single record by id (404 on miss) |
//! | `GET`  | `/quick-lookup` | Common-factor composite lookup |
//! | `GET`  | `/major-changes` | Year-over-year changes passthrough |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "page must be >= 1" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted; the API is a public
//! read-only surface consumed by browser clients.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::dataset;
use crate::models::{ChangesDataset, Dataset, DatasetMetadata, Factor};
use crate::search::{self, QuickLookup, SearchCriteria};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    dataset: Arc<Dataset>,
    changes: Arc<ChangesDataset>,
    default_per_page: usize,
    max_per_page: usize,
}

/// Starts the HTTP API server.
///
/// Loads the dataset artifact (fatal if unavailable), binds to
/// `[server].bind`, and serves until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let loaded = dataset::load_dataset(&config.data.factors)?;
    let changes = dataset::load_changes(config.data.changes.as_deref());
    println!(
        "Loaded {} conversion factors ({} dataset)",
        loaded.metadata.total_factors, loaded.metadata.year
    );

    let state = AppState {
        dataset: Arc::new(loaded),
        changes: Arc::new(changes),
        default_per_page: config.server.default_per_page,
        max_per_page: config.server.max_per_page,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/metadata", get(handle_metadata))
        .route("/categories", get(handle_categories))
        .route("/factors", get(handle_list_factors))
        .route("/search", post(handle_search))
        .route("/factors/{id}", get(handle_get_factor))
        .route("/quick-lookup", get(handle_quick_lookup))
        .route("/major-changes", get(handle_major_changes))
        .layer(cors)
        .with_state(state);

    let bind_addr = &config.server.bind;
    println!("API listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (`"bad_request"`, `"not_found"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

// ============ Pagination ============

/// `page`/`per_page` query parameters shared by the list endpoints.
#[derive(Deserialize)]
struct PageParams {
    page: Option<usize>,
    per_page: Option<usize>,
}

impl AppState {
    /// Resolves and validates paging, defaulting to page 1 and the
    /// configured page size. Out-of-bounds values are a client error, not
    /// a clamp.
    fn resolve_paging(
        &self,
        page: Option<usize>,
        per_page: Option<usize>,
    ) -> Result<(usize, usize), AppError> {
        let page = page.unwrap_or(1);
        if page < 1 {
            return Err(bad_request("page must be >= 1"));
        }
        let per_page = per_page.unwrap_or(self.default_per_page);
        if per_page < 1 || per_page > self.max_per_page {
            return Err(bad_request(format!(
                "per_page must be between 1 and {}",
                self.max_per_page
            )));
        }
        Ok((page, per_page))
    }

    /// Builds the standard list response for one page of filtered records.
    fn factor_page(&self, filtered: Vec<&Factor>, page: usize, per_page: usize) -> FactorPage {
        let total = filtered.len();
        let records = search::paginate(&filtered, page, per_page)
            .iter()
            .map(|f| (*f).clone())
            .collect();
        FactorPage {
            metadata: self.dataset.metadata.clone(),
            factors: records,
            total,
            page,
            per_page,
        }
    }
}

/// Response body shared by every list-returning endpoint: the dataset
/// metadata, one page of records, the pre-pagination total, and the echoed
/// paging parameters.
#[derive(Serialize)]
struct FactorPage {
    metadata: DatasetMetadata,
    factors: Vec<Factor>,
    total: usize,
    page: usize,
    per_page: usize,
}

// ============ GET / ============

#[derive(Serialize)]
struct RootResponse {
    status: String,
    message: String,
    version: String,
    total_factors: usize,
    year: i32,
}

async fn handle_root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        status: "ok".to_string(),
        message: state.dataset.metadata.source.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        total_factors: state.dataset.metadata.total_factors,
        year: state.dataset.metadata.year,
    })
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    timestamp: String,
    factors_loaded: usize,
    version: String,
}

/// The dataset is loaded before the listener binds, so a serving process is
/// by construction healthy; load failures surface as startup errors.
async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        factors_loaded: state.dataset.metadata.total_factors,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /metadata ============

#[derive(Serialize)]
struct MetadataResponse {
    conversion_factors: DatasetMetadata,
    major_changes: serde_json::Value,
}

async fn handle_metadata(State(state): State<AppState>) -> Json<MetadataResponse> {
    Json(MetadataResponse {
        conversion_factors: state.dataset.metadata.clone(),
        major_changes: state.changes.metadata.clone(),
    })
}

// ============ GET /categories ============

#[derive(Serialize)]
struct CategoriesResponse {
    categories: indexmap::IndexMap<String, usize>,
    scopes: indexmap::IndexMap<String, usize>,
}

async fn handle_categories(State(state): State<AppState>) -> Json<CategoriesResponse> {
    Json(CategoriesResponse {
        categories: state.dataset.metadata.categories.clone(),
        scopes: state.dataset.metadata.scopes.clone(),
    })
}

// ============ GET /factors ============

/// Query parameters of the simple list endpoint. `category` targets
/// level 1; `search` is the free-text criterion.
#[derive(Deserialize)]
struct ListParams {
    scope: Option<String>,
    category: Option<String>,
    search: Option<String>,
    page: Option<usize>,
    per_page: Option<usize>,
}

async fn handle_list_factors(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<FactorPage>, AppError> {
    let (page, per_page) = state.resolve_paging(params.page, params.per_page)?;
    let criteria = SearchCriteria {
        scope: params.scope,
        category_level1: params.category,
        search_term: params.search,
        ..Default::default()
    };
    let filtered = search::search_factors(&state.dataset.conversion_factors, &criteria);
    Ok(Json(state.factor_page(filtered, page, per_page)))
}

// ============ POST /search ============

async fn handle_search(
    State(state): State<AppState>,
    Query(paging): Query<PageParams>,
    Json(criteria): Json<SearchCriteria>,
) -> Result<Json<FactorPage>, AppError> {
    let (page, per_page) = state.resolve_paging(paging.page, paging.per_page)?;
    let filtered = search::search_factors(&state.dataset.conversion_factors, &criteria);
    Ok(Json(state.factor_page(filtered, page, per_page)))
}

// ============ GET /factors/{id} ============

async fn handle_get_factor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Factor>, AppError> {
    search::find_by_id(&state.dataset.conversion_factors, &id)
        .map(|f| Json(f.clone()))
        .ok_or_else(|| not_found(format!("Conversion factor {} not found", id)))
}

// ============ GET /quick-lookup ============

#[derive(Serialize)]
struct QuickLookupResponse {
    results: Vec<Factor>,
    total: usize,
}

async fn handle_quick_lookup(
    State(state): State<AppState>,
    Query(query): Query<QuickLookup>,
) -> Json<QuickLookupResponse> {
    let lookup = search::quick_lookup(&state.dataset.conversion_factors, &query);
    Json(QuickLookupResponse {
        results: lookup.results.into_iter().cloned().collect(),
        total: lookup.total,
    })
}

// ============ GET /major-changes ============

async fn handle_major_changes(State(state): State<AppState>) -> Json<ChangesDataset> {
    Json(state.changes.as_ref().clone())
}
