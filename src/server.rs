//! HTTP API for the digest and the catalog.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (status, version, timestamp) |
//! | `GET`  | `/api/digest` | Fetch chat, match, summarise and store a digest |
//! | `POST` | `/api/match` | Match texts against the catalogs |
//! | `GET`  | `/api/components/{id}/parents` | Ancestor rows of a component |
//! | `GET`  | `/api/components/{id}/children` | Descendant rows (`?direct_only=true` for one level) |
//! | `GET`  | `/api/machine-details` | Component rows by id (`?item_id=&parent_id=&limit=`) |
//! | `GET`  | `/api/machine-details/{item_id}/impact` | Ancestors affected by a change, and other usages of its base part |
//! | `GET`  | `/api/discussions` | Stored summaries, newest first (`?item_id=&since=&limit=`) |
//! | `PUT`  | `/api/discussion-summary` | Overwrite a stored summary |
//! | `DELETE` | `/api/discussion-summary/{id}` | Delete a stored summary |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "lookback_minutes must be in [1, 1440]" } }
//! ```
//!
//! Error codes: `bad_request` (400), `store_required` (400), `not_found` (404),
//! `timeout` (408), `internal` (500), `upstream` (502).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the dashboard can be
//! served from anywhere.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use bom_digest_core::error::MatchError;
use bom_digest_core::hierarchy::{ancestor_ids, nodes_to_table};
use bom_digest_core::store::CatalogStore;
use bom_digest_core::table::{Row, Table};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::db;
use crate::digest::{self, DigestDeps, DigestOutcome, DigestRequest};
use crate::discussions::{self, Discussion, SummaryUpdate};
use crate::llm::{LlmClient, OpenRouterClient};
use crate::source::{MessageSource, SlackSource};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    pool: sqlx::SqlitePool,
    /// `Err` carries why the digest cannot run (missing credentials).
    source: Result<Arc<dyn MessageSource>, String>,
    llm: Result<Arc<dyn LlmClient>, String>,
}

impl AppState {
    pub fn new(
        config: Config,
        pool: sqlx::SqlitePool,
        source: Result<Arc<dyn MessageSource>, String>,
        llm: Result<Arc<dyn LlmClient>, String>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            pool,
            source,
            llm,
        }
    }
}

/// Routes with CORS, ready to serve or to drive in tests.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/digest", get(handle_digest))
        .route("/api/match", post(handle_match))
        .route("/api/components/{id}/parents", get(handle_parents))
        .route("/api/components/{id}/children", get(handle_children))
        .route("/api/machine-details", get(handle_machine_details))
        .route("/api/machine-details/{item_id}/impact", get(handle_impact))
        .route("/api/discussions", get(handle_discussions))
        .route("/api/discussion-summary", put(handle_update_summary))
        .route("/api/discussion-summary/{id}", delete(handle_delete_summary))
        .fallback(handle_fallback)
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind`.
///
/// Slack and LLM credentials are read once at startup. If either is
/// missing the server still starts; `/api/digest` then answers
/// `bad_request` with the reason.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let pool = db::connect(config).await?;

    let source = SlackSource::from_config(&config.slack)
        .map(|s| Arc::new(s) as Arc<dyn MessageSource>)
        .map_err(|e| e.to_string());
    let llm = OpenRouterClient::from_config(&config.llm)
        .map(|c| Arc::new(c) as Arc<dyn LlmClient>)
        .map_err(|e| e.to_string());
    if let Err(e) = &source {
        tracing::warn!(error = %e, "digest disabled: Slack source unavailable");
    }
    if let Err(e) = &llm {
        tracing::warn!(error = %e, "digest disabled: LLM client unavailable");
    }

    let app = router(AppState::new(config.clone(), pool, source, llm));

    tracing::info!(bind = %bind_addr, "server listening");
    println!("bomd server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn app_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code,
        message: message.into(),
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    app_error(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    app_error(StatusCode::NOT_FOUND, "not_found", message)
}

/// Map an error to a status by the first engine error in its chain.
/// Anything else is `default_code`.
fn classify(err: anyhow::Error, upstream: bool) -> AppError {
    let message = format!("{:#}", err);
    let engine = err
        .chain()
        .filter_map(|e| e.downcast_ref::<MatchError>())
        .find(|e| !matches!(e, MatchError::Store(_)));

    match engine {
        Some(MatchError::Timeout { .. }) => {
            app_error(StatusCode::REQUEST_TIMEOUT, "timeout", message)
        }
        Some(MatchError::StoreRequired { .. }) => {
            app_error(StatusCode::BAD_REQUEST, "store_required", message)
        }
        Some(MatchError::InvalidIdentifier(_)) => bad_request(message),
        _ if upstream && !is_store_failure(&err) => {
            app_error(StatusCode::BAD_GATEWAY, "upstream", message)
        }
        _ => {
            tracing::error!(error = %message, "request failed");
            app_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
        }
    }
}

fn is_store_failure(err: &anyhow::Error) -> bool {
    err.chain().any(|e| {
        e.downcast_ref::<MatchError>().is_some() || e.downcast_ref::<sqlx::Error>().is_some()
    })
}

async fn handle_fallback() -> AppError {
    not_found("no such route")
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `{ "success": true, "count": n, "data": [...] }`
#[derive(Serialize)]
struct ListResponse<T> {
    success: bool,
    count: usize,
    data: Vec<T>,
}

impl<T> ListResponse<T> {
    fn new(data: Vec<T>) -> Self {
        Self {
            success: true,
            count: data.len(),
            data,
        }
    }
}

// ============ GET /api/digest ============

#[derive(Deserialize)]
struct DigestParams {
    lookback_minutes: Option<u32>,
    #[serde(default)]
    supplier_search: bool,
}

async fn handle_digest(
    State(state): State<AppState>,
    Query(params): Query<DigestParams>,
) -> Result<Json<DigestOutcome>, AppError> {
    let lookback_minutes = params
        .lookback_minutes
        .unwrap_or(state.config.slack.lookback_minutes);
    if !(1..=1440).contains(&lookback_minutes) {
        return Err(bad_request("lookback_minutes must be in [1, 1440]"));
    }

    let source = state.source.as_ref().map_err(|e| bad_request(e.clone()))?;
    let llm = state.llm.as_ref().map_err(|e| bad_request(e.clone()))?;

    let (_store, matcher) = digest::build_matcher(&state.config, &state.pool)
        .await
        .map_err(|e| classify(e, false))?;

    let outcome = digest::run_digest(
        DigestRequest {
            lookback_minutes,
            supplier_search: params.supplier_search,
        },
        DigestDeps {
            matcher: &matcher,
            source: source.as_ref(),
            llm: llm.as_ref(),
            pool: Some(&state.pool),
        },
    )
    .await
    .map_err(|e| classify(e, true))?;

    Ok(Json(outcome))
}

// ============ POST /api/match ============

#[derive(Deserialize)]
struct MatchBody {
    #[serde(default)]
    texts: Vec<String>,
    #[serde(default)]
    supplier_search: bool,
    #[serde(default = "default_expand")]
    expand: bool,
}

fn default_expand() -> bool {
    true
}

#[derive(Serialize)]
struct MatchResponse {
    keywords: Vec<String>,
    components: Table,
    suppliers: Table,
    /// Present when expansion was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    hierarchy: Option<Table>,
}

async fn handle_match(
    State(state): State<AppState>,
    Json(body): Json<MatchBody>,
) -> Result<Json<MatchResponse>, AppError> {
    let (_store, matcher) = digest::build_matcher(&state.config, &state.pool)
        .await
        .map_err(|e| classify(e, false))?;

    let matches = matcher
        .find_components(&body.texts, body.supplier_search)
        .await
        .map_err(|e| classify(e.into(), false))?;

    let hierarchy = if body.expand {
        let nodes = matcher
            .expand_hierarchy(&matches.components)
            .await
            .map_err(|e| classify(e.into(), false))?;
        Some(nodes_to_table(&nodes, &state.config.catalog.component_id_column))
    } else {
        None
    };

    Ok(Json(MatchResponse {
        components: matches.component_table(),
        suppliers: matches.supplier_table(),
        keywords: matches.keywords,
        hierarchy,
    }))
}

// ============ GET /api/components/{id}/parents ============

async fn handle_parents(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ListResponse<Row>>, AppError> {
    let store = catalog_store(&state);
    let catalog = &state.config.catalog;

    let mut rows = store
        .fetch_by_ids(&catalog.component_table, &catalog.component_id_column, &ancestor_ids(&id))
        .await
        .map_err(|e| classify(e, false))?;
    sort_by_id(&mut rows, &catalog.component_id_column);

    Ok(Json(ListResponse::new(rows)))
}

// ============ GET /api/components/{id}/children ============

#[derive(Deserialize)]
struct ChildrenParams {
    #[serde(default)]
    direct_only: bool,
}

async fn handle_children(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ChildrenParams>,
) -> Result<Json<ListResponse<Row>>, AppError> {
    if id.trim().is_empty() {
        return Err(bad_request("component id must not be empty"));
    }
    let store = catalog_store(&state);
    let catalog = &state.config.catalog;

    let rows = store
        .fetch_by_prefix(
            &catalog.component_table,
            &catalog.component_id_column,
            &id,
            params.direct_only,
        )
        .await
        .map_err(|e| classify(e, false))?;

    Ok(Json(ListResponse::new(rows)))
}

// ============ GET /api/machine-details ============

#[derive(Deserialize)]
struct MachineDetailsParams {
    item_id: Option<String>,
    parent_id: Option<String>,
    limit: Option<usize>,
}

async fn handle_machine_details(
    State(state): State<AppState>,
    Query(params): Query<MachineDetailsParams>,
) -> Result<Json<ListResponse<Row>>, AppError> {
    if params.limit.is_some_and(|l| l < 1) {
        return Err(bad_request("limit must be >= 1"));
    }
    let store = catalog_store(&state);
    let catalog = &state.config.catalog;
    let table = &catalog.component_table;
    let id_column = &catalog.component_id_column;

    let mut rows = match (&params.item_id, &params.parent_id) {
        (Some(item_id), _) => store
            .fetch_where_eq(table, id_column, item_id)
            .await
            .map_err(|e| classify(e, false))?,
        (None, Some(parent_id)) => store
            .fetch_by_prefix(table, id_column, parent_id, false)
            .await
            .map_err(|e| classify(e, false))?,
        (None, None) => store
            .load_table(table)
            .await
            .map_err(|e| classify(e, false))?,
    };
    if let (Some(_), Some(parent_id)) = (&params.item_id, &params.parent_id) {
        let head = format!("{}.", parent_id);
        rows.retain(|r| row_id(r, id_column).is_some_and(|id| id.starts_with(&head)));
    }
    sort_by_id(&mut rows, id_column);
    if let Some(limit) = params.limit {
        rows.truncate(limit);
    }

    Ok(Json(ListResponse::new(rows)))
}

// ============ GET /api/machine-details/{item_id}/impact ============

#[derive(Deserialize)]
struct ImpactParams {
    #[serde(default = "default_true")]
    include_self: bool,
    #[serde(default = "default_true")]
    exclude_current_usage: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
struct ImpactReport {
    item_id: String,
    component: Row,
    /// The component itself (unless excluded) and its ancestors, by id.
    directly_affected_components: Vec<Row>,
    base_child_identifier: Option<String>,
    /// Other placements of the same base part.
    other_usages_of_base_component: Vec<Row>,
    counts: ImpactCounts,
}

#[derive(Serialize)]
struct ImpactCounts {
    directly_affected: usize,
    other_usages: usize,
}

async fn handle_impact(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    Query(params): Query<ImpactParams>,
) -> Result<Json<ListResponse<ImpactReport>>, AppError> {
    let store = catalog_store(&state);
    let catalog = &state.config.catalog;
    let table = &catalog.component_table;
    let id_column = &catalog.component_id_column;

    let component = store
        .fetch_by_ids(table, id_column, std::slice::from_ref(&item_id))
        .await
        .map_err(|e| classify(e, false))?
        .into_iter()
        .next()
        .ok_or_else(|| not_found(format!("Item not found: {}", item_id)))?;

    let mut affected_ids = ancestor_ids(&item_id);
    if params.include_self {
        affected_ids.push(item_id.clone());
    }
    let mut affected = store
        .fetch_by_ids(table, id_column, &affected_ids)
        .await
        .map_err(|e| classify(e, false))?;
    sort_by_id(&mut affected, id_column);

    let base = component
        .get(&catalog.component_usage_column)
        .and_then(bom_digest_core::catalog::id_text)
        .filter(|b| !b.trim().is_empty());
    let mut usages = match &base {
        Some(base) => store
            .fetch_where_eq(table, &catalog.component_usage_column, base)
            .await
            .map_err(|e| classify(e, false))?,
        None => Vec::new(),
    };
    if params.exclude_current_usage {
        usages.retain(|r| row_id(r, id_column).as_deref() != Some(item_id.as_str()));
    }
    sort_by_id(&mut usages, id_column);

    let counts = ImpactCounts {
        directly_affected: affected.len(),
        other_usages: usages.len(),
    };
    Ok(Json(ListResponse::new(vec![ImpactReport {
        item_id,
        component,
        directly_affected_components: affected,
        base_child_identifier: base,
        other_usages_of_base_component: usages,
        counts,
    }])))
}

// ============ GET /api/discussions ============

#[derive(Deserialize)]
struct DiscussionParams {
    item_id: Option<String>,
    /// `created_at` lower bound, exclusive.
    since: Option<String>,
    limit: Option<i64>,
}

async fn handle_discussions(
    State(state): State<AppState>,
    Query(params): Query<DiscussionParams>,
) -> Result<Json<ListResponse<Discussion>>, AppError> {
    if params.limit.is_some_and(|l| l < 1) {
        return Err(bad_request("limit must be >= 1"));
    }
    let rows = discussions::list(
        &state.pool,
        params.item_id.as_deref(),
        params.since.as_deref(),
        params.limit,
    )
    .await
    .map_err(|e| classify(e, false))?;
    Ok(Json(ListResponse::new(rows)))
}

// ============ PUT /api/discussion-summary ============

#[derive(Deserialize)]
struct UpdateSummaryBody {
    /// Number, or a string holding one.
    discussion_id: serde_json::Value,
    #[serde(flatten)]
    changes: SummaryUpdate,
}

#[derive(Serialize)]
struct UpdateSummaryResponse {
    success: bool,
    updated_rows: usize,
    discussion: Discussion,
}

async fn handle_update_summary(
    State(state): State<AppState>,
    Json(body): Json<UpdateSummaryBody>,
) -> Result<Json<UpdateSummaryResponse>, AppError> {
    let id = parse_discussion_id(&body.discussion_id).ok_or_else(|| {
        bad_request(format!(
            "Invalid discussion_id: {}. Must be a valid integer.",
            body.discussion_id
        ))
    })?;

    let discussion = discussions::update(&state.pool, id, &body.changes)
        .await
        .map_err(|e| classify(e, false))?
        .ok_or_else(|| not_found(format!("No discussion_summary row found for discussion_id={}", id)))?;

    Ok(Json(UpdateSummaryResponse {
        success: true,
        updated_rows: 1,
        discussion,
    }))
}

// ============ DELETE /api/discussion-summary/{id} ============

#[derive(Serialize)]
struct DeleteSummaryResponse {
    success: bool,
    deleted_rows: usize,
}

async fn handle_delete_summary(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<DeleteSummaryResponse>, AppError> {
    let id: i64 = raw_id.trim().parse().map_err(|_| {
        bad_request(format!(
            "Invalid discussion_id: {}. Must be a valid integer.",
            raw_id
        ))
    })?;

    let deleted = discussions::delete(&state.pool, id)
        .await
        .map_err(|e| classify(e, false))?;
    if !deleted {
        return Err(not_found(format!(
            "No discussion_summary row found for discussion_id={}",
            id
        )));
    }

    Ok(Json(DeleteSummaryResponse {
        success: true,
        deleted_rows: 1,
    }))
}

fn parse_discussion_id(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn row_id(row: &Row, id_column: &str) -> Option<String> {
    row.get(id_column).and_then(bom_digest_core::catalog::id_text)
}

/// Lexicographic, as the catalog stores ids as text.
fn sort_by_id(rows: &mut [Row], id_column: &str) {
    rows.sort_by_key(|r| row_id(r, id_column));
}

fn catalog_store(state: &AppState) -> crate::sqlite_store::SqliteCatalogStore {
    crate::sqlite_store::SqliteCatalogStore::new(
        state.pool.clone(),
        std::time::Duration::from_secs(state.config.catalog.query_timeout_secs),
    )
}
