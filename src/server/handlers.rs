//! Request handlers: the HTML page, form posts and the JSON API.

use super::page::PageView;
use super::{AppState, ViewSettings};
use crate::analysis;
use crate::models::{
    AggregationRow, Dataset, FileStatus, FilterOptions, FilterSelection, IngestReport, PendingFix,
    PendingRecord, PendingResolution, SortKey,
};
use crate::report;
use crate::session::SessionId;
use axum::extract::{Form, Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

// ── Request/Response types ────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    pub vocation: Option<String>,
    pub mode: Option<String>,
    pub sort: Option<String>,
}

impl ViewQuery {
    /// Blank or unrecognized values fall back to the default order.
    pub fn sort_key(&self) -> SortKey {
        param(&self.sort)
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FiltersQuery {
    pub vocation: Option<String>,
}

#[derive(Serialize)]
pub struct ZonesResponse {
    pub filter: FilterSelection,
    pub rows: Vec<AggregationRow>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub sessions: usize,
}

// ── Helpers ───────────────────────────────────────

/// Treat absent and blank query values alike.
fn param(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

struct ZoneView {
    options: FilterOptions,
    filter: FilterSelection,
    rows: Vec<AggregationRow>,
}

fn zone_view(dataset: &Dataset, query: &ViewQuery, settings: &ViewSettings) -> ZoneView {
    let records = &dataset.records;
    let filter = analysis::resolve_filter(
        records,
        param(&query.vocation),
        param(&query.mode),
        &settings.default_vocation,
        &settings.default_mode,
    );

    let narrowed = Some(filter.vocation.as_str()).filter(|v| !v.is_empty());
    let options = analysis::filter_options_for(records, narrowed);

    let mut rows = analysis::aggregate_by_zone(records, &filter);
    analysis::sort_rows(&mut rows, query.sort_key());

    ZoneView {
        options,
        filter,
        rows,
    }
}

async fn read_uploads(
    mut multipart: Multipart,
) -> Result<Vec<(String, Vec<u8>)>, (StatusCode, String)> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (e.status(), format!("Multipart error: {}", e.body_text())))?
    {
        // Plain form fields carry no file name.
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };

        let bytes = field
            .bytes()
            .await
            .map_err(|e| (e.status(), format!("Failed to read {}: {}", name, e.body_text())))?;

        // An empty file input still submits one nameless, empty part.
        if name.is_empty() && bytes.is_empty() {
            continue;
        }

        let name = if name.is_empty() {
            format!("upload-{}", files.len() + 1)
        } else {
            name
        };
        files.push((name, bytes.to_vec()));
    }

    Ok(files)
}

fn log_upload(id: SessionId, report: &IngestReport) {
    info!(
        "Session {}: {} file(s) accepted, {} duplicate, {} rejected; {} records, {} pending",
        id,
        report.count(FileStatus::Accepted),
        report.count(FileStatus::Duplicate),
        report.count(FileStatus::Rejected),
        report.total_records(),
        report.total_pending(),
    );
}

async fn ingest_uploads(
    state: &AppState,
    id: SessionId,
    multipart: Multipart,
) -> Result<IngestReport, (StatusCode, String)> {
    let files = read_uploads(multipart).await?;
    let report = state.sessions.with_session(id, |s| s.ingest(files)).await;
    log_upload(id, &report);
    Ok(report)
}

fn no_pending(index: usize) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("No pending hunt at index {}", index))
}

async fn resolve_in_session(
    state: &AppState,
    id: SessionId,
    index: usize,
    fix: PendingFix,
) -> Result<PendingResolution, (StatusCode, String)> {
    let resolution = state
        .sessions
        .with_session(id, |s| s.resolve_pending(index, &fix))
        .await
        .ok_or_else(|| no_pending(index))?;

    match &resolution {
        PendingResolution::Resolved { record } => {
            info!("Session {}: {} resolved into {}", id, record.source, record.zone)
        }
        PendingResolution::Pending { pending } => {
            info!("Session {}: {} still pending, {}", id, pending.source, pending.problems())
        }
    }
    Ok(resolution)
}

async fn delete_in_session(
    state: &AppState,
    id: SessionId,
    index: usize,
) -> Result<PendingRecord, (StatusCode, String)> {
    let removed = state
        .sessions
        .with_session(id, |s| s.delete_pending(index))
        .await
        .ok_or_else(|| no_pending(index))?;

    info!("Session {}: discarded pending {}", id, removed.source);
    Ok(removed)
}

// ── HTML ──────────────────────────────────────────

pub async fn index(
    State(state): State<Arc<AppState>>,
    Extension(id): Extension<SessionId>,
    Query(query): Query<ViewQuery>,
) -> Result<Html<String>, (StatusCode, String)> {
    let settings = &state.view;
    let sort = query.sort_key();

    let html = state
        .sessions
        .with_session(id, |session| {
            let last_upload = session.take_last_upload();
            let dataset = session.dataset();
            let zones = zone_view(dataset, &query, settings);

            state.page.render(&PageView {
                options: &zones.options,
                filter: &zones.filter,
                rows: &zones.rows,
                sort,
                pending: &dataset.pending,
                last_upload: last_upload.as_ref(),
                record_count: dataset.records.len(),
                precision: settings.precision,
            })
        })
        .await
        .map_err(|e| {
            error!("Failed to render page: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page".to_string())
        })?;

    Ok(Html(html))
}

pub async fn upload_form(
    State(state): State<Arc<AppState>>,
    Extension(id): Extension<SessionId>,
    multipart: Multipart,
) -> Result<Redirect, (StatusCode, String)> {
    ingest_uploads(&state, id, multipart).await?;
    Ok(Redirect::to("/"))
}

pub async fn reset_form(
    State(state): State<Arc<AppState>>,
    Extension(id): Extension<SessionId>,
) -> Redirect {
    state.sessions.with_session(id, |s| s.clear()).await;
    info!("Session {} cleared", id);
    Redirect::to("/")
}

pub async fn resolve_pending_form(
    State(state): State<Arc<AppState>>,
    Extension(id): Extension<SessionId>,
    Path(index): Path<usize>,
    Form(fix): Form<PendingFix>,
) -> Result<Redirect, (StatusCode, String)> {
    resolve_in_session(&state, id, index, fix).await?;
    Ok(Redirect::to("/"))
}

pub async fn delete_pending_form(
    State(state): State<Arc<AppState>>,
    Extension(id): Extension<SessionId>,
    Path(index): Path<usize>,
) -> Result<Redirect, (StatusCode, String)> {
    delete_in_session(&state, id, index).await?;
    Ok(Redirect::to("/"))
}

// ── JSON API ──────────────────────────────────────

pub async fn api_upload(
    State(state): State<Arc<AppState>>,
    Extension(id): Extension<SessionId>,
    multipart: Multipart,
) -> Result<Json<IngestReport>, (StatusCode, String)> {
    let report = ingest_uploads(&state, id, multipart).await?;
    Ok(Json(report))
}

pub async fn api_filters(
    State(state): State<Arc<AppState>>,
    Extension(id): Extension<SessionId>,
    Query(query): Query<FiltersQuery>,
) -> Json<FilterOptions> {
    let options = state
        .sessions
        .with_session(id, |s| {
            analysis::filter_options_for(&s.dataset().records, param(&query.vocation))
        })
        .await;

    Json(options)
}

pub async fn api_zones(
    State(state): State<Arc<AppState>>,
    Extension(id): Extension<SessionId>,
    Query(query): Query<ViewQuery>,
) -> Json<ZonesResponse> {
    let zones = state
        .sessions
        .with_session(id, |s| zone_view(s.dataset(), &query, &state.view))
        .await;

    Json(ZonesResponse {
        filter: zones.filter,
        rows: zones.rows,
    })
}

pub async fn api_pending(
    State(state): State<Arc<AppState>>,
    Extension(id): Extension<SessionId>,
) -> Json<Vec<PendingRecord>> {
    let pending = state
        .sessions
        .with_session(id, |s| s.dataset().pending.clone())
        .await;

    Json(pending)
}

pub async fn api_resolve_pending(
    State(state): State<Arc<AppState>>,
    Extension(id): Extension<SessionId>,
    Path(index): Path<usize>,
    Json(fix): Json<PendingFix>,
) -> Result<Json<PendingResolution>, (StatusCode, String)> {
    let resolution = resolve_in_session(&state, id, index, fix).await?;
    Ok(Json(resolution))
}

pub async fn api_delete_pending(
    State(state): State<Arc<AppState>>,
    Extension(id): Extension<SessionId>,
    Path(index): Path<usize>,
) -> Result<StatusCode, (StatusCode, String)> {
    delete_in_session(&state, id, index).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn api_export(
    State(state): State<Arc<AppState>>,
    Extension(id): Extension<SessionId>,
    Query(query): Query<ViewQuery>,
) -> Response {
    let zones = state
        .sessions
        .with_session(id, |s| zone_view(s.dataset(), &query, &state.view))
        .await;

    let csv = report::generate_csv(&zones.rows, state.view.precision);
    let disposition = format!("attachment; filename=\"{}\"", state.view.csv_filename);

    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response()
}

pub async fn api_reset(
    State(state): State<Arc<AppState>>,
    Extension(id): Extension<SessionId>,
) -> StatusCode {
    if state.sessions.remove(id).await {
        info!("Session {} removed", id);
    }
    StatusCode::NO_CONTENT
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        sessions: state.sessions.len().await,
    })
}
