use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use base64::Engine as _;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use windcrew_core::availability::{summarize_availability, PersonAvailability};
use windcrew_core::conflicts::{detect_conflicts, ScheduleConflict};
use windcrew_core::import::{run_import_exclusive, DuplicatePolicy, ImportRequest, ImportSummary};
use windcrew_core::rollups;
use windcrew_core::store::TimesheetStore;
use windcrew_core::types::{ImportBatchRecord, ProjectMappingRecord};
use windcrew_parser::{parse_workbook, ParseResult};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    /// Workbook bytes, base64-encoded.
    pub file_base64: String,
}

/// Decode + normalize + aggregate a workbook for operator review. Malformed
/// files come back as a zero-row result with warnings, not an error status.
pub async fn parse_timesheet(
    Json(payload): Json<ParseRequest>,
) -> Result<Json<ParseResult>, StatusCode> {
    let bytes = decode_file(&payload.file_base64)?;
    Ok(Json(parse_workbook(&bytes)))
}

#[derive(Debug, Deserialize)]
pub struct ImportRequestBody {
    pub file_base64: String,
    pub file_name: String,
    pub org_id: Uuid,
    pub uploaded_by: Option<Uuid>,
    pub policy: DuplicatePolicy,
    /// Source project code → internal project id, as confirmed by the operator.
    #[serde(default)]
    pub mappings: HashMap<String, Uuid>,
}

pub async fn import_timesheet(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ImportRequestBody>,
) -> Result<Json<ImportSummary>, StatusCode> {
    let bytes = decode_file(&payload.file_base64)?;
    let parse = parse_workbook(&bytes);
    if parse.rows.is_empty() {
        tracing::warn!(file = %payload.file_name, warnings = ?parse.warnings, "import rejected");
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let request = ImportRequest {
        org_id: payload.org_id,
        uploaded_by: payload.uploaded_by,
        file_name: payload.file_name,
        policy: payload.policy,
        mappings: payload.mappings,
    };

    run_import_exclusive(&state.store, &parse, request)
        .await
        .map(Json)
        .map_err(|err| {
            tracing::error!("import failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

#[derive(Debug, Deserialize)]
pub struct BatchListQuery {
    pub org_id: Uuid,
    #[serde(default = "default_batch_limit")]
    pub limit: i64,
}

fn default_batch_limit() -> i64 {
    50
}

pub async fn list_batches(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BatchListQuery>,
) -> Result<Json<Vec<ImportBatchRecord>>, StatusCode> {
    state
        .store
        .recent_import_batches(query.org_id, query.limit)
        .await
        .map(Json)
        .map_err(internal_error)
}

/// Undo an import: the batch's work entries go first (lines cascade), then
/// the batch record itself. Personnel created by the import are kept.
pub async fn delete_batch(
    State(state): State<Arc<AppState>>,
    Path(batch_id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    state
        .store
        .delete_import_batch(batch_id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(internal_error)
}

#[derive(Debug, Deserialize)]
pub struct OrgQuery {
    pub org_id: Uuid,
}

/// Saved source-code → project mappings; the review screen preloads these so
/// previously confirmed codes apply automatically on the next import.
pub async fn list_project_mappings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OrgQuery>,
) -> Result<Json<Vec<ProjectMappingRecord>>, StatusCode> {
    state
        .store
        .project_mappings(query.org_id)
        .await
        .map(Json)
        .map_err(internal_error)
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub org_id: Uuid,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

pub async fn conflict_report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<ScheduleConflict>>, StatusCode> {
    let entries = state
        .store
        .entries_in_range(query.org_id, query.start, query.end)
        .await
        .map_err(internal_error)?;
    Ok(Json(detect_conflicts(&entries)))
}

pub async fn availability_report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<PersonAvailability>>, StatusCode> {
    let entries = state
        .store
        .entries_in_range(query.org_id, query.start, query.end)
        .await
        .map_err(internal_error)?;
    Ok(Json(summarize_availability(&entries, query.start, query.end)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoursGroupBy {
    Person,
    Project,
    Turbine,
}

#[derive(Debug, Deserialize)]
pub struct HoursQuery {
    pub org_id: Uuid,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub group_by: HoursGroupBy,
}

#[derive(Debug, serde::Serialize)]
#[serde(untagged)]
pub enum HoursReport {
    Person(Vec<rollups::PersonHours>),
    Project(Vec<rollups::ProjectHours>),
    Turbine(Vec<rollups::TurbineHours>),
}

pub async fn hours_report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HoursQuery>,
) -> Result<Json<HoursReport>, StatusCode> {
    let entries = state
        .store
        .entries_in_range(query.org_id, query.start, query.end)
        .await
        .map_err(internal_error)?;

    let report = match query.group_by {
        HoursGroupBy::Person => HoursReport::Person(rollups::rollup_by_person(&entries)),
        HoursGroupBy::Project => HoursReport::Project(rollups::rollup_by_project(&entries)),
        HoursGroupBy::Turbine => HoursReport::Turbine(rollups::rollup_by_turbine(&entries)),
    };
    Ok(Json(report))
}

fn decode_file(encoded: &str) -> Result<Vec<u8>, StatusCode> {
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|err| {
            tracing::warn!("workbook payload is not valid base64: {err}");
            StatusCode::BAD_REQUEST
        })
}

fn internal_error(err: windcrew_core::error::CoreError) -> StatusCode {
    tracing::error!("store query failed: {err}");
    StatusCode::INTERNAL_SERVER_ERROR
}
