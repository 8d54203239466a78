use std::collections::HashMap;

use chrono::{Duration, Utc};
use uuid::Uuid;
use windcrew_parser::{EntryKind, ParseResult};

use crate::error::Result;
use crate::store::{ImportLock, PostgresStore, TimesheetStore, IMPORT_LOCK_KEY};
use crate::types::{
    BatchOutcome, BatchStatus, NewImportBatch, NewWorkEntry, NewWorkEntryLine, PersonnelStatus,
    ProjectMappingRecord,
};

/// Rows are written in fixed-size chunks purely so progress is observable;
/// there is no parallelism across chunks.
const CHUNK_SIZE: usize = 10;

/// At most this many row-level error messages survive onto the batch record.
const MAX_BATCH_ERRORS: usize = 20;

/// What to do when a row collides with an entry from an earlier batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    Skip,
    Overwrite,
}

/// Operator-confirmed inputs for one import run.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub org_id: Uuid,
    pub uploaded_by: Option<Uuid>,
    pub file_name: String,
    pub policy: DuplicatePolicy,
    /// Source project code → internal project id. May be partial; rows whose
    /// code is unmapped are still imported, just without a project.
    pub mappings: HashMap<String, Uuid>,
}

/// Post-import summary shown to the operator.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ImportSummary {
    pub batch_id: Uuid,
    pub total_rows: i64,
    pub imported_rows: i64,
    pub new_personnel: i64,
    pub skipped_rows: i64,
    pub errors: Vec<String>,
    pub status: BatchStatus,
}

/// Run the reconciliation engine against a Postgres store, serialized on the
/// import advisory lock so two operators cannot race the personnel upsert or
/// the duplicate probe.
pub async fn run_import_exclusive(
    store: &PostgresStore,
    parse: &ParseResult,
    request: ImportRequest,
) -> Result<ImportSummary> {
    let lock = ImportLock::acquire(store.pool(), IMPORT_LOCK_KEY).await?;
    let result = run_import(store, parse, request).await;
    lock.release().await?;
    result
}

/// The reconciliation & import engine.
///
/// Upserts personnel, applies project-code mappings, detects duplicates
/// against earlier batches under the given policy, persists rows in chunks,
/// finalizes the batch, and refreshes the touched personnel's derived status.
/// Store failures on individual rows degrade to bounded error messages; they
/// never abort the batch.
pub async fn run_import<S: TimesheetStore + ?Sized>(
    store: &S,
    parse: &ParseResult,
    request: ImportRequest,
) -> Result<ImportSummary> {
    let batch_id = store
        .create_import_batch(&NewImportBatch {
            org_id: request.org_id,
            uploaded_by: request.uploaded_by,
            file_name: request.file_name.clone(),
            period_start: parse.date_range.start,
            period_end: parse.date_range.end,
            total_rows: parse.total_rows as i64,
        })
        .await?;

    tracing::info!(
        %batch_id,
        rows = parse.rows.len(),
        file = %request.file_name,
        "import started"
    );

    let mut imported_rows = 0i64;
    let mut new_personnel = 0i64;
    let mut skipped_rows = 0i64;
    let mut errors: Vec<String> = Vec::new();

    for (source_code, project_id) in &request.mappings {
        let source_name = parse
            .unique_projects
            .iter()
            .find(|project| &project.source_code == source_code)
            .map(|project| project.source_name.clone())
            .unwrap_or_else(|| source_code.clone());
        store
            .upsert_project_mapping(&ProjectMappingRecord {
                org_id: request.org_id,
                source_code: source_code.clone(),
                source_name,
                project_id: *project_id,
            })
            .await?;
    }

    let mut personnel_ids: HashMap<String, Uuid> = HashMap::new();
    for person in &parse.unique_personnel {
        match store
            .find_personnel(request.org_id, &person.employee_code)
            .await?
        {
            Some(existing) => {
                personnel_ids.insert(person.employee_code.clone(), existing.id);
            }
            None => {
                let department = (!person.department.is_empty()).then_some(&*person.department);
                match store
                    .insert_personnel(
                        request.org_id,
                        &person.employee_code,
                        &person.full_name,
                        department,
                    )
                    .await
                {
                    Ok(created) => {
                        personnel_ids.insert(person.employee_code.clone(), created.id);
                        new_personnel += 1;
                    }
                    Err(err) => errors.push(format!("{}: {err}", person.employee_code)),
                }
            }
        }
    }

    let total = parse.rows.len();
    for (chunk_index, chunk) in parse.rows.chunks(CHUNK_SIZE).enumerate() {
        for row in chunk {
            let Some(&personnel_id) = personnel_ids.get(&row.employee_code) else {
                skipped_rows += 1;
                continue;
            };

            let project_id = if row.source_project_code.is_empty() {
                None
            } else {
                request.mappings.get(&row.source_project_code).copied()
            };

            if let Some(existing) = store
                .find_duplicate_entry(personnel_id, row.work_date, batch_id)
                .await?
            {
                match request.policy {
                    DuplicatePolicy::Skip => {
                        skipped_rows += 1;
                        continue;
                    }
                    DuplicatePolicy::Overwrite => {
                        store.delete_work_entry(existing).await?;
                    }
                }
            }

            let entry = NewWorkEntry {
                org_id: request.org_id,
                personnel_id,
                import_batch_id: batch_id,
                work_date: row.work_date,
                entry_kind: row.entry_kind,
                total_hours: row.total_hours,
                start_time: row.start_time,
                end_time: row.end_time,
                project_id,
                source_project_code: non_empty(&row.source_project_code),
                source_activity_code: non_empty(&row.source_activity_code),
                notes: non_empty(&row.notes),
                meal_breakfast: row.meal_breakfast,
                meal_lunch: row.meal_lunch,
                meal_dinner: row.meal_dinner,
                meal_night: row.meal_night,
                source_status: non_empty(&row.source_status),
                lines: row
                    .lines
                    .iter()
                    .map(|line| NewWorkEntryLine {
                        slot: line.slot as i16,
                        work_type_code: line.work_type_code.clone(),
                        work_type_label: line.work_type_label.clone(),
                        turbine_raw: non_empty(&line.turbine_raw),
                        hours: line.hours,
                    })
                    .collect(),
            };

            match store.insert_work_entry(&entry).await {
                Ok(_) => imported_rows += 1,
                Err(err) => {
                    errors.push(format!("{} / {}: {err}", row.full_name, row.work_date));
                    skipped_rows += 1;
                }
            }
        }

        tracing::debug!(
            %batch_id,
            processed = (chunk_index * CHUNK_SIZE + chunk.len()).min(total),
            total,
            "import progress"
        );
    }

    // A batch fails only when errors outnumber imported rows.
    let status = if errors.len() as i64 > imported_rows {
        BatchStatus::Failed
    } else {
        BatchStatus::Completed
    };

    let mut bounded_errors = errors;
    bounded_errors.truncate(MAX_BATCH_ERRORS);

    let outcome = BatchOutcome {
        imported_rows,
        new_personnel,
        skipped_rows,
        errors: bounded_errors.clone(),
        status,
    };
    store.finalize_import_batch(batch_id, &outcome).await?;

    if let Err(err) = refresh_personnel_status(store, personnel_ids.values().copied()).await {
        tracing::warn!(%batch_id, "status refresh after import failed: {err}");
    }

    tracing::info!(
        %batch_id,
        imported = imported_rows,
        new = new_personnel,
        skipped = skipped_rows,
        status = status.as_str(),
        "import finished"
    );

    Ok(ImportSummary {
        batch_id,
        total_rows: parse.total_rows as i64,
        imported_rows,
        new_personnel,
        skipped_rows,
        errors: bounded_errors,
        status,
    })
}

/// Recompute each person's displayed status from their *latest* entry by work
/// date. Not tied to the wall-clock date: importing historical data leaves
/// current status alone unless it supersedes the latest known entry.
pub async fn refresh_personnel_status<S: TimesheetStore + ?Sized>(
    store: &S,
    personnel_ids: impl IntoIterator<Item = Uuid>,
) -> Result<()> {
    for personnel_id in personnel_ids {
        if let Some(latest) = store.latest_entry(personnel_id).await? {
            store
                .update_personnel_status(
                    personnel_id,
                    status_for_kind(latest.entry_kind),
                    latest.project_id,
                )
                .await?;
        }
    }
    Ok(())
}

/// Finalize orphaned `processing` batches older than `max_age` as failed.
/// A batch left in `processing` means an importer died mid-run; its rows stay
/// in place (imports are not rolled back) but the batch must reach a terminal
/// state.
pub async fn sweep_stale_batches<S: TimesheetStore + ?Sized>(
    store: &S,
    max_age: Duration,
) -> Result<usize> {
    let cutoff = Utc::now() - max_age;
    let stale = store.stale_processing_batches(cutoff).await?;
    let count = stale.len();
    for batch_id in stale {
        store
            .mark_batch_failed(batch_id, "import did not finish; closed by sweep")
            .await?;
        tracing::warn!(%batch_id, "stale processing batch marked failed");
    }
    Ok(count)
}

/// Fixed entry-kind → personnel-status derivation table.
pub fn status_for_kind(kind: EntryKind) -> PersonnelStatus {
    match kind {
        EntryKind::OnSite => PersonnelStatus::OnSite,
        EntryKind::Travel => PersonnelStatus::Travel,
        EntryKind::Standby => PersonnelStatus::Standby,
        EntryKind::AnnualLeave
        | EntryKind::InterProjectLeave
        | EntryKind::SickLeave
        | EntryKind::DayOff => PersonnelStatus::Leave,
        EntryKind::Training => PersonnelStatus::Training,
        EntryKind::PaternityLeave | EntryKind::Office | EntryKind::Unclassified => {
            PersonnelStatus::Available
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
