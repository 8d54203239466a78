use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;
use tokio::task;
use uuid::Uuid;
use windcrew_parser::EntryKind;

use crate::db::DbPool;
use crate::error::{CoreError, Result};
use crate::types::{
    BatchOutcome, BatchStatus, ImportBatchRecord, LatestEntry, NewImportBatch, NewWorkEntry,
    PersonnelRecord, PersonnelStatus, ProjectMappingRecord, WorkEntryLineRecord, WorkEntryRecord,
};

/// Everything the reconciliation engine and the analyzers need from the
/// persistent store: lookup-by-key, upsert, bounded insert, delete-by-key,
/// and filtered range queries. Exact schema/transport stays behind this
/// boundary.
#[async_trait]
pub trait TimesheetStore: Send + Sync {
    async fn find_personnel(
        &self,
        org_id: Uuid,
        employee_code: &str,
    ) -> Result<Option<PersonnelRecord>>;

    async fn insert_personnel(
        &self,
        org_id: Uuid,
        employee_code: &str,
        full_name: &str,
        department: Option<&str>,
    ) -> Result<PersonnelRecord>;

    async fn update_personnel_status(
        &self,
        personnel_id: Uuid,
        status: PersonnelStatus,
        current_project_id: Option<Uuid>,
    ) -> Result<()>;

    /// Idempotent upsert keyed by (org, source code).
    async fn upsert_project_mapping(&self, mapping: &ProjectMappingRecord) -> Result<()>;

    async fn project_mappings(&self, org_id: Uuid) -> Result<Vec<ProjectMappingRecord>>;

    async fn create_import_batch(&self, batch: &NewImportBatch) -> Result<Uuid>;

    async fn finalize_import_batch(&self, batch_id: Uuid, outcome: &BatchOutcome) -> Result<()>;

    async fn recent_import_batches(
        &self,
        org_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ImportBatchRecord>>;

    /// Batches still in `processing` created before the cutoff: orphans left
    /// by an importer that never finished.
    async fn stale_processing_batches(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>>;

    async fn mark_batch_failed(&self, batch_id: Uuid, error: &str) -> Result<()>;

    /// Remove a batch's work entries (lines cascade) and then the batch itself.
    async fn delete_import_batch(&self, batch_id: Uuid) -> Result<()>;

    /// An existing entry for (person, date) belonging to a *different* batch.
    /// A single file never duplicate-detects against itself.
    async fn find_duplicate_entry(
        &self,
        personnel_id: Uuid,
        work_date: NaiveDate,
        exclude_batch: Uuid,
    ) -> Result<Option<Uuid>>;

    async fn delete_work_entry(&self, entry_id: Uuid) -> Result<()>;

    async fn insert_work_entry(&self, entry: &NewWorkEntry) -> Result<Uuid>;

    /// The person's most recent entry by work date, if any.
    async fn latest_entry(&self, personnel_id: Uuid) -> Result<Option<LatestEntry>>;

    async fn entries_in_range(
        &self,
        org_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WorkEntryRecord>>;
}

#[derive(Clone)]
pub struct PostgresStore {
    pool: DbPool,
}

impl PostgresStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn parse_entry_kind(value: &str) -> Result<EntryKind> {
    EntryKind::try_from(value).map_err(CoreError::Validation)
}

fn parse_personnel_status(value: &str) -> Result<PersonnelStatus> {
    PersonnelStatus::from_str(value)
        .ok_or_else(|| CoreError::Validation(format!("invalid personnel status '{value}'")))
}

fn parse_batch_status(value: &str) -> Result<BatchStatus> {
    BatchStatus::from_str(value)
        .ok_or_else(|| CoreError::Validation(format!("invalid batch status '{value}'")))
}

fn personnel_from_row(row: &sqlx::postgres::PgRow) -> Result<PersonnelRecord> {
    let status: String = row.try_get("status")?;
    Ok(PersonnelRecord {
        id: row.try_get("id")?,
        org_id: row.try_get("org_id")?,
        employee_code: row.try_get("employee_code")?,
        full_name: row.try_get("full_name")?,
        department: row.try_get("department")?,
        status: parse_personnel_status(&status)?,
        current_project_id: row.try_get("current_project_id")?,
        is_active: row.try_get("is_active")?,
    })
}

#[async_trait]
impl TimesheetStore for PostgresStore {
    async fn find_personnel(
        &self,
        org_id: Uuid,
        employee_code: &str,
    ) -> Result<Option<PersonnelRecord>> {
        let row = sqlx::query(
            r#"
                SELECT id, org_id, employee_code, full_name, department, status,
                       current_project_id, is_active
                FROM personnel
                WHERE org_id = $1 AND employee_code = $2
            "#,
        )
        .bind(org_id)
        .bind(employee_code)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(personnel_from_row).transpose()
    }

    async fn insert_personnel(
        &self,
        org_id: Uuid,
        employee_code: &str,
        full_name: &str,
        department: Option<&str>,
    ) -> Result<PersonnelRecord> {
        let row = sqlx::query(
            r#"
                INSERT INTO personnel (org_id, employee_code, full_name, department, status)
                VALUES ($1, $2, $3, $4, 'available')
                RETURNING id, org_id, employee_code, full_name, department, status,
                          current_project_id, is_active
            "#,
        )
        .bind(org_id)
        .bind(employee_code)
        .bind(full_name)
        .bind(department)
        .fetch_one(&self.pool)
        .await?;

        personnel_from_row(&row)
    }

    async fn update_personnel_status(
        &self,
        personnel_id: Uuid,
        status: PersonnelStatus,
        current_project_id: Option<Uuid>,
    ) -> Result<()> {
        sqlx::query(
            r#"
                UPDATE personnel
                SET status = $1, current_project_id = $2
                WHERE id = $3
            "#,
        )
        .bind(status.as_str())
        .bind(current_project_id)
        .bind(personnel_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_project_mapping(&self, mapping: &ProjectMappingRecord) -> Result<()> {
        sqlx::query(
            r#"
                INSERT INTO project_code_mappings (org_id, source_code, source_name, project_id)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (org_id, source_code) DO UPDATE SET
                    source_name = EXCLUDED.source_name,
                    project_id = EXCLUDED.project_id
            "#,
        )
        .bind(mapping.org_id)
        .bind(&mapping.source_code)
        .bind(&mapping.source_name)
        .bind(mapping.project_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn project_mappings(&self, org_id: Uuid) -> Result<Vec<ProjectMappingRecord>> {
        let rows = sqlx::query(
            r#"
                SELECT org_id, source_code, source_name, project_id
                FROM project_code_mappings
                WHERE org_id = $1
                ORDER BY source_code
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        let mut mappings = Vec::with_capacity(rows.len());
        for row in rows {
            mappings.push(ProjectMappingRecord {
                org_id: row.try_get("org_id")?,
                source_code: row.try_get("source_code")?,
                source_name: row.try_get("source_name")?,
                project_id: row.try_get("project_id")?,
            });
        }
        Ok(mappings)
    }

    async fn create_import_batch(&self, batch: &NewImportBatch) -> Result<Uuid> {
        let row = sqlx::query(
            r#"
                INSERT INTO import_batches
                    (org_id, uploaded_by, file_name, period_start, period_end, total_rows, status)
                VALUES ($1, $2, $3, $4, $5, $6, 'processing')
                RETURNING id
            "#,
        )
        .bind(batch.org_id)
        .bind(batch.uploaded_by)
        .bind(&batch.file_name)
        .bind(batch.period_start)
        .bind(batch.period_end)
        .bind(batch.total_rows)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("id")?)
    }

    async fn finalize_import_batch(&self, batch_id: Uuid, outcome: &BatchOutcome) -> Result<()> {
        sqlx::query(
            r#"
                UPDATE import_batches
                SET imported_rows = $1,
                    new_personnel = $2,
                    skipped_rows = $3,
                    errors = $4,
                    status = $5
                WHERE id = $6
            "#,
        )
        .bind(outcome.imported_rows)
        .bind(outcome.new_personnel)
        .bind(outcome.skipped_rows)
        .bind(serde_json::to_value(&outcome.errors)?)
        .bind(outcome.status.as_str())
        .bind(batch_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_import_batches(
        &self,
        org_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ImportBatchRecord>> {
        let rows = sqlx::query(
            r#"
                SELECT id, org_id, uploaded_by, file_name, period_start, period_end,
                       total_rows, imported_rows, new_personnel, skipped_rows,
                       status, errors, created_at
                FROM import_batches
                WHERE org_id = $1
                ORDER BY created_at DESC
                LIMIT $2
            "#,
        )
        .bind(org_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut batches = Vec::with_capacity(rows.len());
        for row in rows {
            let status: String = row.try_get("status")?;
            let errors: serde_json::Value = row.try_get("errors")?;
            batches.push(ImportBatchRecord {
                id: row.try_get("id")?,
                org_id: row.try_get("org_id")?,
                uploaded_by: row.try_get("uploaded_by")?,
                file_name: row.try_get("file_name")?,
                period_start: row.try_get("period_start")?,
                period_end: row.try_get("period_end")?,
                total_rows: row.try_get("total_rows")?,
                imported_rows: row.try_get("imported_rows")?,
                new_personnel: row.try_get("new_personnel")?,
                skipped_rows: row.try_get("skipped_rows")?,
                status: parse_batch_status(&status)?,
                errors: serde_json::from_value(errors)?,
                created_at: row.try_get("created_at")?,
            });
        }
        Ok(batches)
    }

    async fn stale_processing_batches(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            r#"
                SELECT id FROM import_batches
                WHERE status = 'processing' AND created_at < $1
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(row.try_get("id")?);
        }
        Ok(ids)
    }

    async fn mark_batch_failed(&self, batch_id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            r#"
                UPDATE import_batches
                SET status = 'failed', errors = $1
                WHERE id = $2
            "#,
        )
        .bind(serde_json::to_value(vec![error])?)
        .bind(batch_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_import_batch(&self, batch_id: Uuid) -> Result<()> {
        sqlx::query(r#"DELETE FROM work_entries WHERE import_batch_id = $1"#)
            .bind(batch_id)
            .execute(&self.pool)
            .await?;
        sqlx::query(r#"DELETE FROM import_batches WHERE id = $1"#)
            .bind(batch_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_duplicate_entry(
        &self,
        personnel_id: Uuid,
        work_date: NaiveDate,
        exclude_batch: Uuid,
    ) -> Result<Option<Uuid>> {
        let row = sqlx::query(
            r#"
                SELECT id FROM work_entries
                WHERE personnel_id = $1 AND work_date = $2 AND import_batch_id <> $3
                LIMIT 1
            "#,
        )
        .bind(personnel_id)
        .bind(work_date)
        .bind(exclude_batch)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row.try_get("id")).transpose()?)
    }

    async fn delete_work_entry(&self, entry_id: Uuid) -> Result<()> {
        sqlx::query(r#"DELETE FROM work_entries WHERE id = $1"#)
            .bind(entry_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_work_entry(&self, entry: &NewWorkEntry) -> Result<Uuid> {
        let mut db_tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
                INSERT INTO work_entries
                    (org_id, personnel_id, import_batch_id, work_date, entry_type,
                     total_hours, start_time, end_time, project_id,
                     source_project_code, source_activity_code, notes,
                     meal_breakfast, meal_lunch, meal_dinner, meal_night, source_status)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
                RETURNING id
            "#,
        )
        .bind(entry.org_id)
        .bind(entry.personnel_id)
        .bind(entry.import_batch_id)
        .bind(entry.work_date)
        .bind(entry.entry_kind.as_str())
        .bind(entry.total_hours)
        .bind(entry.start_time)
        .bind(entry.end_time)
        .bind(entry.project_id)
        .bind(&entry.source_project_code)
        .bind(&entry.source_activity_code)
        .bind(&entry.notes)
        .bind(entry.meal_breakfast)
        .bind(entry.meal_lunch)
        .bind(entry.meal_dinner)
        .bind(entry.meal_night)
        .bind(&entry.source_status)
        .fetch_one(&mut *db_tx)
        .await?;

        let entry_id: Uuid = row.try_get("id")?;

        for line in &entry.lines {
            sqlx::query(
                r#"
                    INSERT INTO work_entry_lines
                        (work_entry_id, line_no, work_type_code, work_type_label, turbine_raw, hours)
                    VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(entry_id)
            .bind(line.slot)
            .bind(&line.work_type_code)
            .bind(&line.work_type_label)
            .bind(&line.turbine_raw)
            .bind(line.hours)
            .execute(&mut *db_tx)
            .await?;
        }

        db_tx.commit().await?;
        Ok(entry_id)
    }

    async fn latest_entry(&self, personnel_id: Uuid) -> Result<Option<LatestEntry>> {
        let row = sqlx::query(
            r#"
                SELECT work_date, entry_type, project_id
                FROM work_entries
                WHERE personnel_id = $1
                ORDER BY work_date DESC, created_at DESC
                LIMIT 1
            "#,
        )
        .bind(personnel_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let entry_type: String = row.try_get("entry_type")?;
                Ok(Some(LatestEntry {
                    work_date: row.try_get("work_date")?,
                    entry_kind: parse_entry_kind(&entry_type)?,
                    project_id: row.try_get("project_id")?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn entries_in_range(
        &self,
        org_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WorkEntryRecord>> {
        let rows = sqlx::query(
            r#"
                SELECT we.id, we.personnel_id, we.work_date, we.entry_type, we.total_hours,
                       we.project_id,
                       p.employee_code, p.full_name, p.department,
                       pr.name AS project_name
                FROM work_entries we
                JOIN personnel p ON p.id = we.personnel_id
                LEFT JOIN projects pr ON pr.id = we.project_id
                WHERE we.org_id = $1 AND we.work_date >= $2 AND we.work_date <= $3
                ORDER BY we.work_date, p.employee_code
            "#,
        )
        .bind(org_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let entry_type: String = row.try_get("entry_type")?;
            entries.push(WorkEntryRecord {
                id: row.try_get("id")?,
                personnel_id: row.try_get("personnel_id")?,
                employee_code: row.try_get("employee_code")?,
                full_name: row.try_get("full_name")?,
                department: row.try_get("department")?,
                work_date: row.try_get("work_date")?,
                entry_kind: parse_entry_kind(&entry_type)?,
                total_hours: row.try_get("total_hours")?,
                project_id: row.try_get("project_id")?,
                project_name: row.try_get("project_name")?,
                lines: Vec::new(),
            });
        }

        if entries.is_empty() {
            return Ok(entries);
        }

        let ids: Vec<Uuid> = entries.iter().map(|entry| entry.id).collect();
        let line_rows = sqlx::query(
            r#"
                SELECT work_entry_id, line_no, work_type_code, work_type_label, turbine_raw, hours
                FROM work_entry_lines
                WHERE work_entry_id = ANY($1)
                ORDER BY work_entry_id, line_no
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut lines_by_entry: HashMap<Uuid, Vec<WorkEntryLineRecord>> = HashMap::new();
        for row in line_rows {
            let entry_id: Uuid = row.try_get("work_entry_id")?;
            lines_by_entry
                .entry(entry_id)
                .or_default()
                .push(WorkEntryLineRecord {
                    slot: row.try_get("line_no")?,
                    work_type_code: row.try_get("work_type_code")?,
                    work_type_label: row.try_get("work_type_label")?,
                    turbine_raw: row.try_get("turbine_raw")?,
                    hours: row.try_get("hours")?,
                });
        }

        for entry in &mut entries {
            if let Some(lines) = lines_by_entry.remove(&entry.id) {
                entry.lines = lines;
            }
        }

        Ok(entries)
    }
}

/// Postgres advisory lock serializing imports. The personnel upsert and the
/// check-then-insert duplicate probe are not safe under concurrent importers.
pub struct ImportLock {
    conn: Option<sqlx::pool::PoolConnection<sqlx::Postgres>>,
    key: i64,
}

pub const IMPORT_LOCK_KEY: i64 = 0x57494E44_43_52; // "WINDCR"

impl ImportLock {
    pub async fn acquire(pool: &DbPool, key: i64) -> Result<Self> {
        let mut conn = pool.acquire().await?;
        sqlx::query::<sqlx::Postgres>("SELECT pg_advisory_lock($1)")
            .bind(key)
            .execute(conn.as_mut())
            .await?;
        Ok(Self {
            conn: Some(conn),
            key,
        })
    }

    pub async fn release(mut self) -> Result<()> {
        if let Some(mut conn) = self.conn.take() {
            sqlx::query::<sqlx::Postgres>("SELECT pg_advisory_unlock($1)")
                .bind(self.key)
                .execute(conn.as_mut())
                .await?;
        }
        Ok(())
    }
}

impl Drop for ImportLock {
    fn drop(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            let key = self.key;
            task::spawn(async move {
                if let Err(err) = sqlx::query::<sqlx::Postgres>("SELECT pg_advisory_unlock($1)")
                    .bind(key)
                    .execute(conn.as_mut())
                    .await
                {
                    tracing::warn!("failed to release import lock in drop: {err}");
                }
            });
        }
    }
}
