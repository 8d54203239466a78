//! In-memory store double for exercising the import engine without Postgres.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;
use windcrew_parser::{
    DateRange, EntryKind, ParseResult, ParsedRow, PersonnelSummary, ProjectSummary,
};

use windcrew_core::error::{CoreError, Result};
use windcrew_core::store::TimesheetStore;
use windcrew_core::types::{
    BatchOutcome, BatchStatus, ImportBatchRecord, LatestEntry, NewImportBatch, NewWorkEntry,
    PersonnelRecord, PersonnelStatus, ProjectMappingRecord, WorkEntryRecord,
};

#[derive(Default)]
struct Inner {
    personnel: Vec<PersonnelRecord>,
    mappings: Vec<ProjectMappingRecord>,
    batches: Vec<ImportBatchRecord>,
    entries: Vec<(Uuid, NewWorkEntry)>,
    fail_entry_dates: HashSet<NaiveDate>,
}

/// Single-writer in-memory [`TimesheetStore`]. Entry inserts can be made to
/// fail for chosen dates to exercise the error-bounding path.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_inserts_on(&self, date: NaiveDate) {
        self.inner.lock().unwrap().fail_entry_dates.insert(date);
    }

    pub fn entry_count(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn entries(&self) -> Vec<(Uuid, NewWorkEntry)> {
        self.inner.lock().unwrap().entries.clone()
    }

    pub fn batch(&self, batch_id: Uuid) -> Option<ImportBatchRecord> {
        self.inner
            .lock()
            .unwrap()
            .batches
            .iter()
            .find(|batch| batch.id == batch_id)
            .cloned()
    }

    pub fn personnel(&self) -> Vec<PersonnelRecord> {
        self.inner.lock().unwrap().personnel.clone()
    }

    pub fn mappings(&self) -> Vec<ProjectMappingRecord> {
        self.inner.lock().unwrap().mappings.clone()
    }

    pub fn backdate_batch(&self, batch_id: Uuid, created_at: DateTime<Utc>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(batch) = inner.batches.iter_mut().find(|batch| batch.id == batch_id) {
            batch.created_at = created_at;
        }
    }
}

#[async_trait]
impl TimesheetStore for MemoryStore {
    async fn find_personnel(
        &self,
        org_id: Uuid,
        employee_code: &str,
    ) -> Result<Option<PersonnelRecord>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .personnel
            .iter()
            .find(|person| person.org_id == org_id && person.employee_code == employee_code)
            .cloned())
    }

    async fn insert_personnel(
        &self,
        org_id: Uuid,
        employee_code: &str,
        full_name: &str,
        department: Option<&str>,
    ) -> Result<PersonnelRecord> {
        let record = PersonnelRecord {
            id: Uuid::new_v4(),
            org_id,
            employee_code: employee_code.to_string(),
            full_name: full_name.to_string(),
            department: department.map(str::to_string),
            status: PersonnelStatus::Available,
            current_project_id: None,
            is_active: true,
        };
        self.inner.lock().unwrap().personnel.push(record.clone());
        Ok(record)
    }

    async fn update_personnel_status(
        &self,
        personnel_id: Uuid,
        status: PersonnelStatus,
        current_project_id: Option<Uuid>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(person) = inner
            .personnel
            .iter_mut()
            .find(|person| person.id == personnel_id)
        {
            person.status = status;
            person.current_project_id = current_project_id;
        }
        Ok(())
    }

    async fn upsert_project_mapping(&self, mapping: &ProjectMappingRecord) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.mappings.iter_mut().find(|existing| {
            existing.org_id == mapping.org_id && existing.source_code == mapping.source_code
        }) {
            *existing = mapping.clone();
        } else {
            inner.mappings.push(mapping.clone());
        }
        Ok(())
    }

    async fn project_mappings(&self, org_id: Uuid) -> Result<Vec<ProjectMappingRecord>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .mappings
            .iter()
            .filter(|mapping| mapping.org_id == org_id)
            .cloned()
            .collect())
    }

    async fn create_import_batch(&self, batch: &NewImportBatch) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.inner.lock().unwrap().batches.push(ImportBatchRecord {
            id,
            org_id: batch.org_id,
            uploaded_by: batch.uploaded_by,
            file_name: batch.file_name.clone(),
            period_start: batch.period_start,
            period_end: batch.period_end,
            total_rows: batch.total_rows,
            imported_rows: 0,
            new_personnel: 0,
            skipped_rows: 0,
            status: BatchStatus::Processing,
            errors: Vec::new(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn finalize_import_batch(&self, batch_id: Uuid, outcome: &BatchOutcome) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let batch = inner
            .batches
            .iter_mut()
            .find(|batch| batch.id == batch_id)
            .ok_or_else(|| CoreError::Store(format!("batch {batch_id} not found")))?;
        batch.imported_rows = outcome.imported_rows;
        batch.new_personnel = outcome.new_personnel;
        batch.skipped_rows = outcome.skipped_rows;
        batch.errors = outcome.errors.clone();
        batch.status = outcome.status;
        Ok(())
    }

    async fn recent_import_batches(
        &self,
        org_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ImportBatchRecord>> {
        let mut batches: Vec<ImportBatchRecord> = self
            .inner
            .lock()
            .unwrap()
            .batches
            .iter()
            .filter(|batch| batch.org_id == org_id)
            .cloned()
            .collect();
        batches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        batches.truncate(limit as usize);
        Ok(batches)
    }

    async fn stale_processing_batches(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .batches
            .iter()
            .filter(|batch| batch.status == BatchStatus::Processing && batch.created_at < cutoff)
            .map(|batch| batch.id)
            .collect())
    }

    async fn mark_batch_failed(&self, batch_id: Uuid, error: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(batch) = inner.batches.iter_mut().find(|batch| batch.id == batch_id) {
            batch.status = BatchStatus::Failed;
            batch.errors = vec![error.to_string()];
        }
        Ok(())
    }

    async fn delete_import_batch(&self, batch_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .entries
            .retain(|(_, entry)| entry.import_batch_id != batch_id);
        inner.batches.retain(|batch| batch.id != batch_id);
        Ok(())
    }

    async fn find_duplicate_entry(
        &self,
        personnel_id: Uuid,
        work_date: NaiveDate,
        exclude_batch: Uuid,
    ) -> Result<Option<Uuid>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .entries
            .iter()
            .find(|(_, entry)| {
                entry.personnel_id == personnel_id
                    && entry.work_date == work_date
                    && entry.import_batch_id != exclude_batch
            })
            .map(|(id, _)| *id))
    }

    async fn delete_work_entry(&self, entry_id: Uuid) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .entries
            .retain(|(id, _)| *id != entry_id);
        Ok(())
    }

    async fn insert_work_entry(&self, entry: &NewWorkEntry) -> Result<Uuid> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_entry_dates.contains(&entry.work_date) {
            return Err(CoreError::Store("synthetic insert failure".to_string()));
        }
        let id = Uuid::new_v4();
        inner.entries.push((id, entry.clone()));
        Ok(id)
    }

    async fn latest_entry(&self, personnel_id: Uuid) -> Result<Option<LatestEntry>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .entries
            .iter()
            .filter(|(_, entry)| entry.personnel_id == personnel_id)
            .max_by_key(|(_, entry)| entry.work_date)
            .map(|(_, entry)| LatestEntry {
                work_date: entry.work_date,
                entry_kind: entry.entry_kind,
                project_id: entry.project_id,
            }))
    }

    async fn entries_in_range(
        &self,
        org_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WorkEntryRecord>> {
        let inner = self.inner.lock().unwrap();
        let mut records = Vec::new();
        for (id, entry) in &inner.entries {
            if entry.org_id != org_id || entry.work_date < start || entry.work_date > end {
                continue;
            }
            let person = inner
                .personnel
                .iter()
                .find(|person| person.id == entry.personnel_id);
            records.push(WorkEntryRecord {
                id: *id,
                personnel_id: entry.personnel_id,
                employee_code: person
                    .map(|person| person.employee_code.clone())
                    .unwrap_or_default(),
                full_name: person
                    .map(|person| person.full_name.clone())
                    .unwrap_or_default(),
                department: person.and_then(|person| person.department.clone()),
                work_date: entry.work_date,
                entry_kind: entry.entry_kind,
                total_hours: entry.total_hours,
                project_id: entry.project_id,
                project_name: None,
                lines: Vec::new(),
            });
        }
        Ok(records)
    }
}

/// Minimal [`ParsedRow`] for engine tests.
pub fn parsed_row(
    employee_code: &str,
    full_name: &str,
    date: NaiveDate,
    entry_kind: EntryKind,
    source_project_code: &str,
) -> ParsedRow {
    ParsedRow {
        employee_code: employee_code.to_string(),
        full_name: full_name.to_string(),
        work_date: date,
        entry_kind,
        entry_type_raw: entry_kind.as_str().to_uppercase(),
        total_hours: 8.0,
        source_project_code: source_project_code.to_string(),
        source_project_name: if source_project_code.is_empty() {
            String::new()
        } else {
            format!("Project {source_project_code}")
        },
        ..ParsedRow::default()
    }
}

/// Aggregate a hand-built row set the way the parser would.
pub fn parse_result(rows: Vec<ParsedRow>) -> ParseResult {
    let mut personnel: Vec<PersonnelSummary> = Vec::new();
    let mut projects: Vec<ProjectSummary> = Vec::new();
    let mut personnel_index: HashMap<String, usize> = HashMap::new();
    let mut project_index: HashMap<String, usize> = HashMap::new();
    let mut date_range = DateRange::default();

    for row in &rows {
        date_range.start = Some(date_range.start.map_or(row.work_date, |d| d.min(row.work_date)));
        date_range.end = Some(date_range.end.map_or(row.work_date, |d| d.max(row.work_date)));

        match personnel_index.get(&row.employee_code) {
            Some(&index) => personnel[index].entry_count += 1,
            None => {
                personnel_index.insert(row.employee_code.clone(), personnel.len());
                personnel.push(PersonnelSummary {
                    employee_code: row.employee_code.clone(),
                    full_name: row.full_name.clone(),
                    department: row.department.clone(),
                    entry_count: 1,
                });
            }
        }

        if !row.source_project_code.is_empty() {
            match project_index.get(&row.source_project_code) {
                Some(&index) => projects[index].entry_count += 1,
                None => {
                    project_index.insert(row.source_project_code.clone(), projects.len());
                    projects.push(ProjectSummary {
                        source_code: row.source_project_code.clone(),
                        source_name: row.source_project_name.clone(),
                        entry_count: 1,
                    });
                }
            }
        }
    }

    ParseResult {
        total_rows: rows.len(),
        rows,
        unique_personnel: personnel,
        unique_projects: projects,
        date_range,
        skipped_rows: 0,
        warnings: Vec::new(),
    }
}
