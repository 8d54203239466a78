use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use windcrew_parser::EntryKind;

/// Displayed status of a person, derived from their most recent work entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonnelStatus {
    OnSite,
    Travel,
    Standby,
    Leave,
    Training,
    Available,
}

impl PersonnelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonnelStatus::OnSite => "on_site",
            PersonnelStatus::Travel => "travel",
            PersonnelStatus::Standby => "standby",
            PersonnelStatus::Leave => "leave",
            PersonnelStatus::Training => "training",
            PersonnelStatus::Available => "available",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "on_site" => Some(Self::OnSite),
            "travel" => Some(Self::Travel),
            "standby" => Some(Self::Standby),
            "leave" => Some(Self::Leave),
            "training" => Some(Self::Training),
            "available" => Some(Self::Available),
            _ => None,
        }
    }
}

/// Lifecycle of an import batch: `processing → completed | failed`, terminal
/// either way. A batch stuck in `processing` is the crash marker the sweep
/// job looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Processing,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonnelRecord {
    pub id: Uuid,
    pub org_id: Uuid,
    pub employee_code: String,
    pub full_name: String,
    pub department: Option<String>,
    pub status: PersonnelStatus,
    pub current_project_id: Option<Uuid>,
    pub is_active: bool,
}

/// Many-to-one association from an external payroll project code to an
/// internal project, upserted by (org, source code).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMappingRecord {
    pub org_id: Uuid,
    pub source_code: String,
    pub source_name: String,
    pub project_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportBatchRecord {
    pub id: Uuid,
    pub org_id: Uuid,
    pub uploaded_by: Option<Uuid>,
    pub file_name: String,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub total_rows: i64,
    pub imported_rows: i64,
    pub new_personnel: i64,
    pub skipped_rows: i64,
    pub status: BatchStatus,
    pub errors: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewImportBatch {
    pub org_id: Uuid,
    pub uploaded_by: Option<Uuid>,
    pub file_name: String,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub total_rows: i64,
}

/// Final counters written onto a batch when the import finishes.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub imported_rows: i64,
    pub new_personnel: i64,
    pub skipped_rows: i64,
    pub errors: Vec<String>,
    pub status: BatchStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkEntryLineRecord {
    pub slot: i16,
    pub work_type_code: String,
    pub work_type_label: String,
    pub turbine_raw: Option<String>,
    pub hours: f64,
}

/// One persisted work entry with its personnel/project joins already
/// flattened to scalar columns, so analyzers never deal with join shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkEntryRecord {
    pub id: Uuid,
    pub personnel_id: Uuid,
    pub employee_code: String,
    pub full_name: String,
    pub department: Option<String>,
    pub work_date: NaiveDate,
    pub entry_kind: EntryKind,
    pub total_hours: f64,
    pub project_id: Option<Uuid>,
    pub project_name: Option<String>,
    pub lines: Vec<WorkEntryLineRecord>,
}

#[derive(Debug, Clone)]
pub struct NewWorkEntryLine {
    pub slot: i16,
    pub work_type_code: String,
    pub work_type_label: String,
    pub turbine_raw: Option<String>,
    pub hours: f64,
}

#[derive(Debug, Clone)]
pub struct NewWorkEntry {
    pub org_id: Uuid,
    pub personnel_id: Uuid,
    pub import_batch_id: Uuid,
    pub work_date: NaiveDate,
    pub entry_kind: EntryKind,
    pub total_hours: f64,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub project_id: Option<Uuid>,
    pub source_project_code: Option<String>,
    pub source_activity_code: Option<String>,
    pub notes: Option<String>,
    pub meal_breakfast: bool,
    pub meal_lunch: bool,
    pub meal_dinner: bool,
    pub meal_night: bool,
    pub source_status: Option<String>,
    pub lines: Vec<NewWorkEntryLine>,
}

/// A person's most recent entry, as far as status derivation cares.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatestEntry {
    pub work_date: NaiveDate,
    pub entry_kind: EntryKind,
    pub project_id: Option<Uuid>,
}
