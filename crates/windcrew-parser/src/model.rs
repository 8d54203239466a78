use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Canonical classification of one timesheet day, derived from the payroll
/// export's free-text "Puantaj Kaydı Türü" column.
///
/// Raw text that matches no vocabulary entry becomes
/// [`EntryKind::Unclassified`]; it is never folded into a leave-like kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    OnSite,
    Travel,
    Standby,
    AnnualLeave,
    InterProjectLeave,
    SickLeave,
    Training,
    DayOff,
    PaternityLeave,
    Office,
    Unclassified,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::OnSite => "on_site",
            EntryKind::Travel => "travel",
            EntryKind::Standby => "standby",
            EntryKind::AnnualLeave => "annual_leave",
            EntryKind::InterProjectLeave => "inter_project_leave",
            EntryKind::SickLeave => "sick_leave",
            EntryKind::Training => "training",
            EntryKind::DayOff => "day_off",
            EntryKind::PaternityLeave => "paternity_leave",
            EntryKind::Office => "office",
            EntryKind::Unclassified => "unclassified",
        }
    }

    /// Turkish display label used by the review screens.
    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::OnSite => "Sahada",
            EntryKind::Travel => "Yolda",
            EntryKind::Standby => "Bekleme",
            EntryKind::AnnualLeave => "Yıllık İzin",
            EntryKind::InterProjectLeave => "Proje Arası",
            EntryKind::SickLeave => "İstirahat",
            EntryKind::Training => "Eğitim",
            EntryKind::DayOff => "Tatil",
            EntryKind::PaternityLeave => "Babalık İzni",
            EntryKind::Office => "Ofiste",
            EntryKind::Unclassified => "Sınıflandırılmamış",
        }
    }

    /// True for the kinds that count as a leave day in aggregate reports.
    /// `Unclassified` is not one of them.
    pub fn is_leave(&self) -> bool {
        matches!(
            self,
            EntryKind::AnnualLeave
                | EntryKind::InterProjectLeave
                | EntryKind::SickLeave
                | EntryKind::DayOff
        )
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for EntryKind {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "on_site" => Ok(EntryKind::OnSite),
            "travel" => Ok(EntryKind::Travel),
            "standby" => Ok(EntryKind::Standby),
            "annual_leave" => Ok(EntryKind::AnnualLeave),
            "inter_project_leave" => Ok(EntryKind::InterProjectLeave),
            "sick_leave" => Ok(EntryKind::SickLeave),
            "training" => Ok(EntryKind::Training),
            "day_off" => Ok(EntryKind::DayOff),
            "paternity_leave" => Ok(EntryKind::PaternityLeave),
            "office" => Ok(EntryKind::Office),
            "unclassified" => Ok(EntryKind::Unclassified),
            other => Err(format!("unknown entry kind '{other}'")),
        }
    }
}

/// One of up to four work slots on a timesheet row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkEntryLine {
    /// 1-based slot position in the export.
    pub slot: u8,
    pub work_type_raw: String,
    /// Prefix of the raw work type before the first `-`, trimmed and upper-cased.
    pub work_type_code: String,
    /// Display label from the fixed work-type table, falling back to the raw text.
    pub work_type_label: String,
    /// Free text: a turbine number, `*`, or empty.
    pub turbine_raw: String,
    pub hours: f64,
}

/// One normalized timesheet entry for one person on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRow {
    pub employee_code: String,
    pub full_name: String,
    pub department: String,
    pub work_date: NaiveDate,
    pub entry_kind: EntryKind,
    pub entry_type_raw: String,
    pub total_hours: f64,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub source_project_code: String,
    pub source_project_name: String,
    pub source_activity_code: String,
    pub notes: String,
    pub meal_breakfast: bool,
    pub meal_lunch: bool,
    pub meal_dinner: bool,
    pub meal_night: bool,
    pub source_status: String,
    pub lines: Vec<WorkEntryLine>,
}

/// Per-employee rollup across the batch; name and department are first-seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonnelSummary {
    pub employee_code: String,
    pub full_name: String,
    pub department: String,
    pub entry_count: usize,
}

/// Per-source-project rollup; only rows with a non-empty project code count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub source_code: String,
    pub source_name: String,
    pub entry_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// Output of one decode + normalize + aggregate pass over a workbook.
/// Immutable once produced; consumed by the import engine and the review UI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseResult {
    pub rows: Vec<ParsedRow>,
    pub unique_personnel: Vec<PersonnelSummary>,
    pub unique_projects: Vec<ProjectSummary>,
    pub date_range: DateRange,
    pub total_rows: usize,
    pub skipped_rows: usize,
    pub warnings: Vec<String>,
}

impl Default for ParsedRow {
    fn default() -> Self {
        Self {
            employee_code: String::new(),
            full_name: String::new(),
            department: String::new(),
            work_date: NaiveDate::default(),
            entry_kind: EntryKind::Unclassified,
            entry_type_raw: String::new(),
            total_hours: 0.0,
            start_time: None,
            end_time: None,
            source_project_code: String::new(),
            source_project_name: String::new(),
            source_activity_code: String::new(),
            notes: String::new(),
            meal_breakfast: false,
            meal_lunch: false,
            meal_dinner: false,
            meal_night: false,
            source_status: String::new(),
            lines: Vec::new(),
        }
    }
}
