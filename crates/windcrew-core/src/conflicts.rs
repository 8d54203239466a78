use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;
use windcrew_parser::EntryKind;

use crate::types::WorkEntryRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictProject {
    pub project_id: Uuid,
    pub project_name: Option<String>,
    pub entry_kind: EntryKind,
    pub hours: f64,
}

/// One person booked on two or more distinct projects on the same day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleConflict {
    pub personnel_id: Uuid,
    pub employee_code: String,
    pub full_name: String,
    pub department: Option<String>,
    pub work_date: NaiveDate,
    pub projects: Vec<ConflictProject>,
}

/// Group persisted entries by (person, date) and report every group that
/// spans at least two distinct non-null projects. A single project, a null
/// project, or a lone unassigned entry is not a conflict.
pub fn detect_conflicts(entries: &[WorkEntryRecord]) -> Vec<ScheduleConflict> {
    let mut by_person_day: BTreeMap<(NaiveDate, Uuid), Vec<&WorkEntryRecord>> = BTreeMap::new();
    for entry in entries {
        by_person_day
            .entry((entry.work_date, entry.personnel_id))
            .or_default()
            .push(entry);
    }

    let mut conflicts = Vec::new();
    for ((work_date, personnel_id), day_entries) in by_person_day {
        let mut projects: Vec<ConflictProject> = Vec::new();
        for entry in &day_entries {
            let Some(project_id) = entry.project_id else {
                continue;
            };
            if projects.iter().any(|seen| seen.project_id == project_id) {
                continue;
            }
            projects.push(ConflictProject {
                project_id,
                project_name: entry.project_name.clone(),
                entry_kind: entry.entry_kind,
                hours: entry.total_hours,
            });
        }

        if projects.len() >= 2 {
            let first = day_entries[0];
            conflicts.push(ScheduleConflict {
                personnel_id,
                employee_code: first.employee_code.clone(),
                full_name: first.full_name.clone(),
                department: first.department.clone(),
                work_date,
                projects,
            });
        }
    }

    conflicts
}
