use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;
use windcrew_parser::EntryKind;

use crate::types::WorkEntryRecord;

/// Per-person availability over a date range.
///
/// `unclassified_days` never feeds the leave bucket; unknown payroll
/// vocabulary stays visible under its own count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonAvailability {
    pub personnel_id: Uuid,
    pub employee_code: String,
    pub full_name: String,
    pub department: Option<String>,
    pub total_entries: usize,
    pub on_site_days: usize,
    pub standby_days: usize,
    pub leave_days: usize,
    pub unclassified_days: usize,
    pub distinct_days: usize,
    pub projects: Vec<String>,
    /// `min(100, round(100 × distinct days with entries / calendar days))`.
    pub busy_pct: u8,
}

pub fn summarize_availability(
    entries: &[WorkEntryRecord],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<PersonAvailability> {
    struct Accumulator<'a> {
        entry: &'a WorkEntryRecord,
        total_entries: usize,
        on_site_days: usize,
        standby_days: usize,
        leave_days: usize,
        unclassified_days: usize,
        dates: BTreeSet<NaiveDate>,
        projects: BTreeSet<&'a str>,
    }

    let calendar_days = (end - start).num_days().max(0) as usize + 1;

    let mut by_person: BTreeMap<Uuid, Accumulator<'_>> = BTreeMap::new();
    for entry in entries {
        let acc = by_person
            .entry(entry.personnel_id)
            .or_insert_with(|| Accumulator {
                entry,
                total_entries: 0,
                on_site_days: 0,
                standby_days: 0,
                leave_days: 0,
                unclassified_days: 0,
                dates: BTreeSet::new(),
                projects: BTreeSet::new(),
            });

        acc.total_entries += 1;
        acc.dates.insert(entry.work_date);
        match entry.entry_kind {
            EntryKind::OnSite => acc.on_site_days += 1,
            EntryKind::Standby => acc.standby_days += 1,
            EntryKind::Unclassified => acc.unclassified_days += 1,
            kind if kind.is_leave() => acc.leave_days += 1,
            _ => {}
        }
        if let Some(name) = entry.project_name.as_deref() {
            acc.projects.insert(name);
        }
    }

    let mut summaries: Vec<PersonAvailability> = by_person
        .into_values()
        .map(|acc| {
            let distinct_days = acc.dates.len();
            let busy_pct =
                ((distinct_days as f64 / calendar_days as f64) * 100.0).round().min(100.0) as u8;
            PersonAvailability {
                personnel_id: acc.entry.personnel_id,
                employee_code: acc.entry.employee_code.clone(),
                full_name: acc.entry.full_name.clone(),
                department: acc.entry.department.clone(),
                total_entries: acc.total_entries,
                on_site_days: acc.on_site_days,
                standby_days: acc.standby_days,
                leave_days: acc.leave_days,
                unclassified_days: acc.unclassified_days,
                distinct_days,
                projects: acc.projects.into_iter().map(str::to_string).collect(),
                busy_pct,
            }
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.on_site_days
            .cmp(&a.on_site_days)
            .then_with(|| a.employee_code.cmp(&b.employee_code))
    });
    summaries
}
