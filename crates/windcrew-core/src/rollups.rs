use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;
use windcrew_parser::EntryKind;

use crate::types::{WorkEntryLineRecord, WorkEntryRecord};

/// Bucket for line hours whose turbine field is absent or the `*` wildcard.
pub const GENERAL_SITE: &str = "Genel Saha";

/// Non-productive labels excluded from work-type breakdowns. Raw entry totals
/// keep them; only the per-label splits drop them.
const EXCLUDED_LABELS: [&str; 2] = ["Proje Arası", "İzin Günü"];

/// Hours per work-type label, per turbine bucket.
pub type WorkTypeHours = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonHours {
    pub personnel_id: Uuid,
    pub employee_code: String,
    pub full_name: String,
    pub department: Option<String>,
    /// Sum of entry-level total hours, non-productive included.
    pub total_hours: f64,
    pub on_site_days: usize,
    pub work_type_hours: WorkTypeHours,
    /// Productive line hours split per turbine bucket, then per label.
    pub turbine_hours: BTreeMap<String, WorkTypeHours>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectHours {
    pub project_id: Uuid,
    pub project_name: Option<String>,
    pub total_hours: f64,
    pub unique_personnel: usize,
    pub work_type_hours: WorkTypeHours,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurbineHours {
    pub bucket: String,
    pub total_hours: f64,
    pub work_type_hours: WorkTypeHours,
    pub person_hours: BTreeMap<String, f64>,
}

/// Normalize a line's free-text turbine field to its rollup bucket:
/// `T<text>` for a concrete turbine, [`GENERAL_SITE`] otherwise.
pub fn turbine_bucket(raw: Option<&str>) -> String {
    match raw {
        Some(text) if !text.is_empty() && text != "*" => format!("T{text}"),
        _ => GENERAL_SITE.to_string(),
    }
}

fn line_is_productive(line: &WorkEntryLineRecord) -> bool {
    line.hours > 0.0
        && !line.work_type_label.is_empty()
        && !EXCLUDED_LABELS.contains(&line.work_type_label.as_str())
}

pub fn rollup_by_person(entries: &[WorkEntryRecord]) -> Vec<PersonHours> {
    let mut by_person: BTreeMap<Uuid, PersonHours> = BTreeMap::new();
    for entry in entries {
        let person = by_person
            .entry(entry.personnel_id)
            .or_insert_with(|| PersonHours {
                personnel_id: entry.personnel_id,
                employee_code: entry.employee_code.clone(),
                full_name: entry.full_name.clone(),
                department: entry.department.clone(),
                total_hours: 0.0,
                on_site_days: 0,
                work_type_hours: BTreeMap::new(),
                turbine_hours: BTreeMap::new(),
            });

        person.total_hours += entry.total_hours;
        if entry.entry_kind == EntryKind::OnSite {
            person.on_site_days += 1;
        }

        for line in entry.lines.iter().filter(|line| line_is_productive(line)) {
            *person
                .work_type_hours
                .entry(line.work_type_label.clone())
                .or_default() += line.hours;
            *person
                .turbine_hours
                .entry(turbine_bucket(line.turbine_raw.as_deref()))
                .or_default()
                .entry(line.work_type_label.clone())
                .or_default() += line.hours;
        }
    }

    let mut rollup: Vec<PersonHours> = by_person.into_values().collect();
    rollup.sort_by(|a, b| {
        b.total_hours
            .total_cmp(&a.total_hours)
            .then_with(|| a.employee_code.cmp(&b.employee_code))
    });
    rollup
}

/// Entries without a project association are left out entirely.
pub fn rollup_by_project(entries: &[WorkEntryRecord]) -> Vec<ProjectHours> {
    struct Accumulator {
        rollup: ProjectHours,
        personnel: std::collections::BTreeSet<Uuid>,
    }

    let mut by_project: BTreeMap<Uuid, Accumulator> = BTreeMap::new();
    for entry in entries {
        let Some(project_id) = entry.project_id else {
            continue;
        };
        let acc = by_project.entry(project_id).or_insert_with(|| Accumulator {
            rollup: ProjectHours {
                project_id,
                project_name: entry.project_name.clone(),
                total_hours: 0.0,
                unique_personnel: 0,
                work_type_hours: BTreeMap::new(),
            },
            personnel: Default::default(),
        });

        acc.rollup.total_hours += entry.total_hours;
        acc.personnel.insert(entry.personnel_id);
        for line in entry.lines.iter().filter(|line| line_is_productive(line)) {
            *acc.rollup
                .work_type_hours
                .entry(line.work_type_label.clone())
                .or_default() += line.hours;
        }
    }

    let mut rollup: Vec<ProjectHours> = by_project
        .into_values()
        .map(|acc| ProjectHours {
            unique_personnel: acc.personnel.len(),
            ..acc.rollup
        })
        .collect();
    rollup.sort_by(|a, b| b.total_hours.total_cmp(&a.total_hours));
    rollup
}

/// Productive line hours grouped by turbine bucket. Totals here are line-level
/// sums, not entry totals. Buckets order numerically with [`GENERAL_SITE`] last.
pub fn rollup_by_turbine(entries: &[WorkEntryRecord]) -> Vec<TurbineHours> {
    let mut by_bucket: BTreeMap<String, TurbineHours> = BTreeMap::new();
    for entry in entries {
        for line in entry.lines.iter().filter(|line| line_is_productive(line)) {
            let bucket = turbine_bucket(line.turbine_raw.as_deref());
            let rollup = by_bucket
                .entry(bucket.clone())
                .or_insert_with(|| TurbineHours {
                    bucket,
                    total_hours: 0.0,
                    work_type_hours: BTreeMap::new(),
                    person_hours: BTreeMap::new(),
                });

            rollup.total_hours += line.hours;
            *rollup
                .work_type_hours
                .entry(line.work_type_label.clone())
                .or_default() += line.hours;
            *rollup
                .person_hours
                .entry(entry.full_name.clone())
                .or_default() += line.hours;
        }
    }

    let mut rollup: Vec<TurbineHours> = by_bucket.into_values().collect();
    rollup.sort_by_key(|turbine| turbine_sort_key(&turbine.bucket));
    rollup
}

fn turbine_sort_key(bucket: &str) -> (u8, u32, String) {
    if bucket == GENERAL_SITE {
        return (1, 0, String::new());
    }
    let number = bucket
        .strip_prefix('T')
        .and_then(|rest| rest.parse().ok())
        .unwrap_or(u32::MAX);
    (0, number, bucket.to_string())
}
