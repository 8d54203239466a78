use std::collections::{BTreeSet, HashMap};

use crate::decode::{SheetGrid, COL_EMPLOYEE_CODE};
use crate::errors::DecodeError;
use crate::model::{
    DateRange, EntryKind, ParseResult, ParsedRow, PersonnelSummary, ProjectSummary,
};
use crate::normalize::{ColumnMap, RowNormalizer};
use crate::vocab::Vocabulary;

/// At most this many distinct unknown entry-type strings are surfaced as
/// warnings; the rest collapse into a count.
const MAX_UNKNOWN_WARNINGS: usize = 10;

/// Full decode → normalize → aggregate pass over a payroll workbook.
///
/// Input-format problems never escape this type: an empty or unreadable
/// workbook, or one missing the employee-code column, comes back as a
/// zero-row [`ParseResult`] whose warnings explain the rejection.
#[derive(Debug, Clone, Default)]
pub struct TimesheetParser {
    normalizer: RowNormalizer,
}

impl TimesheetParser {
    pub fn new(vocab: Vocabulary) -> Self {
        Self {
            normalizer: RowNormalizer::new(vocab),
        }
    }

    pub fn parse(&self, bytes: &[u8]) -> ParseResult {
        let grid = match SheetGrid::from_bytes(bytes) {
            Ok(grid) => grid,
            Err(err) => {
                return ParseResult {
                    warnings: vec![err.to_string()],
                    ..ParseResult::default()
                }
            }
        };

        let mut warnings: Vec<String> = Vec::new();
        if let Err(DecodeError::MissingColumns { missing }) = grid.require_columns() {
            warnings.extend(
                missing
                    .iter()
                    .map(|name| format!("required column \"{name}\" not found")),
            );
            // Employee identity is the one column with no fallback; without it
            // the whole file is rejected. Other missing required columns
            // degrade the import instead (their rows skip one by one).
            if missing.iter().any(|name| name == COL_EMPLOYEE_CODE) {
                return ParseResult {
                    warnings,
                    ..ParseResult::default()
                };
            }
        }

        let columns = ColumnMap::resolve(&grid);

        let mut rows: Vec<ParsedRow> = Vec::new();
        let mut skipped_rows = 0usize;
        let mut personnel: Vec<PersonnelSummary> = Vec::new();
        let mut personnel_index: HashMap<String, usize> = HashMap::new();
        let mut projects: Vec<ProjectSummary> = Vec::new();
        let mut project_index: HashMap<String, usize> = HashMap::new();
        let mut date_range = DateRange::default();
        let mut unknown_entry_types: BTreeSet<String> = BTreeSet::new();

        for raw_row in grid.rows() {
            let Some(row) = self.normalizer.normalize(&grid, raw_row, &columns) else {
                skipped_rows += 1;
                continue;
            };

            if row.entry_kind == EntryKind::Unclassified {
                unknown_entry_types.insert(row.entry_type_raw.clone());
            }

            date_range.start = Some(match date_range.start {
                Some(start) => start.min(row.work_date),
                None => row.work_date,
            });
            date_range.end = Some(match date_range.end {
                Some(end) => end.max(row.work_date),
                None => row.work_date,
            });

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

            rows.push(row);
        }

        for raw in unknown_entry_types.iter().take(MAX_UNKNOWN_WARNINGS) {
            warnings.push(format!("unrecognized entry type \"{raw}\""));
        }
        if unknown_entry_types.len() > MAX_UNKNOWN_WARNINGS {
            warnings.push(format!(
                "{} more unrecognized entry types",
                unknown_entry_types.len() - MAX_UNKNOWN_WARNINGS
            ));
        }

        ParseResult {
            total_rows: grid.rows().len(),
            rows,
            unique_personnel: personnel,
            unique_projects: projects,
            date_range,
            skipped_rows,
            warnings,
        }
    }

    /// Decode without the warning conversion, for callers that want the raw
    /// failure.
    pub fn decode(&self, bytes: &[u8]) -> Result<SheetGrid, DecodeError> {
        SheetGrid::from_bytes(bytes)
    }
}

/// Parse a workbook with the default (Turkish payroll) vocabulary.
pub fn parse_workbook(bytes: &[u8]) -> ParseResult {
    TimesheetParser::default().parse(bytes)
}
