use calamine::Data;

use crate::decode::{
    cell_date, cell_number, cell_text, SheetGrid, COL_EMPLOYEE_CODE, COL_ENTRY_TYPE, COL_FULL_NAME,
    COL_WORK_DATE,
};
use crate::model::{EntryKind, ParsedRow, WorkEntryLine};
use crate::vocab::{work_type_code, Vocabulary};

const SLOT_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, Default)]
struct SlotColumns {
    work_type: Option<usize>,
    turbine: Option<usize>,
    hours: Option<usize>,
}

/// Column positions resolved once per workbook so row normalization never
/// searches headers again.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    employee_code: Option<usize>,
    full_name: Option<usize>,
    work_date: Option<usize>,
    entry_type: Option<usize>,
    total_hours: Option<usize>,
    start_time: Option<usize>,
    end_time: Option<usize>,
    project_code: Option<usize>,
    project_name: Option<usize>,
    activity_code: Option<usize>,
    notes: Option<usize>,
    department: Option<usize>,
    status: Option<usize>,
    meal_breakfast: Option<usize>,
    meal_lunch: Option<usize>,
    meal_dinner: Option<usize>,
    meal_night: Option<usize>,
    slots: [SlotColumns; SLOT_COUNT],
}

impl ColumnMap {
    pub fn resolve(grid: &SheetGrid) -> Self {
        let mut slots = [SlotColumns::default(); SLOT_COUNT];
        for (index, slot) in slots.iter_mut().enumerate() {
            let slot_no = index + 1;
            slot.work_type = grid.column(&format!("Res Montaj Tipi{slot_no}"));
            slot.turbine = grid.column(&format!("Tirbun No{slot_no}"));
            slot.hours = grid.column(&format!("RM Saat{slot_no}"));
        }

        Self {
            employee_code: grid.column(COL_EMPLOYEE_CODE),
            full_name: grid.column(COL_FULL_NAME),
            work_date: grid.column(COL_WORK_DATE),
            entry_type: grid.column(COL_ENTRY_TYPE),
            total_hours: grid.column("Süre"),
            start_time: grid.column("Başlangıç Saati"),
            end_time: grid.column("Bitiş Saati"),
            project_code: grid.column("Proje Kodu"),
            project_name: grid.column("Proje"),
            activity_code: grid.column("Aktivite"),
            notes: grid.column("Yapılan İş"),
            department: grid.column("Department"),
            status: grid.column("Durum"),
            meal_breakfast: grid.column("Kahvaltı"),
            meal_lunch: grid.column("Öğle Yemeği"),
            meal_dinner: grid.column("Akşam Yemeği"),
            meal_night: grid.column("Gece Yemeği"),
            slots,
        }
    }
}

/// Turns one raw grid row into a [`ParsedRow`], or signals a skip.
///
/// A row with a blank employee code, name, or entry-type text, or with an
/// unresolvable date, is skipped. Skips are silent at row granularity and
/// only counted in the aggregate.
#[derive(Debug, Clone, Default)]
pub struct RowNormalizer {
    vocab: Vocabulary,
}

impl RowNormalizer {
    pub fn new(vocab: Vocabulary) -> Self {
        Self { vocab }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn normalize(
        &self,
        grid: &SheetGrid,
        row: &[Data],
        columns: &ColumnMap,
    ) -> Option<ParsedRow> {
        let employee_code = cell_text(grid.cell(row, columns.employee_code));
        let full_name = cell_text(grid.cell(row, columns.full_name));
        let entry_type_raw = cell_text(grid.cell(row, columns.entry_type));

        if employee_code.is_empty() || full_name.is_empty() || entry_type_raw.is_empty() {
            return None;
        }

        let work_date = cell_date(grid.cell(row, columns.work_date))?;

        let entry_kind = self
            .vocab
            .entry_kind(&entry_type_raw)
            .unwrap_or(EntryKind::Unclassified);

        let total_hours = cell_number(grid.cell(row, columns.total_hours)).unwrap_or(0.0);
        let start_time = cell_number(grid.cell(row, columns.start_time));
        let end_time = cell_number(grid.cell(row, columns.end_time));

        let mut lines = Vec::new();
        for (index, slot) in columns.slots.iter().enumerate() {
            let work_type_raw = cell_text(grid.cell(row, slot.work_type));
            if work_type_raw.is_empty() {
                continue;
            }
            let turbine_raw = cell_text(grid.cell(row, slot.turbine));
            let hours = cell_number(grid.cell(row, slot.hours)).unwrap_or(0.0);
            lines.push(WorkEntryLine {
                slot: (index + 1) as u8,
                work_type_code: work_type_code(&work_type_raw),
                work_type_label: self.vocab.work_type_label(&work_type_raw).to_string(),
                work_type_raw,
                turbine_raw,
                hours,
            });
        }

        Some(ParsedRow {
            employee_code,
            full_name,
            department: cell_text(grid.cell(row, columns.department)),
            work_date,
            entry_kind,
            entry_type_raw,
            total_hours,
            start_time,
            end_time,
            source_project_code: cell_text(grid.cell(row, columns.project_code)),
            source_project_name: cell_text(grid.cell(row, columns.project_name)),
            source_activity_code: cell_text(grid.cell(row, columns.activity_code)),
            notes: cell_text(grid.cell(row, columns.notes)),
            meal_breakfast: truthy(grid.cell(row, columns.meal_breakfast)),
            meal_lunch: truthy(grid.cell(row, columns.meal_lunch)),
            meal_dinner: truthy(grid.cell(row, columns.meal_dinner)),
            meal_night: truthy(grid.cell(row, columns.meal_night)),
            source_status: cell_text(grid.cell(row, columns.status)),
            lines,
        })
    }
}

/// The export writes meal flags inconsistently; only this small fixed set of
/// representations counts as true.
fn truthy(cell: &Data) -> bool {
    match cell {
        Data::Bool(value) => *value,
        Data::Int(value) => *value == 1,
        Data::Float(value) => *value == 1.0,
        Data::String(text) => matches!(text.trim(), "1" | "True"),
        _ => false,
    }
}
