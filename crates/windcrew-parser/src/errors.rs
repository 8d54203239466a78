use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("workbook could not be read: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("workbook is empty or has no data rows")]
    EmptyInput,

    #[error("required columns missing: {}", missing.join(", "))]
    MissingColumns { missing: Vec<String> },
}
