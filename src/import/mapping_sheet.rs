//! Reader for the per-subject mapping sheet (`yonalish.xlsx`).
//!
//! Layout of the first worksheet, header in the first row:
//!
//! | col 0 | col 1        | col 2        | col 3             |
//! |-------|--------------|--------------|-------------------|
//! | #     | faculty code | faculty name | education type id |
//!
//! Rows are parsed best-effort: a bad row is reported and skipped, the rest
//! of the sheet is still read.

use calamine::{open_workbook_auto, Data, Range, Reader};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

const CODE_COLUMN: u32 = 1;
const NAME_COLUMN: u32 = 2;
const EDUCATION_TYPE_COLUMN: u32 = 3;
const DEFAULT_EDUCATION_TYPE_ID: i64 = 1;

#[derive(Error, Debug)]
pub enum SheetError {
    #[error("Failed to open spreadsheet: {0}")]
    Open(#[from] calamine::Error),
    #[error("Spreadsheet has no worksheet")]
    NoWorksheet,
}

/// One faculty row of a mapping sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacultyMapping {
    /// Integer rendering of the numeric code cell (`60310300.0` becomes `"60310300"`)
    pub code: String,
    pub name: String,
    pub education_type_id: i64,
}

/// A row that could not be turned into a mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based row number as shown by spreadsheet applications
    pub row: u32,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingSheet {
    pub mappings: Vec<FacultyMapping>,
    pub skipped: Vec<SkippedRow>,
}

/// Read the first worksheet of the workbook at `path`
pub fn read_mapping_sheet(path: &Path) -> Result<MappingSheet, SheetError> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SheetError::NoWorksheet)??;

    let sheet = parse_range(&range);
    debug!(
        "Read {} faculty mappings from {} ({} rows skipped)",
        sheet.mappings.len(),
        path.display(),
        sheet.skipped.len()
    );
    Ok(sheet)
}

/// Parse mapping rows from a worksheet range, skipping the header row
///
/// Cells are addressed by absolute position, so a sheet whose first column is
/// empty still lines up.
pub fn parse_range(range: &Range<Data>) -> MappingSheet {
    let mut sheet = MappingSheet::default();

    let (Some((first_row, _)), Some((last_row, _))) = (range.start(), range.end()) else {
        return sheet;
    };

    // Row 0 is the header
    for row in first_row.max(1)..=last_row {
        let cell = |col: u32| range.get_value((row, col)).unwrap_or(&Data::Empty);

        let cells = [
            cell(CODE_COLUMN),
            cell(NAME_COLUMN),
            cell(EDUCATION_TYPE_COLUMN),
        ];
        if cells.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }

        match parse_row(cells[0], cells[1], cells[2]) {
            Ok(mapping) => sheet.mappings.push(mapping),
            Err(reason) => {
                warn!("Skipped mapping row {}: {}", row + 1, reason);
                sheet.skipped.push(SkippedRow {
                    row: row + 1,
                    reason,
                });
            }
        }
    }

    sheet
}

fn parse_row(code: &Data, name: &Data, education_type: &Data) -> Result<FacultyMapping, String> {
    let code = match code {
        Data::Int(value) => value.to_string(),
        Data::Float(value) => (value.trunc() as i64).to_string(),
        // A numeric cell with a date format is still a number
        Data::DateTime(value) => (value.as_f64().trunc() as i64).to_string(),
        Data::Empty => return Err("empty faculty code".to_string()),
        other => return Err(format!("faculty code is not numeric: {}", other)),
    };

    let name = match name {
        Data::String(value) => value.clone(),
        Data::Empty => return Err(format!("empty faculty name for code {}", code)),
        other => return Err(format!("faculty name is not text: {}", other)),
    };

    Ok(FacultyMapping {
        code,
        name,
        education_type_id: education_type_id(education_type),
    })
}

/// Numeric cell or integer text; anything else falls back to the default
fn education_type_id(cell: &Data) -> i64 {
    match cell {
        Data::Int(value) => *value,
        Data::Float(value) => value.trunc() as i64,
        Data::DateTime(value) => value.as_f64().trunc() as i64,
        Data::String(value) => value.parse().unwrap_or(DEFAULT_EDUCATION_TYPE_ID),
        _ => DEFAULT_EDUCATION_TYPE_ID,
    }
}
