//! Spreadsheet reading (import) and writing (export).
//!
//! Reading goes through `calamine`, which understands both `.xlsx` and the
//! legacy `.xls` format. Writing uses `rust_xlsxwriter` and always produces
//! `.xlsx` with a single named sheet.

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rust_xlsxwriter::{Color, Format, FormatPattern, Workbook, Worksheet, XlsxError};

use crate::error::{CoreError, ImportError};
use crate::validation::Row;

/// Upload extensions accepted by the importer (lowercase, no dot).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["xlsx", "xls"];

/// MIME type sent with exported workbooks.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Reject uploads whose file name does not end in a supported extension.
pub fn check_extension(file_name: &str) -> Result<(), ImportError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(())
    } else {
        Err(ImportError::UnsupportedExtension(file_name.to_string()))
    }
}

/// Read the data rows of `sheet` from an in-memory workbook, owned or
/// borrowed.
///
/// Row 1 of the sheet is the header and is skipped. Every cell is read as
/// its display string. Entirely blank rows are dropped; the remaining rows
/// keep their original 1-based sheet position in [`Row::number`].
pub fn read_rows<B>(bytes: B, sheet: &str) -> Result<Vec<Row>, ImportError>
where
    B: AsRef<[u8]> + Clone,
{
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ImportError::Unreadable(e.to_string()))?;

    if !workbook.sheet_names().iter().any(|name| name == sheet) {
        return Err(ImportError::MissingSheet(sheet.to_string()));
    }

    let range = workbook
        .worksheet_range(sheet)
        .map_err(|e| ImportError::Unreadable(e.to_string()))?;

    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut rows = Vec::new();

    for (offset, cells) in range.rows().enumerate() {
        let index = start_row as usize + offset;
        if index == 0 {
            continue;
        }

        let mut values = vec![String::new(); start_col as usize];
        values.extend(cells.iter().map(cell_text));

        if values.iter().all(String::is_empty) {
            continue;
        }
        rows.push(Row::new(index + 1, values));
    }

    Ok(rows)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A value written to one export cell.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetCell {
    Int(i64),
    Text(String),
}

/// A record that knows how to lay itself out as one export row.
pub trait SheetRecord {
    fn cells(&self) -> Vec<SheetCell>;
}

/// Write `records` under `headers` to a new `.xlsx` file at `path`.
pub fn write_records<T: SheetRecord>(
    path: &Path,
    sheet: &str,
    headers: &[&str],
    records: &[T],
) -> Result<(), CoreError> {
    let rows: Vec<Vec<SheetCell>> = records.iter().map(SheetRecord::cells).collect();
    write_rows(path, sheet, headers, &rows)
}

/// Write a header row and raw `rows` to a new `.xlsx` file at `path`.
pub fn write_rows(
    path: &Path,
    sheet: &str,
    headers: &[&str],
    rows: &[Vec<SheetCell>],
) -> Result<(), CoreError> {
    let mut workbook = Workbook::new();
    fill_sheet(workbook.add_worksheet(), sheet, headers, rows).map_err(write_error)?;
    workbook.save(path).map_err(write_error)
}

/// Same as [`write_rows`] but returns the file contents.
pub fn rows_to_bytes(
    sheet: &str,
    headers: &[&str],
    rows: &[Vec<SheetCell>],
) -> Result<Vec<u8>, CoreError> {
    let mut workbook = Workbook::new();
    fill_sheet(workbook.add_worksheet(), sheet, headers, rows).map_err(write_error)?;
    workbook.save_to_buffer().map_err(write_error)
}

fn fill_sheet(
    worksheet: &mut Worksheet,
    sheet: &str,
    headers: &[&str],
    rows: &[Vec<SheetCell>],
) -> Result<(), XlsxError> {
    worksheet.set_name(sheet)?;

    let header_format = Format::new()
        .set_bold()
        .set_pattern(FormatPattern::Solid)
        .set_background_color(Color::Yellow);

    for (col, header) in (0u16..).zip(headers) {
        worksheet.write_string_with_format(0, col, *header, &header_format)?;
    }

    for (row, cells) in (1u32..).zip(rows) {
        for (col, cell) in (0u16..).zip(cells) {
            match cell {
                SheetCell::Int(value) => {
                    worksheet.write_number(row, col, *value as f64)?;
                }
                SheetCell::Text(value) => {
                    worksheet.write_string(row, col, value)?;
                }
            }
        }
    }

    Ok(())
}

fn write_error(err: XlsxError) -> CoreError {
    CoreError::Internal(format!("Failed to write spreadsheet: {err}"))
}
