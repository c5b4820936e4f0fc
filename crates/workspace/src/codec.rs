//! Conversion between dataset files and [`TabularDataset`] values.
//! 資料集檔案與 [`TabularDataset`] 之間的轉換。

use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Reader};
use rust_xlsxwriter::{Workbook, XlsxError};
use thiserror::Error;

use crate::table::{Cell, TabularDataset};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// On-disk tabular formats understood by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TabularFormat {
    /// Comma-separated values with a header row.
    Csv,
    /// Spreadsheet workbook; only the first sheet is read or written.
    Spreadsheet,
}

impl TabularFormat {
    /// Picks the format from the file extension of `path`.
    /// 依副檔名判斷格式。
    pub fn from_path(path: &Path) -> Result<Self, CodecError> {
        match extension_of(path).as_deref() {
            Some("csv") => Ok(TabularFormat::Csv),
            Some("xlsx") | Some("xls") => Ok(TabularFormat::Spreadsheet),
            Some(other) => Err(CodecError::UnknownExtension(other.to_string())),
            None => Err(CodecError::UnknownExtension(String::new())),
        }
    }

    /// Like [`TabularFormat::from_path`], but refuses legacy `.xls`, which can
    /// be read and not written.
    pub fn for_output(path: &Path) -> Result<Self, CodecError> {
        match extension_of(path).as_deref() {
            Some("xls") => Err(CodecError::ReadOnlyFormat("xls".to_string())),
            _ => Self::from_path(path),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TabularFormat::Csv => "csv",
            TabularFormat::Spreadsheet => "spreadsheet",
        }
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Errors produced while parsing or serialising a dataset.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("unreadable spreadsheet: {0}")]
    WorkbookRead(#[from] calamine::Error),
    #[error("failed to write spreadsheet: {0}")]
    WorkbookWrite(#[from] XlsxError),
    #[error("dataset has no header row")]
    MissingHeader,
    #[error("line {line} has {found} fields but the header has {expected}")]
    TooManyFields {
        line: u64,
        found: usize,
        expected: usize,
    },
    #[error("unrecognised tabular file extension '{0}'")]
    UnknownExtension(String),
    #[error("'.{0}' files can be read but not written")]
    ReadOnlyFormat(String),
    #[error("dataset exceeds the spreadsheet row or column limit")]
    SheetLimit,
    #[error("failed to flush csv output: {0}")]
    Flush(String),
}

/// Black-box converter between raw bytes and [`TabularDataset`].
/// 原始位元組與表格資料之間的轉換介面。
///
/// Implementations must preserve column names and row order in both directions.
pub trait DatasetCodec {
    fn parse(&self, bytes: &[u8], format: TabularFormat) -> Result<TabularDataset, CodecError>;

    fn serialize(
        &self,
        dataset: &TabularDataset,
        format: TabularFormat,
    ) -> Result<Vec<u8>, CodecError>;
}

/// Codec for CSV files (`csv` crate) and first-sheet workbooks (`calamine`
/// to read, `rust_xlsxwriter` to write).
///
/// CSV cells are typed by [`Cell::infer`]. Workbook cells keep the type
/// stored in the sheet, so text such as `"02134"` stays text.
#[derive(Debug, Clone, Copy)]
pub struct TabularCodec {
    delimiter: u8,
}

impl Default for TabularCodec {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl TabularCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// CSV field delimiter; workbooks ignore it.
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    fn parse_csv(&self, bytes: &[u8]) -> Result<TabularDataset, CodecError> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Err(CodecError::MissingHeader);
        }
        let mut dataset = TabularDataset::new(headers.iter());
        for record in reader.records() {
            let record = record?;
            if record.len() > headers.len() {
                return Err(CodecError::TooManyFields {
                    line: record.position().map(|pos| pos.line()).unwrap_or_default(),
                    found: record.len(),
                    expected: headers.len(),
                });
            }
            dataset.push_row(record.iter().map(Cell::infer));
        }
        Ok(dataset)
    }

    fn serialize_csv(&self, dataset: &TabularDataset) -> Result<Vec<u8>, CodecError> {
        if dataset.column_count() == 0 {
            return Err(CodecError::MissingHeader);
        }
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(Vec::new());
        writer.write_record(dataset.columns())?;
        for row in dataset.rows() {
            writer.write_record(row.iter().map(|cell| cell.to_string()))?;
        }
        writer
            .into_inner()
            .map_err(|err| CodecError::Flush(err.to_string()))
    }

    fn parse_workbook(&self, bytes: &[u8]) -> Result<TabularDataset, CodecError> {
        let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes))?;
        let Some(range) = workbook.worksheet_range_at(0) else {
            return Err(CodecError::MissingHeader);
        };
        let range = range?;
        let mut rows = range.rows();
        let Some(header) = rows.next() else {
            return Err(CodecError::MissingHeader);
        };

        let width = header
            .iter()
            .rposition(|value| !matches!(value, Data::Empty))
            .map_or(0, |last| last + 1);
        if width == 0 {
            return Err(CodecError::MissingHeader);
        }
        let mut dataset = TabularDataset::new(header[..width].iter().map(header_label));
        for (index, row) in rows.enumerate() {
            if let Some(last) = row.iter().rposition(|value| !matches!(value, Data::Empty)) {
                if last >= width {
                    return Err(CodecError::TooManyFields {
                        line: index as u64 + 2,
                        found: last + 1,
                        expected: width,
                    });
                }
            }
            dataset.push_row(row.iter().take(width).map(sheet_cell));
        }
        Ok(dataset)
    }

    fn serialize_workbook(&self, dataset: &TabularDataset) -> Result<Vec<u8>, CodecError> {
        if dataset.column_count() == 0 {
            return Err(CodecError::MissingHeader);
        }
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (column, name) in dataset.columns().iter().enumerate() {
            sheet.write_string(0, sheet_column(column)?, name.as_str())?;
        }
        for (index, row) in dataset.rows().iter().enumerate() {
            let row_number = sheet_row(index + 1)?;
            for (column, cell) in row.iter().enumerate() {
                let column = sheet_column(column)?;
                match cell {
                    Cell::Empty => {}
                    Cell::Number(value) => {
                        sheet.write_number(row_number, column, *value)?;
                    }
                    Cell::Text(text) => {
                        sheet.write_string(row_number, column, text.as_str())?;
                    }
                }
            }
        }
        Ok(workbook.save_to_buffer()?)
    }
}

impl DatasetCodec for TabularCodec {
    fn parse(&self, bytes: &[u8], format: TabularFormat) -> Result<TabularDataset, CodecError> {
        match format {
            TabularFormat::Csv => self.parse_csv(bytes),
            TabularFormat::Spreadsheet => self.parse_workbook(bytes),
        }
    }

    fn serialize(
        &self,
        dataset: &TabularDataset,
        format: TabularFormat,
    ) -> Result<Vec<u8>, CodecError> {
        match format {
            TabularFormat::Csv => self.serialize_csv(dataset),
            TabularFormat::Spreadsheet => self.serialize_workbook(dataset),
        }
    }
}

fn header_label(value: &Data) -> String {
    match value {
        Data::Empty => String::new(),
        Data::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn sheet_cell(value: &Data) -> Cell {
    match value {
        Data::Empty => Cell::Empty,
        Data::String(text) if text.is_empty() => Cell::Empty,
        Data::String(text) => Cell::Text(text.clone()),
        Data::Int(value) => Cell::Number(*value as f64),
        Data::Float(value) if value.is_finite() => Cell::Number(*value),
        other => Cell::Text(other.to_string()),
    }
}

fn sheet_row(index: usize) -> Result<u32, CodecError> {
    u32::try_from(index).map_err(|_| CodecError::SheetLimit)
}

fn sheet_column(index: usize) -> Result<u16, CodecError> {
    u16::try_from(index).map_err(|_| CodecError::SheetLimit)
}
