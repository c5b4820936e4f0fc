use std::fmt;

/// Single value inside a [`TabularDataset`].
/// 表格中的單一儲存格。
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Types a raw field from a text format.
    /// 依原始文字判斷儲存格型別。
    ///
    /// Only `""` is empty. A field is numeric when it is a plain decimal
    /// (`-?digits[.digits]`) without padding or a redundant leading zero, so
    /// `"02134"`, `" 5"` and `"1e3"` stay text exactly as written. Text that is
    /// itself a plain decimal reads back as [`Cell::Number`].
    pub fn infer(raw: &str) -> Self {
        if raw.is_empty() {
            return Cell::Empty;
        }
        if is_plain_decimal(raw) {
            if let Ok(value) = raw.parse::<f64>() {
                if value.is_finite() {
                    return Cell::Number(value);
                }
            }
        }
        Cell::Text(raw.to_string())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(value) => Some(*value),
            _ => None,
        }
    }
}

fn is_plain_decimal(raw: &str) -> bool {
    let unsigned = raw.strip_prefix('-').unwrap_or(raw);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };
    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if !digits(whole) || (whole.len() > 1 && whole.starts_with('0')) {
        return false;
    }
    fraction.map_or(true, digits)
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Number(value) => write!(f, "{value}"),
            Cell::Text(text) => f.write_str(text),
        }
    }
}

/// Goes through [`Cell::infer`], so the cell matches what a CSV reload yields.
impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::infer(value)
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        match Cell::infer(&value) {
            Cell::Text(_) => Cell::Text(value),
            typed => typed,
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Number(value as f64)
    }
}

/// In-memory tabular dataset: ordered column names and rows of cells.
/// 記憶體中的表格資料：有序欄位名稱與資料列。
///
/// Every row holds exactly `columns().len()` cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TabularDataset {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl TabularDataset {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|cells| cells.get(column))
    }

    /// Appends a row, padding with [`Cell::Empty`] or truncating to the column count.
    pub fn push_row<I>(&mut self, cells: I)
    where
        I: IntoIterator<Item = Cell>,
    {
        let mut row: Vec<Cell> = cells.into_iter().take(self.columns.len()).collect();
        row.resize(self.columns.len(), Cell::Empty);
        self.rows.push(row);
    }

    /// Overwrites a cell; returns `false` when the coordinates are out of range.
    pub fn set_cell(&mut self, row: usize, column: usize, value: Cell) -> bool {
        match self.rows.get_mut(row).and_then(|cells| cells.get_mut(column)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn remove_row(&mut self, row: usize) -> Option<Vec<Cell>> {
        (row < self.rows.len()).then(|| self.rows.remove(row))
    }

    /// Keeps only the rows for which `keep` returns `true`.
    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[Cell]) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }

    /// Adds a column filled with `fill` for every existing row.
    pub fn add_column(&mut self, name: impl Into<String>, fill: Cell) {
        self.columns.push(name.into());
        for row in &mut self.rows {
            row.push(fill.clone());
        }
    }

    pub fn rename_column(&mut self, index: usize, name: impl Into<String>) -> bool {
        match self.columns.get_mut(index) {
            Some(column) => {
                *column = name.into();
                true
            }
            None => false,
        }
    }
}
