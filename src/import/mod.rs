//! Importers for the chapter spreadsheets and the film master CSV.
//!
//! Worksheets arrive as CSV exports and are loaded into a [`SheetGrid`], a
//! rectangular view of string cells addressed by zero-based row and column.

pub mod chapter_sheet;
pub mod film_csv;
pub mod text;

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

pub use chapter_sheet::{import_chapter_sheet, SheetSummary};
pub use film_csv::{import_films_csv, FilmImportStats};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SheetGrid {
    rows: Vec<Vec<String>>,
}

impl SheetGrid {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        SheetGrid { rows }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record.context("Failed to read worksheet row")?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(SheetGrid { rows })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).with_context(|| format!("Failed to open sheet {:?}", path))?;
        Self::from_reader(file).with_context(|| format!("Failed to parse sheet {:?}", path))
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, row: usize) -> &[String] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Missing cells read as empty.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.row(row).get(column).map(String::as_str).unwrap_or("")
    }
}
