//! CSV input for observations and model results.
//!
//! The time column is the one named like a time axis (`time`, `date`,
//! `datetime`, ...) or else the first column. Other columns become float
//! columns when every non-empty cell parses as a number and text columns
//! otherwise. Empty cells and `NaN` are missing values.

use std::io::Read;
use std::path::Path;

use chrono::NaiveDateTime;
use skill_common::time::parse_datetime;
use skill_common::{SkillError, SkillResult};
use timeseries::synonyms::canonical_name;
use timeseries::{Column, DataTable, SeriesReader};
use tracing::debug;

/// Reads delimited text files into tables.
#[derive(Debug, Clone)]
pub struct CsvReader {
    delimiter: u8,
}

impl Default for CsvReader {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl CsvReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Read a table from any reader.
    pub fn read_from<R: Read>(&self, source: R) -> SkillResult<DataTable> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(csv::Trim::All)
            .from_reader(source);

        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_error)?
            .iter()
            .map(str::to_string)
            .collect();
        if headers.is_empty() {
            return Err(SkillError::invalid_value("CSV input has no columns"));
        }

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for record in reader.records() {
            let record = record.map_err(csv_error)?;
            for (column, cell) in cells.iter_mut().zip(record.iter()) {
                column.push(cell.to_string());
            }
        }

        let time_col = headers
            .iter()
            .position(|h| canonical_name(h) == Some("time"))
            .unwrap_or(0);
        let time = cells[time_col]
            .iter()
            .map(|s| parse_datetime(s))
            .collect::<SkillResult<Vec<NaiveDateTime>>>()
            .map_err(|e| SkillError::invalid_type(format!("column '{}' is not a time axis: {e}", headers[time_col])))?;

        let columns: Vec<Column> = headers
            .into_iter()
            .zip(cells)
            .enumerate()
            .filter(|(i, _)| *i != time_col)
            .map(|(_, (name, values))| to_column(name, values))
            .collect();
        debug!(rows = time.len(), columns = columns.len(), "read CSV table");
        DataTable::with_time_index(time, columns)
    }
}

impl SeriesReader for CsvReader {
    fn read(&self, path: &Path) -> SkillResult<DataTable> {
        let file = std::fs::File::open(path)?;
        self.read_from(file)
            .map_err(|e| SkillError::invalid_value(format!("{}: {e}", path.display())))
    }
}

fn csv_error(err: csv::Error) -> SkillError {
    SkillError::Io(err.into())
}

fn parse_number(cell: &str) -> Option<f64> {
    if cell.is_empty() {
        return Some(f64::NAN);
    }
    cell.parse().ok()
}

fn to_column(name: String, values: Vec<String>) -> Column {
    match values.iter().map(|v| parse_number(v)).collect::<Option<Vec<f64>>>() {
        Some(numbers) => Column::float(name, numbers),
        None => Column::text(name, values),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::ts;
    use timeseries::{ColumnData, TableIndex};

    #[test]
    fn test_reads_time_index_and_numbers() {
        let text = "date,WL,flag\n2019-01-01 00:00:00,1.5,ok\n2019-01-01 01:00:00,,bad\n";
        let table = CsvReader::new().read_from(text.as_bytes()).unwrap();
        assert_eq!(table.column_names(), vec!["WL", "flag"]);
        assert_eq!(
            table.index(),
            &TableIndex::Time(vec![ts("2019-01-01T00:00:00"), ts("2019-01-01T01:00:00")])
        );
        let wl = table.column("WL").unwrap().data.as_float().unwrap();
        assert_eq!(wl[0], 1.5);
        assert!(wl[1].is_nan());
        assert!(matches!(table.column("flag").unwrap().data, ColumnData::Text(_)));
    }

    #[test]
    fn test_first_column_is_time_by_default() {
        let text = "t;a\n2019-01-02;NaN\n";
        let table = CsvReader::new().with_delimiter(b';').read_from(text.as_bytes()).unwrap();
        assert_eq!(table.n_rows(), 1);
        assert!(table.column("a").unwrap().data.as_float().unwrap()[0].is_nan());
    }

    #[test]
    fn test_bad_timestamp_is_type_error() {
        let err = CsvReader::new().read_from("time,a\nyesterday,1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, SkillError::InvalidType(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = CsvReader::new().read(Path::new("/nonexistent/obs.csv")).unwrap_err();
        assert!(matches!(err, SkillError::Io(_)));
    }
}
