//! Tabular input: the common shape of everything a reader can produce.

use std::path::Path;

use chrono::NaiveDateTime;
use skill_common::time::{parse_datetime, round_to_resolution};
use skill_common::{Quantity, SkillError, SkillResult};

/// Values of one column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Float(Vec<f64>),
    Time(Vec<NaiveDateTime>),
    Text(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Float(v) => v.len(),
            ColumnData::Time(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnData::Float(_) => "float",
            ColumnData::Time(_) => "datetime",
            ColumnData::Text(_) => "text",
        }
    }

    pub fn as_float(&self) -> Option<&[f64]> {
        match self {
            ColumnData::Float(v) => Some(v),
            _ => None,
        }
    }
}

/// A named column with optional quantity metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
    pub quantity: Option<Quantity>,
}

impl Column {
    pub fn float(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Float(values),
            quantity: None,
        }
    }

    pub fn time(name: impl Into<String>, values: Vec<NaiveDateTime>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Time(values),
            quantity: None,
        }
    }

    pub fn text(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Text(values),
            quantity: None,
        }
    }

    pub fn with_quantity(mut self, quantity: Quantity) -> Self {
        self.quantity = Some(quantity);
        self
    }
}

/// Row index of a table.
#[derive(Debug, Clone, PartialEq)]
pub enum TableIndex {
    /// Timestamps, one per row.
    Time(Vec<NaiveDateTime>),
    /// Plain positional index with the given number of rows.
    Range(usize),
}

impl TableIndex {
    pub fn len(&self) -> usize {
        match self {
            TableIndex::Time(t) => t.len(),
            TableIndex::Range(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A column-oriented table such as a dataframe, a single series, or a labelled dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    index: TableIndex,
    columns: Vec<Column>,
}

impl DataTable {
    pub fn new(index: TableIndex, columns: Vec<Column>) -> SkillResult<Self> {
        let n = index.len();
        for (i, col) in columns.iter().enumerate() {
            if col.data.len() != n {
                return Err(SkillError::invalid_value(format!(
                    "column '{}' has {} rows, index has {}",
                    col.name,
                    col.data.len(),
                    n
                )));
            }
            if columns[..i].iter().any(|c| c.name == col.name) {
                return Err(SkillError::name_collision(format!("column '{}' appears twice", col.name)));
            }
        }
        Ok(Self { index, columns })
    }

    /// Table indexed by time.
    pub fn with_time_index(time: Vec<NaiveDateTime>, columns: Vec<Column>) -> SkillResult<Self> {
        Self::new(TableIndex::Time(time), columns)
    }

    /// Single named series on a time index.
    pub fn from_series(name: impl Into<String>, time: Vec<NaiveDateTime>, values: Vec<f64>) -> SkillResult<Self> {
        Self::with_time_index(time, vec![Column::float(name, values)])
    }

    pub fn index(&self) -> &TableIndex {
        &self.index
    }

    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub(crate) fn columns_mut(&mut self) -> &mut Vec<Column> {
        &mut self.columns
    }

    /// Split into a rounded time axis and the remaining columns.
    ///
    /// A positional index is replaced by a column named `time` holding
    /// timestamps or ISO strings. Anything else is an `InvalidType` error.
    pub fn into_time_indexed(self) -> SkillResult<(Vec<NaiveDateTime>, Vec<Column>)> {
        let DataTable { index, mut columns } = self;
        let time = match index {
            TableIndex::Time(time) => time,
            TableIndex::Range(_) => {
                let pos = columns.iter().position(|c| c.name == "time").ok_or_else(|| {
                    SkillError::invalid_type("input must have a datetime index or a 'time' column")
                })?;
                let col = columns.remove(pos);
                match col.data {
                    ColumnData::Time(t) => t,
                    ColumnData::Text(s) => s
                        .iter()
                        .map(|v| parse_datetime(v))
                        .collect::<SkillResult<Vec<_>>>()
                        .map_err(|e| SkillError::invalid_type(format!("'time' column is not datetime: {e}")))?,
                    ColumnData::Float(_) => {
                        return Err(SkillError::invalid_type("'time' column must be datetime, got float"))
                    }
                }
            }
        };
        Ok((time.into_iter().map(round_to_resolution).collect(), columns))
    }
}

/// Reads a file into a table. Implemented by format-specific readers.
pub trait SeriesReader {
    fn read(&self, path: &Path) -> SkillResult<DataTable>;
}
