//! CSV to labelled series conversion for downloaded datasets

use std::fmt;

use serde::Serialize;

/// Errors raised while extracting a series from CSV text
#[derive(Debug, PartialEq)]
pub enum SeriesError {
    /// Row has fewer columns than the catalog asks for (1-based row in the body)
    MissingColumn { row: usize, column: usize },

    /// Value cell is not a number
    InvalidValue { row: usize, value: String },
}

impl fmt::Display for SeriesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesError::MissingColumn { row, column } => {
                write!(f, "row {} has no column {}", row, column)
            }
            SeriesError::InvalidValue { row, value } => {
                write!(f, "row {}: '{}' is not a number", row, value)
            }
        }
    }
}

impl std::error::Error for SeriesError {}

/// Values with their labels, in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    pub labels: Vec<String>,
    pub values: Vec<f32>,
}

/// Condensed view of a series for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub points: usize,
    pub first_label: Option<String>,
    pub last_label: Option<String>,
    pub min: Option<f32>,
    pub max: Option<f32>,
    pub last: Option<f32>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn summary(&self) -> SeriesSummary {
        SeriesSummary {
            points: self.len(),
            first_label: self.labels.first().cloned(),
            last_label: self.labels.last().cloned(),
            min: self.values.iter().copied().reduce(f32::min),
            max: self.values.iter().copied().reduce(f32::max),
            last: self.values.last().copied(),
        }
    }
}

/// Parse `data`, skipping `header_rows` lines and one trailing blank line
pub fn extract(
    data: &str,
    header_rows: usize,
    value_column: usize,
    label_column: usize,
) -> Result<Series, SeriesError> {
    let mut rows: Vec<&str> = data.split('\n').skip(header_rows).collect();
    if rows.last().is_some_and(|row| row.trim().is_empty()) {
        rows.pop();
    }

    let mut series = Series::default();
    for (offset, row) in rows.into_iter().enumerate() {
        let number = header_rows + offset + 1;
        let cells: Vec<&str> = row.split(',').map(str::trim).collect();

        let cell = |column: usize| {
            cells
                .get(column)
                .copied()
                .ok_or(SeriesError::MissingColumn { row: number, column })
        };

        let raw_value = cell(value_column)?;
        let value = raw_value.parse::<f32>().map_err(|_| SeriesError::InvalidValue {
            row: number,
            value: raw_value.to_string(),
        })?;
        let label = cell(label_column)?;

        series.values.push(value);
        series.labels.push(label.to_string());
    }

    Ok(series)
}
