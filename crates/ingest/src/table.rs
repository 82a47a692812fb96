//! Format-specific readers producing an untyped header + cell grid.

use std::io::{Read, Seek};

use calamine::{Data, Reader};
use chrono::NaiveDate;
use funnel_core::{FunnelError, FunnelResult};

/// A single source cell before schema mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl Cell {
    /// Text cell, with surrounding whitespace removed. Blank text is `Empty`.
    pub fn text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(trimmed.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Int(v) => write!(f, "{v}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Text(v) => f.write_str(v),
            Cell::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
        }
    }
}

/// Header row plus data rows. Fully blank rows are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    fn push_row(&mut self, row: Vec<Cell>) {
        if !row.iter().all(Cell::is_empty) {
            self.rows.push(row);
        }
    }
}

fn header_name(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_string()
}

pub fn read_csv<R: Read>(reader: R) -> FunnelResult<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| FunnelError::Read(format!("CSV header: {e}")))?
        .iter()
        .map(header_name)
        .collect();

    let mut table = RawTable {
        headers,
        rows: Vec::new(),
    };
    for record in reader.records() {
        let record = record.map_err(|e| FunnelError::Read(format!("CSV record: {e}")))?;
        table.push_row(record.iter().map(Cell::text).collect());
    }
    Ok(table)
}

/// Reads the first worksheet of an opened workbook.
pub fn read_first_sheet<RS, W>(mut workbook: W) -> FunnelResult<RawTable>
where
    RS: Read + Seek,
    W: Reader<RS>,
    W::Error: std::fmt::Display,
{
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| FunnelError::Read("workbook contains no worksheets".into()))?
        .map_err(|e| FunnelError::Read(format!("worksheet: {e}")))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(RawTable::default());
    };

    let mut table = RawTable {
        headers: header_row
            .iter()
            .map(|cell| header_name(&cell.to_string()))
            .collect(),
        rows: Vec::new(),
    };
    for row in rows {
        table.push_row(row.iter().map(sheet_cell).collect());
    }
    Ok(table)
}

fn sheet_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Int(v) => Cell::Int(*v),
        Data::Float(v) => Cell::Float(*v),
        Data::String(v) | Data::DateTimeIso(v) | Data::DurationIso(v) => Cell::text(v),
        Data::Bool(v) => Cell::Text(v.to_string()),
        Data::DateTime(v) => match v.as_datetime() {
            Some(dt) => Cell::Date(dt.date()),
            None => Cell::Float(v.as_f64()),
        },
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_headers_strip_bom_and_whitespace() {
        let input = "\u{feff}event , clicks\nhome,12\n";
        let table = read_csv(input.as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["event", "clicks"]);
        assert_eq!(
            table.rows,
            vec![vec![Cell::Text("home".into()), Cell::Text("12".into())]]
        );
    }

    #[test]
    fn csv_blank_cells_and_rows() {
        let input = "a,b\n1,\n,\n3,4\n";
        let table = read_csv(input.as_bytes()).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][1], Cell::Empty);
    }

    #[test]
    fn csv_short_rows_are_accepted() {
        let input = "a,b,c\n1,2\n";
        let table = read_csv(input.as_bytes()).unwrap();
        assert_eq!(table.rows[0].len(), 2);
    }

    #[test]
    fn cell_display_round_trips_values() {
        assert_eq!(Cell::Int(42).to_string(), "42");
        assert_eq!(Cell::Float(1.5).to_string(), "1.5");
        assert_eq!(Cell::Empty.to_string(), "");
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(Cell::Date(date).to_string(), "2024-03-09");
    }

    #[test]
    fn sheet_values_map_to_cells() {
        assert_eq!(sheet_cell(&Data::Empty), Cell::Empty);
        assert_eq!(sheet_cell(&Data::Int(7)), Cell::Int(7));
        assert_eq!(sheet_cell(&Data::Float(1000.0)), Cell::Float(1000.0));
        assert_eq!(sheet_cell(&Data::String("  feed ".into())), Cell::Text("feed".into()));
        assert_eq!(sheet_cell(&Data::String("   ".into())), Cell::Empty);
        assert_eq!(sheet_cell(&Data::Bool(true)), Cell::Text("true".into()));
        assert_eq!(
            sheet_cell(&Data::DateTimeIso("2024-06-01".into())),
            Cell::Text("2024-06-01".into())
        );
    }
}
