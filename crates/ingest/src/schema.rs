//! Resolves configured column names against a table header and converts
//! raw rows into typed [`Record`]s.

use chrono::{Duration, NaiveDate};
use funnel_core::types::Record;
use funnel_core::{ColumnMapping, ColumnRole, FunnelError, FunnelResult};

use crate::table::Cell;

/// Header positions of every mapped role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMapping {
    exposure: usize,
    click: usize,
    submit: usize,
    order: usize,
    event_name: usize,
    platform: Option<usize>,
    date: Option<usize>,
    names: Vec<String>,
}

impl SchemaMapping {
    /// Fails with [`FunnelError::Schema`] on the first required role whose
    /// column is absent. Optional roles resolve to `None` when absent.
    pub fn resolve(headers: &[String], columns: &ColumnMapping) -> FunnelResult<Self> {
        let position = |role: ColumnRole| -> FunnelResult<Option<usize>> {
            let Some(name) = columns.column_for(role) else {
                return Ok(None);
            };
            match headers.iter().position(|h| h == name) {
                Some(idx) => Ok(Some(idx)),
                None if role.is_required() => Err(FunnelError::Schema {
                    role: role.to_string(),
                    column: name.to_string(),
                }),
                None => Ok(None),
            }
        };
        let required = |role: ColumnRole| -> FunnelResult<usize> {
            position(role)?.ok_or_else(|| FunnelError::Schema {
                role: role.to_string(),
                column: String::new(),
            })
        };

        Ok(Self {
            exposure: required(ColumnRole::Exposure)?,
            click: required(ColumnRole::Click)?,
            submit: required(ColumnRole::Submit)?,
            order: required(ColumnRole::Order)?,
            event_name: required(ColumnRole::EventName)?,
            platform: position(ColumnRole::Platform)?,
            date: position(ColumnRole::Date)?,
            names: headers.to_vec(),
        })
    }

    pub fn has_platform(&self) -> bool {
        self.platform.is_some()
    }

    pub fn has_date(&self) -> bool {
        self.date.is_some()
    }

    /// `line` is the 1-based source line, used in error messages.
    pub fn to_record(&self, row: &[Cell], line: usize) -> FunnelResult<Record> {
        Ok(Record {
            exposure: self.count(row, self.exposure, line)?,
            click: self.count(row, self.click, line)?,
            submit: self.count(row, self.submit, line)?,
            order: self.count(row, self.order, line)?,
            event_name: text(cell(row, self.event_name)),
            platform: self.platform.and_then(|idx| text(cell(row, idx))),
            date: match self.date {
                Some(idx) => self.date_value(row, idx, line)?,
                None => None,
            },
        })
    }

    fn count(&self, row: &[Cell], idx: usize, line: usize) -> FunnelResult<Option<u64>> {
        let value = cell(row, idx);
        parse_count(value)
            .map_err(|()| self.type_error(line, idx, value, "a non-negative integer"))
    }

    fn date_value(
        &self,
        row: &[Cell],
        idx: usize,
        line: usize,
    ) -> FunnelResult<Option<NaiveDate>> {
        let value = cell(row, idx);
        parse_date(value).map_err(|()| self.type_error(line, idx, value, "a date"))
    }

    fn type_error(
        &self,
        line: usize,
        idx: usize,
        value: &Cell,
        expected: &'static str,
    ) -> FunnelError {
        FunnelError::DataType {
            row: line,
            column: self.names[idx].clone(),
            value: value.to_string(),
            expected,
        }
    }
}

const EMPTY: Cell = Cell::Empty;

fn cell(row: &[Cell], idx: usize) -> &Cell {
    row.get(idx).unwrap_or(&EMPTY)
}

fn text(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Empty => None,
        Cell::Float(v) if v.fract() == 0.0 && v.abs() < 1e15 => Some(format!("{}", *v as i64)),
        other => Some(other.to_string()),
    }
}

fn parse_count(cell: &Cell) -> Result<Option<u64>, ()> {
    match cell {
        Cell::Empty => Ok(None),
        Cell::Int(v) => u64::try_from(*v).map(Some).map_err(|_| ()),
        Cell::Float(v) => integral(*v).map(Some),
        Cell::Text(s) => match s.parse::<u64>() {
            Ok(v) => Ok(Some(v)),
            Err(_) => s.parse::<f64>().map_err(|_| ()).and_then(integral).map(Some),
        },
        Cell::Date(_) => Err(()),
    }
}

// Spreadsheets store every number as a float; accept those without a fraction.
fn integral(v: f64) -> Result<u64, ()> {
    if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v < u64::MAX as f64 {
        Ok(v as u64)
    } else {
        Err(())
    }
}

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

fn parse_date(cell: &Cell) -> Result<Option<NaiveDate>, ()> {
    match cell {
        Cell::Empty => Ok(None),
        Cell::Date(d) => Ok(Some(*d)),
        Cell::Int(v) => serial_date(*v as f64).map(Some),
        Cell::Float(v) => serial_date(*v).map(Some),
        Cell::Text(s) => {
            let day = s.split([' ', 'T']).next().unwrap_or_default();
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(day, fmt).ok())
                .map(Some)
                .ok_or(())
        }
    }
}

/// Spreadsheet serial day number (1900 date system).
fn serial_date(serial: f64) -> Result<NaiveDate, ()> {
    if !serial.is_finite() || !(1.0..2_958_466.0).contains(&serial) {
        return Err(());
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).ok_or(())?;
    epoch
        .checked_add_signed(Duration::days(serial.floor() as i64))
        .ok_or(())
}
