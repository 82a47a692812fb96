//! Table loader: detects the input format, reads the first table and maps
//! it onto the funnel schema.

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use calamine::{Reader, Xls, Xlsx};
use funnel_core::types::{Dataset, Record};
use funnel_core::{ColumnMapping, FunnelError, FunnelResult};
use tracing::{debug, info};

use crate::schema::SchemaMapping;
use crate::table::{read_csv, read_first_sheet, RawTable};

/// Supported tabular inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    /// Office Open XML workbook (`.xlsx`, `.xlsm`).
    Xlsx,
    /// Legacy binary workbook (`.xls`).
    Xls,
}

impl InputFormat {
    /// Detects the format from a file extension, case-insensitively.
    pub fn from_path(path: &Path) -> FunnelResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(InputFormat::Csv),
            "xlsx" | "xlsm" => Ok(InputFormat::Xlsx),
            "xls" => Ok(InputFormat::Xls),
            _ => Err(FunnelError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

pub struct TableLoader {
    columns: ColumnMapping,
}

impl TableLoader {
    pub fn new(columns: ColumnMapping) -> Self {
        Self { columns }
    }

    pub fn load_path(&self, path: &Path) -> FunnelResult<Dataset> {
        let format = InputFormat::from_path(path)?;
        let file = File::open(path)?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.load_reader(BufReader::new(file), format, &source)
    }

    /// Loads from any byte stream, e.g. an uploaded file held in memory.
    pub fn load_reader<R: Read>(
        &self,
        mut reader: R,
        format: InputFormat,
        source: &str,
    ) -> FunnelResult<Dataset> {
        let table = match format {
            InputFormat::Csv => read_csv(reader)?,
            InputFormat::Xlsx | InputFormat::Xls => {
                let mut bytes = Vec::new();
                reader.read_to_end(&mut bytes)?;
                read_workbook(Cursor::new(bytes), format)?
            }
        };
        info!(
            source,
            rows = table.rows.len(),
            columns = table.headers.len(),
            "Loaded input table"
        );
        self.map_table(table, source)
    }

    fn map_table(&self, table: RawTable, source: &str) -> FunnelResult<Dataset> {
        let schema = SchemaMapping::resolve(&table.headers, &self.columns)?;
        debug!(
            platform = schema.has_platform(),
            date = schema.has_date(),
            "Column roles resolved"
        );

        let records = table
            .rows
            .iter()
            .enumerate()
            // Line 1 is the header.
            .map(|(idx, row)| schema.to_record(row, idx + 2))
            .collect::<FunnelResult<Vec<Record>>>()?;

        Ok(Dataset::new(source, records)
            .with_optional_columns(schema.has_platform(), schema.has_date()))
    }
}

impl Default for TableLoader {
    fn default() -> Self {
        Self::new(ColumnMapping::default())
    }
}

fn read_workbook(bytes: Cursor<Vec<u8>>, format: InputFormat) -> FunnelResult<RawTable> {
    match format {
        InputFormat::Xls => {
            let workbook: Xls<_> =
                Xls::new(bytes).map_err(|e| FunnelError::Read(format!("xls workbook: {e}")))?;
            read_first_sheet::<Cursor<Vec<u8>>, _>(workbook)
        }
        _ => {
            let workbook: Xlsx<_> =
                Xlsx::new(bytes).map_err(|e| FunnelError::Read(format!("xlsx workbook: {e}")))?;
            read_first_sheet::<Cursor<Vec<u8>>, _>(workbook)
        }
    }
}
