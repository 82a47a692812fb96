//! Input loading: CSV and spreadsheet exports mapped onto funnel records
//! through a declared column mapping.

pub mod loader;
pub mod schema;
pub mod table;

pub use loader::{InputFormat, TableLoader};
