//! Row filtering, column projection and table rendering

mod columns;
mod filter;
mod render;

pub use columns::{join_columns, Column, ResourceKind, DEBUG_PRESET};
pub use filter::{header, project, RowFilter};
pub use render::{OutputFormat, Table};
