//! Raw E-Prime record schema
//!
//! One record per row of the TAB export. Cells are kept as typed values
//! keyed by column header; converters decide which columns they need.

mod adapter;
mod record;

pub use adapter::*;
pub use record::*;
