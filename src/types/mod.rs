//! Data types shared by the store, movement engine and exporter.

mod address;
mod workbook;

pub use address::*;
pub use workbook::*;
