//! Host-side persistence for the in-memory sheet.

pub mod csv;

pub use csv::{csv_string, load_csv, write_csv};
