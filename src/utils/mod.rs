//! Storage helpers shared by the library and the binaries.
//!
//! - **`data_source`**: read access to the per-sector Lanczos data, keyed by block
//!   and tag.
//! - **`output`**: descriptive file names, pole/weight records and CSV tables.

pub mod data_source;
pub mod output;
