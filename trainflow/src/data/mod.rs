//! Tabular data handling.

mod table;

pub use table::{test_partition_size, Cell, Table, MISSING_SENTINEL};
