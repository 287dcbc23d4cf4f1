//! Utility functions for timestamps and artifact file IO.

pub mod files;
pub mod timestamps;

pub use files::{ensure_parent_dir, read_bytes, read_json, write_bytes, write_json};
pub use timestamps::{format_run_timestamp, iso_timestamp, RUN_TIMESTAMP_FORMAT};
