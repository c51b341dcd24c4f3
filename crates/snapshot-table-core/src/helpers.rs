//! High-level helpers for deriving metadata from data files.
//!
//! Current helpers:
//! - Parquet-based [`crate::metadata::DataFile`] derivation that reads row
//!   counts and column metrics from the Parquet footer, plus Hive-style
//!   partition path parsing, used by directory import.
pub mod parquet;
