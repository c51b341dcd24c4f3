//! Helpers for building [`DataFile`] descriptors from Parquet files.
//!
//! [`data_file_from_parquet_bytes`] reads only the footer: row count from the
//! file metadata, and per-column compressed size, value count, null count
//! and min/max from row-group statistics. Columns are matched to schema
//! fields by top-level name. Bounds are reported only when every row group
//! carries them, so a file with partial statistics never gets bounds that
//! are too narrow.
//!
//! [`partition_from_hive_path`] derives identity partition values from
//! `<column>=<value>` directory segments.

use std::{
    collections::BTreeMap,
    path::{Component, Path},
};

use bytes::Bytes;
use parquet::{
    errors::ParquetError,
    file::{
        reader::{FileReader, SerializedFileReader},
        statistics::Statistics,
    },
};
use snafu::{Backtrace, prelude::*};

use crate::metadata::{DataFile, Datum, PartitionSpec, PartitionValues, TableSchema};

/// Value Hive writes for a null partition.
pub const HIVE_NULL_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

const PARQUET_MAGIC: &[u8; 4] = b"PAR1";

/// Errors raised while deriving metadata from Parquet files.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ParquetImportError {
    /// File is too short to be a Parquet file.
    #[snafu(display("File too short to be Parquet: {path}"))]
    TooShort {
        /// Offending file.
        path: String,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },

    /// Header or footer magic is not `PAR1`.
    #[snafu(display("Missing Parquet magic bytes: {path}"))]
    InvalidMagic {
        /// Offending file.
        path: String,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },

    /// The Parquet footer could not be decoded.
    #[snafu(display("Failed to read Parquet footer of {path}: {source}"))]
    ParquetRead {
        /// Offending file.
        path: String,
        /// Underlying Parquet error.
        source: ParquetError,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },

    /// A partition column has no `<column>=<value>` segment in the path.
    #[snafu(display("Path {path} has no value for partition column {column}"))]
    MissingPartitionValue {
        /// Offending file.
        path: String,
        /// Partition source column.
        column: String,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },

    /// A partition value in the path does not parse as the column type.
    #[snafu(display("Path {path} has invalid value {value:?} for partition column {column}"))]
    InvalidPartitionValue {
        /// Offending file.
        path: String,
        /// Partition source column.
        column: String,
        /// Raw value from the path.
        value: String,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },
}

/// Derive identity partition values from Hive-style directory names in
/// `rel_path` (for example `id=1/part-0.parquet`).
pub fn partition_from_hive_path(
    rel_path: &Path,
    schema: &TableSchema,
    spec: &PartitionSpec,
) -> Result<PartitionValues, ParquetImportError> {
    let path_str = rel_path.to_string_lossy().to_string();

    let mut segments: BTreeMap<String, String> = BTreeMap::new();
    if let Some(parent) = rel_path.parent() {
        for component in parent.components() {
            if let Component::Normal(os) = component
                && let Some((k, v)) = os.to_string_lossy().split_once('=')
            {
                segments.insert(k.to_string(), v.to_string());
            }
        }
    }

    let mut values = Vec::with_capacity(spec.fields.len());
    for field in &spec.fields {
        let Some(source) = schema.field_by_id(field.source_id) else {
            return MissingPartitionValueSnafu {
                path: path_str,
                column: field.name.clone(),
            }
            .fail();
        };

        let raw = segments
            .get(&source.name)
            .context(MissingPartitionValueSnafu {
                path: path_str.clone(),
                column: source.name.clone(),
            })?;

        if raw == HIVE_NULL_PARTITION {
            values.push(None);
            continue;
        }

        let datum = Datum::parse_as(source.field_type, raw).context(InvalidPartitionValueSnafu {
            path: path_str.clone(),
            column: source.name.clone(),
            value: raw.clone(),
        })?;
        values.push(Some(datum));
    }

    Ok(PartitionValues(values))
}

fn stats_bounds(stats: &Statistics) -> Option<(Datum, Datum)> {
    match stats {
        Statistics::Boolean(s) => Some((Datum::Boolean(*s.min_opt()?), Datum::Boolean(*s.max_opt()?))),
        Statistics::Int32(s) => Some((Datum::Int(*s.min_opt()?), Datum::Int(*s.max_opt()?))),
        Statistics::Int64(s) => Some((Datum::Long(*s.min_opt()?), Datum::Long(*s.max_opt()?))),
        Statistics::ByteArray(s) => {
            let lo = s.min_opt()?.as_utf8().ok()?;
            let hi = s.max_opt()?.as_utf8().ok()?;
            Some((Datum::String(lo.to_string()), Datum::String(hi.to_string())))
        }
        _ => None,
    }
}

/// Per-column accumulator across row groups.
#[derive(Default)]
struct ColumnAcc {
    size: u64,
    values: u64,
    nulls: Option<u64>,
    bounds: Option<(Datum, Datum)>,
    bounds_complete: bool,
    seen: bool,
}

impl ColumnAcc {
    fn merge_row_group(&mut self, size: i64, values: i64, stats: Option<&Statistics>) {
        let first = !self.seen;
        self.seen = true;
        self.size += u64::try_from(size).unwrap_or(0);
        self.values += u64::try_from(values).unwrap_or(0);

        let null_count = stats.and_then(Statistics::null_count_opt);
        self.nulls = match (first, self.nulls, null_count) {
            (true, _, n) => n,
            (false, Some(acc), Some(n)) => Some(acc + n),
            _ => None,
        };

        let rg_values = u64::try_from(values).unwrap_or(0);
        let all_null_group = null_count.is_some_and(|n| n == rg_values);
        let group_bounds = stats.and_then(stats_bounds);

        if first {
            self.bounds_complete = true;
        }
        match group_bounds {
            Some((lo, hi)) => {
                self.bounds = Some(match self.bounds.take() {
                    Some((acc_lo, acc_hi)) => (acc_lo.min(lo), acc_hi.max(hi)),
                    None => (lo, hi),
                });
            }
            // A row group of only nulls contributes no bounds.
            None if all_null_group => {}
            None => self.bounds_complete = false,
        }
    }
}

/// Build a [`DataFile`] for the Parquet file `rel_path` whose contents are
/// `data`.
pub fn data_file_from_parquet_bytes(
    rel_path: &str,
    data: Bytes,
    schema: &TableSchema,
    partition: PartitionValues,
) -> Result<DataFile, ParquetImportError> {
    ensure!(
        data.len() >= 8,
        TooShortSnafu {
            path: rel_path.to_string()
        }
    );
    ensure!(
        data.starts_with(PARQUET_MAGIC) && data.ends_with(PARQUET_MAGIC),
        InvalidMagicSnafu {
            path: rel_path.to_string()
        }
    );

    let file_size = data.len() as u64;
    let reader = SerializedFileReader::new(data).context(ParquetReadSnafu {
        path: rel_path.to_string(),
    })?;
    let meta = reader.metadata();
    let record_count = u64::try_from(meta.file_metadata().num_rows()).unwrap_or(0);

    let mut accs: BTreeMap<i32, ColumnAcc> = BTreeMap::new();
    for rg in meta.row_groups() {
        for col in rg.columns() {
            let descr = col.column_descr();
            // Nested columns have multi-part paths and are not tracked.
            if descr.path().parts().len() != 1 {
                continue;
            }
            let Some(field) = schema.field_by_name(descr.name()) else {
                continue;
            };
            accs.entry(field.id).or_default().merge_row_group(
                col.compressed_size(),
                col.num_values(),
                col.statistics(),
            );
        }
    }

    let mut file = DataFile::new(rel_path, partition, record_count, file_size);
    for (field_id, acc) in accs {
        file.column_sizes.insert(field_id, acc.size);
        file.value_counts.insert(field_id, acc.values);
        if let Some(n) = acc.nulls {
            file.null_value_counts.insert(field_id, n);
        }

        let field_type = schema.field_by_id(field_id).map(|f| f.field_type);
        if let (true, Some((lo, hi)), Some(ty)) = (acc.bounds_complete, acc.bounds, field_type)
            && let (Some(lo), Some(hi)) = (lo.to_type(ty), hi.to_type(ty))
        {
            file.lower_bounds.insert(field_id, lo);
            file.upper_bounds.insert(field_id, hi);
        }
    }

    Ok(file)
}
