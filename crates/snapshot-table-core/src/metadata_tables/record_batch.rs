//! Arrow renderings of the metadata tables.
//!
//! Column layout follows the row types. Data files become a struct column in
//! `entries` and top-level columns in `files`; the `partition` struct is
//! omitted for unpartitioned tables. Metric maps are keyed by field id and
//! are null when a file carries no metrics of that kind.

use std::{collections::BTreeMap, sync::Arc};

use arrow::{
    array::{
        Array, ArrayRef, BooleanArray, Int32Array, Int32Builder, Int64Array, Int64Builder,
        ListArray, MapBuilder, StringArray, StringBuilder, StructArray, TimestampMicrosecondArray,
    },
    buffer::OffsetBuffer,
    datatypes::{Field, FieldRef, Fields},
    error::ArrowError,
    record_batch::RecordBatch,
};
use chrono::{DateTime, Utc};

use crate::{
    metadata::{DataFile, Datum, PartitionValues, PrimitiveType, TableMeta},
    metadata_tables::{
        EntryRow, HistoryRow, ManifestRow, PartitionRow, PartitionSummaryRow, SnapshotRow,
    },
};

type Column = (String, ArrayRef, bool);

fn column(name: &str, array: ArrayRef, nullable: bool) -> Column {
    (name.to_string(), array, nullable)
}

fn to_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn to_i32(v: u64) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

fn batch(columns: Vec<Column>) -> Result<RecordBatch, ArrowError> {
    RecordBatch::try_from_iter_with_nullable(columns)
}

fn struct_array(columns: Vec<Column>) -> Result<StructArray, ArrowError> {
    let (fields, arrays): (Vec<FieldRef>, Vec<ArrayRef>) = columns
        .into_iter()
        .map(|(name, array, nullable)| {
            let field = Arc::new(Field::new(name, array.data_type().clone(), nullable));
            (field, array)
        })
        .unzip();
    StructArray::try_new(Fields::from(fields), arrays, None)
}

fn timestamps(values: impl Iterator<Item = DateTime<Utc>>) -> ArrayRef {
    Arc::new(
        TimestampMicrosecondArray::from_iter_values(values.map(|t| t.timestamp_micros()))
            .with_timezone("UTC"),
    )
}

fn datum_array(ty: PrimitiveType, values: &[Option<&Datum>]) -> ArrayRef {
    match ty {
        PrimitiveType::Boolean => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Some(Datum::Boolean(b)) => Some(*b),
                    _ => None,
                })
                .collect::<BooleanArray>(),
        ),
        PrimitiveType::Int => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Some(Datum::Int(i)) => Some(*i),
                    _ => None,
                })
                .collect::<Int32Array>(),
        ),
        PrimitiveType::Long => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Some(Datum::Long(i)) => Some(*i),
                    _ => None,
                })
                .collect::<Int64Array>(),
        ),
        PrimitiveType::String => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Some(Datum::String(s)) => Some(s.as_str()),
                    _ => None,
                })
                .collect::<StringArray>(),
        ),
    }
}

/// Struct array of partition tuples, or `None` for unpartitioned tables.
fn partition_array(
    tuples: &[&PartitionValues],
    meta: &TableMeta,
) -> Result<Option<ArrayRef>, ArrowError> {
    let spec = &meta.partition_spec;
    if spec.is_unpartitioned() {
        return Ok(None);
    }

    let mut columns = Vec::with_capacity(spec.fields.len());
    for (idx, field) in spec.fields.iter().enumerate() {
        let source = meta.schema.field_by_id(field.source_id).ok_or_else(|| {
            ArrowError::SchemaError(format!(
                "partition field {} has no source column {}",
                field.name, field.source_id
            ))
        })?;
        let values: Vec<Option<&Datum>> = tuples.iter().map(|t| t.get(idx)).collect();
        columns.push(column(&field.name, datum_array(source.field_type, &values), true));
    }

    Ok(Some(Arc::new(struct_array(columns)?)))
}

fn count_map<'a>(maps: impl Iterator<Item = &'a BTreeMap<i32, u64>>) -> Result<ArrayRef, ArrowError> {
    let mut builder = MapBuilder::new(None, Int32Builder::new(), Int64Builder::new());
    for map in maps {
        if map.is_empty() {
            builder.append(false)?;
            continue;
        }
        for (id, count) in map {
            builder.keys().append_value(*id);
            builder.values().append_value(to_i64(*count));
        }
        builder.append(true)?;
    }
    Ok(Arc::new(builder.finish()))
}

fn bound_map<'a>(maps: impl Iterator<Item = &'a BTreeMap<i32, Datum>>) -> Result<ArrayRef, ArrowError> {
    let mut builder = MapBuilder::new(None, Int32Builder::new(), StringBuilder::new());
    for map in maps {
        if map.is_empty() {
            builder.append(false)?;
            continue;
        }
        for (id, bound) in map {
            builder.keys().append_value(*id);
            builder.values().append_value(bound.to_string());
        }
        builder.append(true)?;
    }
    Ok(Arc::new(builder.finish()))
}

fn data_file_columns(files: &[&DataFile], meta: &TableMeta) -> Result<Vec<Column>, ArrowError> {
    let mut columns = vec![
        column(
            "file_path",
            Arc::new(StringArray::from_iter_values(files.iter().map(|f| &f.file_path))),
            false,
        ),
        column(
            "file_format",
            Arc::new(StringArray::from_iter_values(
                files.iter().map(|f| f.file_format.as_str()),
            )),
            false,
        ),
    ];

    let tuples: Vec<&PartitionValues> = files.iter().map(|f| &f.partition).collect();
    if let Some(partition) = partition_array(&tuples, meta)? {
        columns.push(column("partition", partition, false));
    }

    columns.extend([
        column(
            "record_count",
            Arc::new(Int64Array::from_iter_values(
                files.iter().map(|f| to_i64(f.record_count)),
            )),
            false,
        ),
        column(
            "file_size_in_bytes",
            Arc::new(Int64Array::from_iter_values(
                files.iter().map(|f| to_i64(f.file_size_in_bytes)),
            )),
            false,
        ),
        column("column_sizes", count_map(files.iter().map(|f| &f.column_sizes))?, true),
        column("value_counts", count_map(files.iter().map(|f| &f.value_counts))?, true),
        column(
            "null_value_counts",
            count_map(files.iter().map(|f| &f.null_value_counts))?,
            true,
        ),
        column("lower_bounds", bound_map(files.iter().map(|f| &f.lower_bounds))?, true),
        column("upper_bounds", bound_map(files.iter().map(|f| &f.upper_bounds))?, true),
    ]);

    Ok(columns)
}

pub(crate) fn entries_batch(rows: &[EntryRow], meta: &TableMeta) -> Result<RecordBatch, ArrowError> {
    let files: Vec<&DataFile> = rows.iter().map(|r| &r.data_file).collect();
    let data_file = struct_array(data_file_columns(&files, meta)?)?;

    batch(vec![
        column(
            "status",
            Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.status.code()))),
            false,
        ),
        column(
            "snapshot_id",
            Arc::new(
                rows.iter()
                    .map(|r| r.snapshot_id.map(|id| id.0))
                    .collect::<Int64Array>(),
            ),
            true,
        ),
        column("data_file", Arc::new(data_file), false),
    ])
}

pub(crate) fn files_batch(files: &[DataFile], meta: &TableMeta) -> Result<RecordBatch, ArrowError> {
    let refs: Vec<&DataFile> = files.iter().collect();
    batch(data_file_columns(&refs, meta)?)
}

fn partition_summaries(rows: &[ManifestRow]) -> Result<ArrayRef, ArrowError> {
    let summaries: Vec<&PartitionSummaryRow> =
        rows.iter().flat_map(|r| &r.partition_summaries).collect();

    let items = struct_array(vec![
        column(
            "contains_null",
            Arc::new(BooleanArray::from(
                summaries.iter().map(|s| s.contains_null).collect::<Vec<_>>(),
            )),
            false,
        ),
        column(
            "lower_bound",
            Arc::new(
                summaries
                    .iter()
                    .map(|s| s.lower_bound.as_deref())
                    .collect::<StringArray>(),
            ),
            true,
        ),
        column(
            "upper_bound",
            Arc::new(
                summaries
                    .iter()
                    .map(|s| s.upper_bound.as_deref())
                    .collect::<StringArray>(),
            ),
            true,
        ),
    ])?;

    let item_field = Arc::new(Field::new("element", items.data_type().clone(), false));
    let offsets = OffsetBuffer::from_lengths(rows.iter().map(|r| r.partition_summaries.len()));
    Ok(Arc::new(ListArray::try_new(
        item_field,
        offsets,
        Arc::new(items),
        None,
    )?))
}

pub(crate) fn manifests_batch(rows: &[ManifestRow]) -> Result<RecordBatch, ArrowError> {
    batch(vec![
        column(
            "path",
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| &r.path))),
            false,
        ),
        column(
            "length",
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| to_i64(r.length)))),
            false,
        ),
        column(
            "partition_spec_id",
            Arc::new(Int32Array::from_iter_values(
                rows.iter().map(|r| r.partition_spec_id),
            )),
            false,
        ),
        column(
            "added_snapshot_id",
            Arc::new(Int64Array::from_iter_values(
                rows.iter().map(|r| r.added_snapshot_id.0),
            )),
            false,
        ),
        column(
            "added_data_files_count",
            Arc::new(Int32Array::from_iter_values(
                rows.iter().map(|r| to_i32(u64::from(r.added_data_files_count))),
            )),
            false,
        ),
        column(
            "existing_data_files_count",
            Arc::new(Int32Array::from_iter_values(
                rows.iter().map(|r| to_i32(u64::from(r.existing_data_files_count))),
            )),
            false,
        ),
        column(
            "deleted_data_files_count",
            Arc::new(Int32Array::from_iter_values(
                rows.iter().map(|r| to_i32(u64::from(r.deleted_data_files_count))),
            )),
            false,
        ),
        column("partition_summaries", partition_summaries(rows)?, false),
    ])
}

pub(crate) fn history_batch(rows: &[HistoryRow]) -> Result<RecordBatch, ArrowError> {
    batch(vec![
        column("made_current_at", timestamps(rows.iter().map(|r| r.made_current_at)), false),
        column(
            "snapshot_id",
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.snapshot_id.0))),
            false,
        ),
        column(
            "parent_id",
            Arc::new(
                rows.iter()
                    .map(|r| r.parent_id.map(|id| id.0))
                    .collect::<Int64Array>(),
            ),
            true,
        ),
        column(
            "is_current_ancestor",
            Arc::new(BooleanArray::from(
                rows.iter().map(|r| r.is_current_ancestor).collect::<Vec<_>>(),
            )),
            false,
        ),
    ])
}

pub(crate) fn snapshots_batch(rows: &[SnapshotRow]) -> Result<RecordBatch, ArrowError> {
    let mut summary = MapBuilder::new(None, StringBuilder::new(), StringBuilder::new());
    for row in rows {
        for (k, v) in &row.summary {
            summary.keys().append_value(k);
            summary.values().append_value(v);
        }
        summary.append(true)?;
    }

    batch(vec![
        column("committed_at", timestamps(rows.iter().map(|r| r.committed_at)), false),
        column(
            "snapshot_id",
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.snapshot_id.0))),
            false,
        ),
        column(
            "parent_id",
            Arc::new(
                rows.iter()
                    .map(|r| r.parent_id.map(|id| id.0))
                    .collect::<Int64Array>(),
            ),
            true,
        ),
        column(
            "operation",
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.operation.as_str()),
            )),
            false,
        ),
        column(
            "manifest_list",
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| &r.manifest_list),
            )),
            false,
        ),
        column("summary", Arc::new(summary.finish()), false),
    ])
}

pub(crate) fn partitions_batch(
    rows: &[PartitionRow],
    meta: &TableMeta,
) -> Result<RecordBatch, ArrowError> {
    let mut columns = Vec::with_capacity(3);

    let tuples: Vec<&PartitionValues> = rows.iter().map(|r| &r.partition).collect();
    if let Some(partition) = partition_array(&tuples, meta)? {
        columns.push(column("partition", partition, false));
    }

    columns.extend([
        column(
            "record_count",
            Arc::new(Int64Array::from_iter_values(
                rows.iter().map(|r| to_i64(r.record_count)),
            )),
            false,
        ),
        column(
            "file_count",
            Arc::new(Int32Array::from_iter_values(
                rows.iter().map(|r| to_i32(r.file_count)),
            )),
            false,
        ),
    ]);

    batch(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{EntryStatus, SnapshotId};
    use crate::table::test_util::*;
    use arrow::array::AsArray;
    use arrow::datatypes::{DataType, Int32Type, Int64Type, TimeUnit};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn files_batch_includes_partition_only_when_partitioned() -> TestResult {
        let files = vec![id_file("a", 1, true), id_file("b", 2, true)];
        let partitioned = files_batch(&files, &partitioned_meta())?;
        assert_eq!(partitioned.num_rows(), 2);

        let partition = partitioned
            .column_by_name("partition")
            .ok_or("partition column")?
            .as_struct();
        let ids = partition.column(0).as_primitive::<Int32Type>();
        assert_eq!(ids.values().to_vec(), vec![1, 2]);

        let plain = vec![id_file("a", 1, false)];
        let unpartitioned = files_batch(&plain, &unpartitioned_meta())?;
        assert!(unpartitioned.column_by_name("partition").is_none());
        assert_eq!(
            unpartitioned
                .column_by_name("file_path")
                .ok_or("file_path")?
                .as_string::<i32>()
                .value(0),
            "a"
        );
        Ok(())
    }

    #[test]
    fn entries_batch_nests_data_file() -> TestResult {
        let rows = vec![EntryRow {
            status: EntryStatus::Deleted,
            snapshot_id: Some(SnapshotId(3)),
            data_file: id_file("a", 1, false),
        }];
        let batch = entries_batch(&rows, &unpartitioned_meta())?;

        let status = batch.column_by_name("status").ok_or("status")?;
        assert_eq!(status.as_primitive::<Int32Type>().value(0), 2);
        let snapshot = batch.column_by_name("snapshot_id").ok_or("snapshot_id")?;
        assert_eq!(snapshot.as_primitive::<Int64Type>().value(0), 3);

        let data_file = batch.column_by_name("data_file").ok_or("data_file")?.as_struct();
        let record_count = data_file.column_by_name("record_count").ok_or("record_count")?;
        assert_eq!(record_count.as_primitive::<Int64Type>().value(0), 1);
        Ok(())
    }

    #[test]
    fn manifest_summaries_are_lists_of_structs() -> TestResult {
        let rows = vec![ManifestRow {
            path: "metadata/manifests/m-1.json".into(),
            length: 10,
            partition_spec_id: 0,
            added_snapshot_id: SnapshotId(1),
            added_data_files_count: 1,
            existing_data_files_count: 0,
            deleted_data_files_count: 0,
            partition_summaries: vec![PartitionSummaryRow {
                contains_null: false,
                lower_bound: Some("1".into()),
                upper_bound: Some("1".into()),
            }],
        }];
        let batch = manifests_batch(&rows)?;

        let summaries = batch
            .column_by_name("partition_summaries")
            .ok_or("partition_summaries")?
            .as_list::<i32>();
        assert_eq!(summaries.value_length(0), 1);
        let item = summaries.value(0);
        let item = item.as_struct();
        let lower = item.column_by_name("lower_bound").ok_or("lower_bound")?;
        assert_eq!(lower.as_string::<i32>().value(0), "1");
        Ok(())
    }

    #[test]
    fn history_timestamps_are_utc_micros() -> TestResult {
        let rows = vec![HistoryRow {
            made_current_at: Utc::now(),
            snapshot_id: SnapshotId(1),
            parent_id: None,
            is_current_ancestor: true,
        }];
        let batch = history_batch(&rows)?;

        let made = batch.column_by_name("made_current_at").ok_or("made_current_at")?;
        assert_eq!(
            made.data_type(),
            &DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
        );
        assert!(batch.column_by_name("parent_id").ok_or("parent_id")?.is_null(0));
        Ok(())
    }
}
