//! Integration tests for the metadata tables.
//!
//! Each scenario commits through the public write path and then checks the
//! rows (and, for a few tables, the Arrow rendering) the projector returns:
//! - entries / all_entries across deletes,
//! - files / all_data_files with time travel,
//! - manifests / all_manifests partition summaries,
//! - history ancestry flags after a rollback,
//! - snapshots summaries and partitions aggregation.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::BTreeMap;

use arrow::array::{Array, AsArray, Int32Array, Int64Array};
use arrow::datatypes::Int32Type;
use snapshot_table_core::expressions::Expression;
use snapshot_table_core::metadata::{
    DataFile, Datum, EntryStatus, Operation, PartitionSpec, PartitionValues, PrimitiveType,
    SchemaField, SnapshotId, TableMeta, TableSchema,
};
use snapshot_table_core::metadata_tables::MetadataTableKind;
use snapshot_table_core::storage::TableLocation;
use snapshot_table_core::table::{SnapshotTable, TableError};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

// =============================================================================
// Test Helpers
// =============================================================================

fn schema() -> TableSchema {
    TableSchema::new(vec![
        SchemaField::optional(1, "id", PrimitiveType::Int),
        SchemaField::optional(2, "data", PrimitiveType::String),
    ])
    .expect("valid schema")
}

fn unpartitioned() -> TableMeta {
    TableMeta::new(schema(), PartitionSpec::unpartitioned()).expect("valid meta")
}

fn partitioned_by_id() -> TableMeta {
    let schema = schema();
    let spec = PartitionSpec::identity(&schema, &["id"]).expect("valid spec");
    TableMeta::new(schema, spec).expect("valid meta")
}

/// A data file holding `rows` rows that all have `id = id`.
fn file_with_id(path: &str, id: i32, rows: u64, partitioned: bool) -> DataFile {
    let partition = if partitioned {
        PartitionValues(vec![Some(Datum::Int(id))])
    } else {
        PartitionValues::empty()
    };
    DataFile::new(path, partition, rows, 512).with_column_metrics(
        1,
        rows,
        0,
        Some((Datum::Int(id), Datum::Int(id))),
    )
}

async fn new_table(tmp: &TempDir, meta: TableMeta) -> Result<SnapshotTable, TableError> {
    SnapshotTable::create(TableLocation::local(tmp.path()), meta).await
}

fn paths(files: &[DataFile]) -> Vec<&str> {
    files.iter().map(|f| f.file_path.as_str()).collect()
}

// =============================================================================
// entries / all_entries
// =============================================================================

#[tokio::test]
async fn entries_table_has_one_added_row_per_appended_file() -> TestResult {
    let tmp = TempDir::new()?;
    let mut table = new_table(&tmp, unpartitioned()).await?;
    let s1 = table.append(vec![file_with_id("data/a.parquet", 1, 1, false)]).await?;

    let entries = table.metadata_tables().entries(None).await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, EntryStatus::Added);
    assert_eq!(entries[0].snapshot_id, Some(s1.snapshot_id));
    assert_eq!(entries[0].data_file.file_path, "data/a.parquet");
    Ok(())
}

#[tokio::test]
async fn all_entries_lists_deleted_entries_of_earlier_snapshots() -> TestResult {
    let tmp = TempDir::new()?;
    let mut table = new_table(&tmp, unpartitioned()).await?;

    table.append(vec![file_with_id("data/a.parquet", 1, 1, false)]).await?;
    table.delete_from_row_filter(Expression::equal("id", 1)).await?;
    table.append(vec![file_with_id("data/b.parquet", 2, 1, false)]).await?;

    let mut rows = table.metadata_tables().all_entries().await?;
    rows.sort_by_key(|r| r.snapshot_id);

    assert_eq!(rows.len(), 3);
    let summary: Vec<_> = rows
        .iter()
        .map(|r| (r.snapshot_id.map(|s| s.0), r.status, r.data_file.file_path.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (Some(1), EntryStatus::Added, "data/a.parquet"),
            (Some(2), EntryStatus::Deleted, "data/a.parquet"),
            (Some(3), EntryStatus::Added, "data/b.parquet"),
        ]
    );
    Ok(())
}

// =============================================================================
// files / all_data_files
// =============================================================================

#[tokio::test]
async fn files_table_lists_only_live_files() -> TestResult {
    let tmp = TempDir::new()?;
    let mut table = new_table(&tmp, partitioned_by_id()).await?;

    table.append(vec![file_with_id("data/id=1/a.parquet", 1, 1, true)]).await?;
    table.append(vec![file_with_id("data/id=2/b.parquet", 2, 1, true)]).await?;
    table.delete_from_row_filter(Expression::equal("id", 1)).await?;

    let files = table.metadata_tables().files(None).await?;
    assert_eq!(paths(&files), vec!["data/id=2/b.parquet"]);
    Ok(())
}

#[tokio::test]
async fn files_table_after_delete_file_on_unpartitioned_table() -> TestResult {
    let tmp = TempDir::new()?;
    let mut table = new_table(&tmp, unpartitioned()).await?;

    let s1 = table.append(vec![file_with_id("data/a.parquet", 1, 1, false)]).await?;
    table.append(vec![file_with_id("data/b.parquet", 2, 1, false)]).await?;
    let delete = table.delete_file("data/a.parquet").await?;
    assert_eq!(delete.operation, Operation::Delete);

    let tables = table.metadata_tables();
    assert_eq!(paths(&tables.files(None).await?), vec!["data/b.parquet"]);

    // Time travel: before the delete the file is still live.
    assert_eq!(
        paths(&tables.files(Some(s1.snapshot_id)).await?),
        vec!["data/a.parquet"]
    );
    Ok(())
}

#[tokio::test]
async fn all_data_files_keeps_files_live_in_any_snapshot() -> TestResult {
    let tmp = TempDir::new()?;
    let mut table = new_table(&tmp, partitioned_by_id()).await?;

    table.append(vec![file_with_id("data/id=1/a.parquet", 1, 1, true)]).await?;
    table.delete_from_row_filter(Expression::equal("id", 1)).await?;
    table.append(vec![file_with_id("data/id=2/b.parquet", 2, 1, true)]).await?;

    let mut files = table.metadata_tables().all_data_files().await?;
    files.sort_by(|a, b| a.file_path.cmp(&b.file_path));
    assert_eq!(
        paths(&files),
        vec!["data/id=1/a.parquet", "data/id=2/b.parquet"]
    );
    Ok(())
}

// =============================================================================
// manifests / all_manifests
// =============================================================================

#[tokio::test]
async fn manifests_table_reports_partition_bounds_as_strings() -> TestResult {
    let tmp = TempDir::new()?;
    let mut table = new_table(&tmp, partitioned_by_id()).await?;
    let s1 = table.append(vec![file_with_id("data/id=1/a.parquet", 1, 1, true)]).await?;

    let rows = table.metadata_tables().manifests(None).await?;
    assert_eq!(rows.len(), 1);

    let row = &rows[0];
    assert!(row.path.starts_with("metadata/manifests/"));
    assert!(row.length > 0);
    assert_eq!(row.partition_spec_id, 0);
    assert_eq!(row.added_snapshot_id, s1.snapshot_id);
    assert_eq!(row.added_data_files_count, 1);
    assert_eq!(row.existing_data_files_count, 0);
    assert_eq!(row.deleted_data_files_count, 0);

    assert_eq!(row.partition_summaries.len(), 1);
    let summary = &row.partition_summaries[0];
    assert!(!summary.contains_null);
    assert_eq!(summary.lower_bound.as_deref(), Some("1"));
    assert_eq!(summary.upper_bound.as_deref(), Some("1"));
    Ok(())
}

#[tokio::test]
async fn all_manifests_is_the_union_over_snapshots() -> TestResult {
    let tmp = TempDir::new()?;
    let mut table = new_table(&tmp, partitioned_by_id()).await?;
    table.append(vec![file_with_id("data/id=1/a.parquet", 1, 1, true)]).await?;
    table.delete_from_row_filter(Expression::AlwaysTrue).await?;

    let tables = table.metadata_tables();
    let mut expected = Vec::new();
    for snapshot in tables.snapshots() {
        expected.extend(tables.manifests(Some(snapshot.snapshot_id)).await?);
    }

    let mut all = tables.all_manifests().await?;
    all.sort_by(|a, b| a.path.cmp(&b.path));
    expected.sort_by(|a, b| a.path.cmp(&b.path));

    assert_eq!(all.len(), 2);
    assert_eq!(all, expected);
    for row in &all {
        let summary = &row.partition_summaries[0];
        assert!(!summary.contains_null);
        assert_eq!(summary.lower_bound.as_deref(), Some("1"));
        assert_eq!(summary.upper_bound.as_deref(), Some("1"));
    }
    assert_eq!(all.iter().map(|r| r.deleted_data_files_count).sum::<u32>(), 1);
    Ok(())
}

// =============================================================================
// history / snapshots
// =============================================================================

#[tokio::test]
async fn history_flags_follow_rollback() -> TestResult {
    let tmp = TempDir::new()?;
    let mut table = new_table(&tmp, unpartitioned()).await?;

    let s1 = table.append(vec![file_with_id("data/a.parquet", 1, 1, false)]).await?;
    let s2 = table.append(vec![file_with_id("data/b.parquet", 1, 1, false)]).await?;

    // Before the rollback S2 is an ancestor of the current snapshot.
    let before = table.metadata_tables().history();
    assert!(before.iter().all(|h| h.is_current_ancestor));

    table.rollback_to(s1.snapshot_id).await?;
    let s3 = table.append(vec![file_with_id("data/c.parquet", 1, 1, false)]).await?;
    assert_eq!(s3.parent_snapshot_id, Some(s1.snapshot_id));

    let history = table.metadata_tables().history();
    assert_eq!(history.len(), 4);

    let ids: Vec<_> = history.iter().map(|h| h.snapshot_id).collect();
    assert_eq!(ids, vec![s1.snapshot_id, s2.snapshot_id, s1.snapshot_id, s3.snapshot_id]);

    let parents: Vec<_> = history.iter().map(|h| h.parent_id).collect();
    assert_eq!(parents, vec![None, Some(s1.snapshot_id), None, Some(s1.snapshot_id)]);

    let flags: Vec<_> = history.iter().map(|h| h.is_current_ancestor).collect();
    assert_eq!(flags, vec![true, false, true, true]);

    assert!(history.windows(2).all(|w| w[0].made_current_at <= w[1].made_current_at));

    // The flags survive a replay of the log.
    let reopened = SnapshotTable::open(table.location().clone()).await?;
    assert_eq!(reopened.metadata_tables().history(), history);
    Ok(())
}

#[tokio::test]
async fn snapshots_table_has_structural_parents_and_summaries() -> TestResult {
    let tmp = TempDir::new()?;
    let mut table = new_table(&tmp, unpartitioned()).await?;

    let s1 = table.append(vec![file_with_id("data/a.parquet", 1, 1, false)]).await?;
    let s2 = table.delete_from_row_filter(Expression::AlwaysTrue).await?;
    table.rollback_to(s1.snapshot_id).await?;

    let rows = table.metadata_tables().snapshots();
    assert_eq!(rows.len(), 2);

    let expected_first: BTreeMap<String, String> = [
        ("added-records", "1"),
        ("added-data-files", "1"),
        ("changed-partition-count", "1"),
        ("total-data-files", "1"),
        ("total-records", "1"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    assert_eq!(rows[0].snapshot_id, s1.snapshot_id);
    assert_eq!(rows[0].parent_id, None);
    assert_eq!(rows[0].operation, Operation::Append);
    assert_eq!(rows[0].manifest_list, s1.manifest_list);
    assert_eq!(rows[0].committed_at, s1.timestamp);
    assert_eq!(rows[0].summary, expected_first);

    let expected_second: BTreeMap<String, String> = [
        ("deleted-records", "1"),
        ("deleted-data-files", "1"),
        ("changed-partition-count", "1"),
        ("total-records", "0"),
        ("total-data-files", "0"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    assert_eq!(rows[1].snapshot_id, s2.snapshot_id);
    assert_eq!(rows[1].parent_id, Some(s1.snapshot_id));
    assert_eq!(rows[1].operation, Operation::Delete);
    assert_eq!(rows[1].manifest_list, s2.manifest_list);
    assert_eq!(rows[1].summary, expected_second);
    Ok(())
}

// =============================================================================
// partitions
// =============================================================================

#[tokio::test]
async fn partitions_table_aggregates_and_time_travels() -> TestResult {
    let tmp = TempDir::new()?;
    let mut table = new_table(&tmp, partitioned_by_id()).await?;

    let s1 = table.append(vec![file_with_id("data/id=1/a.parquet", 1, 1, true)]).await?;
    table.append(vec![file_with_id("data/id=2/b.parquet", 2, 1, true)]).await?;

    let tables = table.metadata_tables();
    let rows = tables.partitions(None).await?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].partition, PartitionValues(vec![Some(Datum::Int(1))]));
    assert_eq!((rows[0].record_count, rows[0].file_count), (1, 1));
    assert_eq!(rows[1].partition, PartitionValues(vec![Some(Datum::Int(2))]));
    assert_eq!((rows[1].record_count, rows[1].file_count), (1, 1));

    let first = tables.partitions(Some(s1.snapshot_id)).await?;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0], rows[0]);
    Ok(())
}

#[tokio::test]
async fn partitions_sum_files_committed_separately() -> TestResult {
    let tmp = TempDir::new()?;
    let mut table = new_table(&tmp, partitioned_by_id()).await?;

    table.append(vec![file_with_id("data/id=1/a.parquet", 1, 3, true)]).await?;
    table.append(vec![file_with_id("data/id=1/b.parquet", 1, 4, true)]).await?;
    table.append(vec![file_with_id("data/id=2/c.parquet", 2, 5, true)]).await?;

    let rows = table.metadata_tables().partitions(None).await?;
    let summary: Vec<_> = rows
        .iter()
        .map(|r| (r.partition.clone(), r.record_count, r.file_count))
        .collect();
    assert_eq!(
        summary,
        vec![
            (PartitionValues(vec![Some(Datum::Int(1))]), 7, 2),
            (PartitionValues(vec![Some(Datum::Int(2))]), 5, 1),
        ]
    );
    Ok(())
}

// =============================================================================
// Arrow scans
// =============================================================================

#[tokio::test]
async fn scan_renders_partitions_and_history_batches() -> TestResult {
    let tmp = TempDir::new()?;
    let mut table = new_table(&tmp, partitioned_by_id()).await?;
    let s1 = table.append(vec![file_with_id("data/id=1/a.parquet", 1, 2, true)]).await?;
    table.append(vec![file_with_id("data/id=2/b.parquet", 2, 3, true)]).await?;

    let kind: MetadataTableKind = "partitions".parse()?;
    let batch = table.scan_metadata_table(kind, None).await?;
    assert_eq!(batch.num_rows(), 2);

    let ids = batch
        .column_by_name("partition")
        .expect("partition column")
        .as_struct()
        .column(0)
        .as_primitive::<Int32Type>()
        .clone();
    assert_eq!(ids, Int32Array::from(vec![1, 2]));

    let records = batch
        .column_by_name("record_count")
        .expect("record_count")
        .as_any()
        .downcast_ref::<Int64Array>()
        .expect("int64")
        .clone();
    assert_eq!(records, Int64Array::from(vec![2, 3]));

    let pinned = table
        .scan_metadata_table(MetadataTableKind::Files, Some(s1.snapshot_id))
        .await?;
    assert_eq!(pinned.num_rows(), 1);

    let history = table
        .scan_metadata_table(MetadataTableKind::History, None)
        .await?;
    assert_eq!(history.num_rows(), 2);
    assert_eq!(history.num_columns(), 4);
    Ok(())
}

#[tokio::test]
async fn unknown_snapshot_and_table_names_are_not_found() -> TestResult {
    let tmp = TempDir::new()?;
    let mut table = new_table(&tmp, unpartitioned()).await?;
    table.append(vec![file_with_id("data/a.parquet", 1, 1, false)]).await?;

    let err = table
        .metadata_tables()
        .entries(Some(SnapshotId(42)))
        .await
        .expect_err("unknown snapshot");
    assert!(err.is_not_found());

    let err = table
        .scan_metadata_table(MetadataTableKind::Partitions, Some(SnapshotId(42)))
        .await
        .expect_err("unknown snapshot");
    assert!(matches!(err, TableError::SnapshotNotFound { .. }));

    let err = "position_deletes"
        .parse::<MetadataTableKind>()
        .expect_err("unknown table");
    assert!(matches!(err, TableError::UnknownMetadataTable { .. }));
    Ok(())
}
