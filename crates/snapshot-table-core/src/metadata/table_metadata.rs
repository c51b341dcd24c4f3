//! Table-level metadata and typed property accessors.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::metadata::{PartitionSpec, SchemaError, TableSchema, schema::UnknownSourceColumnSnafu};

/// Current on-disk format version written by this crate.
pub const FORMAT_VERSION: u32 = 1;

/// Table-level metadata recorded by the `CreateTable` log action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    /// Column layout.
    pub schema: TableSchema,
    /// How files are partitioned.
    pub partition_spec: PartitionSpec,
    /// Free-form string properties.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// On-disk format version.
    pub format_version: u32,
}

impl TableMeta {
    /// Build metadata for a new table, checking that every partition field
    /// has a source column in `schema`.
    pub fn new(schema: TableSchema, partition_spec: PartitionSpec) -> Result<Self, SchemaError> {
        for field in &partition_spec.fields {
            ensure!(
                schema.field_by_id(field.source_id).is_some(),
                UnknownSourceColumnSnafu {
                    name: field.name.clone()
                }
            );
        }

        Ok(Self {
            schema,
            partition_spec,
            properties: BTreeMap::new(),
            created_at: Utc::now(),
            format_version: FORMAT_VERSION,
        })
    }

    /// Add a property, builder style.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Well-known table property keys and their typed readers.
pub mod table_properties {
    use std::collections::BTreeMap;

    /// When `true`, staged manifests are adopted as-is and their entries
    /// inherit the committing snapshot id.
    pub const SNAPSHOT_ID_INHERITANCE_ENABLED: &str =
        "compatibility.snapshot-id-inheritance.enabled";

    /// Default for [`SNAPSHOT_ID_INHERITANCE_ENABLED`].
    pub const SNAPSHOT_ID_INHERITANCE_ENABLED_DEFAULT: bool = false;

    /// Read a boolean property; unparsable values fall back to `default`.
    pub fn bool_property(props: &BTreeMap<String, String>, key: &str, default: bool) -> bool {
        match props.get(key) {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => true,
                "false" => false,
                other => {
                    log::warn!("ignoring invalid boolean for property {key}: {other:?}");
                    default
                }
            },
            None => default,
        }
    }

    /// Whether snapshot-id inheritance is enabled.
    pub fn snapshot_id_inheritance_enabled(props: &BTreeMap<String, String>) -> bool {
        bool_property(
            props,
            SNAPSHOT_ID_INHERITANCE_ENABLED,
            SNAPSHOT_ID_INHERITANCE_ENABLED_DEFAULT,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::table_properties::*;
    use super::*;
    use crate::metadata::{PartitionField, PrimitiveType, SchemaField, Transform};

    fn schema() -> TableSchema {
        TableSchema::new(vec![SchemaField::optional(1, "id", PrimitiveType::Int)])
            .expect("schema")
    }

    #[test]
    fn new_rejects_dangling_partition_source() {
        let spec = PartitionSpec {
            spec_id: 0,
            fields: vec![PartitionField {
                source_id: 9,
                field_id: 1000,
                name: "ghost".to_string(),
                transform: Transform::Identity,
            }],
        };
        assert!(TableMeta::new(schema(), spec).is_err());
    }

    #[test]
    fn inheritance_defaults_to_disabled() {
        let meta = TableMeta::new(schema(), PartitionSpec::unpartitioned()).expect("meta");
        assert!(!snapshot_id_inheritance_enabled(&meta.properties));

        let meta = meta.with_property(SNAPSHOT_ID_INHERITANCE_ENABLED, "TRUE");
        assert!(snapshot_id_inheritance_enabled(&meta.properties));
    }

    #[test]
    fn invalid_boolean_falls_back_to_default() {
        let mut props = BTreeMap::new();
        props.insert("flag".to_string(), "yes".to_string());
        assert!(bool_property(&props, "flag", true));
        assert!(!bool_property(&props, "flag", false));
    }

    #[test]
    fn table_meta_json_roundtrip() {
        let meta = TableMeta::new(schema(), PartitionSpec::identity(&schema(), &["id"]).expect("spec"))
            .expect("meta")
            .with_property("owner", "ops");
        let json = serde_json::to_string(&meta).expect("serialize");
        let decoded: TableMeta = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(meta, decoded);
    }
}
