//! Table schema, typed literals, and identity partition specs.
//!
//! The schema is intentionally small: four primitive types cover what the
//! metadata engine needs for partition values and column bounds. Field ids are
//! stable integers; every column metric in a [`crate::metadata::DataFile`] is
//! keyed by them.

use std::fmt;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

/// First field id handed out to partition fields.
pub const PARTITION_FIELD_ID_START: i32 = 1000;

/// Primitive column types understood by the metadata engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    /// `true` / `false`.
    Boolean,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    /// UTF-8 string.
    String,
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Int => "int",
            PrimitiveType::Long => "long",
            PrimitiveType::String => "string",
        };
        f.write_str(s)
    }
}

/// A typed literal: partition values, column bounds, and expression operands.
///
/// Values of the same variant are totally ordered. Comparisons across
/// variants are never made by the engine; binding converts literals to the
/// column type first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Datum {
    /// Boolean literal.
    Boolean(bool),
    /// 32-bit integer literal.
    Int(i32),
    /// 64-bit integer literal.
    Long(i64),
    /// String literal.
    String(String),
}

impl Datum {
    /// The primitive type of this literal.
    pub fn primitive_type(&self) -> PrimitiveType {
        match self {
            Datum::Boolean(_) => PrimitiveType::Boolean,
            Datum::Int(_) => PrimitiveType::Int,
            Datum::Long(_) => PrimitiveType::Long,
            Datum::String(_) => PrimitiveType::String,
        }
    }

    /// Convert this literal to `target`, if the conversion is lossless.
    ///
    /// `Int` widens to `Long`; `Long` narrows to `Int` only when it fits.
    pub fn to_type(&self, target: PrimitiveType) -> Option<Datum> {
        match (self, target) {
            (Datum::Int(v), PrimitiveType::Long) => Some(Datum::Long(i64::from(*v))),
            (Datum::Long(v), PrimitiveType::Int) => i32::try_from(*v).ok().map(Datum::Int),
            (d, t) if d.primitive_type() == t => Some(d.clone()),
            _ => None,
        }
    }

    /// Parse the string form of a value (as found in Hive-style
    /// `col=value` paths) into a literal of type `ty`.
    pub fn parse_as(ty: PrimitiveType, raw: &str) -> Option<Datum> {
        match ty {
            PrimitiveType::Boolean => raw.parse().ok().map(Datum::Boolean),
            PrimitiveType::Int => raw.parse().ok().map(Datum::Int),
            PrimitiveType::Long => raw.parse().ok().map(Datum::Long),
            PrimitiveType::String => Some(Datum::String(raw.to_string())),
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Boolean(v) => write!(f, "{v}"),
            Datum::Int(v) => write!(f, "{v}"),
            Datum::Long(v) => write!(f, "{v}"),
            Datum::String(v) => f.write_str(v),
        }
    }
}

impl From<bool> for Datum {
    fn from(v: bool) -> Self {
        Datum::Boolean(v)
    }
}

impl From<i32> for Datum {
    fn from(v: i32) -> Self {
        Datum::Int(v)
    }
}

impl From<i64> for Datum {
    fn from(v: i64) -> Self {
        Datum::Long(v)
    }
}

impl From<&str> for Datum {
    fn from(v: &str) -> Self {
        Datum::String(v.to_string())
    }
}

/// A single column in a [`TableSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    /// Stable field id.
    pub id: i32,
    /// Column name.
    pub name: String,
    /// Column type.
    pub field_type: PrimitiveType,
    /// Whether the column is declared non-null.
    #[serde(default)]
    pub required: bool,
}

impl SchemaField {
    /// Optional (nullable) field.
    pub fn optional(id: i32, name: impl Into<String>, field_type: PrimitiveType) -> Self {
        Self {
            id,
            name: name.into(),
            field_type,
            required: false,
        }
    }

    /// Required (non-null) field.
    pub fn required(id: i32, name: impl Into<String>, field_type: PrimitiveType) -> Self {
        Self {
            id,
            name: name.into(),
            field_type,
            required: true,
        }
    }
}

/// Errors raised while building schemas and partition specs.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum SchemaError {
    /// Two fields share the same id.
    #[snafu(display("Duplicate field id {id} in schema"))]
    DuplicateFieldId {
        /// Offending id.
        id: i32,
    },

    /// Two fields share the same name.
    #[snafu(display("Duplicate field name {name:?} in schema"))]
    DuplicateFieldName {
        /// Offending name.
        name: String,
    },

    /// A partition field references a column that is not in the schema.
    #[snafu(display("Partition source column {name:?} not found in schema"))]
    UnknownSourceColumn {
        /// Column name that could not be resolved.
        name: String,
    },
}

/// Ordered list of columns with unique ids and names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    fields: Vec<SchemaField>,
}

impl TableSchema {
    /// Build a schema, rejecting duplicate ids or names.
    pub fn new(fields: Vec<SchemaField>) -> Result<Self, SchemaError> {
        for (i, f) in fields.iter().enumerate() {
            for other in &fields[..i] {
                ensure!(other.id != f.id, DuplicateFieldIdSnafu { id: f.id });
                ensure!(
                    other.name != f.name,
                    DuplicateFieldNameSnafu {
                        name: f.name.clone()
                    }
                );
            }
        }
        Ok(Self { fields })
    }

    /// Columns in declaration order.
    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    /// Look up a column by name.
    pub fn field_by_name(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a column by id.
    pub fn field_by_id(&self, id: i32) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.id == id)
    }
}

// Validate on the way in so a hand-edited log cannot smuggle in duplicates.
impl<'de> Deserialize<'de> for TableSchema {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            fields: Vec<SchemaField>,
        }

        let raw = Raw::deserialize(deserializer)?;
        TableSchema::new(raw.fields).map_err(serde::de::Error::custom)
    }
}

/// Transform applied to a source column to obtain a partition value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transform {
    /// The partition value is the column value itself.
    #[default]
    Identity,
}

/// One field of a partition spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionField {
    /// Schema field id of the source column.
    pub source_id: i32,
    /// Partition field id (starts at [`PARTITION_FIELD_ID_START`]).
    pub field_id: i32,
    /// Partition field name.
    pub name: String,
    /// Transform from source column to partition value.
    #[serde(default)]
    pub transform: Transform,
}

/// How data files of a table are partitioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PartitionSpec {
    /// Spec id; `0` for the initial spec.
    pub spec_id: i32,
    /// Partition fields, in partition tuple order.
    pub fields: Vec<PartitionField>,
}

impl PartitionSpec {
    /// A spec with no partition fields.
    pub fn unpartitioned() -> Self {
        Self::default()
    }

    /// Identity-partition by the given columns, in order.
    pub fn identity(schema: &TableSchema, columns: &[&str]) -> Result<Self, SchemaError> {
        let mut fields = Vec::with_capacity(columns.len());
        for (offset, name) in (0i32..).zip(columns) {
            let source = schema
                .field_by_name(name)
                .context(UnknownSourceColumnSnafu {
                    name: (*name).to_string(),
                })?;
            fields.push(PartitionField {
                source_id: source.id,
                field_id: PARTITION_FIELD_ID_START + offset,
                name: source.name.clone(),
                transform: Transform::Identity,
            });
        }
        Ok(Self { spec_id: 0, fields })
    }

    /// True when the spec has no fields.
    pub fn is_unpartitioned(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of the identity partition field sourced from `source_id`.
    pub fn identity_index_for(&self, source_id: i32) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.source_id == source_id && f.transform == Transform::Identity)
    }
}

/// Partition tuple of a data file, one optional value per partition field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct PartitionValues(pub Vec<Option<Datum>>);

impl PartitionValues {
    /// The empty tuple used by unpartitioned tables.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Value at partition position `idx`.
    pub fn get(&self, idx: usize) -> Option<&Datum> {
        self.0.get(idx).and_then(Option::as_ref)
    }
}

impl<T: Into<Datum>> FromIterator<T> for PartitionValues {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(|v| Some(v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id_data_schema() -> TableSchema {
        TableSchema::new(vec![
            SchemaField::optional(1, "id", PrimitiveType::Int),
            SchemaField::optional(2, "data", PrimitiveType::String),
        ])
        .expect("valid schema")
    }

    #[test]
    fn schema_rejects_duplicate_ids_and_names() {
        let err = TableSchema::new(vec![
            SchemaField::optional(1, "a", PrimitiveType::Int),
            SchemaField::optional(1, "b", PrimitiveType::Int),
        ])
        .expect_err("duplicate id");
        assert_eq!(err, SchemaError::DuplicateFieldId { id: 1 });

        let err = TableSchema::new(vec![
            SchemaField::optional(1, "a", PrimitiveType::Int),
            SchemaField::optional(2, "a", PrimitiveType::Long),
        ])
        .expect_err("duplicate name");
        assert!(matches!(err, SchemaError::DuplicateFieldName { name } if name == "a"));
    }

    #[test]
    fn schema_deserialize_validates() {
        let json = r#"{"fields":[
            {"id":1,"name":"a","field_type":"int"},
            {"id":1,"name":"b","field_type":"int"}
        ]}"#;
        assert!(serde_json::from_str::<TableSchema>(json).is_err());
    }

    #[test]
    fn identity_spec_assigns_partition_field_ids() {
        let schema = id_data_schema();
        let spec = PartitionSpec::identity(&schema, &["id", "data"]).expect("spec");
        assert_eq!(spec.fields[0].field_id, 1000);
        assert_eq!(spec.fields[1].field_id, 1001);
        assert_eq!(spec.fields[0].source_id, 1);
        assert_eq!(spec.identity_index_for(2), Some(1));
        assert_eq!(spec.identity_index_for(3), None);

        assert!(PartitionSpec::identity(&schema, &["missing"]).is_err());
    }

    #[test]
    fn datum_conversions_are_lossless_only() {
        assert_eq!(
            Datum::Int(7).to_type(PrimitiveType::Long),
            Some(Datum::Long(7))
        );
        assert_eq!(
            Datum::Long(i64::MAX).to_type(PrimitiveType::Int),
            None
        );
        assert_eq!(Datum::from("x").to_type(PrimitiveType::Int), None);
        assert_eq!(
            Datum::parse_as(PrimitiveType::Int, "42"),
            Some(Datum::Int(42))
        );
        assert_eq!(Datum::parse_as(PrimitiveType::Boolean, "maybe"), None);
    }

    #[test]
    fn datum_display_is_plain() {
        assert_eq!(Datum::Int(1).to_string(), "1");
        assert_eq!(Datum::Boolean(true).to_string(), "true");
        assert_eq!(Datum::from("abc").to_string(), "abc");
    }

    #[test]
    fn partition_values_order_by_value() {
        let a: PartitionValues = [1].into_iter().collect();
        let b: PartitionValues = [2].into_iter().collect();
        assert!(a < b);
        assert!(PartitionValues(vec![None]) < a);
    }
}
