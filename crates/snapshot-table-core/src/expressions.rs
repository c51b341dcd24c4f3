//! Row-filter expressions and file-level evaluators.
//!
//! Expressions are written against column names and bound to a
//! [`TableSchema`] before use. Binding resolves names to field ids and
//! converts literals to the column type. A bound expression can then be
//! evaluated against a [`DataFile`] in two ways:
//!
//! - [`BoundExpression::might_match`] (inclusive): `false` only when no row
//!   of the file can match.
//! - [`BoundExpression::all_rows_match`] (strict): `true` only when every
//!   row of the file matches.
//!
//! Identity partition values are consulted first since they are exact; column
//! bounds and null counts are used otherwise. Missing metrics make the
//! inclusive evaluator answer `true` and the strict evaluator answer `false`.
//!
//! `NOT` is pushed down to the leaves while binding (`NOT (a < 5)` becomes
//! `a >= 5`, De Morgan for `AND`/`OR`), so a null never satisfies a negated
//! comparison and bound expressions contain no negation.

use std::cmp::Ordering;

use snafu::prelude::*;

use crate::metadata::{DataFile, Datum, PartitionSpec, PrimitiveType, TableSchema};

/// Errors raised while binding an expression to a schema.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum ExpressionError {
    /// The expression names a column that is not in the schema.
    #[snafu(display("Cannot find column {column:?} in table schema"))]
    UnknownColumn {
        /// Column name as written.
        column: String,
    },

    /// A literal cannot be converted to the column type.
    #[snafu(display("Cannot compare column {column:?} of type {expected} with literal {literal:?}"))]
    LiteralType {
        /// Column name.
        column: String,
        /// Column type.
        expected: PrimitiveType,
        /// Literal as written.
        literal: Datum,
    },
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
}

impl CompareOp {
    fn negate(self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::NotEq,
            CompareOp::NotEq => CompareOp::Eq,
            CompareOp::Lt => CompareOp::GtEq,
            CompareOp::LtEq => CompareOp::Gt,
            CompareOp::Gt => CompareOp::LtEq,
            CompareOp::GtEq => CompareOp::Lt,
        }
    }

    fn test(self, ord: Ordering) -> bool {
        match self {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::NotEq => ord != Ordering::Equal,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::LtEq => ord != Ordering::Greater,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::GtEq => ord != Ordering::Less,
        }
    }
}

/// Unbound row filter over column names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// Matches every row.
    AlwaysTrue,
    /// Matches no row.
    AlwaysFalse,
    /// Both sides match.
    And(Box<Expression>, Box<Expression>),
    /// Either side matches.
    Or(Box<Expression>, Box<Expression>),
    /// Negation.
    Not(Box<Expression>),
    /// Column is null.
    IsNull(String),
    /// Column is not null.
    NotNull(String),
    /// `column <op> literal`.
    Compare {
        /// Column name.
        column: String,
        /// Operator.
        op: CompareOp,
        /// Literal operand.
        literal: Datum,
    },
}

impl Expression {
    fn compare(column: &str, op: CompareOp, literal: impl Into<Datum>) -> Self {
        Expression::Compare {
            column: column.to_string(),
            op,
            literal: literal.into(),
        }
    }

    /// `column = literal`
    pub fn equal(column: &str, literal: impl Into<Datum>) -> Self {
        Self::compare(column, CompareOp::Eq, literal)
    }

    /// `column != literal`
    pub fn not_equal(column: &str, literal: impl Into<Datum>) -> Self {
        Self::compare(column, CompareOp::NotEq, literal)
    }

    /// `column < literal`
    pub fn less_than(column: &str, literal: impl Into<Datum>) -> Self {
        Self::compare(column, CompareOp::Lt, literal)
    }

    /// `column <= literal`
    pub fn less_than_or_equal(column: &str, literal: impl Into<Datum>) -> Self {
        Self::compare(column, CompareOp::LtEq, literal)
    }

    /// `column > literal`
    pub fn greater_than(column: &str, literal: impl Into<Datum>) -> Self {
        Self::compare(column, CompareOp::Gt, literal)
    }

    /// `column >= literal`
    pub fn greater_than_or_equal(column: &str, literal: impl Into<Datum>) -> Self {
        Self::compare(column, CompareOp::GtEq, literal)
    }

    /// `column IS NULL`
    pub fn is_null(column: &str) -> Self {
        Expression::IsNull(column.to_string())
    }

    /// `column IS NOT NULL`
    pub fn not_null(column: &str) -> Self {
        Expression::NotNull(column.to_string())
    }

    /// `self AND other`
    pub fn and(self, other: Expression) -> Self {
        Expression::And(Box::new(self), Box::new(other))
    }

    /// `self OR other`
    pub fn or(self, other: Expression) -> Self {
        Expression::Or(Box::new(self), Box::new(other))
    }

    /// `NOT self`
    pub fn negate(self) -> Self {
        Expression::Not(Box::new(self))
    }

    /// The negation of `self` with `NOT` moved onto the leaves.
    ///
    /// Comparisons flip their operator and null checks swap, so the rewritten
    /// leaves keep two-valued semantics for null rows.
    fn negated(&self) -> Expression {
        match self {
            Expression::AlwaysTrue => Expression::AlwaysFalse,
            Expression::AlwaysFalse => Expression::AlwaysTrue,
            Expression::And(l, r) => Expression::Or(Box::new(l.negated()), Box::new(r.negated())),
            Expression::Or(l, r) => Expression::And(Box::new(l.negated()), Box::new(r.negated())),
            Expression::Not(e) => (**e).clone(),
            Expression::IsNull(c) => Expression::NotNull(c.clone()),
            Expression::NotNull(c) => Expression::IsNull(c.clone()),
            Expression::Compare {
                column,
                op,
                literal,
            } => Expression::Compare {
                column: column.clone(),
                op: op.negate(),
                literal: literal.clone(),
            },
        }
    }

    /// Resolve column names and literal types against `schema`.
    ///
    /// Negations are rewritten away first.
    pub fn bind(&self, schema: &TableSchema) -> Result<BoundExpression, ExpressionError> {
        let resolve = |column: &str| {
            schema.field_by_name(column).context(UnknownColumnSnafu {
                column: column.to_string(),
            })
        };

        Ok(match self {
            Expression::AlwaysTrue => BoundExpression::AlwaysTrue,
            Expression::AlwaysFalse => BoundExpression::AlwaysFalse,
            Expression::And(l, r) => {
                BoundExpression::And(Box::new(l.bind(schema)?), Box::new(r.bind(schema)?))
            }
            Expression::Or(l, r) => {
                BoundExpression::Or(Box::new(l.bind(schema)?), Box::new(r.bind(schema)?))
            }
            Expression::Not(e) => e.negated().bind(schema)?,
            Expression::IsNull(c) => BoundExpression::IsNull(resolve(c)?.id),
            Expression::NotNull(c) => BoundExpression::NotNull(resolve(c)?.id),
            Expression::Compare {
                column,
                op,
                literal,
            } => {
                let field = resolve(column)?;
                let literal = literal.to_type(field.field_type).context(LiteralTypeSnafu {
                    column: column.clone(),
                    expected: field.field_type,
                    literal: literal.clone(),
                })?;
                BoundExpression::Compare {
                    field_id: field.id,
                    op: *op,
                    literal,
                }
            }
        })
    }
}

/// Expression with columns resolved to field ids and negations pushed into
/// the leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundExpression {
    /// Matches every row.
    AlwaysTrue,
    /// Matches no row.
    AlwaysFalse,
    /// Both sides match.
    And(Box<BoundExpression>, Box<BoundExpression>),
    /// Either side matches.
    Or(Box<BoundExpression>, Box<BoundExpression>),
    /// Field is null.
    IsNull(i32),
    /// Field is not null.
    NotNull(i32),
    /// `field <op> literal`, literal already of the field type.
    Compare {
        /// Schema field id.
        field_id: i32,
        /// Operator.
        op: CompareOp,
        /// Literal operand.
        literal: Datum,
    },
}

/// Exact knowledge about a column that holds one value for the whole file.
enum Constant<'a> {
    Null,
    Value(&'a Datum),
}

fn partition_constant<'a>(
    file: &'a DataFile,
    spec: &PartitionSpec,
    field_id: i32,
) -> Option<Constant<'a>> {
    let idx = spec.identity_index_for(field_id)?;
    let slot = file.partition.0.get(idx)?;
    Some(match slot {
        Some(v) => Constant::Value(v),
        None => Constant::Null,
    })
}

/// Null-count facts for a column: `(value_count, null_count)` when known.
fn null_facts(file: &DataFile, field_id: i32) -> (Option<u64>, Option<u64>) {
    (
        file.value_counts.get(&field_id).copied(),
        file.null_value_counts.get(&field_id).copied(),
    )
}

fn all_null(file: &DataFile, field_id: i32) -> bool {
    matches!(null_facts(file, field_id), (Some(v), Some(n)) if v == n)
}

fn no_nulls(file: &DataFile, field_id: i32) -> bool {
    matches!(null_facts(file, field_id).1, Some(0))
}

impl BoundExpression {
    /// Inclusive evaluation: can any row of `file` match?
    pub fn might_match(&self, file: &DataFile, spec: &PartitionSpec) -> bool {
        match self {
            BoundExpression::AlwaysTrue => true,
            BoundExpression::AlwaysFalse => false,
            BoundExpression::And(l, r) => l.might_match(file, spec) && r.might_match(file, spec),
            BoundExpression::Or(l, r) => l.might_match(file, spec) || r.might_match(file, spec),
            BoundExpression::IsNull(id) => match partition_constant(file, spec, *id) {
                Some(Constant::Null) => true,
                Some(Constant::Value(_)) => false,
                None => !matches!(null_facts(file, *id).1, Some(0)),
            },
            BoundExpression::NotNull(id) => match partition_constant(file, spec, *id) {
                Some(Constant::Null) => false,
                Some(Constant::Value(_)) => true,
                None => !all_null(file, *id),
            },
            BoundExpression::Compare {
                field_id,
                op,
                literal,
            } => match partition_constant(file, spec, *field_id) {
                Some(Constant::Null) => false,
                Some(Constant::Value(v)) => op.test(v.cmp(literal)),
                None => {
                    if all_null(file, *field_id) {
                        return false;
                    }
                    let lower = file.lower_bounds.get(field_id);
                    let upper = file.upper_bounds.get(field_id);
                    match op {
                        CompareOp::Eq => {
                            lower.is_none_or(|lo| lo <= literal)
                                && upper.is_none_or(|hi| hi >= literal)
                        }
                        CompareOp::NotEq => match (lower, upper) {
                            (Some(lo), Some(hi)) => {
                                !(lo == literal && hi == literal && no_nulls(file, *field_id))
                            }
                            _ => true,
                        },
                        CompareOp::Lt => lower.is_none_or(|lo| lo < literal),
                        CompareOp::LtEq => lower.is_none_or(|lo| lo <= literal),
                        CompareOp::Gt => upper.is_none_or(|hi| hi > literal),
                        CompareOp::GtEq => upper.is_none_or(|hi| hi >= literal),
                    }
                }
            },
        }
    }

    /// Strict evaluation: does every row of `file` match?
    pub fn all_rows_match(&self, file: &DataFile, spec: &PartitionSpec) -> bool {
        match self {
            BoundExpression::AlwaysTrue => true,
            BoundExpression::AlwaysFalse => false,
            BoundExpression::And(l, r) => {
                l.all_rows_match(file, spec) && r.all_rows_match(file, spec)
            }
            BoundExpression::Or(l, r) => {
                l.all_rows_match(file, spec) || r.all_rows_match(file, spec)
            }
            BoundExpression::IsNull(id) => match partition_constant(file, spec, *id) {
                Some(Constant::Null) => true,
                Some(Constant::Value(_)) => false,
                None => all_null(file, *id),
            },
            BoundExpression::NotNull(id) => match partition_constant(file, spec, *id) {
                Some(Constant::Null) => false,
                Some(Constant::Value(_)) => true,
                None => no_nulls(file, *id),
            },
            BoundExpression::Compare {
                field_id,
                op,
                literal,
            } => match partition_constant(file, spec, *field_id) {
                Some(Constant::Null) => false,
                Some(Constant::Value(v)) => op.test(v.cmp(literal)),
                None => {
                    // Nulls never satisfy a comparison.
                    if !no_nulls(file, *field_id) {
                        return false;
                    }
                    let (Some(lo), Some(hi)) = (
                        file.lower_bounds.get(field_id),
                        file.upper_bounds.get(field_id),
                    ) else {
                        return false;
                    };
                    match op {
                        CompareOp::Eq => lo == literal && hi == literal,
                        CompareOp::NotEq => hi < literal || lo > literal,
                        CompareOp::Lt => hi < literal,
                        CompareOp::LtEq => hi <= literal,
                        CompareOp::Gt => lo > literal,
                        CompareOp::GtEq => lo >= literal,
                    }
                }
            },
        }
    }
}
