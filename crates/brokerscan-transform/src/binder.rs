//! Binds a file group's raw text fields to the destination row schema.
//!
//! Binding runs in two steps so the planner can interleave them with file
//! discovery:
//!
//! 1. [`RowSchemaBinder::init`] allocates one staging slot per source field
//!    (always `VARCHAR`, initially non-nullable) and rewrites the group's
//!    legacy column mappings.
//! 2. [`RowSchemaBinder::finalize`] resolves one expression per materialized
//!    destination slot, inserts implicit casts, promotes staging slots to
//!    nullable where needed and only then computes the staging layout.

use std::collections::BTreeMap;

use brokerscan_core::{
    ColumnRef, ColumnType, DescriptorTable, Expr, FileGroup, SlotId, TableSchema, TupleId,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TransformError;
use crate::legacy::rewrite_legacy_exprs;

/// Staging slots allocated for one file group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingSchema {
    pub tuple_id: TupleId,
    /// In source field order.
    pub slot_ids: Vec<SlotId>,
    by_name: BTreeMap<String, SlotId>,
}

impl StagingSchema {
    pub fn slot_for(&self, field: &str) -> Option<SlotId> {
        self.by_name.get(field).copied()
    }
}

/// Output of [`RowSchemaBinder::init`]: staging slots plus the rewritten,
/// still name-based column mappings.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedGroup {
    pub staging: StagingSchema,
    pub exprs: BTreeMap<String, Expr>,
}

/// One expression per materialized destination slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformPlan {
    pub src_tuple_id: TupleId,
    pub src_slot_ids: Vec<SlotId>,
    pub dest_tuple_id: TupleId,
    pub expr_of_dest_slot: BTreeMap<SlotId, Expr>,
}

pub struct RowSchemaBinder<'a> {
    table: &'a TableSchema,
    dest_tuple: TupleId,
}

impl<'a> RowSchemaBinder<'a> {
    pub fn new(table: &'a TableSchema, dest_tuple: TupleId) -> Self {
        Self { table, dest_tuple }
    }

    /// Init then finalize in one go.
    pub fn bind(
        &self,
        group: &FileGroup,
        descs: &mut DescriptorTable,
    ) -> Result<TransformPlan, TransformError> {
        let staged = self.init(group, descs)?;
        self.finalize(&staged, descs)
    }

    pub fn init(
        &self,
        group: &FileGroup,
        descs: &mut DescriptorTable,
    ) -> Result<StagedGroup, TransformError> {
        let field_names = group
            .value_names
            .clone()
            .unwrap_or_else(|| self.table.column_names());

        let tuple_id = descs.create_tuple();
        let mut slot_ids = Vec::with_capacity(field_names.len());
        let mut by_name = BTreeMap::new();
        for name in field_names {
            let slot = descs
                .add_slot(tuple_id, name.clone(), ColumnType::Varchar)
                .ok_or(TransformError::UnknownTuple(tuple_id))?;
            slot_ids.push(slot);
            by_name.insert(name, slot);
        }

        let exprs = rewrite_legacy_exprs(&group.expr_column_map, self.table)?;

        debug!(
            "Staged {} source fields in tuple {} for table {}",
            slot_ids.len(),
            tuple_id,
            self.table.name
        );
        Ok(StagedGroup {
            staging: StagingSchema {
                tuple_id,
                slot_ids,
                by_name,
            },
            exprs,
        })
    }

    pub fn finalize(
        &self,
        staged: &StagedGroup,
        descs: &mut DescriptorTable,
    ) -> Result<TransformPlan, TransformError> {
        let staging = &staged.staging;

        let mut bound: BTreeMap<&str, Expr> = BTreeMap::new();
        for (column, expr) in &staged.exprs {
            let rebound = bind_fields(expr, staging)?;
            rebound.data_type(&|id| descs.slot_type(id))?;
            bound.insert(column.as_str(), rebound);
        }

        let dest = descs
            .tuple(self.dest_tuple)
            .ok_or(TransformError::UnknownTuple(self.dest_tuple))?;
        let targets: Vec<DestSlot> = dest
            .materialized_slots()
            .map(|slot| DestSlot {
                id: slot.id,
                name: slot.name.clone(),
                column_type: slot.column_type,
                allow_null: slot.column.as_ref().map_or(slot.nullable, |c| c.nullable),
                default_value: slot.column.as_ref().and_then(|c| c.default_value.clone()),
            })
            .collect();

        let mut expr_of_dest_slot = BTreeMap::new();
        for target in targets {
            let expr = match bound.remove(target.name.as_str()) {
                Some(expr) => expr,
                None => self.implicit_value(&target, staging, descs)?,
            };
            let source_type = expr.data_type(&|id| descs.slot_type(id))?;
            let expr = cast_to_slot(target.column_type, source_type, expr);
            debug!("Dest slot {} ({}) <- {}", target.id, target.name, expr);
            expr_of_dest_slot.insert(target.id, expr);
        }

        // Layout depends on nullability, so it goes last.
        descs
            .compute_layout(staging.tuple_id)
            .ok_or(TransformError::UnknownTuple(staging.tuple_id))?;

        Ok(TransformPlan {
            src_tuple_id: staging.tuple_id,
            src_slot_ids: staging.slot_ids.clone(),
            dest_tuple_id: self.dest_tuple,
            expr_of_dest_slot,
        })
    }

    /// Value for a destination column without an explicit mapping.
    fn implicit_value(
        &self,
        target: &DestSlot,
        staging: &StagingSchema,
        descs: &mut DescriptorTable,
    ) -> Result<Expr, TransformError> {
        if let Some(src) = staging.slot_for(&target.name) {
            if target.allow_null {
                if let Some(slot) = descs.slot_mut(src) {
                    slot.nullable = true;
                }
            }
            return Ok(Expr::slot(src, target.name.clone()));
        }
        if let Some(default) = &target.default_value {
            return Ok(Expr::lit_str(default.clone()));
        }
        if target.allow_null {
            return Ok(Expr::null(target.column_type));
        }
        Err(TransformError::MissingValue {
            column: target.name.clone(),
        })
    }
}

struct DestSlot {
    id: SlotId,
    name: String,
    column_type: ColumnType,
    allow_null: bool,
    default_value: Option<String>,
}

/// Replace field-name references with the staging slots they name.
fn bind_fields(expr: &Expr, staging: &StagingSchema) -> Result<Expr, TransformError> {
    expr.map_columns(&mut |column| match column {
        ColumnRef::Named(name) => staging
            .slot_for(name)
            .map(|id| Expr::slot(id, name.clone()))
            .ok_or_else(|| TransformError::UnresolvedField {
                field: name.clone(),
            }),
        ColumnRef::Slot { .. } => Ok(Expr::Column(column.clone())),
    })
}

/// String destinations take any string source as-is; every other mismatch
/// gets a non-strict cast.
fn cast_to_slot(dest: ColumnType, source: ColumnType, expr: Expr) -> Expr {
    if dest.is_string() {
        if source.is_string() {
            expr
        } else {
            Expr::cast(expr, ColumnType::Varchar)
        }
    } else if dest != source {
        Expr::cast(expr, dest)
    } else {
        expr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brokerscan_core::{BinaryOperator, Column};

    fn table() -> TableSchema {
        TableSchema::new(
            "events",
            vec![
                Column::new("id", ColumnType::BigInt),
                Column::new("name", ColumnType::Varchar).nullable(),
                Column::new("city", ColumnType::Varchar).with_default("nowhere"),
                Column::new("score", ColumnType::Double).nullable(),
            ],
        )
    }

    fn setup(schema: &TableSchema) -> (DescriptorTable, TupleId) {
        let mut descs = DescriptorTable::new();
        let dest = descs.create_table_tuple(schema);
        (descs, dest)
    }

    fn dest_slot(descs: &DescriptorTable, dest: TupleId, name: &str) -> SlotId {
        descs
            .tuple(dest)
            .unwrap()
            .slots
            .iter()
            .find(|s| s.name == name)
            .unwrap()
            .id
    }

    #[test]
    fn test_same_named_fields_bind_directly() {
        let schema = table();
        let (mut descs, dest) = setup(&schema);
        let group = FileGroup::new(vec!["/data/x.csv".into()]);

        let plan = RowSchemaBinder::new(&schema, dest).bind(&group, &mut descs).unwrap();
        assert_eq!(plan.src_slot_ids.len(), 4);
        assert_eq!(plan.expr_of_dest_slot.len(), 4);

        for (column, src) in schema.columns.iter().zip(&plan.src_slot_ids) {
            let expr = &plan.expr_of_dest_slot[&dest_slot(&descs, dest, &column.name)];
            let inner = match expr {
                Expr::Cast { expr, to, strict } => {
                    assert_eq!(*to, column.column_type);
                    assert!(!strict);
                    expr.as_ref()
                }
                other => other,
            };
            assert_eq!(inner, &Expr::slot(*src, column.name.clone()));
        }

        // Varchar destination needs no cast.
        let name_expr = &plan.expr_of_dest_slot[&dest_slot(&descs, dest, "name")];
        assert!(matches!(name_expr, Expr::Column(_)));
    }

    #[test]
    fn test_nullable_promotion_and_layout() {
        let schema = table();
        let (mut descs, dest) = setup(&schema);
        let group = FileGroup::new(vec![]);

        let plan = RowSchemaBinder::new(&schema, dest).bind(&group, &mut descs).unwrap();
        let staging = descs.tuple(plan.src_tuple_id).unwrap();
        let nullable: Vec<&str> = staging
            .slots
            .iter()
            .filter(|s| s.nullable)
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(nullable, vec!["name", "score"]);

        let layout = staging.layout.as_ref().unwrap();
        assert_eq!(layout.null_indicator_bytes, 1);
        assert_eq!(layout.byte_size, 8 + 4 * 16);
    }

    #[test]
    fn test_default_and_null_for_missing_fields() {
        let schema = table();
        let (mut descs, dest) = setup(&schema);
        let group = FileGroup::new(vec![]).with_value_names(vec!["id".into()]);

        let plan = RowSchemaBinder::new(&schema, dest).bind(&group, &mut descs).unwrap();
        assert_eq!(
            plan.expr_of_dest_slot[&dest_slot(&descs, dest, "city")],
            Expr::lit_str("nowhere")
        );
        assert_eq!(
            plan.expr_of_dest_slot[&dest_slot(&descs, dest, "score")],
            Expr::null(ColumnType::Double)
        );
        assert_eq!(
            plan.expr_of_dest_slot[&dest_slot(&descs, dest, "name")],
            Expr::null(ColumnType::Varchar)
        );
    }

    #[test]
    fn test_missing_value_for_required_column() {
        let schema = table();
        let (mut descs, dest) = setup(&schema);
        let group = FileGroup::new(vec![]).with_value_names(vec!["name".into()]);

        let err = RowSchemaBinder::new(&schema, dest)
            .bind(&group, &mut descs)
            .unwrap_err();
        assert_eq!(err, TransformError::MissingValue { column: "id".into() });
    }

    #[test]
    fn test_unresolved_field() {
        let schema = table();
        let (mut descs, dest) = setup(&schema);
        let group = FileGroup::new(vec![])
            .with_value_names(vec!["id".into()])
            .with_expr("name", Expr::call("upper", vec![Expr::col("raw_name")]));

        let err = RowSchemaBinder::new(&schema, dest)
            .bind(&group, &mut descs)
            .unwrap_err();
        assert_eq!(
            err,
            TransformError::UnresolvedField {
                field: "raw_name".into()
            }
        );
    }

    #[test]
    fn test_explicit_expression_is_rebound_and_cast() {
        let schema = table();
        let (mut descs, dest) = setup(&schema);
        let group = FileGroup::new(vec![])
            .with_value_names(vec!["c1".into(), "c2".into()])
            .with_expr("id", Expr::col("c1"))
            .with_expr(
                "score",
                Expr::binary(BinaryOperator::Plus, Expr::col("c2"), Expr::lit_int(1)),
            );

        let binder = RowSchemaBinder::new(&schema, dest);
        let staged = binder.init(&group, &mut descs).unwrap();
        let c1 = staged.staging.slot_for("c1").unwrap();
        let c2 = staged.staging.slot_for("c2").unwrap();
        let plan = binder.finalize(&staged, &mut descs).unwrap();

        assert_eq!(
            plan.expr_of_dest_slot[&dest_slot(&descs, dest, "id")],
            Expr::cast(Expr::slot(c1, "c1"), ColumnType::BigInt)
        );
        // varchar + int is already a double.
        assert_eq!(
            plan.expr_of_dest_slot[&dest_slot(&descs, dest, "score")],
            Expr::binary(BinaryOperator::Plus, Expr::slot(c2, "c2"), Expr::lit_int(1))
        );
        // Explicit mappings never promote staging nullability.
        assert!(descs.tuple(plan.src_tuple_id).unwrap().slots.iter().all(|s| !s.nullable));
    }

    #[test]
    fn test_string_destination_casts_non_string_source() {
        let schema = TableSchema::new("t", vec![Column::new("day", ColumnType::Varchar)]);
        let (mut descs, dest) = setup(&schema);
        let group = FileGroup::new(vec![])
            .with_value_names(vec!["ts".into()])
            .with_expr(
                "day",
                Expr::call("unix_timestamp", vec![Expr::col("ts")]),
            );

        let plan = RowSchemaBinder::new(&schema, dest).bind(&group, &mut descs).unwrap();
        let expr = &plan.expr_of_dest_slot[&dest_slot(&descs, dest, "day")];
        assert!(matches!(expr, Expr::Cast { to: ColumnType::Varchar, .. }));
    }

    #[test]
    fn test_legacy_mapping_is_rewritten_before_binding() {
        let schema = table();
        let (mut descs, dest) = setup(&schema);
        let group = FileGroup::new(vec![])
            .with_expr("name", Expr::call("replace_value", vec![Expr::lit_str("x")]));

        let plan = RowSchemaBinder::new(&schema, dest).bind(&group, &mut descs).unwrap();
        let expr = &plan.expr_of_dest_slot[&dest_slot(&descs, dest, "name")];
        assert_eq!(expr.function_name(), Some("if"));
        assert!(expr
            .column_refs()
            .iter()
            .all(|c| matches!(c, ColumnRef::Slot { .. })));
    }

    #[test]
    fn test_unknown_function_is_reported() {
        let schema = table();
        let (mut descs, dest) = setup(&schema);
        let group = FileGroup::new(vec![])
            .with_expr("name", Expr::call("soundex", vec![Expr::col("name")]));

        let err = RowSchemaBinder::new(&schema, dest)
            .bind(&group, &mut descs)
            .unwrap_err();
        assert_eq!(
            err,
            TransformError::UnknownFunction {
                name: "soundex".into()
            }
        );
    }
}
