//! Tuple and slot descriptors.
//!
//! A [`DescriptorTable`] allocates the row schemas of one statement: the
//! destination tuple produced by the scan and the all-text staging tuples
//! holding raw fields. Ids are unique within one table.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use arrow::datatypes::{Field, Schema, SchemaRef};
use serde::{Deserialize, Serialize};

use crate::table::{Column, TableSchema};
use crate::types::ColumnType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TupleId(pub u32);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TupleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotDescriptor {
    pub id: SlotId,
    pub parent: TupleId,
    pub name: String,
    /// Backing destination column, if the slot belongs to a table tuple.
    pub column: Option<Column>,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub materialized: bool,
}

/// Where a slot lives inside a materialized row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotPosition {
    pub byte_offset: usize,
    /// `(byte, bit)` of the null indicator, for nullable slots.
    pub null_indicator: Option<(usize, u8)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TupleLayout {
    pub byte_size: usize,
    pub null_indicator_bytes: usize,
    pub positions: BTreeMap<SlotId, SlotPosition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TupleDescriptor {
    pub id: TupleId,
    pub table: Option<String>,
    pub slots: Vec<SlotDescriptor>,
    pub layout: Option<TupleLayout>,
}

impl TupleDescriptor {
    pub fn slot(&self, id: SlotId) -> Option<&SlotDescriptor> {
        self.slots.iter().find(|s| s.id == id)
    }

    pub fn materialized_slots(&self) -> impl Iterator<Item = &SlotDescriptor> {
        self.slots.iter().filter(|s| s.materialized)
    }

    /// Materialized slots as an Arrow schema, field names taken from slot names.
    pub fn arrow_schema(&self) -> SchemaRef {
        let fields: Vec<Field> = self
            .materialized_slots()
            .map(|s| Field::new(s.name.as_str(), s.column_type.to_arrow(), s.nullable))
            .collect();
        Arc::new(Schema::new(fields))
    }

    /// Null indicators first, then slots by decreasing width, each aligned to
    /// its own width (16-byte handles align to 8).
    fn compute_layout(&self) -> TupleLayout {
        let materialized: Vec<&SlotDescriptor> = self.materialized_slots().collect();

        let mut positions: BTreeMap<SlotId, SlotPosition> = BTreeMap::new();
        let mut null_indicators: BTreeMap<SlotId, (usize, u8)> = BTreeMap::new();
        let mut nullable_seen = 0usize;
        for slot in &materialized {
            if slot.nullable {
                null_indicators.insert(slot.id, (nullable_seen / 8, (nullable_seen % 8) as u8));
                nullable_seen += 1;
            }
        }
        let null_indicator_bytes = nullable_seen.div_ceil(8);

        let mut by_size = materialized.clone();
        by_size.sort_by(|a, b| b.column_type.slot_size().cmp(&a.column_type.slot_size()));

        let mut offset = null_indicator_bytes;
        for slot in by_size {
            let size = slot.column_type.slot_size();
            let align = size.min(8);
            offset = offset.div_ceil(align) * align;
            positions.insert(
                slot.id,
                SlotPosition {
                    byte_offset: offset,
                    null_indicator: null_indicators.get(&slot.id).copied(),
                },
            );
            offset += size;
        }

        TupleLayout {
            byte_size: offset,
            null_indicator_bytes,
            positions,
        }
    }
}

#[derive(Debug, Default)]
pub struct DescriptorTable {
    tuples: Vec<TupleDescriptor>,
    next_slot: u32,
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_tuple(&mut self) -> TupleId {
        let id = TupleId(self.tuples.len() as u32);
        self.tuples.push(TupleDescriptor {
            id,
            table: None,
            slots: Vec::new(),
            layout: None,
        });
        id
    }

    /// A tuple with one materialized slot per table column, in declared order.
    pub fn create_table_tuple(&mut self, schema: &TableSchema) -> TupleId {
        let tuple = self.create_tuple();
        if let Some(t) = self.tuple_mut(tuple) {
            t.table = Some(schema.name.clone());
        }
        for column in &schema.columns {
            let id = self.alloc_slot_id();
            if let Some(t) = self.tuple_mut(tuple) {
                t.slots.push(SlotDescriptor {
                    id,
                    parent: tuple,
                    name: column.name.clone(),
                    column: Some(column.clone()),
                    column_type: column.column_type,
                    nullable: column.nullable,
                    materialized: true,
                });
            }
        }
        tuple
    }

    /// Adds a materialized, non-nullable slot. Returns `None` if the tuple
    /// does not exist.
    pub fn add_slot(
        &mut self,
        tuple: TupleId,
        name: impl Into<String>,
        column_type: ColumnType,
    ) -> Option<SlotId> {
        self.tuple(tuple)?;
        let id = self.alloc_slot_id();
        let t = self.tuple_mut(tuple)?;
        t.slots.push(SlotDescriptor {
            id,
            parent: tuple,
            name: name.into(),
            column: None,
            column_type,
            nullable: false,
            materialized: true,
        });
        t.layout = None;
        Some(id)
    }

    pub fn tuple(&self, id: TupleId) -> Option<&TupleDescriptor> {
        self.tuples.get(id.0 as usize)
    }

    pub fn tuple_mut(&mut self, id: TupleId) -> Option<&mut TupleDescriptor> {
        self.tuples.get_mut(id.0 as usize)
    }

    pub fn slot(&self, id: SlotId) -> Option<&SlotDescriptor> {
        self.tuples.iter().find_map(|t| t.slot(id))
    }

    pub fn slot_mut(&mut self, id: SlotId) -> Option<&mut SlotDescriptor> {
        self.tuples
            .iter_mut()
            .find_map(|t| t.slots.iter_mut().find(|s| s.id == id))
    }

    pub fn slot_type(&self, id: SlotId) -> Option<ColumnType> {
        self.slot(id).map(|s| s.column_type)
    }

    /// Recompute and store the physical layout of a tuple. Must run after
    /// every nullability change to its slots.
    pub fn compute_layout(&mut self, tuple: TupleId) -> Option<&TupleLayout> {
        let t = self.tuple_mut(tuple)?;
        t.layout = Some(t.compute_layout());
        t.layout.as_ref()
    }

    fn alloc_slot_id(&mut self) -> SlotId {
        let id = SlotId(self.next_slot);
        self.next_slot += 1;
        id
    }
}
