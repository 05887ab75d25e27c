//! Destination tables, external broker tables and file groups.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::endpoint::BrokerDesc;
use crate::expr::Expr;
use crate::types::ColumnType;

pub const DEFAULT_COLUMN_SEPARATOR: &str = "\t";
pub const DEFAULT_LINE_DELIMITER: &str = "\n";

/// A column of a destination table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub default_value: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            default_value: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// One range partition of a destination table. Bounds are literal values,
/// one per partition column; an empty `lower` means unbounded below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangePartition {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub lower: Vec<String>,
    pub upper: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangePartitioning {
    pub columns: Vec<String>,
    pub partitions: Vec<RangePartition>,
}

/// Schema of the table rows are loaded into (or read as).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub partitioning: Option<RangePartitioning>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
            partitioning: None,
        }
    }

    pub fn with_partitioning(mut self, partitioning: RangePartitioning) -> Self {
        self.partitioning = Some(partitioning);
        self
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in declared order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// An external table whose rows live in files reachable through a broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerTable {
    pub schema: TableSchema,
    pub paths: Vec<String>,
    pub broker: BrokerDesc,
    #[serde(default = "default_column_separator")]
    pub column_separator: String,
    #[serde(default = "default_line_delimiter")]
    pub line_delimiter: String,
}

impl BrokerTable {
    pub fn name(&self) -> &str {
        &self.schema.name
    }
}

/// A named logical source: one per load clause, or a single synthetic group
/// for an external-table read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileGroup {
    pub file_paths: Vec<String>,
    /// Names of the fields in each line. `None` means "the destination
    /// table's columns, in declared order".
    #[serde(default)]
    pub value_names: Option<Vec<String>>,
    /// Destination column -> expression over the source fields.
    #[serde(default)]
    pub expr_column_map: BTreeMap<String, Expr>,
    #[serde(default)]
    pub partition_ids: Vec<i64>,
    #[serde(default = "default_column_separator")]
    pub column_separator: String,
    #[serde(default = "default_line_delimiter")]
    pub line_delimiter: String,
}

fn default_column_separator() -> String {
    DEFAULT_COLUMN_SEPARATOR.to_string()
}

fn default_line_delimiter() -> String {
    DEFAULT_LINE_DELIMITER.to_string()
}

impl FileGroup {
    pub fn new(file_paths: Vec<String>) -> Self {
        Self {
            file_paths,
            value_names: None,
            expr_column_map: BTreeMap::new(),
            partition_ids: Vec::new(),
            column_separator: default_column_separator(),
            line_delimiter: default_line_delimiter(),
        }
    }

    /// The synthetic group used to read an external broker table.
    pub fn from_broker_table(table: &BrokerTable) -> Self {
        Self {
            file_paths: table.paths.clone(),
            value_names: None,
            expr_column_map: BTreeMap::new(),
            partition_ids: Vec::new(),
            column_separator: table.column_separator.clone(),
            line_delimiter: table.line_delimiter.clone(),
        }
    }

    pub fn with_value_names(mut self, names: Vec<String>) -> Self {
        self.value_names = Some(names);
        self
    }

    pub fn with_expr(mut self, column: impl Into<String>, expr: Expr) -> Self {
        self.expr_column_map.insert(column.into(), expr);
        self
    }

    pub fn with_partition_ids(mut self, ids: Vec<i64>) -> Self {
        self.partition_ids = ids;
        self
    }

    pub fn with_separators(mut self, column: impl Into<String>, line: impl Into<String>) -> Self {
        self.column_separator = column.into();
        self.line_delimiter = line.into();
        self
    }

    /// First byte of the UTF-8 encoded field separator.
    pub fn column_separator_byte(&self) -> Option<u8> {
        self.column_separator.as_bytes().first().copied()
    }

    /// First byte of the UTF-8 encoded line delimiter.
    pub fn line_delimiter_byte(&self) -> Option<u8> {
        self.line_delimiter.as_bytes().first().copied()
    }
}
