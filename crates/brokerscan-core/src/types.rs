//! Column types understood by the planner.

use std::fmt;

use arrow::datatypes::{DataType, TimeUnit};
use serde::{Deserialize, Serialize};

/// Primitive type of a destination column, a staging field or an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Date,
    DateTime,
    Char,
    Varchar,
}

impl ColumnType {
    pub fn is_string(self) -> bool {
        matches!(self, ColumnType::Char | ColumnType::Varchar)
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ColumnType::TinyInt
                | ColumnType::SmallInt
                | ColumnType::Int
                | ColumnType::BigInt
                | ColumnType::Float
                | ColumnType::Double
        )
    }

    pub fn is_floating(self) -> bool {
        matches!(self, ColumnType::Float | ColumnType::Double)
    }

    /// Fixed in-tuple width. Strings and datetimes are stored as 16-byte
    /// handles.
    pub fn slot_size(self) -> usize {
        match self {
            ColumnType::Boolean | ColumnType::TinyInt => 1,
            ColumnType::SmallInt => 2,
            ColumnType::Int | ColumnType::Float => 4,
            ColumnType::BigInt | ColumnType::Double => 8,
            ColumnType::Date | ColumnType::DateTime | ColumnType::Char | ColumnType::Varchar => 16,
        }
    }

    pub fn to_arrow(self) -> DataType {
        match self {
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::TinyInt => DataType::Int8,
            ColumnType::SmallInt => DataType::Int16,
            ColumnType::Int => DataType::Int32,
            ColumnType::BigInt => DataType::Int64,
            ColumnType::Float => DataType::Float32,
            ColumnType::Double => DataType::Float64,
            ColumnType::Date => DataType::Date32,
            ColumnType::DateTime => DataType::Timestamp(TimeUnit::Second, None),
            ColumnType::Char | ColumnType::Varchar => DataType::Utf8,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::TinyInt => "TINYINT",
            ColumnType::SmallInt => "SMALLINT",
            ColumnType::Int => "INT",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Float => "FLOAT",
            ColumnType::Double => "DOUBLE",
            ColumnType::Date => "DATE",
            ColumnType::DateTime => "DATETIME",
            ColumnType::Char => "CHAR",
            ColumnType::Varchar => "VARCHAR",
        };
        f.write_str(name)
    }
}
