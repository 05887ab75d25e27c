//! Expression AST used for column transforms.
//!
//! Trees are immutable values: every rewrite or rebinding pass builds a new
//! tree and leaves its input untouched.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::descriptor::SlotId;
use crate::functions;
use crate::types::ColumnType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("column '{0}' is not bound to a slot")]
    UnboundColumn(String),
    #[error("unknown slot {0}")]
    UnknownSlot(SlotId),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("function '{function}' expects {expected} argument(s), got {found}")]
    ArgumentCount {
        function: String,
        expected: &'static str,
        found: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarValue {
    /// A null of a known type.
    Null(ColumnType),
    Boolean(bool),
    Int(i64),
    Double(f64),
    String(String),
}

impl ScalarValue {
    pub fn data_type(&self) -> ColumnType {
        match self {
            ScalarValue::Null(t) => *t,
            ScalarValue::Boolean(_) => ColumnType::Boolean,
            ScalarValue::Int(_) => ColumnType::BigInt,
            ScalarValue::Double(_) => ColumnType::Double,
            ScalarValue::String(_) => ColumnType::Varchar,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// A reference to an input column, either still by name (as parsed) or
/// bound to a slot of a tuple descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRef {
    Named(String),
    Slot { id: SlotId, name: String },
}

impl ColumnRef {
    pub fn name(&self) -> &str {
        match self {
            ColumnRef::Named(name) => name,
            ColumnRef::Slot { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Plus,
    Minus,
    Multiply,
    Divide,
}

impl BinaryOperator {
    pub fn is_predicate(self) -> bool {
        !matches!(
            self,
            BinaryOperator::Plus
                | BinaryOperator::Minus
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
        )
    }

    fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Eq => "=",
            BinaryOperator::NotEq => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Column(ColumnRef),
    Literal(ScalarValue),
    Function {
        name: String,
        args: Vec<Expr>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Conversion to `to`. Non-strict casts yield null on malformed input
    /// instead of failing the row.
    Cast {
        expr: Box<Expr>,
        to: ColumnType,
        #[serde(default)]
        strict: bool,
    },
}

impl Expr {
    pub fn col(name: impl Into<String>) -> Self {
        Expr::Column(ColumnRef::Named(name.into()))
    }

    pub fn slot(id: SlotId, name: impl Into<String>) -> Self {
        Expr::Column(ColumnRef::Slot {
            id,
            name: name.into(),
        })
    }

    pub fn lit_str(value: impl Into<String>) -> Self {
        Expr::Literal(ScalarValue::String(value.into()))
    }

    pub fn lit_int(value: i64) -> Self {
        Expr::Literal(ScalarValue::Int(value))
    }

    pub fn null(data_type: ColumnType) -> Self {
        Expr::Literal(ScalarValue::Null(data_type))
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            args,
        }
    }

    pub fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Non-strict cast.
    pub fn cast(expr: Expr, to: ColumnType) -> Self {
        Expr::Cast {
            expr: Box::new(expr),
            to,
            strict: false,
        }
    }

    pub fn function_name(&self) -> Option<&str> {
        match self {
            Expr::Function { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(self, Expr::Literal(ScalarValue::Null(_)))
    }

    /// All column references in the tree, in pre-order.
    pub fn column_refs(&self) -> Vec<&ColumnRef> {
        let mut out = Vec::new();
        self.collect_column_refs(&mut out);
        out
    }

    fn collect_column_refs<'a>(&'a self, out: &mut Vec<&'a ColumnRef>) {
        match self {
            Expr::Column(c) => out.push(c),
            Expr::Literal(_) => {}
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.collect_column_refs(out);
                }
            }
            Expr::Binary { left, right, .. } => {
                left.collect_column_refs(out);
                right.collect_column_refs(out);
            }
            Expr::Cast { expr, .. } => expr.collect_column_refs(out),
        }
    }

    /// Build a new tree with every column reference replaced by `f(column)`.
    pub fn map_columns<E, F>(&self, f: &mut F) -> Result<Expr, E>
    where
        F: FnMut(&ColumnRef) -> Result<Expr, E>,
    {
        Ok(match self {
            Expr::Column(c) => f(c)?,
            Expr::Literal(v) => Expr::Literal(v.clone()),
            Expr::Function { name, args } => Expr::Function {
                name: name.clone(),
                args: args
                    .iter()
                    .map(|a| a.map_columns(f))
                    .collect::<Result<Vec<_>, E>>()?,
            },
            Expr::Binary { op, left, right } => Expr::Binary {
                op: *op,
                left: Box::new(left.map_columns(f)?),
                right: Box::new(right.map_columns(f)?),
            },
            Expr::Cast { expr, to, strict } => Expr::Cast {
                expr: Box::new(expr.map_columns(f)?),
                to: *to,
                strict: *strict,
            },
        })
    }

    /// Result type of the expression. `slot_type` supplies the type of every
    /// bound slot; named references are an error since they have no type yet.
    pub fn data_type<F>(&self, slot_type: &F) -> Result<ColumnType, ExprError>
    where
        F: Fn(SlotId) -> Option<ColumnType>,
    {
        match self {
            Expr::Column(ColumnRef::Named(name)) => Err(ExprError::UnboundColumn(name.clone())),
            Expr::Column(ColumnRef::Slot { id, .. }) => {
                slot_type(*id).ok_or(ExprError::UnknownSlot(*id))
            }
            Expr::Literal(v) => Ok(v.data_type()),
            Expr::Function { name, args } => {
                let arg_types = args
                    .iter()
                    .map(|a| a.data_type(slot_type))
                    .collect::<Result<Vec<_>, _>>()?;
                functions::return_type(name, &arg_types)
            }
            Expr::Binary { op, left, right } => {
                let l = left.data_type(slot_type)?;
                let r = right.data_type(slot_type)?;
                Ok(functions::binary_return_type(*op, l, r))
            }
            Expr::Cast { to, .. } => Ok(*to),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null(_) => f.write_str("NULL"),
            ScalarValue::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            ScalarValue::Int(i) => write!(f, "{}", i),
            ScalarValue::Double(d) => write!(f, "{}", d),
            ScalarValue::String(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(c) => write!(f, "`{}`", c.name()),
            Expr::Literal(v) => write!(f, "{}", v),
            Expr::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            Expr::Binary { op, left, right } => write!(f, "({} {} {})", left, op.symbol(), right),
            Expr::Cast { expr, to, .. } => write!(f, "CAST({} AS {})", expr, to),
        }
    }
}
