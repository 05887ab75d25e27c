//! Builtin scalar function signatures.
//!
//! Only result types are modeled; evaluation happens in the executor.

use crate::expr::{BinaryOperator, ExprError};
use crate::types::ColumnType;

/// Result type of calling `name` (case-insensitive) with `args`.
pub fn return_type(name: &str, args: &[ColumnType]) -> Result<ColumnType, ExprError> {
    let lower = name.to_ascii_lowercase();
    let arity = |expected: &'static str, ok: bool| -> Result<(), ExprError> {
        if ok {
            Ok(())
        } else {
            Err(ExprError::ArgumentCount {
                function: lower.clone(),
                expected,
                found: args.len(),
            })
        }
    };

    match lower.as_str() {
        "if" => {
            arity("3", args.len() == 3)?;
            Ok(common_type(args[1], args[2]))
        }
        "ifnull" | "coalesce" => {
            arity("at least 1", !args.is_empty())?;
            Ok(args[1..].iter().fold(args[0], |acc, t| common_type(acc, *t)))
        }
        "from_unixtime" => {
            arity("1 or 2", matches!(args.len(), 1 | 2))?;
            Ok(ColumnType::Varchar)
        }
        "date_format" => {
            arity("2", args.len() == 2)?;
            Ok(ColumnType::Varchar)
        }
        "str_to_date" => {
            arity("2", args.len() == 2)?;
            Ok(ColumnType::DateTime)
        }
        "unix_timestamp" => {
            arity("0 to 2", args.len() <= 2)?;
            Ok(ColumnType::Int)
        }
        "now" | "current_timestamp" => {
            arity("0", args.is_empty())?;
            Ok(ColumnType::DateTime)
        }
        "concat" => {
            arity("at least 1", !args.is_empty())?;
            Ok(ColumnType::Varchar)
        }
        "upper" | "lower" | "trim" | "ltrim" | "rtrim" | "md5" => {
            arity("1", args.len() == 1)?;
            Ok(ColumnType::Varchar)
        }
        "substr" | "substring" => {
            arity("2 or 3", matches!(args.len(), 2 | 3))?;
            Ok(ColumnType::Varchar)
        }
        "replace" | "lpad" | "rpad" => {
            arity("3", args.len() == 3)?;
            Ok(ColumnType::Varchar)
        }
        "length" => {
            arity("1", args.len() == 1)?;
            Ok(ColumnType::Int)
        }
        "abs" => {
            arity("1", args.len() == 1)?;
            Ok(if args[0].is_numeric() { args[0] } else { ColumnType::Double })
        }
        "floor" | "ceil" => {
            arity("1", args.len() == 1)?;
            Ok(ColumnType::BigInt)
        }
        "round" => {
            arity("1 or 2", matches!(args.len(), 1 | 2))?;
            Ok(ColumnType::Double)
        }
        _ => Err(ExprError::UnknownFunction(name.to_string())),
    }
}

pub fn binary_return_type(op: BinaryOperator, left: ColumnType, right: ColumnType) -> ColumnType {
    if op.is_predicate() {
        return ColumnType::Boolean;
    }
    match op {
        BinaryOperator::Divide => ColumnType::Double,
        _ if is_integral(left) && is_integral(right) => ColumnType::BigInt,
        _ => ColumnType::Double,
    }
}

/// Type both branches of a conditional are coerced to.
pub fn common_type(a: ColumnType, b: ColumnType) -> ColumnType {
    if a == b {
        return a;
    }
    if a.is_string() || b.is_string() {
        return ColumnType::Varchar;
    }
    if a.is_numeric() && b.is_numeric() {
        return if a.is_floating() || b.is_floating() {
            ColumnType::Double
        } else {
            ColumnType::BigInt
        };
    }
    if matches!(a, ColumnType::Date | ColumnType::DateTime)
        && matches!(b, ColumnType::Date | ColumnType::DateTime)
    {
        return ColumnType::DateTime;
    }
    ColumnType::Varchar
}

fn is_integral(t: ColumnType) -> bool {
    t.is_numeric() && !t.is_floating()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_if_takes_branch_type() {
        let t = return_type(
            "IF",
            &[ColumnType::Boolean, ColumnType::Varchar, ColumnType::Varchar],
        )
        .unwrap();
        assert_eq!(t, ColumnType::Varchar);
    }

    #[test]
    fn test_if_arity() {
        let err = return_type("if", &[ColumnType::Boolean]).unwrap_err();
        assert!(matches!(err, ExprError::ArgumentCount { found: 1, .. }));
    }

    #[test]
    fn test_unknown_function() {
        let err = return_type("no_such_fn", &[]).unwrap_err();
        assert_eq!(err, ExprError::UnknownFunction("no_such_fn".to_string()));
    }

    #[test]
    fn test_time_functions() {
        assert_eq!(
            return_type("str_to_date", &[ColumnType::Varchar, ColumnType::Varchar]).unwrap(),
            ColumnType::DateTime
        );
        assert_eq!(
            return_type("from_unixtime", &[ColumnType::Varchar]).unwrap(),
            ColumnType::Varchar
        );
    }

    #[test]
    fn test_arithmetic_types() {
        assert_eq!(
            binary_return_type(BinaryOperator::Plus, ColumnType::Int, ColumnType::BigInt),
            ColumnType::BigInt
        );
        assert_eq!(
            binary_return_type(BinaryOperator::Plus, ColumnType::Varchar, ColumnType::Int),
            ColumnType::Double
        );
        assert_eq!(
            binary_return_type(BinaryOperator::NotEq, ColumnType::Varchar, ColumnType::Int),
            ColumnType::Boolean
        );
    }

    #[test]
    fn test_common_type() {
        assert_eq!(common_type(ColumnType::Int, ColumnType::Varchar), ColumnType::Varchar);
        assert_eq!(common_type(ColumnType::Int, ColumnType::Double), ColumnType::Double);
        assert_eq!(common_type(ColumnType::Date, ColumnType::DateTime), ColumnType::DateTime);
    }
}
