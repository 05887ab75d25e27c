//! Rewrites deprecated load functions into current builtins.
//!
//! Only a top-level call on a column mapping is rewritten; nested calls
//! pass through untouched. Function names match case-insensitively.
//!
//! | legacy call | rewritten to |
//! |---|---|
//! | `replace_value(old[, new])` | `if(col != old, col, new)` |
//! | `strftime(fmt, ts)` | `from_unixtime(ts)` |
//! | `time_format(out, in, v)` | `date_format(str_to_date(v, in), out)` |
//! | `alignment_timestamp(p, ts)` | `unix_timestamp(date_format(from_unixtime(ts), <p format>))` |
//! | `default_value(e)` | `e` |

use std::collections::BTreeMap;

use brokerscan_core::{BinaryOperator, Column, ColumnType, Expr, ScalarValue, TableSchema};
use tracing::debug;

use crate::error::TransformError;

const LEGACY_FUNCTIONS: [&str; 5] = [
    "replace_value",
    "strftime",
    "time_format",
    "alignment_timestamp",
    "default_value",
];

pub fn is_legacy_function(name: &str) -> bool {
    LEGACY_FUNCTIONS
        .iter()
        .any(|legacy| legacy.eq_ignore_ascii_case(name))
}

/// Rewrite every entry of a column -> expression map into a new map.
///
/// Each key must name a column of `table`.
pub fn rewrite_legacy_exprs(
    exprs: &BTreeMap<String, Expr>,
    table: &TableSchema,
) -> Result<BTreeMap<String, Expr>, TransformError> {
    exprs
        .iter()
        .map(|(name, expr)| {
            let column = table
                .column(name)
                .ok_or_else(|| TransformError::UnknownColumn {
                    column: name.clone(),
                })?;
            Ok((name.clone(), rewrite_legacy_expr(column, expr)?))
        })
        .collect()
}

/// Rewrite one mapping for `column`. Non-legacy expressions are returned
/// unchanged.
pub fn rewrite_legacy_expr(column: &Column, expr: &Expr) -> Result<Expr, TransformError> {
    let Expr::Function { name, args } = expr else {
        return Ok(expr.clone());
    };
    let lower = name.to_ascii_lowercase();

    let rewritten = match lower.as_str() {
        "replace_value" => {
            expect_args(&lower, args, 1..=2)?;
            let fallback = match args.get(1) {
                Some(new_value) => new_value.clone(),
                None => fallback_value(column)?,
            };
            let current = Expr::col(column.name.clone());
            Expr::call(
                "if",
                vec![
                    Expr::binary(BinaryOperator::NotEq, current.clone(), args[0].clone()),
                    current,
                    fallback,
                ],
            )
        }
        // The format argument is ignored; from_unixtime renders its default.
        "strftime" => {
            expect_args(&lower, args, 2..=2)?;
            Expr::call("from_unixtime", vec![args[1].clone()])
        }
        "time_format" => {
            expect_args(&lower, args, 3..=3)?;
            let parsed = Expr::call("str_to_date", vec![args[2].clone(), args[1].clone()]);
            Expr::call("date_format", vec![parsed, args[0].clone()])
        }
        "alignment_timestamp" => {
            expect_args(&lower, args, 2..=2)?;
            let format = alignment_format(&lower, &args[0])?;
            let rendered = Expr::call(
                "date_format",
                vec![
                    Expr::call("from_unixtime", vec![args[1].clone()]),
                    Expr::lit_str(format),
                ],
            );
            Expr::call("unix_timestamp", vec![rendered])
        }
        "default_value" => {
            expect_args(&lower, args, 1..=1)?;
            // The unwrapped value may itself be a legacy call.
            rewrite_legacy_expr(column, &args[0])?
        }
        _ => return Ok(expr.clone()),
    };

    debug!("Rewrote legacy {} on column {}: {}", lower, column.name, rewritten);
    Ok(rewritten)
}

fn expect_args(
    function: &str,
    args: &[Expr],
    range: std::ops::RangeInclusive<usize>,
) -> Result<(), TransformError> {
    if range.contains(&args.len()) {
        return Ok(());
    }
    let expected = if range.start() == range.end() {
        range.start().to_string()
    } else {
        format!("{} to {}", range.start(), range.end())
    };
    Err(TransformError::InvalidArgument {
        function: function.to_string(),
        message: format!("expected {} argument(s), got {}", expected, args.len()),
    })
}

/// Value substituted by `replace_value` when no replacement is given.
fn fallback_value(column: &Column) -> Result<Expr, TransformError> {
    if let Some(default) = &column.default_value {
        Ok(Expr::lit_str(default.clone()))
    } else if column.nullable {
        Ok(Expr::null(ColumnType::Varchar))
    } else {
        Err(TransformError::MissingDefault {
            column: column.name.clone(),
        })
    }
}

fn alignment_format(function: &str, precision: &Expr) -> Result<&'static str, TransformError> {
    let Expr::Literal(ScalarValue::String(precision)) = precision else {
        return Err(TransformError::InvalidArgument {
            function: function.to_string(),
            message: format!("precision must be a string literal, got {}", precision),
        });
    };
    match precision.to_ascii_lowercase().as_str() {
        "year" => Ok("%Y-01-01 00:00:00"),
        "month" => Ok("%Y-%m-01 00:00:00"),
        "day" => Ok("%Y-%m-%d 00:00:00"),
        "hour" => Ok("%Y-%m-%d %H:00:00"),
        _ => Err(TransformError::UnknownPrecision {
            precision: precision.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TableSchema {
        TableSchema::new(
            "orders",
            vec![
                Column::new("id", ColumnType::BigInt),
                Column::new("status", ColumnType::Varchar).nullable(),
                Column::new("region", ColumnType::Varchar).with_default("unknown"),
                Column::new("code", ColumnType::Varchar),
                Column::new("ts", ColumnType::Int),
            ],
        )
    }

    fn rewrite_one(column: &str, expr: Expr) -> Result<Expr, TransformError> {
        let mut map = BTreeMap::new();
        map.insert(column.to_string(), expr);
        rewrite_legacy_exprs(&map, &table()).map(|mut m| m.remove(column).unwrap())
    }

    #[test]
    fn test_replace_value_on_nullable_column_falls_back_to_null() {
        let out = rewrite_one("status", Expr::call("replace_value", vec![Expr::lit_str("x")])).unwrap();
        assert_eq!(
            out,
            Expr::call(
                "if",
                vec![
                    Expr::binary(BinaryOperator::NotEq, Expr::col("status"), Expr::lit_str("x")),
                    Expr::col("status"),
                    Expr::null(ColumnType::Varchar),
                ],
            )
        );
    }

    #[test]
    fn test_replace_value_uses_default_then_explicit_value() {
        let out = rewrite_one("region", Expr::call("REPLACE_VALUE", vec![Expr::lit_str("")])).unwrap();
        assert_eq!(out.to_string(), "if((`region` != ''), `region`, 'unknown')");

        let out = rewrite_one(
            "code",
            Expr::call("replace_value", vec![Expr::lit_str("-"), Expr::lit_str("n/a")]),
        )
        .unwrap();
        assert_eq!(out.to_string(), "if((`code` != '-'), `code`, 'n/a')");
    }

    #[test]
    fn test_replace_value_without_fallback_fails() {
        let err = rewrite_one("code", Expr::call("replace_value", vec![Expr::lit_str("x")])).unwrap_err();
        assert_eq!(
            err,
            TransformError::MissingDefault {
                column: "code".into()
            }
        );
    }

    #[test]
    fn test_strftime_drops_format() {
        let out = rewrite_one(
            "code",
            Expr::call("strftime", vec![Expr::lit_str("%Y"), Expr::col("raw_ts")]),
        )
        .unwrap();
        assert_eq!(out, Expr::call("from_unixtime", vec![Expr::col("raw_ts")]));
    }

    #[test]
    fn test_time_format() {
        let out = rewrite_one(
            "code",
            Expr::call(
                "time_format",
                vec![
                    Expr::lit_str("%Y-%m-%d"),
                    Expr::lit_str("%d/%m/%Y"),
                    Expr::col("raw"),
                ],
            ),
        )
        .unwrap();
        assert_eq!(
            out.to_string(),
            "date_format(str_to_date(`raw`, '%d/%m/%Y'), '%Y-%m-%d')"
        );
    }

    #[test]
    fn test_alignment_timestamp_precisions() {
        for (precision, format) in [
            ("year", "%Y-01-01 00:00:00"),
            ("Month", "%Y-%m-01 00:00:00"),
            ("day", "%Y-%m-%d 00:00:00"),
            ("HOUR", "%Y-%m-%d %H:00:00"),
        ] {
            let out = rewrite_one(
                "ts",
                Expr::call(
                    "alignment_timestamp",
                    vec![Expr::lit_str(precision), Expr::col("raw_ts")],
                ),
            )
            .unwrap();
            assert_eq!(
                out.to_string(),
                format!("unix_timestamp(date_format(from_unixtime(`raw_ts`), '{}'))", format)
            );
        }
    }

    #[test]
    fn test_alignment_timestamp_rejects_unknown_precision() {
        let err = rewrite_one(
            "ts",
            Expr::call(
                "alignment_timestamp",
                vec![Expr::lit_str("minute"), Expr::col("raw_ts")],
            ),
        )
        .unwrap_err();
        assert_eq!(
            err,
            TransformError::UnknownPrecision {
                precision: "minute".into()
            }
        );

        let err = rewrite_one(
            "ts",
            Expr::call("alignment_timestamp", vec![Expr::col("p"), Expr::col("raw_ts")]),
        )
        .unwrap_err();
        assert!(matches!(err, TransformError::InvalidArgument { .. }));
    }

    #[test]
    fn test_default_value_unwraps() {
        let out = rewrite_one("code", Expr::call("default_value", vec![Expr::lit_str("a")])).unwrap();
        assert_eq!(out, Expr::lit_str("a"));
    }

    #[test]
    fn test_wrong_arity_is_invalid_argument() {
        let err = rewrite_one("code", Expr::call("strftime", vec![Expr::col("raw")])).unwrap_err();
        assert_eq!(
            err,
            TransformError::InvalidArgument {
                function: "strftime".into(),
                message: "expected 2 argument(s), got 1".into(),
            }
        );
    }

    #[test]
    fn test_unknown_column_rejected() {
        let err = rewrite_one("missing", Expr::col("a")).unwrap_err();
        assert_eq!(
            err,
            TransformError::UnknownColumn {
                column: "missing".into()
            }
        );
    }

    #[test]
    fn test_current_vocabulary_passes_through() {
        let expr = Expr::call("upper", vec![Expr::call("strftime", vec![Expr::col("a"), Expr::col("b")])]);
        assert_eq!(rewrite_one("code", expr.clone()).unwrap(), expr);
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let mut map = BTreeMap::new();
        map.insert(
            "status".to_string(),
            Expr::call("replace_value", vec![Expr::lit_str("x")]),
        );
        map.insert(
            "ts".to_string(),
            Expr::call(
                "alignment_timestamp",
                vec![Expr::lit_str("day"), Expr::col("raw_ts")],
            ),
        );
        map.insert(
            "code".to_string(),
            Expr::call(
                "default_value",
                vec![Expr::call("strftime", vec![Expr::lit_str("%Y"), Expr::col("raw")])],
            ),
        );

        let once = rewrite_legacy_exprs(&map, &table()).unwrap();
        let twice = rewrite_legacy_exprs(&once, &table()).unwrap();
        assert_eq!(once, twice);
        assert!(once
            .values()
            .filter_map(Expr::function_name)
            .all(|name| !is_legacy_function(name)));
    }
}
