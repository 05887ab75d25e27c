//! Binding a load clause described in JSON, the way the CLI receives it.

use brokerscan_core::{ColumnRef, ColumnType, DescriptorTable, Expr, FileGroup, TableSchema};
use brokerscan_transform::{RowSchemaBinder, TransformError};

fn table() -> TableSchema {
    serde_json::from_str(
        r#"{
            "name": "page_views",
            "columns": [
                {"name": "site", "column_type": "varchar"},
                {"name": "hour_ts", "column_type": "int"},
                {"name": "day", "column_type": "varchar", "nullable": true},
                {"name": "visits", "column_type": "big_int", "default_value": "0"}
            ]
        }"#,
    )
    .unwrap()
}

fn group(json: &str) -> FileGroup {
    serde_json::from_str(json).unwrap()
}

#[test]
fn binds_legacy_load_clause() {
    let table = table();
    let mut descs = DescriptorTable::new();
    let dest = descs.create_table_tuple(&table);

    let group = group(
        r#"{
            "file_paths": ["/logs/2024-01-01/*"],
            "value_names": ["site", "ts", "raw_day"],
            "expr_column_map": {
                "hour_ts": {"function": {"name": "alignment_timestamp", "args": [
                    {"literal": {"string": "hour"}},
                    {"column": {"named": "ts"}}
                ]}},
                "day": {"function": {"name": "time_format", "args": [
                    {"literal": {"string": "%Y-%m-%d"}},
                    {"literal": {"string": "%Y%m%d"}},
                    {"column": {"named": "raw_day"}}
                ]}}
            },
            "column_separator": ","
        }"#,
    );
    assert_eq!(group.column_separator_byte(), Some(b','));
    assert_eq!(group.line_delimiter_byte(), Some(b'\n'));

    let plan = RowSchemaBinder::new(&table, dest)
        .bind(&group, &mut descs)
        .unwrap();
    assert_eq!(plan.src_slot_ids.len(), 3);
    assert_eq!(plan.expr_of_dest_slot.len(), 4);

    let dest_desc = descs.tuple(dest).unwrap();
    let by_name = |name: &str| {
        let id = dest_desc.slots.iter().find(|s| s.name == name).unwrap().id;
        plan.expr_of_dest_slot[&id].clone()
    };

    // unix_timestamp already yields INT.
    assert_eq!(by_name("hour_ts").function_name(), Some("unix_timestamp"));
    assert_eq!(by_name("day").function_name(), Some("date_format"));
    assert_eq!(
        by_name("visits"),
        Expr::cast(Expr::lit_str("0"), ColumnType::BigInt)
    );
    assert!(matches!(by_name("site"), Expr::Column(ColumnRef::Slot { .. })));

    let staging = descs.tuple(plan.src_tuple_id).unwrap();
    assert!(staging.layout.is_some());
    assert_eq!(staging.arrow_schema().fields().len(), 3);
}

#[test]
fn mapping_to_unknown_column_fails() {
    let table = table();
    let mut descs = DescriptorTable::new();
    let dest = descs.create_table_tuple(&table);

    let group = group(
        r#"{
            "file_paths": ["/logs/*"],
            "expr_column_map": {"country": {"column": {"named": "site"}}}
        }"#,
    );

    let err = RowSchemaBinder::new(&table, dest)
        .bind(&group, &mut descs)
        .unwrap_err();
    assert_eq!(
        err,
        TransformError::UnknownColumn {
            column: "country".into()
        }
    );
    assert!(err.to_string().contains("country"));
}
