//! Human-readable rendering of a broker scan node.

use brokerscan_core::{BrokerDesc, BrokerTable};

/// `TABLE`/`PATH` lines for an external-table read, then the broker name.
/// One line each, every line starting with `prefix`.
pub fn render_explain(prefix: &str, external: Option<&BrokerTable>, broker: &BrokerDesc) -> String {
    let mut out = String::new();
    if let Some(table) = external {
        out.push_str(&format!("{}TABLE: {}\n", prefix, table.name()));
        out.push_str(&format!("{}PATH: {}\n", prefix, table.paths.join(",")));
    }
    if !broker.name.is_empty() {
        out.push_str(&format!("{}BROKER: {}\n", prefix, broker.name));
    }
    out
}
