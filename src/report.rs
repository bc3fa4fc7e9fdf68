use crate::rule::{RuleSnapshot, ANY};
use std::fmt::Write;

/// Which fields a rule report carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Listing and lookup output.
    Reader,
    /// Edit output; adds the Protocol line.
    Editor,
}

pub fn format(rule: &RuleSnapshot, layout: Layout) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "[Rule] {}", rule.name);
    let _ = writeln!(out, "  Description: {}", rule.description);
    let _ = writeln!(out, "  Application: {}", rule.application);
    let _ = writeln!(out, "  Local Ports: {}", or_any(&rule.local_ports));
    let _ = writeln!(out, "  Remote Addresses: {}", or_any(&rule.remote_addresses));
    if layout == Layout::Editor {
        let _ = writeln!(out, "  Protocol: {}", rule.protocol);
    }
    let _ = writeln!(out, "  Action: {}", rule.action);
    let _ = writeln!(out, "  Direction: {}", rule.direction);
    let _ = writeln!(
        out,
        "  Enabled: {}",
        if rule.enabled { "Yes" } else { "No" }
    );
    out
}

pub fn format_json(rules: &[RuleSnapshot]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(rules)
}

fn or_any(value: &str) -> &str {
    if value.is_empty() {
        ANY
    } else {
        value
    }
}
