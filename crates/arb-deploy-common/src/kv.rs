//! ---
//! arb_section: "01-core-functionality"
//! arb_subsection: "module"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Shared primitives and utilities for the bootstrap tooling."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
//! Parser for the shell-style `KEY=VALUE` files found on hosts: `.env`
//! secrets files and `/etc/os-release`.

use indexmap::IndexMap;

/// Parse `KEY=VALUE` assignments, preserving first-seen key order.
///
/// Blank lines and `#` comments are skipped, an `export ` prefix is accepted,
/// and values wrapped in matching single or double quotes are unquoted. A
/// later assignment of the same key replaces the earlier value. Lines that are
/// not assignments are ignored.
pub fn parse_assignments(content: &str) -> IndexMap<String, String> {
    let mut values = IndexMap::new();
    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            continue;
        }
        values.insert(key.to_owned(), unquote(value.trim()).to_owned());
    }
    values
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(rest) = value.strip_prefix(quote) {
            if let Some(end) = rest.find(quote) {
                return &rest[..end];
            }
        }
    }
    match value.find(" #") {
        Some(idx) => value[..idx].trim_end(),
        None => value,
    }
}
