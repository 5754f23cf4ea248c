//! Type-name-driven value normalization.
//!
//! Vendor type names are not standardized across engines, so both column
//! metadata and cell values normalize through the raw type name string.
//! Value rules are an ordered table of (predicate, transform) pairs;
//! vendor-specific rules can be appended without touching the dispatch.

use crate::db::Value;

/// Normalizes a vendor type name for column metadata: upper-cased and
/// truncated at the first space, dropping qualifiers like "UNSIGNED".
pub fn normalize_type_name(raw: &str) -> String {
    let upper = raw.to_uppercase();
    match upper.find(' ') {
        Some(index) if index > 0 => upper[..index].to_string(),
        _ => upper,
    }
}

/// One normalization rule: applies `transform` to non-null values of any
/// type whose vendor name satisfies `matches`.
struct ValueRule {
    matches: fn(&str) -> bool,
    transform: fn(Value) -> Value,
}

const RULES: &[ValueRule] = &[
    ValueRule {
        matches: is_binary_type,
        transform: bytes_to_text,
    },
    ValueRule {
        matches: is_geometry_type,
        transform: to_textual,
    },
];

/// Normalizes one cell value by its column's vendor type name.
///
/// The first matching rule wins; null always passes through; unmatched
/// types pass the raw driver value through unchanged.
pub fn normalize_value(vendor_type: &str, value: Value) -> Value {
    for rule in RULES {
        if (rule.matches)(vendor_type) {
            if value.is_null() {
                return value;
            }
            return (rule.transform)(value);
        }
    }
    value
}

/// True for BINARY/BLOB variants, any case. Not exhaustive; extended as
/// vendors surface new spellings.
fn is_binary_type(vendor_type: &str) -> bool {
    let upper = vendor_type.to_uppercase();
    upper.contains("BINARY") || upper.contains("BLOB")
}

fn is_geometry_type(vendor_type: &str) -> bool {
    vendor_type.to_uppercase().contains("GEOMETRY")
}

/// Decodes raw bytes as text. Non-byte values are already text-shaped and
/// pass through.
fn bytes_to_text(value: Value) -> Value {
    match value {
        Value::Bytes(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        other => other,
    }
}

/// Converts a value to its textual representation.
fn to_textual(value: Value) -> Value {
    Value::String(value.to_display_string())
}
