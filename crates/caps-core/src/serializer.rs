//! Canonical serializer — the inverse of the parser.
//!
//! Output is round-trippable: every scalar kind except flags carries an
//! explicit `(typeName)` prefix, doubles always render with a decimal point
//! or exponent so they cannot re-parse as ints, and nested structures/caps
//! are emitted as escaped string payloads that re-enter the same grammar.
//! Reparsing a serialized tree yields an equal tree.

use crate::types::{Caps, Structure, Value};

/// Serialize a value with its explicit type prefix.
pub fn value_to_string(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

/// Like [`value_to_string`], but int/double/boolean/fraction omit their
/// prefix. All other kinds fall back to the prefixed form.
pub fn value_to_string_bare(value: &Value) -> String {
    match value {
        Value::Int(i) => i.to_string(),
        Value::Double(d) => format_double(*d),
        Value::Boolean(b) => bool_str(*b).to_string(),
        Value::Fraction {
            numerator,
            denominator,
        } => format!("{numerator}/{denominator}"),
        other => value_to_string(other),
    }
}

/// Serialize a structure: `name, field=(type)value, …;` in field insertion
/// order, with the trailing `;` terminator.
pub fn structure_to_string(structure: &Structure) -> String {
    let mut out = String::new();
    out.push_str(structure.name());
    for (key, value) in structure.fields() {
        out.push_str(", ");
        out.push_str(key);
        out.push('=');
        write_value(value, &mut out);
    }
    out.push(';');
    out
}

/// Serialize a caps set: `ANY`, `EMPTY`, or `; `-joined entries. An entry
/// with no features omits the parentheses entirely. No trailing `;`.
pub fn caps_to_string(caps: &Caps) -> String {
    let entries = match caps {
        Caps::Any => return "ANY".to_string(),
        Caps::Empty => return "EMPTY".to_string(),
        Caps::Structures(entries) if entries.is_empty() => return "EMPTY".to_string(),
        Caps::Structures(entries) => entries,
    };
    let mut out = String::new();
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            out.push_str("; ");
        }
        out.push_str(entry.structure().name());
        if !entry.features().is_empty() {
            out.push('(');
            out.push_str(&entry.features().join(", "));
            out.push(')');
        }
        for (key, value) in entry.structure().fields() {
            out.push_str(", ");
            out.push_str(key);
            out.push('=');
            write_value(value, &mut out);
        }
    }
    out
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Int(i) => {
            out.push_str("(int)");
            out.push_str(&i.to_string());
        }
        Value::Double(d) => {
            out.push_str("(double)");
            out.push_str(&format_double(*d));
        }
        Value::String(s) => {
            out.push_str("(string)");
            write_quoted(s, out);
        }
        Value::Boolean(b) => {
            out.push_str("(boolean)");
            out.push_str(bool_str(*b));
        }
        Value::Fraction {
            numerator,
            denominator,
        } => {
            out.push_str("(fraction)");
            out.push_str(&format!("{numerator}/{denominator}"));
        }
        Value::Bitmask(bits) => {
            out.push_str(&format!("(bitmask)0x{bits:016x}"));
        }
        Value::Flags(flags) => {
            out.push_str(&flags.join("+"));
        }
        Value::List(items) => write_seq(items, '{', '}', out),
        Value::Array(items) => write_seq(items, '<', '>', out),
        Value::Range { min, max, step } => {
            out.push_str("[ ");
            write_value(min, out);
            out.push_str(", ");
            write_value(max, out);
            if let Some(step) = step {
                out.push_str(", ");
                write_value(step, out);
            }
            out.push_str(" ]");
        }
        Value::Structure(s) => {
            out.push_str("(GstStructure)");
            write_quoted(&structure_to_string(s), out);
        }
        Value::Caps(c) => {
            out.push_str("(GstCaps)");
            write_quoted(&caps_to_string(c), out);
        }
        Value::Typed { type_name, value } => {
            out.push('(');
            out.push_str(type_name);
            out.push(')');
            write_typed_payload(value, out);
        }
    }
}

/// The payload after an unrecognized tag renders without a second prefix:
/// scalars in their bare form, strings as a bare quoted literal, bracketed
/// kinds in their bracketed form. Reparsing re-wraps it under the same tag.
fn write_typed_payload(value: &Value, out: &mut String) {
    match value {
        Value::Int(i) => out.push_str(&i.to_string()),
        Value::Double(d) => out.push_str(&format_double(*d)),
        Value::Boolean(b) => out.push_str(bool_str(*b)),
        Value::Fraction {
            numerator,
            denominator,
        } => out.push_str(&format!("{numerator}/{denominator}")),
        Value::String(s) => write_quoted(s, out),
        other => write_value(other, out),
    }
}

fn write_seq(items: &[Value], open: char, close: char, out: &mut String) {
    if items.is_empty() {
        out.push(open);
        out.push(' ');
        out.push(close);
        return;
    }
    out.push(open);
    out.push(' ');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_value(item, out);
    }
    out.push(' ');
    out.push(close);
}

/// Render a double so it can never re-parse as an int: append `.0` when the
/// default rendering has neither a decimal point nor an exponent.
/// Non-finite values render as-is (`inf`, `NaN` re-parse as doubles via the
/// float coercion path).
pub(crate) fn format_double(d: f64) -> String {
    let s = d.to_string();
    if !d.is_finite() || s.contains('.') || s.contains('e') || s.contains('E') {
        s
    } else {
        format!("{s}.0")
    }
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

/// Escape table for quoted payloads: backslash, double quote, newline, tab,
/// carriage return only.
fn write_quoted(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
}
