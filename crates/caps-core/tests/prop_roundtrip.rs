//! Property-based roundtrip tests.
//!
//! Uses the `proptest` crate to generate random Value/Structure/Caps trees
//! and verify that the canonical serialization reparses to an equal tree.
//! This catches edge cases hand-written tests miss.
//!
//! Strategies generate:
//! - Random scalars of every kind (ints across the full i64 range, finite
//!   doubles, printable-ASCII strings including quotes and backslashes,
//!   fractions, bitmasks, flag sets)
//! - Unknown-tag typed values (tags prefixed `x` so they can never collide
//!   with a coercion-table alias)
//! - Recursive containers (lists, arrays, ranges, nested structures) up to
//!   a few levels deep
//! - Caps with sentinels, features, and multiple entries
//!
//! Known exclusions: non-finite doubles (NaN breaks tree equality) and
//! empty `Caps::Structures` (canonically serialized as the EMPTY sentinel).

use caps_core::{
    caps_to_string, parse_caps, parse_caps_opt, parse_structure, parse_structure_opt,
    structure_to_string, Caps, CapsEntry, Structure, Value,
};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn arb_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9/_.-]{0,12}"
}

fn arb_field_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,10}"
}

fn arb_feature() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,6}:[A-Za-z][A-Za-z0-9]{0,10}"
}

fn arb_flag() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,8}"
}

/// String payloads, weighted toward the cases that stress quoting: content
/// that looks like other kinds, embedded quotes/backslashes, escapes.
fn arb_string_content() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[ -~]{0,20}",
        1 => Just(String::new()),
        1 => Just("true".to_string()),
        1 => Just("5".to_string()),
        1 => Just("30/1".to_string()),
        1 => Just("say \"hi\"".to_string()),
        1 => Just("c:\\dir".to_string()),
        1 => Just("line1\nline2\tend".to_string()),
    ]
}

fn arb_fraction() -> impl Strategy<Value = Value> {
    (0u64..1_000_000u64, 1u64..1_000_000u64).prop_map(|(numerator, denominator)| {
        Value::Fraction {
            numerator,
            denominator,
        }
    })
}

fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::Int),
        (-1.0e12..1.0e12f64).prop_map(Value::Double),
        arb_string_content().prop_map(Value::String),
        any::<bool>().prop_map(Value::Boolean),
        arb_fraction(),
        any::<u64>().prop_map(Value::Bitmask),
        prop::collection::vec(arb_flag(), 2..5).prop_map(Value::Flags),
    ]
}

/// Unknown-tag typed values. The payload is restricted to the kinds the
/// parser can actually produce under an unrecognized tag.
fn arb_typed() -> impl Strategy<Value = Value> {
    let payload = prop_oneof![
        any::<i64>().prop_map(Value::Int),
        (-1.0e6..1.0e6f64).prop_map(Value::Double),
        arb_string_content().prop_map(Value::String),
        any::<bool>().prop_map(Value::Boolean),
        arb_fraction(),
    ];
    ("x[a-z0-9]{0,8}", payload).prop_map(|(type_name, value)| Value::Typed {
        type_name,
        value: Box::new(value),
    })
}

/// A caps value with scalar-only entries, for nesting inside `Value`.
fn arb_simple_caps() -> impl Strategy<Value = Caps> {
    prop_oneof![
        1 => Just(Caps::Any),
        1 => Just(Caps::Empty),
        3 => prop::collection::vec(arb_entry(), 1..3).prop_map(Caps::Structures),
    ]
}

fn arb_flat_structure() -> impl Strategy<Value = Structure> {
    (
        arb_name(),
        prop::collection::vec((arb_field_name(), arb_scalar()), 0..4),
    )
        .prop_map(|(name, fields)| {
            fields
                .into_iter()
                .fold(Structure::new(name), |s, (k, v)| s.with_field(k, v))
        })
}

fn arb_entry() -> impl Strategy<Value = CapsEntry> {
    (arb_flat_structure(), prop::collection::vec(arb_feature(), 0..3))
        .prop_map(|(structure, features)| CapsEntry::new(structure, features))
}

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        6 => arb_scalar(),
        1 => arb_typed(),
        1 => arb_simple_caps().prop_map(Value::Caps),
    ];
    leaf.prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            (inner.clone(), inner.clone(), prop::option::of(inner.clone())).prop_map(
                |(min, max, step)| Value::Range {
                    min: Box::new(min),
                    max: Box::new(max),
                    step: step.map(Box::new),
                }
            ),
            (
                arb_name(),
                prop::collection::vec((arb_field_name(), inner.clone()), 0..3)
            )
                .prop_map(|(name, fields)| {
                    Value::Structure(
                        fields
                            .into_iter()
                            .fold(Structure::new(name), |s, (k, v)| s.with_field(k, v)),
                    )
                }),
        ]
    })
}

fn arb_structure() -> impl Strategy<Value = Structure> {
    (
        arb_name(),
        prop::collection::vec((arb_field_name(), arb_value()), 0..5),
    )
        .prop_map(|(name, fields)| {
            fields
                .into_iter()
                .fold(Structure::new(name), |s, (k, v)| s.with_field(k, v))
        })
}

fn arb_caps() -> impl Strategy<Value = Caps> {
    prop_oneof![
        1 => Just(Caps::Any),
        1 => Just(Caps::Empty),
        6 => prop::collection::vec(arb_entry(), 1..4).prop_map(Caps::Structures),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn value_roundtrips_through_structure_field(v in arb_value()) {
        let s = Structure::new("t").with_field("f", v);
        let text = structure_to_string(&s);
        let reparsed = parse_structure(&text).expect("reparse failed");
        prop_assert_eq!(&s, &reparsed, "serialized: {}", text);
    }

    #[test]
    fn structure_roundtrips(s in arb_structure()) {
        let text = structure_to_string(&s);
        let reparsed = parse_structure(&text).expect("reparse failed");
        prop_assert_eq!(&s, &reparsed, "serialized: {}", text);
    }

    #[test]
    fn caps_roundtrip(caps in arb_caps()) {
        let text = caps_to_string(&caps);
        let reparsed = parse_caps(&text).expect("reparse failed");
        prop_assert_eq!(&caps, &reparsed, "serialized: {}", text);
    }

    #[test]
    fn serialization_is_a_fixed_point(s in arb_structure()) {
        let once = structure_to_string(&s);
        let twice = structure_to_string(&parse_structure(&once).expect("reparse failed"));
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn parser_never_panics(input in "\\PC{0,40}") {
        let _ = parse_structure_opt(&input);
        let _ = parse_caps_opt(&input);
    }
}
