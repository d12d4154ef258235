//! The caps/structure data model.
//!
//! Everything a parse produces lives here: [`Value`] (the typed field value
//! tree), [`Structure`] (a named, ordered field collection), [`CapsEntry`]
//! (a structure plus its capability features) and [`Caps`] (the `ANY` /
//! `EMPTY` sentinels or a list of entries).
//!
//! Field maps are `Vec<(String, Value)>` rather than a hash map so insertion
//! order is preserved without depending on `IndexMap` — order is significant
//! for serialization. Keys stay unique: inserting an existing key replaces
//! the value in place (last-write-wins), keeping the original position.
//!
//! All types are plain immutable data: construction goes through builders or
//! the parser, transformations produce new trees, and finished trees are
//! safe to share read-only across threads.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::parser;
use crate::serializer;

/// A typed field value.
///
/// A closed sum over every kind the text format can express. `List` and
/// `Array` are semantically identical sequences distinguished only by their
/// serialized delimiters (`{ }` vs `< >`). `Typed` preserves an explicit
/// type tag the coercion table does not recognize, so unknown tags
/// round-trip verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Double(f64),
    String(String),
    Boolean(bool),
    /// An exact numerator/denominator pair, distinct from `Double`.
    /// Both components are non-negative in the text grammar.
    Fraction { numerator: u64, denominator: u64 },
    /// A wide unsigned integer distinguished from `Int` by its explicit tag.
    Bitmask(u64),
    /// Two or more named bits combined with `+`. Never has fewer than two
    /// members — a single flag-shaped word parses as `String`.
    Flags(Vec<String>),
    List(Vec<Value>),
    Array(Vec<Value>),
    /// An inclusive bound pair with optional step. The bounds are
    /// independently typed; no agreement between them is enforced.
    Range {
        min: Box<Value>,
        max: Box<Value>,
        step: Option<Box<Value>>,
    },
    Structure(Structure),
    Caps(Caps),
    /// An explicit type tag not covered by the coercion table, kept with
    /// its interpreted inner value.
    Typed { type_name: String, value: Box<Value> },
}

impl Value {
    /// Short name of the variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Fraction { .. } => "fraction",
            Value::Bitmask(_) => "bitmask",
            Value::Flags(_) => "flags",
            Value::List(_) => "list",
            Value::Array(_) => "array",
            Value::Range { .. } => "range",
            Value::Structure(_) => "structure",
            Value::Caps(_) => "caps",
            Value::Typed { .. } => "typed",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// `(numerator, denominator)` if this is a fraction.
    pub fn as_fraction(&self) -> Option<(u64, u64)> {
        match self {
            Value::Fraction {
                numerator,
                denominator,
            } => Some((*numerator, *denominator)),
            _ => None,
        }
    }

    pub fn as_flags(&self) -> Option<&[String]> {
        match self {
            Value::Flags(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_structure(&self) -> Option<&Structure> {
        match self {
            Value::Structure(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_caps(&self) -> Option<&Caps> {
        match self {
            Value::Caps(c) => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&serializer::value_to_string(self))
    }
}

/// A named, ordered collection of typed fields.
///
/// The name must start with a letter or underscore (e.g. `video/x-raw`).
/// Fields keep their insertion order; keys are unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    name: String,
    fields: Vec<(String, Value)>,
}

impl Structure {
    /// Create an empty structure with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Builder: add or replace a field, returning the updated structure.
    ///
    /// Replacement is last-write-wins and keeps the first occurrence's
    /// position in the field order.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.set(key.into(), value);
        self
    }

    /// Insert or replace a field. Used by the parser while a structure is
    /// under construction; the public surface is `with_field`.
    pub(crate) fn set(&mut self, key: String, value: Value) {
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.fields.push((key, value));
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value of the named field, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Fields in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&serializer::structure_to_string(self))
    }
}

impl FromStr for Structure {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parser::parse_structure(s)
    }
}

/// One entry of a caps set: a structure plus its capability features.
///
/// A feature is a string tag qualifying how the structure's data is made
/// available (e.g. `memory:DMABuf`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapsEntry {
    structure: Structure,
    features: Vec<String>,
}

impl CapsEntry {
    pub fn new(structure: Structure, features: Vec<String>) -> Self {
        Self {
            structure,
            features,
        }
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }
}

/// A capability set: match-everything, match-nothing, or a list of entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Caps {
    /// Matches everything (`ANY`).
    Any,
    /// Matches nothing (`EMPTY` / `NONE`).
    Empty,
    Structures(Vec<CapsEntry>),
}

impl Caps {
    pub fn is_any(&self) -> bool {
        matches!(self, Caps::Any)
    }

    /// True for the `EMPTY` sentinel and for an entry list with no entries.
    pub fn is_empty(&self) -> bool {
        match self {
            Caps::Empty => true,
            Caps::Structures(entries) => entries.is_empty(),
            Caps::Any => false,
        }
    }

    /// The entries of this caps set; empty for both sentinels.
    pub fn entries(&self) -> &[CapsEntry] {
        match self {
            Caps::Structures(entries) => entries,
            _ => &[],
        }
    }

    /// The entry at `index`, if any.
    pub fn at(&self, index: usize) -> Option<&CapsEntry> {
        self.entries().get(index)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }
}

impl fmt::Display for Caps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&serializer::caps_to_string(self))
    }
}

impl FromStr for Caps {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parser::parse_caps(s)
    }
}
