//! # caps-core
//!
//! Pure-Rust parser and canonical serializer for the **GStreamer
//! caps/structure text format** — without depending on GStreamer itself.
//!
//! A *structure* is a named collection of typed key/value fields
//! (`video/x-raw, width=(int)320`); *caps* are a `;`-separated set of such
//! structures, each optionally tagged with capability features
//! (`video/x-raw(memory:DMABuf), …`), plus the sentinels `ANY` and
//! `EMPTY`/`NONE`. Unquoted values get their types inferred (`30/1` is a
//! fraction, `flush+accurate` is flags, `0xFF` is an int); explicit
//! `(typeName)` tags coerce through a fixed table; structures and caps can
//! nest inside string payloads of the same grammar.
//!
//! ## Quick start
//!
//! ```rust
//! use caps_core::{parse_caps, parse_structure, structure_to_string, Value};
//!
//! let s = parse_structure("video/x-raw, width=320, format=I420").unwrap();
//! assert_eq!(s.name(), "video/x-raw");
//! assert_eq!(s.get("width"), Some(&Value::Int(320)));
//!
//! // Canonical, round-trippable serialization
//! assert_eq!(
//!     structure_to_string(&s),
//!     "video/x-raw, width=(int)320, format=(string)\"I420\";"
//! );
//!
//! let caps = parse_caps("video/x-raw(memory:DMABuf), format=NV12").unwrap();
//! assert_eq!(caps.at(0).unwrap().features()[0], "memory:DMABuf");
//! ```
//!
//! ## Modules
//!
//! - [`parser`] — text → [`Structure`] / [`Caps`]
//! - [`serializer`] — [`Value`] / [`Structure`] / [`Caps`] → canonical text
//! - [`types`] — the typed value model
//! - [`error`] — position-carrying parse failure

pub mod error;
pub mod parser;
pub mod serializer;
pub mod types;

pub use error::ParseError;
pub use parser::{parse_caps, parse_caps_opt, parse_structure, parse_structure_opt};
pub use serializer::{caps_to_string, structure_to_string, value_to_string, value_to_string_bare};
pub use types::{Caps, CapsEntry, Structure, Value};
