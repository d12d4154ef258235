//! Parser for the caps/structure text format.
//!
//! The grammar is parsed in one pass by a position-tracked [`Cursor`] with
//! one-token lookahead and no backtracking. Layers, leaves first:
//!
//! - cursor primitives (`peek`/`bump`/`skip_whitespace`/`try_consume`/
//!   `expect`), the only operations higher layers use
//! - identifier lexers (structure names, field names, type names, feature
//!   names — each with its own character class)
//! - the value parser, dispatching on the leading character: `(` explicit
//!   type tag, `[` range, `{` list, `<` array, `"` quoted string, anything
//!   else an unquoted token routed through type inference
//! - the structure and caps grammars on top of the value parser
//!
//! # Key design decisions
//!
//! - **Inference order is load-bearing**: hex → int → double → fraction →
//!   flags → boolean → string. `30/1` must become a fraction, not two ints;
//!   `flush+accurate` must become flags before falling through to string.
//! - **Explicit tags coerce, they do not re-lex**: `(int)3.9` parses the
//!   token by inference first and then converts the result, so the coercion
//!   table works on values, not spellings.
//! - **Failed coercions keep the raw value**: a malformed bitmask or nested
//!   caps/structure payload under an explicit tag is retained as parsed
//!   rather than failing the enclosing parse.
//! - **Nesting is depth-limited**: recursion through brackets and through
//!   nested `(GstCaps)`/`(GstStructure)` string payloads counts against one
//!   limit, so adversarial input cannot exhaust the call stack.

use crate::error::{ParseError, Result};
use crate::serializer::format_double;
use crate::types::{Caps, CapsEntry, Structure, Value};

/// Maximum bracket/payload nesting depth accepted before a parse fails.
const MAX_DEPTH: usize = 64;

/// Parse a structure, e.g. `video/x-raw, width=(int)320`.
///
/// The whole input must be consumed: trailing non-whitespace after the
/// structure (or after its optional `;` terminator) is an error.
pub fn parse_structure(input: &str) -> Result<Structure> {
    parse_structure_at(input, 0)
}

/// Non-failing form of [`parse_structure`]: any failure becomes `None`.
pub fn parse_structure_opt(input: &str) -> Option<Structure> {
    parse_structure(input).ok()
}

/// Parse a caps set: `ANY`, `EMPTY`/`NONE`, or `;`-separated entries of
/// `name(features), field=value, …`.
pub fn parse_caps(input: &str) -> Result<Caps> {
    parse_caps_at(input, 0)
}

/// Non-failing form of [`parse_caps`]: any failure becomes `None`.
pub fn parse_caps_opt(input: &str) -> Option<Caps> {
    parse_caps(input).ok()
}

fn parse_structure_at(input: &str, depth: usize) -> Result<Structure> {
    let mut cur = Cursor::new(input);
    cur.skip_whitespace();
    let name = cur.parse_name()?;
    let mut structure = Structure::new(name);
    parse_field_list(&mut cur, &mut structure, depth)?;
    cur.skip_whitespace();
    if !cur.at_end() {
        return Err(cur.error("unexpected trailing characters after structure"));
    }
    Ok(structure)
}

fn parse_caps_at(input: &str, depth: usize) -> Result<Caps> {
    let mut cur = Cursor::new(input);
    cur.skip_whitespace();

    // The sentinels only count when they are the entire remaining text;
    // a structure named e.g. `ANYTHING` must not match.
    let rest = cur.rest().trim_end_matches([' ', '\t', '\r', '\n']);
    if rest == "ANY" {
        return Ok(Caps::Any);
    }
    if rest == "EMPTY" || rest == "NONE" {
        return Ok(Caps::Empty);
    }

    let mut entries = Vec::new();
    loop {
        cur.skip_whitespace();
        let name = cur.parse_name()?;
        cur.skip_whitespace();

        let mut features = Vec::new();
        if cur.try_consume("(") {
            loop {
                cur.skip_whitespace();
                features.push(cur.parse_feature_name()?);
                cur.skip_whitespace();
                if cur.try_consume(")") {
                    break;
                }
                cur.expect(",")?;
            }
        }

        let mut structure = Structure::new(name);
        let semi = parse_field_list(&mut cur, &mut structure, depth)?;
        entries.push(CapsEntry::new(structure, features));

        if !semi {
            break;
        }
        cur.skip_whitespace();
        if cur.at_end() {
            break;
        }
    }

    cur.skip_whitespace();
    if !cur.at_end() {
        return Err(cur.error("unexpected trailing characters after caps"));
    }
    Ok(Caps::Structures(entries))
}

/// Parse the `, field=value` list shared by the structure and caps grammars.
///
/// Stops at `;` (consumed, returns `true`) or at the first character that is
/// not a `,` (not consumed, returns `false`). A trailing comma immediately
/// before `;` or end of input is tolerated. Duplicate field names are
/// last-write-wins.
fn parse_field_list(cur: &mut Cursor<'_>, structure: &mut Structure, depth: usize) -> Result<bool> {
    loop {
        cur.skip_whitespace();
        if cur.try_consume(";") {
            return Ok(true);
        }
        if !cur.peek_is(',') {
            return Ok(false);
        }
        cur.bump();
        cur.skip_whitespace();
        if cur.at_end() {
            return Ok(false);
        }
        if cur.peek_is(';') {
            continue;
        }
        let key = cur.parse_field_name()?;
        cur.skip_whitespace();
        cur.expect("=")?;
        cur.skip_whitespace();
        let value = parse_value(cur, depth)?;
        structure.set(key, value);
    }
}

/// Parse one value. The caller has already skipped leading whitespace.
fn parse_value(cur: &mut Cursor<'_>, depth: usize) -> Result<Value> {
    if depth >= MAX_DEPTH {
        return Err(cur.error("maximum nesting depth exceeded"));
    }
    match cur.peek() {
        Some('(') => parse_typed(cur, depth),
        Some('[') => parse_range(cur, depth),
        Some('{') => Ok(Value::List(parse_seq(cur, depth, "}")?)),
        Some('<') => Ok(Value::Array(parse_seq(cur, depth, ">")?)),
        Some('"') => Ok(Value::String(parse_quoted(cur)?)),
        Some(_) => {
            let token = cur.parse_token()?;
            Ok(infer(token))
        }
        None => Err(cur.error("expected a value")),
    }
}

/// `( typeName )` followed immediately by a value.
///
/// The `(GstCaps)[ … ]` bracket form bypasses the coercion table and always
/// parses its balanced-bracket body as a nested caps grammar instance.
fn parse_typed(cur: &mut Cursor<'_>, depth: usize) -> Result<Value> {
    cur.bump();
    cur.skip_whitespace();
    let type_name = cur.parse_type_name()?;
    cur.skip_whitespace();
    cur.expect(")")?;

    if cur.peek_is('[') && is_caps_alias(&type_name) {
        let (body, body_start) = cur.extract_balanced_brackets()?;
        let caps = parse_caps_at(body, depth + 1)
            .map_err(|e| ParseError::at(cur.input, body_start + e.offset, e.message))?;
        return Ok(Value::Caps(caps));
    }

    let raw = parse_tagged_payload(cur, depth)?;
    Ok(coerce(&type_name, raw, depth))
}

/// The value forms allowed after a type tag: quoted string, range, list,
/// array, or unquoted token — but not another tag.
fn parse_tagged_payload(cur: &mut Cursor<'_>, depth: usize) -> Result<Value> {
    match cur.peek() {
        Some('[') => parse_range(cur, depth),
        Some('{') => Ok(Value::List(parse_seq(cur, depth, "}")?)),
        Some('<') => Ok(Value::Array(parse_seq(cur, depth, ">")?)),
        Some('"') => Ok(Value::String(parse_quoted(cur)?)),
        Some(_) => {
            let token = cur.parse_token()?;
            Ok(infer(token))
        }
        None => Err(cur.error("expected a value after type tag")),
    }
}

/// `[ min, max ]` or `[ min, max, step ]`.
fn parse_range(cur: &mut Cursor<'_>, depth: usize) -> Result<Value> {
    cur.bump();
    cur.skip_whitespace();
    let min = parse_value(cur, depth + 1)?;
    cur.skip_whitespace();
    cur.expect(",")?;
    cur.skip_whitespace();
    let max = parse_value(cur, depth + 1)?;
    cur.skip_whitespace();
    let step = if cur.try_consume(",") {
        cur.skip_whitespace();
        let step = parse_value(cur, depth + 1)?;
        cur.skip_whitespace();
        Some(Box::new(step))
    } else {
        None
    };
    cur.expect("]")?;
    Ok(Value::Range {
        min: Box::new(min),
        max: Box::new(max),
        step,
    })
}

/// Comma-separated values up to `close` (`}` for lists, `>` for arrays).
/// Tolerates a trailing comma and an empty body.
fn parse_seq(cur: &mut Cursor<'_>, depth: usize, close: &str) -> Result<Vec<Value>> {
    cur.bump();
    let mut items = Vec::new();
    loop {
        cur.skip_whitespace();
        if cur.try_consume(close) {
            break;
        }
        items.push(parse_value(cur, depth + 1)?);
        cur.skip_whitespace();
        if cur.try_consume(",") {
            continue;
        }
        cur.expect(close)?;
        break;
    }
    Ok(items)
}

/// Decode a quoted string. `\n` `\t` `\r` `\"` `\\` are decoded; any other
/// backslash-prefixed character is kept verbatim, backslash included, so
/// unknown escapes round-trip unchanged instead of failing.
fn parse_quoted(cur: &mut Cursor<'_>) -> Result<String> {
    cur.bump();
    let mut out = String::new();
    loop {
        match cur.bump() {
            None => return Err(cur.error("unterminated quoted string")),
            Some('"') => return Ok(out),
            Some('\\') => match cur.bump() {
                None => return Err(cur.error("unterminated quoted string")),
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
            },
            Some(c) => out.push(c),
        }
    }
}

/// Infer the type of an unquoted token. Rules are tried strictly in order;
/// the first match wins.
fn infer(token: &str) -> Value {
    if let Some(v) = infer_hex(token) {
        return v;
    }
    if let Some(v) = infer_int(token) {
        return v;
    }
    if let Some(v) = infer_double(token) {
        return v;
    }
    if let Some(v) = infer_fraction(token) {
        return v;
    }
    if let Some(v) = infer_flags(token) {
        return v;
    }
    if let Some(v) = infer_boolean(token) {
        return v;
    }
    Value::String(token.to_string())
}

/// `0x` / `0X` followed by one or more hex digits. A literal that overflows
/// `i64` falls through the cascade (an explicit `(bitmask)` tag can still
/// lift the resulting string into `u64`).
fn infer_hex(token: &str) -> Option<Value> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    i64::from_str_radix(digits, 16).ok().map(Value::Int)
}

/// Optional sign, digits only — no point, no exponent.
fn infer_int(token: &str) -> Option<Value> {
    let digits = token
        .strip_prefix(['+', '-'])
        .unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse::<i64>().ok().map(Value::Int)
}

/// A decimal point (with optional exponent) or an integer with an exponent.
fn infer_double(token: &str) -> Option<Value> {
    if !is_float_literal(token) {
        return None;
    }
    token.parse::<f64>().ok().map(Value::Double)
}

fn is_float_literal(token: &str) -> bool {
    let bytes = token.as_bytes();
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let mut digits = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
        digits += 1;
    }
    let mut has_dot = false;
    if i < bytes.len() && bytes[i] == b'.' {
        has_dot = true;
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return false;
    }
    let mut has_exp = false;
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        has_exp = true;
        i += 1;
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        let mut exp_digits = 0;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
            exp_digits += 1;
        }
        if exp_digits == 0 {
            return false;
        }
    }
    i == bytes.len() && (has_dot || has_exp)
}

/// `digits / digits`, both non-negative, no signs. A bare `30/1` must not
/// split into two integers.
fn infer_fraction(token: &str) -> Option<Value> {
    let (numer, denom) = token.split_once('/')?;
    if numer.is_empty()
        || denom.is_empty()
        || !numer.bytes().all(|b| b.is_ascii_digit())
        || !denom.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let numerator = numer.parse::<u64>().ok()?;
    let denominator = denom.parse::<u64>().ok()?;
    Some(Value::Fraction {
        numerator,
        denominator,
    })
}

/// Two or more identifier-like tokens joined by `+`. A single flag-shaped
/// word has no `+` and falls through to string.
fn infer_flags(token: &str) -> Option<Value> {
    if !token.contains('+') {
        return None;
    }
    let parts: Vec<&str> = token.split('+').collect();
    if parts.len() < 2 || !parts.iter().all(|p| is_flag_ident(p)) {
        return None;
    }
    Some(Value::Flags(parts.iter().map(|p| p.to_string()).collect()))
}

fn is_flag_ident(s: &str) -> bool {
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn infer_boolean(token: &str) -> Option<Value> {
    if token.eq_ignore_ascii_case("true")
        || token.eq_ignore_ascii_case("yes")
        || token.eq_ignore_ascii_case("t")
    {
        return Some(Value::Boolean(true));
    }
    if token.eq_ignore_ascii_case("false")
        || token.eq_ignore_ascii_case("no")
        || token.eq_ignore_ascii_case("f")
    {
        return Some(Value::Boolean(false));
    }
    None
}

fn is_caps_alias(type_name: &str) -> bool {
    type_name.eq_ignore_ascii_case("gstcaps") || type_name.eq_ignore_ascii_case("caps")
}

/// Convert an already-parsed raw value to the kind named by the tag.
///
/// Combinations outside the table — and conversions that fail — leave the
/// raw value unchanged. An alias the table does not know at all wraps the
/// raw value in [`Value::Typed`], preserving the tag verbatim.
fn coerce(type_name: &str, raw: Value, depth: usize) -> Value {
    match type_name.to_ascii_lowercase().as_str() {
        "int" | "gint" | "uint" | "guint" | "gint8" | "gint16" | "gint32" | "gint64"
        | "guint8" | "guint16" | "guint32" | "guint64" | "int64" | "uint64" => coerce_int(raw),
        "double" | "gdouble" | "float" | "gfloat" => coerce_double(raw),
        "boolean" | "gboolean" | "bool" => coerce_boolean(raw),
        "string" | "gchararray" => coerce_string(raw),
        "bitmask" | "gstbitmask" => coerce_bitmask(raw),
        "fraction" | "gstfraction" => raw,
        "gstcaps" | "caps" => coerce_caps(raw, depth),
        "gststructure" => coerce_structure(raw, depth),
        _ => Value::Typed {
            type_name: type_name.to_string(),
            value: Box::new(raw),
        },
    }
}

fn coerce_int(raw: Value) -> Value {
    match raw {
        Value::Double(d) => Value::Int(d.trunc() as i64),
        Value::Boolean(b) => Value::Int(i64::from(b)),
        Value::String(s) => match parse_i64_literal(&s) {
            Some(i) => Value::Int(i),
            None => Value::String(s),
        },
        other => other,
    }
}

fn coerce_double(raw: Value) -> Value {
    match raw {
        Value::Int(i) => Value::Double(i as f64),
        Value::String(s) => match s.parse::<f64>() {
            Ok(d) => Value::Double(d),
            Err(_) => Value::String(s),
        },
        other => other,
    }
}

fn coerce_boolean(raw: Value) -> Value {
    match raw {
        Value::Int(i) => Value::Boolean(i != 0),
        Value::String(s) => Value::Boolean(
            s.eq_ignore_ascii_case("true")
                || s.eq_ignore_ascii_case("yes")
                || s.eq_ignore_ascii_case("t")
                || s == "1",
        ),
        other => other,
    }
}

fn coerce_string(raw: Value) -> Value {
    match raw {
        Value::Int(i) => Value::String(i.to_string()),
        Value::Double(d) => Value::String(format_double(d)),
        Value::Boolean(b) => Value::String(if b { "true" } else { "false" }.to_string()),
        other => other,
    }
}

fn coerce_bitmask(raw: Value) -> Value {
    match raw {
        Value::Int(i) => Value::Bitmask(i as u64),
        Value::String(s) => match parse_u64_literal(&s) {
            Some(b) => Value::Bitmask(b),
            None => Value::String(s),
        },
        other => other,
    }
}

fn coerce_caps(raw: Value, depth: usize) -> Value {
    match raw {
        Value::String(s) => match parse_caps_at(&s, depth + 1) {
            Ok(caps) => Value::Caps(caps),
            Err(_) => Value::String(s),
        },
        other => other,
    }
}

fn coerce_structure(raw: Value, depth: usize) -> Value {
    match raw {
        Value::String(s) => match parse_structure_at(&s, depth + 1) {
            Ok(structure) => Value::Structure(structure),
            Err(_) => Value::String(s),
        },
        other => other,
    }
}

fn parse_i64_literal(s: &str) -> Option<i64> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        s.parse::<i64>().ok()
    }
}

fn parse_u64_literal(s: &str) -> Option<u64> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        s.parse::<u64>().ok()
    }
}

/// Position-tracked reader over the input text.
struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_is(&self, c: char) -> bool {
        self.peek() == Some(c)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Skip runs of space/tab/CR/LF and backslash-newline line continuations
    /// (`\<LF>`, `\<CR>`, and `\<CR><LF>` counting as one continuation).
    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r' | '\n') => {
                    self.bump();
                }
                Some('\\') => {
                    let rest = &self.input[self.pos + 1..];
                    if rest.starts_with("\r\n") {
                        self.pos += 3;
                    } else if rest.starts_with('\n') || rest.starts_with('\r') {
                        self.pos += 2;
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
    }

    /// Consume `literal` if it matches at the current position.
    fn try_consume(&mut self, literal: &str) -> bool {
        if self.rest().starts_with(literal) {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, literal: &str) -> Result<()> {
        if self.try_consume(literal) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{literal}`")))
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::at(self.input, self.pos, message)
    }

    /// Structure/caps name: `[A-Za-z_]` then `[A-Za-z0-9\-_.:/]*`
    /// (e.g. `video/x-raw`).
    fn parse_name(&mut self) -> Result<String> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                self.bump();
            }
            _ => return Err(self.error("expected a name")),
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '/') {
                self.bump();
            } else {
                break;
            }
        }
        Ok(self.input[start..self.pos].to_string())
    }

    /// Field name: `[A-Za-z0-9\-_]`, `.`, and the two-character property-path
    /// separator `::`. A lone `:` ends the name.
    fn parse_field_name(&mut self) -> Result<String> {
        let start = self.pos;
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') => {
                    self.bump();
                }
                Some(':') if self.rest().starts_with("::") => {
                    self.pos += 2;
                }
                _ => break,
            }
        }
        if self.pos == start {
            Err(self.error("expected a field name"))
        } else {
            Ok(self.input[start..self.pos].to_string())
        }
    }

    /// Type name inside a parenthesized tag: `[A-Za-z0-9_]+`.
    fn parse_type_name(&mut self) -> Result<String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        if self.pos == start {
            Err(self.error("expected a type name"))
        } else {
            Ok(self.input[start..self.pos].to_string())
        }
    }

    /// Capability feature name: `[A-Za-z0-9:_-]+`.
    fn parse_feature_name(&mut self) -> Result<String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || matches!(c, ':' | '_' | '-') {
                self.bump();
            } else {
                break;
            }
        }
        if self.pos == start {
            Err(self.error("expected a feature name"))
        } else {
            Ok(self.input[start..self.pos].to_string())
        }
    }

    /// Unquoted token: everything up to whitespace or a structural
    /// delimiter.
    fn parse_token(&mut self) -> Result<&'a str> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(
                c,
                ' ' | '\t' | '\r' | '\n' | ',' | ';' | ']' | '}' | '>' | '(' | ')' | '='
            ) {
                break;
            }
            self.bump();
        }
        if self.pos == start {
            Err(self.error("expected a value"))
        } else {
            Ok(&self.input[start..self.pos])
        }
    }

    /// Extract the body of a `[ … ]` group, tracking nesting depth of the
    /// bracket character itself so inner ranges and lists do not terminate
    /// the group early. The cursor must be at the opening `[`; on return it
    /// is past the matching close. Returns the body and its start offset.
    fn extract_balanced_brackets(&mut self) -> Result<(&'a str, usize)> {
        self.bump();
        let body_start = self.pos;
        let mut depth = 1usize;
        while let Some(c) = self.bump() {
            match c {
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok((&self.input[body_start..self.pos - 1], body_start));
                    }
                }
                _ => {}
            }
        }
        Err(self.error("unterminated `[`"))
    }
}
