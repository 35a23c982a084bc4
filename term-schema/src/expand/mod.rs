//! Flattening of documents into field observations.
//!
//! The [`Expander`] walks one document depth first and emits a
//! [`FieldObservation`] for every field it visits, parents before their
//! children. Nested names are joined with [`SEPARATOR`]; array elements
//! contribute the [`ARRAY_MARKER`] segment instead of their index, so every
//! element of `tags` is observed as `tags.[]`.
//!
//! ```rust
//! use term_schema::bson::DocumentBuilder;
//! use term_schema::expand::{ExpandConfig, Expander};
//!
//! let doc = DocumentBuilder::new()
//!     .string("name", "abcdefghijklmnoprst")
//!     .document("address", DocumentBuilder::new().string("city", "Ljubljana"))
//!     .build();
//!
//! let expander = Expander::new(ExpandConfig {
//!     string_max_length: 6,
//!     store_value: true,
//!     store_string_length: true,
//!     ..ExpandConfig::default()
//! });
//! let fields = expander.expand(&doc).unwrap();
//! let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
//! assert_eq!(names, ["name", "address", "address.city"]);
//! assert_eq!(fields[0].length, Some(19));
//! ```

pub mod worker;

use serde::Serialize;

use crate::bson::{BsonType, Decoder, Document, Value};
pub use crate::config::ExpandConfig;
use crate::error::ProfileResult;

/// Joins a parent name and a child key.
pub const SEPARATOR: char = '.';

/// Name segment used for array elements.
pub const ARRAY_MARKER: &str = "[]";

/// One typed occurrence of a field in a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldObservation {
    /// Dotted path of the field.
    pub name: String,
    #[serde(rename = "type")]
    pub bson_type: BsonType,
    /// Nesting depth; root fields are level 0.
    pub level: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Untruncated length of strings, arrays and objects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
}

impl FieldObservation {
    pub fn new(name: impl Into<String>, bson_type: BsonType, level: u32) -> Self {
        Self {
            name: name.into(),
            bson_type,
            level,
            value: None,
            length: None,
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }
}

/// Builds the dotted name of a child.
pub fn child_name(parent: Option<&str>, key: &str) -> String {
    match parent {
        Some(parent) => {
            let mut name = String::with_capacity(parent.len() + 1 + key.len());
            name.push_str(parent);
            name.push(SEPARATOR);
            name.push_str(key);
            name
        }
        None => key.to_string(),
    }
}

/// Nesting level implied by a dotted name.
pub fn level_of(name: &str) -> u32 {
    name.matches(SEPARATOR).count() as u32
}

/// Cuts `s` to at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Stateless document flattener.
#[derive(Debug, Clone, Default)]
pub struct Expander {
    config: ExpandConfig,
}

impl Expander {
    pub fn new(config: ExpandConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExpandConfig {
        &self.config
    }

    /// Flattens one document.
    pub fn expand(&self, buf: &[u8]) -> ProfileResult<Vec<FieldObservation>> {
        let mut out = Vec::new();
        self.expand_into(buf, &mut out)?;
        Ok(out)
    }

    /// Flattens one document, appending to `out`.
    ///
    /// On error `out` may hold observations of the failed document; callers
    /// are expected to discard them along with the run.
    pub fn expand_into(&self, buf: &[u8], out: &mut Vec<FieldObservation>) -> ProfileResult<()> {
        let mut dec = Decoder::new(buf);
        self.walk_document(&mut dec, None, 0, out)?;
        Ok(())
    }

    /// Walks the members of a document whose fields sit at `level`.
    ///
    /// Returns the member count and, with value capture on, the captured
    /// document.
    fn walk_document(
        &self,
        dec: &mut Decoder<'_>,
        parent: Option<&str>,
        level: u32,
        out: &mut Vec<FieldObservation>,
    ) -> ProfileResult<(u64, Option<Document>)> {
        let (_, end) = dec.read_document_header()?;
        let mut captured = self.config.store_value.then(Document::new);
        let mut members = 0u64;

        while !dec.at_terminator() {
            dec.assert_before(end)?;
            let ty = dec.read_type()?;
            let key = dec.read_cstring()?;
            let name = child_name(parent, key);
            let value = self.walk_field(dec, ty, name, level, out)?;
            if let (Some(doc), Some(value)) = (captured.as_mut(), value) {
                doc.insert(key, value);
            }
            members += 1;
        }
        dec.read_terminator(end)?;
        Ok((members, captured))
    }

    /// Emits the observation for one field, then its descendants.
    ///
    /// Returns the captured value so that the parent can embed it.
    fn walk_field(
        &self,
        dec: &mut Decoder<'_>,
        ty: BsonType,
        name: String,
        level: u32,
        out: &mut Vec<FieldObservation>,
    ) -> ProfileResult<Option<Value>> {
        let slot = out.len();
        out.push(FieldObservation::new(name, ty, level));

        let (value, length) = match ty {
            BsonType::String => {
                let s = dec.read_string()?;
                let length = self
                    .config
                    .store_string_length
                    .then(|| s.chars().count() as u64);
                let value = self.config.store_value.then(|| {
                    Value::String(truncate_chars(s, self.config.string_max_length).to_string())
                });
                (value, length)
            }
            BsonType::Object => {
                let (members, value) = if level < self.config.max_depth {
                    let parent = out[slot].name.clone();
                    let (members, doc) = self.walk_document(dec, Some(&parent), level + 1, out)?;
                    (members, doc.map(Value::Document))
                } else if self.config.store_value {
                    let doc = self.capture_document(dec)?;
                    (doc.len() as u64, Some(Value::Document(doc)))
                } else {
                    (dec.skip_document()? as u64, None)
                };
                let length = self.config.store_object_length.then_some(members);
                (value, length)
            }
            BsonType::Array => {
                let (count, items) = self.walk_array(dec, slot, level, out)?;
                let length = self.config.store_array_length.then_some(count);
                (items.map(Value::Array), length)
            }
            _ if self.config.store_value => (Some(read_scalar(dec, ty)?), None),
            _ => {
                dec.skip_value(ty)?;
                (None, None)
            }
        };

        let observation = &mut out[slot];
        observation.length = length;
        if self.config.store_value {
            observation.value = value.clone();
        }
        Ok(value)
    }

    /// Walks an array whose own observation sits at `out[slot]`.
    ///
    /// Every element is decoded, but only the first `array_max_length` are
    /// captured and observed. Returns the true element count.
    fn walk_array(
        &self,
        dec: &mut Decoder<'_>,
        slot: usize,
        level: u32,
        out: &mut Vec<FieldObservation>,
    ) -> ProfileResult<(u64, Option<Vec<Value>>)> {
        let (_, end) = dec.read_document_header()?;
        let limit = self.config.array_max_length;
        let recurse = level < self.config.max_depth;
        let element_name = recurse.then(|| child_name(Some(&out[slot].name), ARRAY_MARKER));
        let mut items = self.config.store_value.then(Vec::new);
        let mut count = 0u64;

        while !dec.at_terminator() {
            dec.assert_before(end)?;
            let ty = dec.read_type()?;
            dec.read_cstring()?;
            let within_limit = (count as usize) < limit;

            match (&element_name, within_limit) {
                (Some(name), true) => {
                    let value = self.walk_field(dec, ty, name.clone(), level + 1, out)?;
                    if let (Some(items), Some(value)) = (items.as_mut(), value) {
                        items.push(value);
                    }
                }
                (None, true) if self.config.store_value => {
                    let value = self.capture_value(dec, ty)?;
                    if let Some(items) = items.as_mut() {
                        items.push(value);
                    }
                }
                _ => dec.skip_value(ty)?,
            }
            count += 1;
        }
        dec.read_terminator(end)?;
        Ok((count, items))
    }

    /// Captures a value below the expansion depth, applying the same
    /// truncation rules without emitting observations.
    fn capture_value(&self, dec: &mut Decoder<'_>, ty: BsonType) -> ProfileResult<Value> {
        match ty {
            BsonType::String => {
                let s = dec.read_string()?;
                Ok(Value::String(
                    truncate_chars(s, self.config.string_max_length).to_string(),
                ))
            }
            BsonType::Object => Ok(Value::Document(self.capture_document(dec)?)),
            BsonType::Array => {
                let (_, end) = dec.read_document_header()?;
                let mut items = Vec::new();
                while !dec.at_terminator() {
                    dec.assert_before(end)?;
                    let ty = dec.read_type()?;
                    dec.read_cstring()?;
                    if items.len() < self.config.array_max_length {
                        items.push(self.capture_value(dec, ty)?);
                    } else {
                        dec.skip_value(ty)?;
                    }
                }
                dec.read_terminator(end)?;
                Ok(Value::Array(items))
            }
            _ => read_scalar(dec, ty),
        }
    }

    fn capture_document(&self, dec: &mut Decoder<'_>) -> ProfileResult<Document> {
        let (_, end) = dec.read_document_header()?;
        let mut doc = Document::new();
        while !dec.at_terminator() {
            dec.assert_before(end)?;
            let ty = dec.read_type()?;
            let key = dec.read_cstring()?;
            let value = self.capture_value(dec, ty)?;
            doc.insert(key, value);
        }
        dec.read_terminator(end)?;
        Ok(doc)
    }
}

/// Decodes any value into its untruncated form.
pub fn read_value(dec: &mut Decoder<'_>, ty: BsonType) -> ProfileResult<Value> {
    match ty {
        BsonType::Object => Ok(Value::Document(read_document(dec)?)),
        BsonType::Array => {
            let doc = read_document(dec)?;
            Ok(Value::Array(
                doc.iter().map(|(_, value)| value.clone()).collect(),
            ))
        }
        _ => read_scalar(dec, ty),
    }
}

/// Decodes a whole document into an owned [`Document`].
pub fn read_document(dec: &mut Decoder<'_>) -> ProfileResult<Document> {
    let (_, end) = dec.read_document_header()?;
    let mut doc = Document::new();
    while !dec.at_terminator() {
        dec.assert_before(end)?;
        let ty = dec.read_type()?;
        let key = dec.read_cstring()?;
        let value = read_value(dec, ty)?;
        doc.insert(key, value);
    }
    dec.read_terminator(end)?;
    Ok(doc)
}

/// Decodes a value that is neither an object nor an array.
fn read_scalar(dec: &mut Decoder<'_>, ty: BsonType) -> ProfileResult<Value> {
    let value = match ty {
        BsonType::Double => Value::Double(dec.read_f64()?),
        BsonType::String => Value::String(dec.read_string()?.to_string()),
        BsonType::Object | BsonType::Array => return read_value(dec, ty),
        BsonType::BinData => {
            let (subtype, bytes) = dec.read_binary()?;
            Value::Binary {
                subtype,
                bytes: bytes.to_vec(),
            }
        }
        BsonType::Undefined => Value::Undefined,
        BsonType::ObjectId => Value::ObjectId(dec.read_object_id()?),
        BsonType::Bool => Value::Boolean(dec.read_bool()?),
        BsonType::Date => Value::DateTime(dec.read_i64()?),
        BsonType::Null => Value::Null,
        BsonType::Regex => {
            let (pattern, options) = dec.read_regex()?;
            Value::Regex {
                pattern: pattern.to_string(),
                options: options.to_string(),
            }
        }
        BsonType::DbPointer => {
            let namespace = dec.read_string()?.to_string();
            let id = dec.read_object_id()?;
            Value::DbPointer { namespace, id }
        }
        BsonType::Javascript => Value::JavaScript(dec.read_string()?.to_string()),
        BsonType::Symbol => Value::Symbol(dec.read_string()?.to_string()),
        BsonType::JavascriptWithScope => {
            let (start, end) = dec.read_code_with_scope_header()?;
            let code = dec.read_string()?.to_string();
            let scope = read_document(dec)?;
            dec.assert_code_with_scope_end(start, end)?;
            Value::JavaScriptWithScope { code, scope }
        }
        BsonType::Int => Value::Int32(dec.read_i32()?),
        BsonType::Timestamp => {
            let increment = dec.read_u32()?;
            let time = dec.read_u32()?;
            Value::Timestamp { time, increment }
        }
        BsonType::Long => Value::Int64(dec.read_i64()?),
        BsonType::Decimal => Value::Decimal128(dec.read_decimal128()?),
        BsonType::MinKey => Value::MinKey,
        BsonType::MaxKey => Value::MaxKey,
    };
    Ok(value)
}
