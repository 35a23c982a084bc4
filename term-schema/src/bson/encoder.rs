//! Encoding of [`Document`]s into BSON buffers.
//!
//! The profiler only reads BSON; the encoder exists so that callers, tests
//! and benchmarks can produce well-formed input without a database.
//!
//! ```rust
//! use term_schema::bson::encoder::DocumentBuilder;
//! use term_schema::bson::Value;
//!
//! let doc = DocumentBuilder::new()
//!     .int32("f1", 5)
//!     .string("f2", "šašo")
//!     .array("tags", vec![Value::String("a".into()), Value::Int32(2)])
//!     .build();
//! assert_eq!(&doc[..4], &(doc.len() as i32).to_le_bytes());
//! ```

use super::decimal::Decimal128;
use super::decoder::BINARY_SUBTYPE_OLD;
use super::value::{Document, ObjectId, Value};

/// Fluent builder for a single document.
#[derive(Debug, Clone, Default)]
pub struct DocumentBuilder {
    doc: Document,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field holding any value.
    pub fn value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.doc.insert(name, value);
        self
    }

    pub fn double(self, name: impl Into<String>, value: f64) -> Self {
        self.value(name, Value::Double(value))
    }

    pub fn string(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.value(name, Value::String(value.into()))
    }

    pub fn document(self, name: impl Into<String>, value: DocumentBuilder) -> Self {
        self.value(name, Value::Document(value.doc))
    }

    pub fn array(self, name: impl Into<String>, items: Vec<Value>) -> Self {
        self.value(name, Value::Array(items))
    }

    pub fn object_id(self, name: impl Into<String>, id: ObjectId) -> Self {
        self.value(name, Value::ObjectId(id))
    }

    pub fn boolean(self, name: impl Into<String>, value: bool) -> Self {
        self.value(name, Value::Boolean(value))
    }

    /// Appends a date given in Unix milliseconds.
    pub fn datetime(self, name: impl Into<String>, millis: i64) -> Self {
        self.value(name, Value::DateTime(millis))
    }

    pub fn null(self, name: impl Into<String>) -> Self {
        self.value(name, Value::Null)
    }

    pub fn int32(self, name: impl Into<String>, value: i32) -> Self {
        self.value(name, Value::Int32(value))
    }

    pub fn int64(self, name: impl Into<String>, value: i64) -> Self {
        self.value(name, Value::Int64(value))
    }

    pub fn decimal(self, name: impl Into<String>, value: Decimal128) -> Self {
        self.value(name, Value::Decimal128(value))
    }

    /// The document built so far.
    pub fn as_document(&self) -> &Document {
        &self.doc
    }

    /// Encodes the document.
    pub fn build(&self) -> Vec<u8> {
        encode_document(&self.doc)
    }
}

/// Encodes a document into a new buffer.
pub fn encode_document(doc: &Document) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    write_document(&mut buf, doc.iter());
    buf
}

fn write_document<'v>(buf: &mut Vec<u8>, entries: impl Iterator<Item = (&'v str, &'v Value)>) {
    let start = buf.len();
    buf.extend_from_slice(&[0; 4]);
    for (name, value) in entries {
        buf.push(value.bson_type().tag());
        write_cstring(buf, name);
        write_value(buf, value);
    }
    buf.push(0);
    patch_length(buf, start);
}

fn write_array(buf: &mut Vec<u8>, items: &[Value]) {
    let names: Vec<String> = (0..items.len()).map(|i| i.to_string()).collect();
    write_document(
        buf,
        names.iter().map(String::as_str).zip(items.iter()),
    );
}

fn patch_length(buf: &mut [u8], start: usize) {
    let len = (buf.len() - start) as i32;
    buf[start..start + 4].copy_from_slice(&len.to_le_bytes());
}

fn write_cstring(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&((s.len() + 1) as i32).to_le_bytes());
    write_cstring(buf, s);
}

fn write_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Double(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::String(s) | Value::JavaScript(s) | Value::Symbol(s) => write_string(buf, s),
        Value::Document(doc) => write_document(buf, doc.iter()),
        Value::Array(items) => write_array(buf, items),
        Value::Binary { subtype, bytes } => {
            if *subtype == BINARY_SUBTYPE_OLD {
                buf.extend_from_slice(&((bytes.len() + 4) as i32).to_le_bytes());
                buf.push(*subtype);
                buf.extend_from_slice(&(bytes.len() as i32).to_le_bytes());
            } else {
                buf.extend_from_slice(&(bytes.len() as i32).to_le_bytes());
                buf.push(*subtype);
            }
            buf.extend_from_slice(bytes);
        }
        Value::Undefined | Value::Null | Value::MinKey | Value::MaxKey => {}
        Value::ObjectId(id) => buf.extend_from_slice(&id.bytes()),
        Value::Boolean(v) => buf.push(u8::from(*v)),
        Value::DateTime(ms) => buf.extend_from_slice(&ms.to_le_bytes()),
        Value::Regex { pattern, options } => {
            write_cstring(buf, pattern);
            write_cstring(buf, options);
        }
        Value::DbPointer { namespace, id } => {
            write_string(buf, namespace);
            buf.extend_from_slice(&id.bytes());
        }
        Value::JavaScriptWithScope { code, scope } => {
            let start = buf.len();
            buf.extend_from_slice(&[0; 4]);
            write_string(buf, code);
            write_document(buf, scope.iter());
            patch_length(buf, start);
        }
        Value::Int32(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::Timestamp { time, increment } => {
            buf.extend_from_slice(&increment.to_le_bytes());
            buf.extend_from_slice(&time.to_le_bytes());
        }
        Value::Int64(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::Decimal128(v) => buf.extend_from_slice(&v.to_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document() {
        assert_eq!(DocumentBuilder::new().build(), vec![5, 0, 0, 0, 0]);
    }

    #[test]
    fn test_int_field_layout() {
        let doc = DocumentBuilder::new().int32("a", 1).build();
        assert_eq!(doc, vec![12, 0, 0, 0, 0x10, b'a', 0, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn test_array_uses_index_names() {
        let doc = DocumentBuilder::new()
            .array("x", vec![Value::Boolean(true)])
            .build();
        // outer header, tag, "x\0", inner header, tag, "0\0", value, inner NUL, outer NUL
        assert_eq!(doc[4], 0x04);
        assert_eq!(&doc[11..14], &[0x08, b'0', 0]);
        assert_eq!(doc.len(), 4 + 1 + 2 + 4 + 1 + 2 + 1 + 1 + 1);
    }
}
