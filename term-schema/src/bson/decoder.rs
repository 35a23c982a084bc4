//! Bounds-checked cursor over a BSON buffer.
//!
//! Every read either returns a typed value and advances the cursor, or fails
//! with [`ProfileError::CorruptedDocument`]. There is no recovery: a caller
//! gets a fully valid document or an error.

use super::decimal::Decimal128;
use super::types::BsonType;
use super::value::ObjectId;
use crate::error::{ProfileError, ProfileResult};

/// Binary subtype whose payload repeats its own length in four extra bytes.
pub const BINARY_SUBTYPE_OLD: u8 = 0x02;

/// Smallest possible document: four length bytes and the terminator.
pub const MIN_DOCUMENT_LEN: usize = 5;

/// Cursor over an immutable byte slice.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current absolute offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    fn corrupted(&self, reason: impl Into<String>) -> ProfileError {
        ProfileError::corrupted(self.pos, reason)
    }

    /// Reads `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> ProfileResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(self.corrupted(format!(
                "read of {n} bytes past end of buffer ({} left)",
                self.remaining()
            )));
        }
        let buf: &'a [u8] = self.buf;
        let bytes = &buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> ProfileResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> ProfileResult<()> {
        self.read_bytes(n).map(|_| ())
    }

    /// Moves the cursor `n` bytes back.
    pub fn rewind(&mut self, n: usize) -> ProfileResult<()> {
        if n > self.pos {
            return Err(self.corrupted(format!("rewind of {n} bytes before start of buffer")));
        }
        self.pos -= n;
        Ok(())
    }

    pub fn read_u8(&mut self) -> ProfileResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i32(&mut self) -> ProfileResult<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> ProfileResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> ProfileResult<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> ProfileResult<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> ProfileResult<f64> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    /// Reads a non-negative length prefix.
    fn read_length(&mut self) -> ProfileResult<usize> {
        let len = self.read_i32()?;
        usize::try_from(len).map_err(|_| self.corrupted(format!("negative length {len}")))
    }

    fn utf8(&self, bytes: &'a [u8]) -> ProfileResult<&'a str> {
        std::str::from_utf8(bytes).map_err(|e| self.corrupted(format!("invalid UTF-8: {e}")))
    }

    /// Reads a NUL-terminated string of unknown length.
    pub fn read_cstring(&mut self) -> ProfileResult<&'a str> {
        let buf: &'a [u8] = self.buf;
        let nul = buf[self.pos.min(buf.len())..]
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| self.corrupted("unterminated C string"))?;
        let bytes = self.read_bytes(nul)?;
        self.pos += 1;
        self.utf8(bytes)
    }

    /// Reads an `int32` length followed by that many bytes, the last of
    /// which must be NUL.
    pub fn read_string(&mut self) -> ProfileResult<&'a str> {
        let len = self.read_length()?;
        if len == 0 {
            return Err(self.corrupted("string length must include the terminator"));
        }
        let bytes = self.read_bytes(len)?;
        if bytes[len - 1] != 0 {
            return Err(self.corrupted("string is not NUL-terminated"));
        }
        self.utf8(&bytes[..len - 1])
    }

    /// Reads a binary blob, returning its subtype and payload.
    ///
    /// For the legacy subtype `0x02` the payload starts with a redundant
    /// copy of its length, which is checked and stripped.
    pub fn read_binary(&mut self) -> ProfileResult<(u8, &'a [u8])> {
        let len = self.read_length()?;
        let subtype = self.read_u8()?;
        if subtype == BINARY_SUBTYPE_OLD && len >= 4 {
            let inner = self.read_length()?;
            if inner != len - 4 {
                return Err(self.corrupted(format!(
                    "old binary inner length {inner} does not match outer length {len}"
                )));
            }
            return Ok((subtype, self.read_bytes(inner)?));
        }
        Ok((subtype, self.read_bytes(len)?))
    }

    /// Reads a boolean byte, which must be exactly 0 or 1.
    pub fn read_bool(&mut self) -> ProfileResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => {
                self.pos -= 1;
                Err(self.corrupted(format!("invalid boolean byte {other:#04x}")))
            }
        }
    }

    /// Reads a regular expression as `(pattern, options)`.
    pub fn read_regex(&mut self) -> ProfileResult<(&'a str, &'a str)> {
        let pattern = self.read_cstring()?;
        let options = self.read_cstring()?;
        Ok((pattern, options))
    }

    pub fn read_object_id(&mut self) -> ProfileResult<ObjectId> {
        Ok(ObjectId::from_bytes(self.read_array()?))
    }

    pub fn read_decimal128(&mut self) -> ProfileResult<Decimal128> {
        Ok(Decimal128::from_bytes(self.read_array()?))
    }

    /// Reads an element type tag.
    pub fn read_type(&mut self) -> ProfileResult<BsonType> {
        let tag = self.read_u8()?;
        BsonType::from_tag(tag).ok_or_else(|| {
            ProfileError::corrupted(self.pos - 1, format!("unknown element type {tag:#04x}"))
        })
    }

    /// Reads a document length header.
    ///
    /// Returns the declared length and the absolute offset of the
    /// document's terminator byte.
    pub fn read_document_header(&mut self) -> ProfileResult<(usize, usize)> {
        let start = self.pos;
        let len = self.read_length()?;
        if len < MIN_DOCUMENT_LEN {
            return Err(ProfileError::corrupted(
                start,
                format!("document length {len} is below the minimum of {MIN_DOCUMENT_LEN}"),
            ));
        }
        let end = start
            .checked_add(len - 1)
            .filter(|end| *end < self.buf.len())
            .ok_or_else(|| {
                ProfileError::corrupted(
                    start,
                    format!(
                        "document length {len} exceeds buffer of {} bytes",
                        self.buf.len() - start
                    ),
                )
            })?;
        Ok((len, end))
    }

    /// Fails unless the cursor is strictly before `end`.
    pub fn assert_before(&self, end: usize) -> ProfileResult<()> {
        if self.pos < end {
            Ok(())
        } else {
            Err(self.corrupted(format!("element overruns document end at {end}")))
        }
    }

    /// Whether the cursor sits on a NUL byte (the end of an element list).
    pub fn at_terminator(&self) -> bool {
        self.buf.get(self.pos) == Some(&0)
    }

    /// Consumes the terminator, which must be at exactly `end`.
    pub fn read_terminator(&mut self, end: usize) -> ProfileResult<()> {
        if self.pos != end {
            return Err(self.corrupted(format!(
                "document terminator expected at {end}, found at {}",
                self.pos
            )));
        }
        if !self.at_terminator() {
            return Err(self.corrupted("missing document terminator"));
        }
        self.pos += 1;
        Ok(())
    }

    /// Decodes and discards a value of type `ty`, validating its structure.
    pub fn skip_value(&mut self, ty: BsonType) -> ProfileResult<()> {
        match ty {
            BsonType::Double | BsonType::Date | BsonType::Timestamp | BsonType::Long => {
                self.skip(8)
            }
            BsonType::Int => self.skip(4),
            BsonType::Decimal => self.skip(16),
            BsonType::ObjectId => self.skip(12),
            BsonType::Bool => self.read_bool().map(|_| ()),
            BsonType::String | BsonType::Javascript | BsonType::Symbol => {
                self.read_string().map(|_| ())
            }
            BsonType::BinData => self.read_binary().map(|_| ()),
            BsonType::Regex => self.read_regex().map(|_| ()),
            BsonType::DbPointer => {
                self.read_string()?;
                self.skip(12)
            }
            BsonType::Object | BsonType::Array => self.skip_document().map(|_| ()),
            BsonType::JavascriptWithScope => self.skip_code_with_scope(),
            BsonType::Undefined | BsonType::Null | BsonType::MinKey | BsonType::MaxKey => Ok(()),
        }
    }

    /// Walks a whole document, returning its number of members.
    pub fn skip_document(&mut self) -> ProfileResult<usize> {
        let (_, end) = self.read_document_header()?;
        let mut members = 0;
        while !self.at_terminator() {
            self.assert_before(end)?;
            let ty = self.read_type()?;
            self.read_cstring()?;
            self.skip_value(ty)?;
            members += 1;
        }
        self.read_terminator(end)?;
        Ok(members)
    }

    fn skip_code_with_scope(&mut self) -> ProfileResult<()> {
        let (start, end) = self.read_code_with_scope_header()?;
        self.read_string()?;
        self.skip_document()?;
        self.assert_code_with_scope_end(start, end)
    }

    /// Reads the total length of a code-with-scope value, returning its
    /// start offset and expected end offset.
    pub fn read_code_with_scope_header(&mut self) -> ProfileResult<(usize, usize)> {
        let start = self.pos;
        let len = self.read_length()?;
        let end = start + len;
        if end > self.buf.len() {
            return Err(ProfileError::corrupted(
                start,
                format!("code with scope length {len} exceeds buffer"),
            ));
        }
        Ok((start, end))
    }

    /// Checks that a code-with-scope value ended where its header said.
    pub fn assert_code_with_scope_end(&self, start: usize, end: usize) -> ProfileResult<()> {
        if self.pos != end {
            return Err(ProfileError::corrupted(
                start,
                format!(
                    "code with scope declared {} bytes but used {}",
                    end - start,
                    self.pos - start
                ),
            ));
        }
        Ok(())
    }
}
