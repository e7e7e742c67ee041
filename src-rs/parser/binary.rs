//! Protocol V2: length-prefixed records, big-endian.
//!
//! ```text
//! record   := u16 depth | str16 name | str16 hash | u16 count | property*
//! property := str16 key | str32 value
//! strN     := uN byte length | UTF-8 bytes
//! ```
//!
//! Input that ends between records ends the dump; input that ends inside a
//! record is truncated.

use super::{RawRecord, TreeAssembler};
use crate::error::ParseError;
use crate::property::ViewProperty;

pub(super) fn decode(bytes: &[u8], assembler: &mut TreeAssembler) -> Result<(), ParseError> {
    let mut cursor = Cursor { bytes, pos: 0 };
    let mut ordinal = 0;
    while !cursor.at_end() {
        ordinal += 1;
        assembler.push(read_record(&mut cursor, ordinal)?)?;
    }
    Ok(())
}

fn read_record(cursor: &mut Cursor<'_>, ordinal: usize) -> Result<RawRecord, ParseError> {
    let depth = usize::from(cursor.u16()?);
    let name = cursor.str16()?.to_string();
    let hash = cursor.str16()?.to_string();
    let count = usize::from(cursor.u16()?);

    let mut properties = Vec::with_capacity(count);
    for _ in 0..count {
        let key = cursor.str16()?;
        if key.is_empty() {
            return Err(ParseError::MalformedToken {
                record: ordinal,
                detail: "empty property name".to_string(),
            });
        }
        let value = cursor.str32()?;
        properties.push(ViewProperty::new(key, value));
    }

    Ok(RawRecord {
        ordinal,
        depth,
        name,
        hash,
        properties,
    })
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ParseError> {
        let remaining = self.bytes.len() - self.pos;
        if len > remaining {
            return Err(ParseError::Truncated {
                offset: self.bytes.len(),
                needed: len - remaining,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, ParseError> {
        let raw = self.take(2)?;
        Ok(u16::from_be_bytes([raw[0], raw[1]]))
    }

    fn u32(&mut self) -> Result<u32, ParseError> {
        let raw = self.take(4)?;
        Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn str16(&mut self) -> Result<&'a str, ParseError> {
        let len = usize::from(self.u16()?);
        Ok(std::str::from_utf8(self.take(len)?)?)
    }

    fn str32(&mut self) -> Result<&'a str, ParseError> {
        let len = self.u32()? as usize;
        Ok(std::str::from_utf8(self.take(len)?)?)
    }
}
