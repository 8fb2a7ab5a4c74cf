//! Field walking for GET DATA and PUT DATA payloads.
//!
//! Both commands carry a chain of fields, each introduced by a
//! [`TypeFlags`] descriptor and an id byte; the chain continues while the
//! descriptor's `more` bit is set. The walk must consume the payload exactly.
//!
//! ```text
//! GET request   [desc][id]([offset])                    per field
//! GET response  [status] then [desc][id]([count])[value bytes] per field
//! PUT request   [desc][id]([from][to][count])[value bytes]     per field
//! PUT response  [status]
//! ```

use crate::error::{byte_at, take, CodecError, Result};
use crate::names::NameTable;
use crate::type_flags::TypeFlags;

/// A field named by a GET DATA request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetField {
    pub flags: TypeFlags,
    pub id: u8,
    /// First element requested, for arrays.
    pub offset: Option<u8>,
}

impl GetField {
    /// ` 44:20(Name)[0]`
    pub fn label(&self, data_ids: &NameTable) -> String {
        let mut out = field_label(self.flags, self.id, data_ids);
        if let Some(offset) = self.offset {
            out.push_str(&format!("[{offset}]"));
        }
        out
    }
}

/// Element range written by an array PUT DATA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayRange {
    /// First element index written.
    pub from: u8,
    /// One past the last element index written.
    pub to: u8,
    /// Elements carried in the request.
    pub count: u8,
}

/// A field written by a PUT DATA request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutField<'a> {
    pub flags: TypeFlags,
    pub id: u8,
    pub range: Option<ArrayRange>,
    pub elements: Vec<&'a [u8]>,
}

impl PutField<'_> {
    /// ` 40:31(Name)[0..8]`
    pub fn label(&self, data_ids: &NameTable) -> String {
        let mut out = field_label(self.flags, self.id, data_ids);
        if let Some(range) = self.range {
            out.push_str(&format!("[{}..{}]", range.from, range.to));
        }
        out
    }

    pub fn render_value(&self) -> String {
        render_elements(self.flags, &self.elements)
    }
}

/// A field value carried by a successful GET DATA response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueField<'a> {
    pub flags: TypeFlags,
    pub id: u8,
    /// Element count reported by the device, for arrays.
    pub count: Option<u8>,
    pub elements: Vec<&'a [u8]>,
}

impl ValueField<'_> {
    /// ` 44:20(Name)`, using the id carried in the response itself.
    pub fn label(&self, data_ids: &NameTable) -> String {
        field_label(self.flags, self.id, data_ids)
    }

    pub fn render_value(&self) -> String {
        render_elements(self.flags, &self.elements)
    }

    /// All element bytes back to back.
    pub fn value_bytes(&self) -> Vec<u8> {
        self.elements.concat()
    }
}

fn field_label(flags: TypeFlags, id: u8, data_ids: &NameTable) -> String {
    match data_ids.get(id) {
        Some(name) => format!(" {:02x}:{id:02x}({name})", flags.type_value()),
        None => format!(" {:02x}:{id:02x}", flags.type_value()),
    }
}

/// Sized arrays render as `[a, b, c]`; scalars and byte arrays as one value.
fn render_elements(flags: TypeFlags, elements: &[&[u8]]) -> String {
    let formatter = flags.formatter();
    if flags.array() && flags.size_code() != 0 {
        let items: Vec<String> = elements.iter().map(|e| formatter.render(e)).collect();
        format!("[{}]", items.join(", "))
    } else {
        formatter.render(elements.first().copied().unwrap_or_default())
    }
}

/// Split value bytes into elements: a byte array is one blob, a sized
/// array is `count` chunks, a scalar is one element.
fn split_elements(flags: TypeFlags, bytes: &[u8]) -> Vec<&[u8]> {
    if flags.array() && flags.size_code() != 0 {
        bytes.chunks(flags.element_size()).collect()
    } else {
        vec![bytes]
    }
}

fn ensure_consumed(consumed: usize, len: usize) -> Result<()> {
    if consumed != len {
        return Err(CodecError::TrailingBytes { consumed, len });
    }
    Ok(())
}

/// Walk the fields of a GET DATA request payload.
pub fn parse_get_request(payload: &[u8]) -> Result<Vec<GetField>> {
    let mut fields = Vec::new();
    let mut index = 0usize;
    loop {
        let flags = TypeFlags::new(byte_at(payload, index)?);
        let id = byte_at(payload, index + 1)?;
        let offset = if flags.array() {
            Some(byte_at(payload, index + 2)?)
        } else {
            None
        };
        index += if flags.array() { 3 } else { 2 };
        fields.push(GetField { flags, id, offset });

        if !flags.more() {
            break;
        }
    }
    ensure_consumed(index, payload.len())?;
    Ok(fields)
}

/// Walk the fields of a PUT DATA request payload.
pub fn parse_put_request(payload: &[u8]) -> Result<Vec<PutField<'_>>> {
    let mut fields = Vec::new();
    let mut index = 0usize;
    loop {
        let flags = TypeFlags::new(byte_at(payload, index)?);
        let id = byte_at(payload, index + 1)?;
        let (range, header, value_len) = if flags.array() {
            let header = take(payload, index + 2, 3)?;
            let range = ArrayRange {
                from: header[0],
                to: header[1],
                count: header[2],
            };
            (Some(range), 5, flags.element_size() * usize::from(range.count))
        } else {
            (None, 2, flags.element_size())
        };
        let value = take(payload, index + header, value_len)?;
        index += header + value_len;

        fields.push(PutField {
            flags,
            id,
            range,
            elements: split_elements(flags, value),
        });

        if !flags.more() {
            break;
        }
    }
    ensure_consumed(index, payload.len())?;
    Ok(fields)
}

/// Walk the field values of a successful GET DATA response.
///
/// `data` is the payload after the status byte.
pub fn parse_values(data: &[u8]) -> Result<Vec<ValueField<'_>>> {
    let mut fields = Vec::new();
    let mut index = 0usize;
    loop {
        let flags = TypeFlags::new(byte_at(data, index)?);
        let id = byte_at(data, index + 1)?;
        let (count, header) = if flags.array() {
            (Some(byte_at(data, index + 2)?), 3)
        } else {
            (None, 2)
        };
        let value_len = flags.element_size() * usize::from(count.unwrap_or(1));
        let value = take(data, index + header, value_len)?;
        index += header + value_len;

        fields.push(ValueField {
            flags,
            id,
            count,
            elements: split_elements(flags, value),
        });

        if !flags.more() {
            break;
        }
    }
    ensure_consumed(index, data.len())?;
    Ok(fields)
}
