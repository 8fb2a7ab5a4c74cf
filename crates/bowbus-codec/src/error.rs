/// Errors that can occur while decoding payloads or loading name tables.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A field or fixed layout needs more bytes than the payload has.
    #[error("payload truncated: {needed} bytes needed at offset {offset}, payload has {len}")]
    Truncated {
        offset: usize,
        needed: usize,
        len: usize,
    },

    /// The field walk ended before the payload did.
    #[error("payload has trailing bytes: fields consumed {consumed} of {len}")]
    TrailingBytes { consumed: usize, len: usize },

    /// The name table file could not be loaded.
    #[error("failed to load name table: {0}")]
    NameTable(String),

    /// The name table file is not valid JSON.
    #[error("name table is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CodecError>;

/// Borrow `len` bytes at `offset`, or report how far short the payload is.
pub(crate) fn take(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    data.get(offset..offset.saturating_add(len))
        .ok_or(CodecError::Truncated {
            offset,
            needed: len,
            len: data.len(),
        })
}

pub(crate) fn byte_at(data: &[u8], offset: usize) -> Result<u8> {
    take(data, offset, 1).map(|bytes| bytes[0])
}
