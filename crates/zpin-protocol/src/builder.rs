use bytes::{BufMut, BytesMut};

/// Builder for multi-field command payloads.
///
/// Board commands mix single bytes with 32-bit little-endian integers; the
/// builder accumulates both in order.
///
/// # Example
/// ```
/// use zpin_protocol::CommandBuilder;
///
/// let payload = CommandBuilder::new()
///     .byte(0x66)
///     .byte(2)
///     .int(0)
///     .int(50)
///     .build();
///
/// assert_eq!(payload, vec![0x66, 2, 0, 0, 0, 0, 50, 0, 0, 0]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CommandBuilder {
    buf: BytesMut,
}

impl CommandBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one byte.
    pub fn byte(mut self, value: u8) -> Self {
        self.buf.put_u8(value);
        self
    }

    /// Append several bytes in order.
    pub fn bytes(mut self, values: &[u8]) -> Self {
        self.buf.put_slice(values);
        self
    }

    /// Append a 32-bit integer, least significant byte first.
    pub fn int(mut self, value: u32) -> Self {
        self.buf.put_u32_le(value);
        self
    }

    /// Append several 32-bit integers.
    pub fn ints(self, values: &[u32]) -> Self {
        values.iter().fold(self, |builder, &v| builder.int(v))
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finish the payload.
    pub fn build(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}
