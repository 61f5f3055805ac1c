//! Encodable trait & Encoder type
use crate::error::EncodeResult;

/// A type which can be encoded into an [`Encoder`]
pub trait Encodable {
    /// Write the type to the stream
    fn encode(&self, e: &mut Encoder<'_>) -> EncodeResult<()>;

    /// Consume the encodable type and return a buffer of its wire form
    fn to_vec(&self) -> EncodeResult<Vec<u8>> {
        let mut buf = Vec::new();
        let mut encoder = Encoder::new(&mut buf);
        self.encode(&mut encoder)?;
        Ok(buf)
    }
}

/// Writes bytes to the end of a growable buffer
#[derive(Debug)]
pub struct Encoder<'a> {
    buffer: &'a mut Vec<u8>,
}

impl<'a> Encoder<'a> {
    /// Create an `Encoder` writing into `buffer`
    pub fn new(buffer: &'a mut Vec<u8>) -> Self {
        Encoder { buffer }
    }

    /// write a `u8`
    pub fn write_u8(&mut self, data: u8) -> EncodeResult<()> {
        self.write_slice(&data.to_be_bytes())
    }

    /// write a big-endian `u16`
    pub fn write_u16(&mut self, data: u16) -> EncodeResult<()> {
        self.write_slice(&data.to_be_bytes())
    }

    /// write a big-endian `u32`
    pub fn write_u32(&mut self, data: u32) -> EncodeResult<()> {
        self.write_slice(&data.to_be_bytes())
    }

    /// append a slice of bytes
    pub fn write_slice(&mut self, data: &[u8]) -> EncodeResult<()> {
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// bytes written so far
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// true if nothing was written yet
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
