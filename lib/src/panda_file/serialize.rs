use super::leb128::encode_uleb128;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Result;

/// Utility trait for serializing items of a bytecode file
///
/// Everything multi-byte is little endian, and sequences are prefixed with a `u32` length unless
/// the item layout says otherwise.
pub trait Serialize: Sized {
    /// Serialize construct into a binary output stream
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()>;
}

impl Serialize for u8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(*self)
    }
}

impl Serialize for u16 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<LittleEndian>(*self)
    }
}

impl Serialize for u32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(*self)
    }
}

impl<A: Serialize> Serialize for Vec<A> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        (self.len() as u32).serialize(writer)?;
        for elem in self {
            elem.serialize(writer)?;
        }
        Ok(())
    }
}

/// String item: ULEB128 length, the bytes, then a terminating zero
pub struct StringItem<'a>(pub &'a [u8]);

impl<'a> StringItem<'a> {
    pub fn size(&self) -> usize {
        super::leb128::uleb128_size(self.0.len() as u32) + self.0.len() + 1
    }
}

impl<'a> Serialize for StringItem<'a> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        encode_uleb128(self.0.len() as u32, writer)?;
        writer.write_all(self.0)?;
        writer.write_u8(0)
    }
}
