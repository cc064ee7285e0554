use byteorder::WriteBytesExt;
use std::io::Result;

/// Decode an unsigned LEB128 value from the start of `data`
///
/// Returns the value and the number of bytes it took up, or `None` if the encoding runs off the end
/// of `data` or doesn't fit in 32 bits.
pub fn decode_uleb128(data: &[u8]) -> Option<(u32, usize)> {
    let mut result: u64 = 0;
    for (i, byte) in data.iter().enumerate().take(5) {
        result |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return u32::try_from(result).ok().map(|value| (value, i + 1));
        }
    }
    None
}

pub fn encode_uleb128<W: WriteBytesExt>(mut value: u32, writer: &mut W) -> Result<()> {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            return writer.write_u8(byte);
        }
        writer.write_u8(byte | 0x80)?;
    }
}

/// Number of bytes `encode_uleb128` produces
pub fn uleb128_size(mut value: u32) -> usize {
    let mut size = 1;
    while value >= 0x80 {
        value >>= 7;
        size += 1;
    }
    size
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_encodings() {
        for (value, bytes) in [
            (0u32, vec![0x00]),
            (127, vec![0x7f]),
            (128, vec![0x80, 0x01]),
            (624485, vec![0xe5, 0x8e, 0x26]),
            (u32::MAX, vec![0xff, 0xff, 0xff, 0xff, 0x0f]),
        ] {
            let mut encoded = vec![];
            encode_uleb128(value, &mut encoded).unwrap();
            assert_eq!(encoded, bytes);
            assert_eq!(uleb128_size(value), bytes.len());
            assert_eq!(decode_uleb128(&bytes), Some((value, bytes.len())));
        }
    }

    #[test]
    fn truncated_input() {
        assert_eq!(decode_uleb128(&[0x80, 0x80]), None);
        assert_eq!(decode_uleb128(&[]), None);
    }
}
