use super::EntityId;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),

    /// File doesn't start with the panda magic
    BadMagic([u8; 8]),

    /// Read past the end of the file
    UnexpectedEof {
        offset: usize,
        wanted: usize,
    },

    /// The header claims a size which isn't the real size
    SizeMismatch {
        declared: u32,
        actual: usize,
    },

    ChecksumMismatch {
        expected: u32,
        found: u32,
    },

    /// Entity offset which doesn't fall inside the file
    OffsetOutOfBounds(EntityId),

    /// No index region covers this entity
    MissingIndexHeader(EntityId),

    /// String item without a terminating zero
    BadString(EntityId),

    BadSourceLang(u8),
    BadTypeId(u32),
    BadTag {
        tag: u8,
        offset: usize,
    },

    /// Item handle which doesn't belong to this builder
    UnknownItem(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IoError(err) => write!(f, "I/O error: {}", err),
            Error::BadMagic(magic) => write!(f, "bad magic {:02x?}", magic),
            Error::UnexpectedEof { offset, wanted } => {
                write!(f, "unexpected end of file reading {} bytes at {:#x}", wanted, offset)
            }
            Error::SizeMismatch { declared, actual } => write!(
                f,
                "header declares {} bytes but the file has {}",
                declared, actual
            ),
            Error::ChecksumMismatch { expected, found } => write!(
                f,
                "checksum mismatch: header says {:#010x}, contents hash to {:#010x}",
                expected, found
            ),
            Error::OffsetOutOfBounds(id) => write!(f, "entity {} is outside the file", id),
            Error::MissingIndexHeader(id) => write!(f, "no index region covers entity {}", id),
            Error::BadString(id) => write!(f, "malformed string item at {}", id),
            Error::BadSourceLang(raw) => write!(f, "unknown source language {}", raw),
            Error::BadTypeId(raw) => write!(f, "unknown type encoding {:#x}", raw),
            Error::BadTag { tag, offset } => write!(f, "unknown tag {:#x} at {:#x}", tag, offset),
            Error::UnknownItem(what) => write!(f, "unknown builder item: {}", what),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}
