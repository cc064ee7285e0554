use super::leb128::decode_uleb128;
use super::{EntityId, Error, SourceLang, Type};
use crate::util::{fnv_hash, fnv_hash_bytes, merge_hashes, FNV_INITIAL_SEED};
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;
use std::fs;
use std::path::Path;

/// Magic at the very start of every file
pub const MAGIC: [u8; 8] = *b"PANDA\0\0\0";

/// Version written by `FileBuilder`
pub const VERSION: [u8; 4] = [0, 0, 0, 5];

/// Size of the fixed file header
pub const HEADER_SIZE: usize = 44;

/// Size of one entry in the index section
pub const INDEX_HEADER_SIZE: usize = 32;

/// Bytes covered by the checksum start here
pub(crate) const CHECKSUMMED_FROM: usize = 12;

/// Fixed file header
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub checksum: u32,
    pub version: [u8; 4],
    pub file_size: u32,
    pub foreign_off: u32,
    pub foreign_size: u32,
    pub num_classes: u32,
    pub class_idx_off: u32,
    pub num_indexes: u32,
    pub index_section_off: u32,
}

/// One region of the file, along with the index tables methods in that region refer through
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndexHeader {
    pub start: u32,
    pub end: u32,
    pub class_idx_size: u32,
    pub class_idx_off: u32,
    pub method_idx_size: u32,
    pub method_idx_off: u32,
    pub field_idx_size: u32,
    pub field_idx_off: u32,
}

/// A loaded bytecode file
///
/// The file owns its bytes. Every accessor borrows from it, so cached entities can keep pointing
/// into the bytecode (eg. instructions) for as long as the file is alive.
pub struct PandaFile {
    full_filename: String,
    data: Vec<u8>,
    header: Header,
    index_headers: Vec<IndexHeader>,
    uniq_id: u32,
}

impl PandaFile {
    /// Parse and validate a file from bytes
    pub fn from_bytes(full_filename: impl Into<String>, data: Vec<u8>) -> Result<PandaFile, Error> {
        let full_filename = full_filename.into();
        let reader = Reader::new(&data);

        let mut magic = [0u8; 8];
        magic.copy_from_slice(reader.bytes(0, MAGIC.len())?);
        if magic != MAGIC {
            return Err(Error::BadMagic(magic));
        }

        let mut version = [0u8; 4];
        version.copy_from_slice(reader.bytes(12, 4)?);
        let header = Header {
            checksum: reader.u32(8)?,
            version,
            file_size: reader.u32(16)?,
            foreign_off: reader.u32(20)?,
            foreign_size: reader.u32(24)?,
            num_classes: reader.u32(28)?,
            class_idx_off: reader.u32(32)?,
            num_indexes: reader.u32(36)?,
            index_section_off: reader.u32(40)?,
        };

        if header.file_size as usize != data.len() {
            return Err(Error::SizeMismatch {
                declared: header.file_size,
                actual: data.len(),
            });
        }

        let found = checksum(&data);
        if found != header.checksum {
            return Err(Error::ChecksumMismatch {
                expected: header.checksum,
                found,
            });
        }

        let index_section = reader.table(
            header.index_section_off as usize,
            header.num_indexes,
            INDEX_HEADER_SIZE,
        )?;
        let index_headers = index_section
            .chunks_exact(INDEX_HEADER_SIZE)
            .map(|entry| IndexHeader {
                start: LittleEndian::read_u32(&entry[0..4]),
                end: LittleEndian::read_u32(&entry[4..8]),
                class_idx_size: LittleEndian::read_u32(&entry[8..12]),
                class_idx_off: LittleEndian::read_u32(&entry[12..16]),
                method_idx_size: LittleEndian::read_u32(&entry[16..20]),
                method_idx_off: LittleEndian::read_u32(&entry[20..24]),
                field_idx_size: LittleEndian::read_u32(&entry[24..28]),
                field_idx_off: LittleEndian::read_u32(&entry[28..32]),
            })
            .collect();

        // Class list must be readable up front, everything else is checked lazily
        reader.table(header.class_idx_off as usize, header.num_classes, 4)?;

        let uniq_id = merge_hashes(
            fnv_hash(basename(&full_filename).as_bytes()),
            fnv_hash(&data[..HEADER_SIZE]),
        );

        log::debug!(
            "Loaded {} ({} bytes, {} classes, uniq id {:#010x})",
            full_filename,
            data.len(),
            header.num_classes,
            uniq_id
        );

        Ok(PandaFile {
            full_filename,
            data,
            header,
            index_headers,
            uniq_id,
        })
    }

    /// Read a file from disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<PandaFile, Error> {
        let data = fs::read(path.as_ref())?;
        PandaFile::from_bytes(path.as_ref().to_string_lossy().into_owned(), data)
    }

    /// Identity of the file, derived from its name and header
    pub fn uniq_id(&self) -> u32 {
        self.uniq_id
    }

    pub fn full_filename(&self) -> &str {
        &self.full_filename
    }

    /// Name of the file without any leading directories
    pub fn filename(&self) -> &str {
        basename(&self.full_filename)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn reader(&self) -> Reader<'_> {
        Reader::new(&self.data)
    }

    /// Every class item in the file, including foreign ones
    pub fn class_ids(&self) -> Vec<EntityId> {
        let reader = self.reader();
        let start = self.header.class_idx_off as usize;
        (0..self.header.num_classes as usize)
            .filter_map(|i| reader.u32(start + i * 4).ok())
            .map(EntityId)
            .collect()
    }

    /// Whether the entity lives in the foreign region (declared here, defined elsewhere)
    pub fn is_external(&self, id: EntityId) -> bool {
        let start = self.header.foreign_off;
        let end = start.saturating_add(self.header.foreign_size);
        start <= id.offset() && id.offset() < end
    }

    /// String data at `id`, without the length prefix and terminator
    pub fn string_data(&self, id: EntityId) -> Result<&[u8], Error> {
        let off = id.offset() as usize;
        let tail = self
            .data
            .get(off..)
            .ok_or(Error::OffsetOutOfBounds(id))?;
        let (len, len_size) = decode_uleb128(tail).ok_or(Error::BadString(id))?;
        let start = len_size;
        let end = start + len as usize;
        match tail.get(start..=end) {
            Some(bytes) if bytes[len as usize] == 0 => Ok(&bytes[..len as usize]),
            _ => Err(Error::BadString(id)),
        }
    }

    /// Size in bytes of the string item at `id`
    pub(crate) fn string_item_size(&self, id: EntityId) -> Result<usize, Error> {
        let tail = self
            .data
            .get(id.offset() as usize..)
            .ok_or(Error::OffsetOutOfBounds(id))?;
        let (len, len_size) = decode_uleb128(tail).ok_or(Error::BadString(id))?;
        Ok(len_size + len as usize + 1)
    }

    /// Position of the region that covers `id` inside the index section
    pub fn index_header_position(&self, id: EntityId) -> Option<usize> {
        self.index_headers
            .iter()
            .position(|header| header.start <= id.offset() && id.offset() < header.end)
    }

    pub fn index_header(&self, position: usize) -> Option<&IndexHeader> {
        self.index_headers.get(position)
    }

    pub fn index_headers(&self) -> &[IndexHeader] {
        &self.index_headers
    }

    /// Class index table of a region
    pub fn class_index(&self, header: &IndexHeader) -> Result<Vec<Type>, Error> {
        self.u32_table(header.class_idx_off, header.class_idx_size)?
            .into_iter()
            .map(Type::from_encoding)
            .collect()
    }

    /// Method index table of a region
    pub fn method_index(&self, header: &IndexHeader) -> Result<Vec<EntityId>, Error> {
        Ok(self
            .u32_table(header.method_idx_off, header.method_idx_size)?
            .into_iter()
            .map(EntityId)
            .collect())
    }

    /// Field index table of a region
    pub fn field_index(&self, header: &IndexHeader) -> Result<Vec<EntityId>, Error> {
        Ok(self
            .u32_table(header.field_idx_off, header.field_idx_size)?
            .into_iter()
            .map(EntityId)
            .collect())
    }

    fn u32_table(&self, off: u32, size: u32) -> Result<Vec<u32>, Error> {
        Ok(self
            .reader()
            .table(off as usize, size, 4)?
            .chunks_exact(4)
            .map(LittleEndian::read_u32)
            .collect())
    }
}

impl fmt::Debug for PandaFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PandaFile")
            .field("full_filename", &self.full_filename)
            .field("size", &self.data.len())
            .field("uniq_id", &format_args!("{:#010x}", self.uniq_id))
            .finish()
    }
}

fn basename(path: &str) -> &str {
    path.rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(path)
}

/// Checksum of everything following the checksum field
pub(crate) fn checksum(data: &[u8]) -> u32 {
    data.get(CHECKSUMMED_FROM..)
        .map(|rest| fnv_hash_bytes(rest, FNV_INITIAL_SEED))
        .unwrap_or(FNV_INITIAL_SEED)
}

/// Bounds checked little endian reads at absolute offsets
#[derive(Copy, Clone)]
pub(crate) struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Reader<'a> {
        Reader { data }
    }

    pub fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8], Error> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or(Error::UnexpectedEof {
                offset,
                wanted: len,
            })
    }

    /// `count` consecutive items of `item_size` bytes each
    pub fn table(&self, offset: usize, count: u32, item_size: usize) -> Result<&'a [u8], Error> {
        let len = (count as usize)
            .checked_mul(item_size)
            .ok_or(Error::UnexpectedEof {
                offset,
                wanted: usize::MAX,
            })?;
        self.bytes(offset, len)
    }

    pub fn u8(&self, offset: usize) -> Result<u8, Error> {
        Ok(self.bytes(offset, 1)?[0])
    }

    pub fn u32(&self, offset: usize) -> Result<u32, Error> {
        Ok(LittleEndian::read_u32(self.bytes(offset, 4)?))
    }

    pub fn source_lang(&self, offset: usize) -> Result<SourceLang, Error> {
        let raw = self.u8(offset)?;
        SourceLang::from_u8(raw).ok_or(Error::BadSourceLang(raw))
    }
}
