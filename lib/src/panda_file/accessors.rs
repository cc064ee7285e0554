//! Read-only views over the items of a `PandaFile`
//!
//! Every accessor parses the fixed part of its item eagerly when constructed, so the getters can
//! be infallible. Anything requiring a further lookup (protos, code) returns a `Result`.

use super::{
    ClassAccessFlags, EntityId, Error, FieldAccessFlags, Index, MethodAccessFlags, PandaFile,
    SourceLang, Type, TypeId, INVALID_INDEX,
};
use byteorder::{ByteOrder, LittleEndian};

pub(crate) mod class_tag {
    pub const NOTHING: u8 = 0;
    pub const INTERFACES: u8 = 1;
    pub const SOURCE_LANG: u8 = 2;
    pub const SOURCE_FILE: u8 = 3;
}

pub(crate) mod method_tag {
    pub const NOTHING: u8 = 0;
    pub const CODE: u8 = 1;
    pub const SOURCE_LANG: u8 = 2;
}

/// Size of the fixed part of a class item (after its descriptor)
pub(crate) const CLASS_FIXED_SIZE: usize = 16;

/// Size of a field item
pub(crate) const FIELD_ITEM_SIZE: usize = 16;

/// Size of the fixed part of a method item (before its tags)
pub(crate) const METHOD_FIXED_SIZE: usize = 16;

/// Size of a try block header (before its catch blocks)
const TRY_BLOCK_SIZE: usize = 12;

const CATCH_BLOCK_SIZE: usize = 12;

pub struct ClassDataAccessor<'f> {
    file: &'f PandaFile,
    class_id: EntityId,
    descriptor: &'f [u8],
    super_class_id: EntityId,
    access_flags: ClassAccessFlags,
    interfaces: Vec<EntityId>,
    source_lang: Option<SourceLang>,
    source_file_id: Option<EntityId>,
    num_fields: u32,
    num_methods: u32,
    fields_off: usize,
}

impl<'f> ClassDataAccessor<'f> {
    pub fn new(file: &'f PandaFile, class_id: EntityId) -> Result<Self, Error> {
        let reader = file.reader();
        let descriptor = file.string_data(class_id)?;
        let mut off = class_id.offset() as usize + file.string_item_size(class_id)?;

        let super_class_id = EntityId(reader.u32(off)?);
        let access_flags = ClassAccessFlags::from_bits_truncate(reader.u32(off + 4)?);
        let num_fields = reader.u32(off + 8)?;
        let num_methods = reader.u32(off + 12)?;
        off += CLASS_FIXED_SIZE;

        let mut interfaces = vec![];
        let mut source_lang = None;
        let mut source_file_id = None;
        loop {
            let tag = reader.u8(off)?;
            off += 1;
            match tag {
                class_tag::NOTHING => break,
                class_tag::INTERFACES => {
                    let count = reader.u32(off)?;
                    off += 4;
                    let table = reader.table(off, count, 4)?;
                    let ids = table.chunks_exact(4).map(LittleEndian::read_u32);
                    interfaces.extend(ids.map(EntityId));
                    off += table.len();
                }
                class_tag::SOURCE_LANG => {
                    source_lang = Some(reader.source_lang(off)?);
                    off += 1;
                }
                class_tag::SOURCE_FILE => {
                    source_file_id = Some(EntityId(reader.u32(off)?));
                    off += 4;
                }
                _ => {
                    return Err(Error::BadTag {
                        tag,
                        offset: off - 1,
                    })
                }
            }
        }

        // Each method item carries at least its terminating tag
        let fields = reader.table(off, num_fields, FIELD_ITEM_SIZE)?;
        reader.table(off + fields.len(), num_methods, METHOD_FIXED_SIZE + 1)?;

        Ok(ClassDataAccessor {
            file,
            class_id,
            descriptor,
            super_class_id,
            access_flags,
            interfaces,
            source_lang,
            source_file_id,
            num_fields,
            num_methods,
            fields_off: off,
        })
    }

    pub fn file(&self) -> &'f PandaFile {
        self.file
    }

    pub fn class_id(&self) -> EntityId {
        self.class_id
    }

    pub fn descriptor(&self) -> &'f [u8] {
        self.descriptor
    }

    /// Super class, or an id with offset 0 if the class has none
    pub fn super_class_id(&self) -> EntityId {
        self.super_class_id
    }

    pub fn access_flags(&self) -> ClassAccessFlags {
        self.access_flags
    }

    pub fn interfaces(&self) -> &[EntityId] {
        &self.interfaces
    }

    pub fn source_lang(&self) -> Option<SourceLang> {
        self.source_lang
    }

    pub fn source_file_id(&self) -> Option<EntityId> {
        self.source_file_id
    }

    pub fn num_fields(&self) -> u32 {
        self.num_fields
    }

    pub fn num_methods(&self) -> u32 {
        self.num_methods
    }

    /// Field items, which immediately follow the class item
    pub fn field_ids(&self) -> Result<Vec<EntityId>, Error> {
        (0..self.num_fields as usize)
            .map(|i| entity_at(self.fields_off + i * FIELD_ITEM_SIZE))
            .collect()
    }

    /// Method items, which immediately follow the field items
    pub fn method_ids(&self) -> Result<Vec<EntityId>, Error> {
        let mut off = self.fields_off + self.num_fields as usize * FIELD_ITEM_SIZE;
        let mut ids = vec![];
        for _ in 0..self.num_methods {
            let method = MethodDataAccessor::new(self.file, entity_at(off)?)?;
            off += method.size();
            ids.push(method.method_id());
        }
        Ok(ids)
    }
}

fn entity_at(offset: usize) -> Result<EntityId, Error> {
    u32::try_from(offset)
        .map(EntityId)
        .map_err(|_| Error::UnexpectedEof { offset, wanted: 0 })
}

pub struct MethodDataAccessor<'f> {
    file: &'f PandaFile,
    method_id: EntityId,
    class_id: EntityId,
    proto_id: EntityId,
    name_id: EntityId,
    access_flags: MethodAccessFlags,
    code_id: Option<EntityId>,
    source_lang: Option<SourceLang>,
    size: usize,
}

impl<'f> MethodDataAccessor<'f> {
    pub fn new(file: &'f PandaFile, method_id: EntityId) -> Result<Self, Error> {
        let reader = file.reader();
        let start = method_id.offset() as usize;
        let class_id = EntityId(reader.u32(start)?);
        let proto_id = EntityId(reader.u32(start + 4)?);
        let name_id = EntityId(reader.u32(start + 8)?);
        let access_flags = MethodAccessFlags::from_bits_truncate(reader.u32(start + 12)?);

        let mut off = start + METHOD_FIXED_SIZE;
        let mut code_id = None;
        let mut source_lang = None;
        loop {
            let tag = reader.u8(off)?;
            off += 1;
            match tag {
                method_tag::NOTHING => break,
                method_tag::CODE => {
                    code_id = Some(EntityId(reader.u32(off)?));
                    off += 4;
                }
                method_tag::SOURCE_LANG => {
                    source_lang = Some(reader.source_lang(off)?);
                    off += 1;
                }
                _ => {
                    return Err(Error::BadTag {
                        tag,
                        offset: off - 1,
                    })
                }
            }
        }

        Ok(MethodDataAccessor {
            file,
            method_id,
            class_id,
            proto_id,
            name_id,
            access_flags,
            code_id,
            source_lang,
            size: off - start,
        })
    }

    pub fn method_id(&self) -> EntityId {
        self.method_id
    }

    pub fn class_id(&self) -> EntityId {
        self.class_id
    }

    pub fn proto_id(&self) -> EntityId {
        self.proto_id
    }

    pub fn name_id(&self) -> EntityId {
        self.name_id
    }

    pub fn name(&self) -> Result<&'f [u8], Error> {
        self.file.string_data(self.name_id)
    }

    pub fn access_flags(&self) -> MethodAccessFlags {
        self.access_flags
    }

    pub fn code_id(&self) -> Option<EntityId> {
        self.code_id
    }

    pub fn source_lang(&self) -> Option<SourceLang> {
        self.source_lang
    }

    /// Size of the whole method item
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    pub fn is_native(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::NATIVE)
    }

    pub fn is_public(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::PUBLIC)
    }

    pub fn is_private(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::PRIVATE)
    }

    pub fn is_protected(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::PROTECTED)
    }

    pub fn is_synthetic(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::SYNTHETIC)
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::ABSTRACT)
    }

    pub fn is_final(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::FINAL)
    }

    /// Types of the method, return type first
    ///
    /// Unless `skip_this` is set, instance methods get their receiver (as a reference to the class
    /// the method is declared in) right after the return type.
    pub fn types_in_proto(&self, skip_this: bool) -> Result<Vec<Type>, Error> {
        let proto = ProtoDataAccessor::new(self.file, self.proto_id)?;
        let mut types = Vec::with_capacity(proto.types().len() + 1);
        types.push(proto.return_type());
        if !self.is_static() && !skip_this {
            types.push(Type::Reference(self.class_id));
        }
        types.extend_from_slice(proto.arg_types());
        Ok(types)
    }
}

pub struct FieldDataAccessor<'f> {
    file: &'f PandaFile,
    field_id: EntityId,
    class_id: EntityId,
    field_type: Type,
    name_id: EntityId,
    access_flags: FieldAccessFlags,
}

impl<'f> FieldDataAccessor<'f> {
    pub fn new(file: &'f PandaFile, field_id: EntityId) -> Result<Self, Error> {
        let reader = file.reader();
        let start = field_id.offset() as usize;
        Ok(FieldDataAccessor {
            file,
            field_id,
            class_id: EntityId(reader.u32(start)?),
            field_type: Type::from_encoding(reader.u32(start + 4)?)?,
            name_id: EntityId(reader.u32(start + 8)?),
            access_flags: FieldAccessFlags::from_bits_truncate(reader.u32(start + 12)?),
        })
    }

    pub fn field_id(&self) -> EntityId {
        self.field_id
    }

    pub fn class_id(&self) -> EntityId {
        self.class_id
    }

    pub fn field_type(&self) -> Type {
        self.field_type
    }

    pub fn name_id(&self) -> EntityId {
        self.name_id
    }

    pub fn name(&self) -> Result<&'f [u8], Error> {
        self.file.string_data(self.name_id)
    }

    pub fn access_flags(&self) -> FieldAccessFlags {
        self.access_flags
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::STATIC)
    }

    pub fn is_volatile(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::VOLATILE)
    }

    pub fn is_public(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::PUBLIC)
    }

    pub fn is_protected(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::PROTECTED)
    }

    pub fn is_private(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::PRIVATE)
    }

    pub fn is_final(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::FINAL)
    }
}

/// Return and argument types of a method
pub struct ProtoDataAccessor {
    types: Vec<Type>,
}

impl ProtoDataAccessor {
    pub fn new(file: &PandaFile, proto_id: EntityId) -> Result<Self, Error> {
        let reader = file.reader();
        let start = proto_id.offset() as usize;
        let count = reader.u32(start)?;
        if count == 0 {
            return Err(Error::BadTypeId(TypeId::Invalid.code()));
        }
        let types = reader
            .table(start + 4, count, 4)?
            .chunks_exact(4)
            .map(|encoded| Type::from_encoding(LittleEndian::read_u32(encoded)))
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(ProtoDataAccessor { types })
    }

    pub fn types(&self) -> &[Type] {
        &self.types
    }

    pub fn return_type(&self) -> Type {
        self.types[0]
    }

    pub fn arg_types(&self) -> &[Type] {
        &self.types[1..]
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatchBlock {
    /// Index into the class index of the region, `None` for a catch-all block
    pub type_idx: Option<Index>,
    pub handler_pc: u32,
    pub code_size: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TryBlock {
    pub start_pc: u32,
    pub length: u32,
    pub catch_blocks: Vec<CatchBlock>,
}

pub struct CodeDataAccessor<'f> {
    num_vregs: u32,
    num_args: u32,
    instructions: &'f [u8],
    try_blocks: Vec<TryBlock>,
}

impl<'f> CodeDataAccessor<'f> {
    pub fn new(file: &'f PandaFile, code_id: EntityId) -> Result<Self, Error> {
        let reader = file.reader();
        let start = code_id.offset() as usize;
        let num_vregs = reader.u32(start)?;
        let num_args = reader.u32(start + 4)?;
        let code_size = reader.u32(start + 8)? as usize;
        let tries_size = reader.u32(start + 12)?;
        let instructions = reader.bytes(start + 16, code_size)?;

        let mut off = start + 16 + code_size;
        reader.table(off, tries_size, TRY_BLOCK_SIZE)?;
        let mut try_blocks = vec![];
        for _ in 0..tries_size {
            let start_pc = reader.u32(off)?;
            let length = reader.u32(off + 4)?;
            let num_catches = reader.u32(off + 8)?;
            off += TRY_BLOCK_SIZE;
            reader.table(off, num_catches, CATCH_BLOCK_SIZE)?;
            let mut catch_blocks = vec![];
            for _ in 0..num_catches {
                let type_idx = reader.u32(off)?;
                catch_blocks.push(CatchBlock {
                    type_idx: Some(type_idx).filter(|idx| *idx != INVALID_INDEX),
                    handler_pc: reader.u32(off + 4)?,
                    code_size: reader.u32(off + 8)?,
                });
                off += CATCH_BLOCK_SIZE;
            }
            try_blocks.push(TryBlock {
                start_pc,
                length,
                catch_blocks,
            });
        }

        Ok(CodeDataAccessor {
            num_vregs,
            num_args,
            instructions,
            try_blocks,
        })
    }

    pub fn num_vregs(&self) -> u32 {
        self.num_vregs
    }

    pub fn num_args(&self) -> u32 {
        self.num_args
    }

    pub fn instructions(&self) -> &'f [u8] {
        self.instructions
    }

    pub fn code_size(&self) -> usize {
        self.instructions.len()
    }

    pub fn try_blocks(&self) -> &[TryBlock] {
        &self.try_blocks
    }
}
