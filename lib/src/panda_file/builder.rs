use super::accessors::{class_tag, method_tag, CLASS_FIXED_SIZE, FIELD_ITEM_SIZE, METHOD_FIXED_SIZE};
use super::file::{checksum, HEADER_SIZE, INDEX_HEADER_SIZE, MAGIC, VERSION};
use super::serialize::{Serialize, StringItem};
use super::{
    ClassAccessFlags, Error, FieldAccessFlags, Index, MethodAccessFlags, PandaFile, SourceLang,
    TypeId, INVALID_INDEX,
};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::collections::HashMap;
use std::io::{Result as IoResult, Write};

/// Class declared through a `FileBuilder`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClassHandle {
    /// Class defined in the file being built
    Local(usize),

    /// Class only referred to by the file being built
    Foreign(usize),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodHandle(usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldHandle(usize);

/// Type as seen by the builder
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Primitive(TypeId),
    Class(ClassHandle),
}

/// Return type and argument types (not including the receiver)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Proto {
    pub return_type: TypeRef,
    pub params: Vec<TypeRef>,
}

impl Proto {
    pub fn new(return_type: TypeRef, params: Vec<TypeRef>) -> Proto {
        Proto {
            return_type,
            params,
        }
    }

    fn size(&self) -> usize {
        4 + 4 * (1 + self.params.len())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatchBlockItem {
    /// Index into the class index, `None` for catch-all
    pub type_idx: Option<Index>,
    pub handler_pc: u32,
    pub code_size: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TryBlockItem {
    pub start_pc: u32,
    pub length: u32,
    pub catch_blocks: Vec<CatchBlockItem>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodeItem {
    pub num_vregs: u32,
    pub num_args: u32,
    pub instructions: Vec<u8>,
    pub try_blocks: Vec<TryBlockItem>,
}

impl CodeItem {
    fn size(&self) -> usize {
        16 + self.instructions.len()
            + self
                .try_blocks
                .iter()
                .map(|try_block| 12 + 12 * try_block.catch_blocks.len())
                .sum::<usize>()
    }
}

impl Serialize for CodeItem {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> IoResult<()> {
        self.num_vregs.serialize(writer)?;
        self.num_args.serialize(writer)?;
        (self.instructions.len() as u32).serialize(writer)?;
        (self.try_blocks.len() as u32).serialize(writer)?;
        writer.write_all(&self.instructions)?;
        for try_block in &self.try_blocks {
            try_block.start_pc.serialize(writer)?;
            try_block.length.serialize(writer)?;
            (try_block.catch_blocks.len() as u32).serialize(writer)?;
            for catch_block in &try_block.catch_blocks {
                catch_block
                    .type_idx
                    .unwrap_or(INVALID_INDEX)
                    .serialize(writer)?;
                catch_block.handler_pc.serialize(writer)?;
                catch_block.code_size.serialize(writer)?;
            }
        }
        Ok(())
    }
}

struct ClassItem {
    descriptor: Vec<u8>,
    super_class: Option<ClassHandle>,
    access_flags: ClassAccessFlags,
    interfaces: Vec<ClassHandle>,
    source_lang: Option<SourceLang>,
    fields: Vec<usize>,
    methods: Vec<usize>,
}

impl ClassItem {
    fn tags_size(&self) -> usize {
        let interfaces = if self.interfaces.is_empty() {
            0
        } else {
            1 + 4 + 4 * self.interfaces.len()
        };
        let source_lang = if self.source_lang.is_some() { 2 } else { 0 };
        interfaces + source_lang + 1
    }
}

struct MethodItem {
    class: ClassHandle,
    name: Vec<u8>,
    proto: Proto,
    access_flags: MethodAccessFlags,
    source_lang: Option<SourceLang>,
    code: Option<CodeItem>,
}

impl MethodItem {
    fn size(&self) -> usize {
        let code = if self.code.is_some() { 5 } else { 0 };
        let source_lang = if self.source_lang.is_some() { 2 } else { 0 };
        METHOD_FIXED_SIZE + code + source_lang + 1
    }
}

struct FieldItem {
    class: ClassHandle,
    name: Vec<u8>,
    field_type: TypeRef,
    access_flags: FieldAccessFlags,
}

/// Offsets of every item, computed before anything gets written
struct Layout {
    index_section_off: u32,
    class_idx_off: u32,
    foreign_off: u32,
    foreign_size: u32,
    local_classes: Vec<u32>,
    foreign_classes: Vec<u32>,
    methods: Vec<u32>,
    fields: Vec<u32>,
    strings: HashMap<Vec<u8>, u32>,
    string_order: Vec<Vec<u8>>,
    protos: Vec<u32>,
    codes: Vec<Option<u32>>,
    class_index_off: u32,
    method_index_off: u32,
    field_index_off: u32,
    file_size: u32,
}

/// Assembles a bytecode file in memory
///
/// Items are declared first and laid out only when the file is built, so declarations can refer
/// to each other in any order. The whole file is a single index region.
#[derive(Default)]
pub struct FileBuilder {
    classes: Vec<ClassItem>,
    foreign_classes: Vec<Vec<u8>>,
    methods: Vec<MethodItem>,
    fields: Vec<FieldItem>,
    class_index: Vec<TypeRef>,
    method_index: Vec<MethodHandle>,
    field_index: Vec<FieldHandle>,
}

impl FileBuilder {
    pub fn new() -> FileBuilder {
        FileBuilder::default()
    }

    /// Declare a class defined in this file
    pub fn add_class(&mut self, descriptor: &str, access_flags: ClassAccessFlags) -> ClassHandle {
        self.classes.push(ClassItem {
            descriptor: descriptor.as_bytes().to_vec(),
            super_class: None,
            access_flags,
            interfaces: vec![],
            source_lang: None,
            fields: vec![],
            methods: vec![],
        });
        ClassHandle::Local(self.classes.len() - 1)
    }

    /// Declare a class defined in some other file
    pub fn add_foreign_class(&mut self, descriptor: &str) -> ClassHandle {
        self.foreign_classes.push(descriptor.as_bytes().to_vec());
        ClassHandle::Foreign(self.foreign_classes.len() - 1)
    }

    pub fn set_super_class(&mut self, class: ClassHandle, super_class: ClassHandle) {
        if let Some(item) = self.local_class_mut(class) {
            item.super_class = Some(super_class);
        }
    }

    pub fn add_interface(&mut self, class: ClassHandle, interface: ClassHandle) {
        if let Some(item) = self.local_class_mut(class) {
            item.interfaces.push(interface);
        }
    }

    pub fn set_source_lang(&mut self, class: ClassHandle, source_lang: SourceLang) {
        if let Some(item) = self.local_class_mut(class) {
            item.source_lang = Some(source_lang);
        }
    }

    /// Declare a method (foreign if the class is foreign)
    pub fn add_method(
        &mut self,
        class: ClassHandle,
        name: &str,
        proto: Proto,
        access_flags: MethodAccessFlags,
    ) -> MethodHandle {
        let idx = self.methods.len();
        self.methods.push(MethodItem {
            class,
            name: name.as_bytes().to_vec(),
            proto,
            access_flags,
            source_lang: None,
            code: None,
        });
        if let Some(item) = self.local_class_mut(class) {
            item.methods.push(idx);
        }
        MethodHandle(idx)
    }

    pub fn set_method_source_lang(&mut self, method: MethodHandle, source_lang: SourceLang) {
        if let Some(item) = self.methods.get_mut(method.0) {
            item.source_lang = Some(source_lang);
        }
    }

    /// Attach code to a method (ignored for methods of foreign classes)
    pub fn set_code(&mut self, method: MethodHandle, code: CodeItem) {
        if let Some(item) = self.methods.get_mut(method.0) {
            if let ClassHandle::Local(_) = item.class {
                item.code = Some(code);
            }
        }
    }

    /// Declare a field (foreign if the class is foreign)
    pub fn add_field(
        &mut self,
        class: ClassHandle,
        name: &str,
        field_type: TypeRef,
        access_flags: FieldAccessFlags,
    ) -> FieldHandle {
        let idx = self.fields.len();
        self.fields.push(FieldItem {
            class,
            name: name.as_bytes().to_vec(),
            field_type,
            access_flags,
        });
        if let Some(item) = self.local_class_mut(class) {
            item.fields.push(idx);
        }
        FieldHandle(idx)
    }

    /// Slot of a type in the region's class index (added if missing)
    pub fn class_index_entry(&mut self, ty: TypeRef) -> Index {
        index_entry(&mut self.class_index, ty)
    }

    /// Slot of a method in the region's method index (added if missing)
    pub fn method_index_entry(&mut self, method: MethodHandle) -> Index {
        index_entry(&mut self.method_index, method)
    }

    /// Slot of a field in the region's field index (added if missing)
    pub fn field_index_entry(&mut self, field: FieldHandle) -> Index {
        index_entry(&mut self.field_index, field)
    }

    fn local_class_mut(&mut self, class: ClassHandle) -> Option<&mut ClassItem> {
        match class {
            ClassHandle::Local(idx) => self.classes.get_mut(idx),
            ClassHandle::Foreign(_) => None,
        }
    }

    /// Lay out, serialize and load the file
    pub fn build(&self, full_filename: impl Into<String>) -> Result<PandaFile, Error> {
        PandaFile::from_bytes(full_filename, self.to_bytes()?)
    }

    /// Lay out and serialize the file
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let layout = self.layout();
        let mut bytes = Vec::with_capacity(layout.file_size as usize);
        self.write(&layout, &mut bytes)?;

        if bytes.len() != layout.file_size as usize {
            return Err(Error::SizeMismatch {
                declared: layout.file_size,
                actual: bytes.len(),
            });
        }

        let sum = checksum(&bytes);
        LittleEndian::write_u32(&mut bytes[8..12], sum);
        Ok(bytes)
    }

    fn layout(&self) -> Layout {
        let mut off = HEADER_SIZE;

        let index_section_off = off;
        off += INDEX_HEADER_SIZE;

        let class_idx_off = off;
        off += 4 * (self.classes.len() + self.foreign_classes.len());

        let mut methods = vec![0; self.methods.len()];
        let mut fields = vec![0; self.fields.len()];

        // Foreign region: foreign classes, then members of foreign classes
        let foreign_off = off;
        let mut foreign_classes = Vec::with_capacity(self.foreign_classes.len());
        for descriptor in &self.foreign_classes {
            foreign_classes.push(off as u32);
            off += StringItem(descriptor).size();
        }
        for (idx, method) in self.methods.iter().enumerate() {
            if let ClassHandle::Foreign(_) = method.class {
                methods[idx] = off as u32;
                off += method.size();
            }
        }
        for (idx, field) in self.fields.iter().enumerate() {
            if let ClassHandle::Foreign(_) = field.class {
                fields[idx] = off as u32;
                off += FIELD_ITEM_SIZE;
            }
        }
        let foreign_size = off - foreign_off;

        // Local classes, each followed by its fields and methods
        let mut local_classes = Vec::with_capacity(self.classes.len());
        for class in &self.classes {
            local_classes.push(off as u32);
            off += StringItem(&class.descriptor).size() + CLASS_FIXED_SIZE + class.tags_size();
            for field in &class.fields {
                fields[*field] = off as u32;
                off += FIELD_ITEM_SIZE;
            }
            for method in &class.methods {
                methods[*method] = off as u32;
                off += self.methods[*method].size();
            }
        }

        let mut strings = HashMap::new();
        let mut string_order = vec![];
        let names = self
            .methods
            .iter()
            .map(|method| &method.name)
            .chain(self.fields.iter().map(|field| &field.name));
        for name in names {
            if !strings.contains_key(name) {
                strings.insert(name.clone(), off as u32);
                string_order.push(name.clone());
                off += StringItem(name).size();
            }
        }

        let mut protos = Vec::with_capacity(self.methods.len());
        for method in &self.methods {
            protos.push(off as u32);
            off += method.proto.size();
        }

        let mut codes = Vec::with_capacity(self.methods.len());
        for method in &self.methods {
            codes.push(method.code.as_ref().map(|code| {
                let code_off = off as u32;
                off += code.size();
                code_off
            }));
        }

        let class_index_off = off;
        off += 4 * self.class_index.len();
        let method_index_off = off;
        off += 4 * self.method_index.len();
        let field_index_off = off;
        off += 4 * self.field_index.len();

        Layout {
            index_section_off: index_section_off as u32,
            class_idx_off: class_idx_off as u32,
            foreign_off: foreign_off as u32,
            foreign_size: foreign_size as u32,
            local_classes,
            foreign_classes,
            methods,
            fields,
            strings,
            string_order,
            protos,
            codes,
            class_index_off: class_index_off as u32,
            method_index_off: method_index_off as u32,
            field_index_off: field_index_off as u32,
            file_size: off as u32,
        }
    }

    fn class_offset(&self, layout: &Layout, class: ClassHandle) -> Result<u32, Error> {
        let offset = match class {
            ClassHandle::Local(idx) => layout.local_classes.get(idx),
            ClassHandle::Foreign(idx) => layout.foreign_classes.get(idx),
        };
        offset
            .copied()
            .ok_or_else(|| Error::UnknownItem(format!("{:?}", class)))
    }

    fn type_encoding(&self, layout: &Layout, ty: TypeRef) -> Result<u32, Error> {
        match ty {
            TypeRef::Primitive(type_id) if type_id.is_primitive() => Ok(type_id.code()),
            TypeRef::Primitive(type_id) => Err(Error::BadTypeId(type_id.code())),
            TypeRef::Class(class) => self.class_offset(layout, class),
        }
    }

    fn string_offset(&self, layout: &Layout, string: &[u8]) -> Result<u32, Error> {
        layout
            .strings
            .get(string)
            .copied()
            .ok_or_else(|| Error::UnknownItem(String::from_utf8_lossy(string).into_owned()))
    }

    fn write(&self, layout: &Layout, out: &mut Vec<u8>) -> Result<(), Error> {
        let num_classes = (self.classes.len() + self.foreign_classes.len()) as u32;

        // Header (checksum is patched in at the end)
        out.write_all(&MAGIC)?;
        0u32.serialize(out)?;
        out.write_all(&VERSION)?;
        layout.file_size.serialize(out)?;
        layout.foreign_off.serialize(out)?;
        layout.foreign_size.serialize(out)?;
        num_classes.serialize(out)?;
        layout.class_idx_off.serialize(out)?;
        1u32.serialize(out)?;
        layout.index_section_off.serialize(out)?;

        // The single index region spans the whole file
        0u32.serialize(out)?;
        layout.file_size.serialize(out)?;
        (self.class_index.len() as u32).serialize(out)?;
        layout.class_index_off.serialize(out)?;
        (self.method_index.len() as u32).serialize(out)?;
        layout.method_index_off.serialize(out)?;
        (self.field_index.len() as u32).serialize(out)?;
        layout.field_index_off.serialize(out)?;

        for offset in layout.local_classes.iter().chain(&layout.foreign_classes) {
            offset.serialize(out)?;
        }

        for descriptor in &self.foreign_classes {
            StringItem(descriptor).serialize(out)?;
        }
        for (idx, method) in self.methods.iter().enumerate() {
            if let ClassHandle::Foreign(_) = method.class {
                self.write_method(layout, idx, out)?;
            }
        }
        for (idx, field) in self.fields.iter().enumerate() {
            if let ClassHandle::Foreign(_) = field.class {
                self.write_field(layout, idx, out)?;
            }
        }

        for class in &self.classes {
            StringItem(&class.descriptor).serialize(out)?;
            let super_class = match class.super_class {
                Some(super_class) => self.class_offset(layout, super_class)?,
                None => 0,
            };
            super_class.serialize(out)?;
            class.access_flags.serialize(out)?;
            (class.fields.len() as u32).serialize(out)?;
            (class.methods.len() as u32).serialize(out)?;
            if !class.interfaces.is_empty() {
                class_tag::INTERFACES.serialize(out)?;
                (class.interfaces.len() as u32).serialize(out)?;
                for interface in &class.interfaces {
                    self.class_offset(layout, *interface)?.serialize(out)?;
                }
            }
            if let Some(source_lang) = class.source_lang {
                class_tag::SOURCE_LANG.serialize(out)?;
                (source_lang as u8).serialize(out)?;
            }
            class_tag::NOTHING.serialize(out)?;

            for field in &class.fields {
                self.write_field(layout, *field, out)?;
            }
            for method in &class.methods {
                self.write_method(layout, *method, out)?;
            }
        }

        for string in &layout.string_order {
            StringItem(string).serialize(out)?;
        }

        for method in &self.methods {
            (1 + method.proto.params.len() as u32).serialize(out)?;
            self.type_encoding(layout, method.proto.return_type)?
                .serialize(out)?;
            for param in &method.proto.params {
                self.type_encoding(layout, *param)?.serialize(out)?;
            }
        }

        for method in &self.methods {
            if let Some(code) = &method.code {
                code.serialize(out)?;
            }
        }

        for ty in &self.class_index {
            self.type_encoding(layout, *ty)?.serialize(out)?;
        }
        for method in &self.method_index {
            layout
                .methods
                .get(method.0)
                .copied()
                .ok_or_else(|| Error::UnknownItem(format!("{:?}", method)))?
                .serialize(out)?;
        }
        for field in &self.field_index {
            layout
                .fields
                .get(field.0)
                .copied()
                .ok_or_else(|| Error::UnknownItem(format!("{:?}", field)))?
                .serialize(out)?;
        }

        Ok(())
    }

    fn write_method(&self, layout: &Layout, idx: usize, out: &mut Vec<u8>) -> Result<(), Error> {
        let method = &self.methods[idx];
        self.class_offset(layout, method.class)?.serialize(out)?;
        layout.protos[idx].serialize(out)?;
        self.string_offset(layout, &method.name)?.serialize(out)?;
        method.access_flags.serialize(out)?;
        if let Some(code_off) = layout.codes[idx] {
            method_tag::CODE.serialize(out)?;
            code_off.serialize(out)?;
        }
        if let Some(source_lang) = method.source_lang {
            method_tag::SOURCE_LANG.serialize(out)?;
            (source_lang as u8).serialize(out)?;
        }
        method_tag::NOTHING.serialize(out)?;
        Ok(())
    }

    fn write_field(&self, layout: &Layout, idx: usize, out: &mut Vec<u8>) -> Result<(), Error> {
        let field = &self.fields[idx];
        self.class_offset(layout, field.class)?.serialize(out)?;
        self.type_encoding(layout, field.field_type)?
            .serialize(out)?;
        self.string_offset(layout, &field.name)?.serialize(out)?;
        field.access_flags.serialize(out)?;
        Ok(())
    }
}

fn index_entry<T: PartialEq>(index: &mut Vec<T>, entry: T) -> Index {
    match index.iter().position(|existing| *existing == entry) {
        Some(position) => position as Index,
        None => {
            index.push(entry);
            (index.len() - 1) as Index
        }
    }
}
