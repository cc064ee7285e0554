use super::Error;
use std::fmt;

/// Offset based handle of an entity inside one bytecode file
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

impl EntityId {
    pub fn offset(self) -> u32 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Index into one of the per-region index tables
pub type Index = u32;

/// Marks an absent index (eg. the type of a catch-all block)
pub const INVALID_INDEX: Index = u32::MAX;

/// Values below this in a type encoding are primitive type ids, everything else is a class offset
pub const PRIMITIVE_ENCODING_LIMIT: u32 = 0x10;

/// Type tags, numbered the way they are encoded in files
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeId {
    Invalid = 0,
    Void = 1,
    U1 = 2,
    I8 = 3,
    U8 = 4,
    I16 = 5,
    U16 = 6,
    I32 = 7,
    U32 = 8,
    F32 = 9,
    F64 = 10,
    I64 = 11,
    U64 = 12,
    Reference = 13,
    Tagged = 14,
}

impl TypeId {
    pub const COUNT: usize = 15;

    pub const PRIMITIVES: [TypeId; 13] = [
        TypeId::Void,
        TypeId::U1,
        TypeId::I8,
        TypeId::U8,
        TypeId::I16,
        TypeId::U16,
        TypeId::I32,
        TypeId::U32,
        TypeId::F32,
        TypeId::F64,
        TypeId::I64,
        TypeId::U64,
        TypeId::Tagged,
    ];

    pub fn from_code(code: u32) -> Option<TypeId> {
        let type_id = match code {
            0 => TypeId::Invalid,
            1 => TypeId::Void,
            2 => TypeId::U1,
            3 => TypeId::I8,
            4 => TypeId::U8,
            5 => TypeId::I16,
            6 => TypeId::U16,
            7 => TypeId::I32,
            8 => TypeId::U32,
            9 => TypeId::F32,
            10 => TypeId::F64,
            11 => TypeId::I64,
            12 => TypeId::U64,
            13 => TypeId::Reference,
            14 => TypeId::Tagged,
            _ => return None,
        };
        Some(type_id)
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_primitive(self) -> bool {
        !matches!(self, TypeId::Invalid | TypeId::Reference)
    }

    /// One-character descriptor of a primitive type
    pub fn descriptor_char(self) -> Option<u8> {
        let c = match self {
            TypeId::Void => b'V',
            TypeId::U1 => b'Z',
            TypeId::I8 => b'B',
            TypeId::U8 => b'H',
            TypeId::I16 => b'S',
            TypeId::U16 => b'C',
            TypeId::I32 => b'I',
            TypeId::U32 => b'U',
            TypeId::F32 => b'F',
            TypeId::F64 => b'D',
            TypeId::I64 => b'J',
            TypeId::U64 => b'Q',
            TypeId::Tagged => b'A',
            TypeId::Invalid | TypeId::Reference => return None,
        };
        Some(c)
    }

    pub fn from_descriptor_char(c: u8) -> Option<TypeId> {
        TypeId::PRIMITIVES
            .iter()
            .copied()
            .find(|type_id| type_id.descriptor_char() == Some(c))
    }

    /// Human readable name (eg. `i32`)
    pub fn name(self) -> &'static str {
        match self {
            TypeId::Invalid => "invalid",
            TypeId::Void => "void",
            TypeId::U1 => "u1",
            TypeId::I8 => "i8",
            TypeId::U8 => "u8",
            TypeId::I16 => "i16",
            TypeId::U16 => "u16",
            TypeId::I32 => "i32",
            TypeId::U32 => "u32",
            TypeId::F32 => "f32",
            TypeId::F64 => "f64",
            TypeId::I64 => "i64",
            TypeId::U64 => "u64",
            TypeId::Reference => "reference",
            TypeId::Tagged => "any",
        }
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded field, proto or index-table type
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(TypeId),

    /// Reference type, pointing at the class item (whose first element is the descriptor)
    Reference(EntityId),
}

impl Type {
    pub fn from_encoding(raw: u32) -> Result<Type, Error> {
        if raw >= PRIMITIVE_ENCODING_LIMIT {
            return Ok(Type::Reference(EntityId(raw)));
        }
        match TypeId::from_code(raw) {
            Some(type_id) if type_id.is_primitive() => Ok(Type::Primitive(type_id)),
            _ => Err(Error::BadTypeId(raw)),
        }
    }

    pub fn encoding(self) -> u32 {
        match self {
            Type::Primitive(type_id) => type_id.code(),
            Type::Reference(class_id) => class_id.offset(),
        }
    }

    pub fn type_id(self) -> TypeId {
        match self {
            Type::Primitive(type_id) => type_id,
            Type::Reference(_) => TypeId::Reference,
        }
    }
}

/// Source language of a class or method
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceLang {
    Ecmascript = 0,
    PandaAssembly = 1,
    Ets = 2,
}

impl SourceLang {
    pub const COUNT: usize = 3;

    pub const ALL: [SourceLang; SourceLang::COUNT] = [
        SourceLang::Ecmascript,
        SourceLang::PandaAssembly,
        SourceLang::Ets,
    ];

    pub fn from_u8(raw: u8) -> Option<SourceLang> {
        SourceLang::ALL.get(usize::from(raw)).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            SourceLang::Ecmascript => "ecmascript",
            SourceLang::PandaAssembly => "panda-assembly",
            SourceLang::Ets => "ets",
        }
    }

    pub fn from_name(name: &str) -> Option<SourceLang> {
        SourceLang::ALL.iter().copied().find(|lang| lang.name() == name)
    }
}

impl fmt::Display for SourceLang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn primitive_descriptors() {
        for type_id in TypeId::PRIMITIVES {
            let c = type_id.descriptor_char().unwrap();
            assert_eq!(TypeId::from_descriptor_char(c), Some(type_id));
            assert_eq!(TypeId::from_code(type_id.code()), Some(type_id));
        }
        assert_eq!(TypeId::Reference.descriptor_char(), None);
        assert_eq!(TypeId::I32.name(), "i32");
        assert_eq!(TypeId::Tagged.name(), "any");
    }

    #[test]
    fn type_encoding() {
        assert_eq!(Type::from_encoding(7).unwrap(), Type::Primitive(TypeId::I32));
        assert_eq!(
            Type::from_encoding(0x40).unwrap(),
            Type::Reference(EntityId(0x40))
        );
        assert!(Type::from_encoding(0).is_err());
        assert!(Type::from_encoding(13).is_err());
        assert!(Type::from_encoding(15).is_err());
    }

    #[test]
    fn source_lang_codes() {
        assert_eq!(SourceLang::from_u8(1), Some(SourceLang::PandaAssembly));
        assert_eq!(SourceLang::from_u8(3), None);
        assert_eq!(SourceLang::from_name("ets"), Some(SourceLang::Ets));
    }
}
