use super::{ClassSlot, FieldHash, Indexes, MethodHash, UniqId};
use crate::descriptors::DescriptorString;
use crate::panda_file::{
    ClassAccessFlags, EntityId, FieldAccessFlags, MethodAccessFlags, PandaFile, SourceLang,
    TypeId,
};
use crate::util::RefId;
use bitflags::bitflags;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

bitflags! {
    pub struct ClassFlags: u32 {
        const PUBLIC = 0x0001;
        const FINAL = 0x0002;
        const ABSTRACT = 0x0004;
        const INTERFACE = 0x0008;
        const ENUM = 0x0010;
        const ANNOTATION = 0x0020;
        const PRIMITIVE = 0x0040;
        const ARRAY_CLASS = 0x0080;
        const OBJECT_ARRAY_CLASS = 0x0100;
    }
}

impl ClassFlags {
    pub fn from_access_flags(access_flags: ClassAccessFlags) -> ClassFlags {
        let mut flags = ClassFlags::empty();
        flags.set(ClassFlags::PUBLIC, access_flags.contains(ClassAccessFlags::PUBLIC));
        flags.set(ClassFlags::FINAL, access_flags.contains(ClassAccessFlags::FINAL));
        flags.set(ClassFlags::ABSTRACT, access_flags.contains(ClassAccessFlags::ABSTRACT));
        flags.set(ClassFlags::INTERFACE, access_flags.contains(ClassAccessFlags::INTERFACE));
        flags.set(ClassFlags::ENUM, access_flags.contains(ClassAccessFlags::ENUM));
        flags.set(ClassFlags::ANNOTATION, access_flags.contains(ClassAccessFlags::ANNOTATION));
        flags
    }
}

bitflags! {
    pub struct MethodFlags: u32 {
        const STATIC = 0x0001;
        const NATIVE = 0x0002;
        const PUBLIC = 0x0004;
        const PRIVATE = 0x0008;
        const PROTECTED = 0x0010;
        const SYNTHETIC = 0x0020;
        const ABSTRACT = 0x0040;
        const FINAL = 0x0080;
        const CONSTRUCTOR = 0x0100;
        const STATIC_CONSTRUCTOR = 0x0200;
        const ARRAY_CONSTRUCTOR = 0x0400;
    }
}

impl MethodFlags {
    pub fn from_access_flags(access_flags: MethodAccessFlags) -> MethodFlags {
        [
            (MethodAccessFlags::STATIC, MethodFlags::STATIC),
            (MethodAccessFlags::NATIVE, MethodFlags::NATIVE),
            (MethodAccessFlags::PUBLIC, MethodFlags::PUBLIC),
            (MethodAccessFlags::PRIVATE, MethodFlags::PRIVATE),
            (MethodAccessFlags::PROTECTED, MethodFlags::PROTECTED),
            (MethodAccessFlags::SYNTHETIC, MethodFlags::SYNTHETIC),
            (MethodAccessFlags::ABSTRACT, MethodFlags::ABSTRACT),
            (MethodAccessFlags::FINAL, MethodFlags::FINAL),
        ]
        .into_iter()
        .filter(|(access, _)| access_flags.contains(*access))
        .fold(MethodFlags::empty(), |flags, (_, flag)| flags | flag)
    }
}

bitflags! {
    pub struct FieldFlags: u32 {
        const STATIC = 0x0001;
        const VOLATILE = 0x0002;
        const PUBLIC = 0x0004;
        const PROTECTED = 0x0008;
        const PRIVATE = 0x0010;
        const FINAL = 0x0020;
    }
}

impl FieldFlags {
    pub fn from_access_flags(access_flags: FieldAccessFlags) -> FieldFlags {
        [
            (FieldAccessFlags::STATIC, FieldFlags::STATIC),
            (FieldAccessFlags::VOLATILE, FieldFlags::VOLATILE),
            (FieldAccessFlags::PUBLIC, FieldFlags::PUBLIC),
            (FieldAccessFlags::PROTECTED, FieldFlags::PROTECTED),
            (FieldAccessFlags::PRIVATE, FieldFlags::PRIVATE),
            (FieldAccessFlags::FINAL, FieldFlags::FINAL),
        ]
        .into_iter()
        .filter(|(access, _)| access_flags.contains(*access))
        .fold(FieldFlags::empty(), |flags, (_, flag)| flags | flag)
    }
}

/// Where a cached entity was read from
#[derive(Copy, Clone)]
pub struct Origin<'c> {
    pub file: &'c PandaFile,
    pub entity_id: EntityId,
}

impl<'c> fmt::Debug for Origin<'c> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.file.filename(), self.entity_id)
    }
}

pub struct CachedClass<'c> {
    pub id: UniqId,
    pub descriptor: DescriptorString,
    pub source_lang: SourceLang,
    pub type_id: TypeId,
    pub flags: ClassFlags,

    /// `None` for synthetic classes
    pub origin: Option<Origin<'c>>,

    /// Interfaces, followed by the super class (if any)
    pub ancestors: Vec<ClassSlot<'c>>,

    /// Component type, for arrays
    pub array_component: Option<ClassSlot<'c>>,

    /// Own methods, plus inherited ones which have been looked up through this class
    methods: RwLock<HashMap<MethodHash, &'c CachedMethod<'c>>>,

    /// Own fields, plus inherited ones which have been looked up through this class
    fields: RwLock<HashMap<FieldHash, &'c CachedField<'c>>>,

    linked: AtomicBool,
}

/// Everything about a class besides its identity and flags
#[derive(Default)]
pub struct ClassParts<'c> {
    pub ancestors: Vec<ClassSlot<'c>>,
    pub array_component: Option<ClassSlot<'c>>,
}

impl<'c> CachedClass<'c> {
    pub fn new(
        id: UniqId,
        descriptor: DescriptorString,
        source_lang: SourceLang,
        type_id: TypeId,
        flags: ClassFlags,
        origin: Option<Origin<'c>>,
        parts: ClassParts<'c>,
    ) -> CachedClass<'c> {
        CachedClass {
            id,
            descriptor,
            source_lang,
            type_id,
            flags,
            origin,
            ancestors: parts.ancestors,
            array_component: parts.array_component,
            methods: RwLock::new(HashMap::new()),
            fields: RwLock::new(HashMap::new()),
            linked: AtomicBool::new(false),
        }
    }

    pub fn is_linked(&self) -> bool {
        self.linked.load(Ordering::Acquire)
    }

    pub(crate) fn mark_linked(&self) {
        self.linked.store(true, Ordering::Release)
    }

    pub fn is_primitive(&self) -> bool {
        self.flags.contains(ClassFlags::PRIMITIVE)
    }

    pub fn is_array(&self) -> bool {
        self.flags.contains(ClassFlags::ARRAY_CLASS)
    }

    pub fn is_interface(&self) -> bool {
        self.flags.contains(ClassFlags::INTERFACE)
    }

    /// Add a method under its hash, keeping whichever method was there first
    pub(crate) fn add_method(&self, method: &'c CachedMethod<'c>) -> &'c CachedMethod<'c> {
        *self.methods.write().entry(method.hash).or_insert(method)
    }

    pub(crate) fn add_field(&self, field: &'c CachedField<'c>) -> &'c CachedField<'c> {
        *self.fields.write().entry(field.hash).or_insert(field)
    }

    /// Method with the given hash, declared here or inherited
    pub fn method(&self, hash: MethodHash) -> Option<&'c CachedMethod<'c>> {
        self.methods.read().get(&hash).copied()
    }

    pub fn field(&self, hash: FieldHash) -> Option<&'c CachedField<'c>> {
        self.fields.read().get(&hash).copied()
    }

    /// Methods known to this class, ordered by name
    pub fn methods(&self) -> Vec<&'c CachedMethod<'c>> {
        let mut methods: Vec<_> = self.methods.read().values().copied().collect();
        methods.sort_by(|m1, m2| (&m1.name, m1.id).cmp(&(&m2.name, m2.id)));
        methods
    }

    /// Fields known to this class, ordered by name
    pub fn fields(&self) -> Vec<&'c CachedField<'c>> {
        let mut fields: Vec<_> = self.fields.read().values().copied().collect();
        fields.sort_by(|f1, f2| (&f1.name, f1.id).cmp(&(&f2.name, f2.id)));
        fields
    }

    /// Look up a method by hash, here first and then up the hierarchy
    ///
    /// Hits found in an ancestor are remembered in this class, so the next lookup is direct. Only
    /// ancestors which have already been resolved are searched.
    pub fn resolve_method(&self, hash: MethodHash) -> Option<&'c CachedMethod<'c>> {
        let found = self.lookup_method(hash, &mut vec![]);
        if found.is_none() {
            log::warn!(
                "CACHE: Cannot find method with hash {:#018x} in {}",
                hash,
                self.descriptor
            );
        }
        found
    }

    pub fn resolve_field(&self, hash: FieldHash) -> Option<&'c CachedField<'c>> {
        let found = self.lookup_field(hash, &mut vec![]);
        if found.is_none() {
            log::warn!(
                "CACHE: Cannot find field with hash {:#018x} in {}",
                hash,
                self.descriptor
            );
        }
        found
    }

    fn lookup_method<'s>(
        &'s self,
        hash: MethodHash,
        visited: &mut Vec<RefId<'s, CachedClass<'c>>>,
    ) -> Option<&'c CachedMethod<'c>> {
        if let Some(method) = self.method(hash) {
            return Some(method);
        }
        visited.push(RefId(self));
        for ancestor in self.resolved_ancestors() {
            if visited.contains(&RefId(ancestor)) {
                continue;
            }
            if let Some(method) = ancestor.lookup_method(hash, visited) {
                return Some(*self.methods.write().entry(hash).or_insert(method));
            }
        }
        None
    }

    fn lookup_field<'s>(
        &'s self,
        hash: FieldHash,
        visited: &mut Vec<RefId<'s, CachedClass<'c>>>,
    ) -> Option<&'c CachedField<'c>> {
        if let Some(field) = self.field(hash) {
            return Some(field);
        }
        visited.push(RefId(self));
        for ancestor in self.resolved_ancestors() {
            if visited.contains(&RefId(ancestor)) {
                continue;
            }
            if let Some(field) = ancestor.lookup_field(hash, visited) {
                return Some(*self.fields.write().entry(hash).or_insert(field));
            }
        }
        None
    }

    fn resolved_ancestors(&self) -> impl Iterator<Item = &'c CachedClass<'c>> + '_ {
        self.ancestors.iter().filter_map(ClassSlot::resolved_class)
    }
}

impl<'c> fmt::Display for CachedClass<'c> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptor)
    }
}

impl<'c> fmt::Debug for CachedClass<'c> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedClass")
            .field("id", &format_args!("{:#018x}", self.id))
            .field("descriptor", &self.descriptor)
            .field("source_lang", &self.source_lang)
            .field("flags", &self.flags)
            .field("origin", &self.origin)
            .field("ancestors", &self.ancestors)
            .field("array_component", &self.array_component)
            .field("linked", &self.is_linked())
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct CachedCatchBlock<'c> {
    pub try_start: u32,
    pub try_end: u32,

    /// `None` catches everything
    pub exception_type: Option<ClassSlot<'c>>,

    pub handler_pc: u32,
    pub code_size: u32,
}

pub struct CachedMethod<'c> {
    pub id: UniqId,
    pub hash: MethodHash,
    pub name: Box<[u8]>,
    pub klass: &'c CachedClass<'c>,

    /// Return type, then `this` (unless the method is static), then the arguments
    pub signature: Vec<ClassSlot<'c>>,

    pub indexes: &'c Indexes<'c>,
    pub flags: MethodFlags,
    pub num_vregs: u32,
    pub num_args: u32,

    /// Instructions, if the method has code
    pub bytecode: Option<&'c [u8]>,

    pub catch_blocks: Vec<CachedCatchBlock<'c>>,
    pub origin: Option<Origin<'c>>,
    linked: AtomicBool,
}

/// What a synthetic method filler gets to set
pub struct MethodParts<'c> {
    pub signature: Vec<ClassSlot<'c>>,
    pub num_args: u32,
    pub flags: MethodFlags,
}

impl<'c> CachedMethod<'c> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: UniqId,
        hash: MethodHash,
        name: &[u8],
        klass: &'c CachedClass<'c>,
        signature: Vec<ClassSlot<'c>>,
        indexes: &'c Indexes<'c>,
        flags: MethodFlags,
        origin: Option<Origin<'c>>,
    ) -> CachedMethod<'c> {
        CachedMethod {
            id,
            hash,
            name: Box::from(name),
            klass,
            signature,
            indexes,
            flags,
            num_vregs: 0,
            num_args: 0,
            bytecode: None,
            catch_blocks: vec![],
            origin,
            linked: AtomicBool::new(false),
        }
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodFlags::STATIC)
    }

    pub fn is_constructor(&self) -> bool {
        self.flags
            .intersects(MethodFlags::CONSTRUCTOR | MethodFlags::ARRAY_CONSTRUCTOR)
    }

    pub fn is_linked(&self) -> bool {
        self.linked.load(Ordering::Acquire)
    }

    pub(crate) fn mark_linked(&self) {
        self.linked.store(true, Ordering::Release)
    }

    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    pub fn return_type(&self) -> Option<&ClassSlot<'c>> {
        self.signature.first()
    }

    /// Arguments, without the receiver
    pub fn arg_types(&self) -> &[ClassSlot<'c>] {
        let skip = if self.is_static() { 1 } else { 2 };
        self.signature.get(skip..).unwrap_or(&[])
    }

    pub fn code_size(&self) -> usize {
        self.bytecode.map_or(0, <[u8]>::len)
    }
}

/// Renders a slot the way signatures are printed (`void`, `i32`, `Lpanda/String;`)
struct SlotName<'a, 'c>(&'a ClassSlot<'c>);

impl<'a, 'c> fmt::Display for SlotName<'a, 'c> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.descriptor().primitive_type() {
            Some(type_id) => f.write_str(type_id.name()),
            None => write!(f, "{}", self.0.descriptor()),
        }
    }
}

impl<'c> fmt::Display for CachedMethod<'c> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{} : (",
            self.klass.descriptor,
            String::from_utf8_lossy(&self.name)
        )?;
        let slots = self
            .signature
            .iter()
            .enumerate()
            .filter(|(i, _)| self.is_static() || *i != 1);
        for (n, (_, slot)) in slots.enumerate() {
            if n > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", SlotName(slot))?;
        }
        f.write_str(")")
    }
}

impl<'c> fmt::Debug for CachedMethod<'c> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedMethod")
            .field("id", &format_args!("{:#018x}", self.id))
            .field("method", &format_args!("{}", self))
            .field("flags", &self.flags)
            .field("origin", &self.origin)
            .field("linked", &self.is_linked())
            .finish()
    }
}

pub struct CachedField<'c> {
    pub id: UniqId,
    pub hash: FieldHash,
    pub name: Box<[u8]>,
    pub klass: &'c CachedClass<'c>,
    pub type_slot: ClassSlot<'c>,
    pub flags: FieldFlags,
    pub origin: Option<Origin<'c>>,
    linked: AtomicBool,
}

impl<'c> CachedField<'c> {
    pub fn new(
        id: UniqId,
        hash: FieldHash,
        name: &[u8],
        klass: &'c CachedClass<'c>,
        type_slot: ClassSlot<'c>,
        flags: FieldFlags,
        origin: Option<Origin<'c>>,
    ) -> CachedField<'c> {
        CachedField {
            id,
            hash,
            name: Box::from(name),
            klass,
            type_slot,
            flags,
            origin,
            linked: AtomicBool::new(false),
        }
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(FieldFlags::STATIC)
    }

    pub fn is_linked(&self) -> bool {
        self.linked.load(Ordering::Acquire)
    }

    pub(crate) fn mark_linked(&self) {
        self.linked.store(true, Ordering::Release)
    }

    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

impl<'c> fmt::Display for CachedField<'c> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} : {}",
            self.klass.descriptor,
            String::from_utf8_lossy(&self.name),
            self.type_slot.descriptor()
        )
    }
}

impl<'c> fmt::Debug for CachedField<'c> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedField")
            .field("id", &format_args!("{:#018x}", self.id))
            .field("field", &format_args!("{}", self))
            .field("flags", &self.flags)
            .field("origin", &self.origin)
            .field("linked", &self.is_linked())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn class<'c>(descriptor: &str, ancestors: Vec<ClassSlot<'c>>) -> CachedClass<'c> {
        CachedClass::new(
            0,
            descriptor.into(),
            SourceLang::PandaAssembly,
            TypeId::Reference,
            ClassFlags::PUBLIC,
            None,
            ClassParts {
                ancestors,
                array_component: None,
            },
        )
    }

    #[test]
    fn flags_from_access_flags() {
        let flags = MethodFlags::from_access_flags(
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC | MethodAccessFlags::BRIDGE,
        );
        assert_eq!(flags, MethodFlags::PUBLIC | MethodFlags::STATIC);

        let flags = ClassFlags::from_access_flags(
            ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT | ClassAccessFlags::SUPER,
        );
        assert_eq!(flags, ClassFlags::INTERFACE | ClassFlags::ABSTRACT);
    }

    #[test]
    fn inherited_lookup_is_remembered() {
        let indexes = Indexes::default();
        let base = class("LBase;", vec![]);
        let derived = class("LDerived;", vec![ClassSlot::resolved(&base)]);

        let method = CachedMethod::new(
            1,
            42,
            b"foo",
            &base,
            vec![ClassSlot::unresolved("V".into())],
            &indexes,
            MethodFlags::STATIC,
            None,
        );
        base.add_method(&method);

        assert!(derived.method(42).is_none());
        let found = derived.resolve_method(42).unwrap();
        assert!(std::ptr::eq(found, &method));
        assert!(derived.method(42).is_some());
        assert!(derived.resolve_method(7).is_none());
    }

    #[test]
    fn unresolved_ancestors_are_skipped() {
        let derived = class("LDerived;", vec![ClassSlot::unresolved("LBase;".into())]);
        assert!(derived.resolve_field(1).is_none());
    }

    #[test]
    fn rendering() {
        let indexes = Indexes::default();
        let owner = class("LA;", vec![]);
        let method = CachedMethod::new(
            1,
            0,
            b"bar",
            &owner,
            vec![
                ClassSlot::unresolved("V".into()),
                ClassSlot::resolved(&owner),
                ClassSlot::unresolved("I".into()),
                ClassSlot::unresolved("Lpanda/String;".into()),
            ],
            &indexes,
            MethodFlags::empty(),
            None,
        );
        assert_eq!(method.to_string(), "LA;::bar : (void, i32, Lpanda/String;)");
        assert_eq!(method.arg_types().len(), 2);

        let field = CachedField::new(
            2,
            0,
            b"x",
            &owner,
            ClassSlot::unresolved("J".into()),
            FieldFlags::empty(),
            None,
        );
        assert_eq!(field.to_string(), "LA;.x : J");
    }
}
