use super::{CachedClass, CachedField, CachedMethod};
use crate::descriptors::DescriptorString;
use crate::panda_file::EntityId;
use once_cell::sync::OnceCell;
use std::fmt;

/// What a class slot currently holds
#[derive(Copy, Clone, Debug)]
pub enum ClassRef<'a, 'c> {
    Resolved(&'c CachedClass<'c>),
    Unresolved(&'a DescriptorString),
}

/// Reference to a class, which starts out as just a descriptor
///
/// A slot only ever moves from unresolved to resolved. Two threads racing to resolve the same slot
/// both end up seeing whichever class got stored first. The descriptor stays around after
/// resolution, so a slot can always be rendered (and hashed) without touching the class.
#[derive(Clone)]
pub struct ClassSlot<'c> {
    descriptor: DescriptorString,
    resolved: OnceCell<&'c CachedClass<'c>>,
}

impl<'c> ClassSlot<'c> {
    pub fn resolved(class: &'c CachedClass<'c>) -> ClassSlot<'c> {
        ClassSlot {
            descriptor: class.descriptor.clone(),
            resolved: OnceCell::with_value(class),
        }
    }

    pub fn unresolved(descriptor: DescriptorString) -> ClassSlot<'c> {
        ClassSlot {
            descriptor,
            resolved: OnceCell::new(),
        }
    }

    pub fn get(&self) -> ClassRef<'_, 'c> {
        match self.resolved.get() {
            Some(class) => ClassRef::Resolved(class),
            None => ClassRef::Unresolved(&self.descriptor),
        }
    }

    pub fn descriptor(&self) -> &DescriptorString {
        &self.descriptor
    }

    pub fn resolved_class(&self) -> Option<&'c CachedClass<'c>> {
        self.resolved.get().copied()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// Store the resolution, returning whichever class the slot ends up holding
    pub fn resolve(&self, class: &'c CachedClass<'c>) -> &'c CachedClass<'c> {
        *self.resolved.get_or_init(|| class)
    }
}

impl<'c> fmt::Debug for ClassSlot<'c> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_resolved() {
            write!(f, "{:?}", self.descriptor)
        } else {
            write!(f, "?{:?}", self.descriptor)
        }
    }
}

/// Method or field referenced from an index table, memoized once it is resolved
pub struct EntitySlot<'c, T> {
    pub id: EntityId,
    resolved: OnceCell<&'c T>,
}

impl<'c, T> EntitySlot<'c, T> {
    pub fn new(id: EntityId) -> EntitySlot<'c, T> {
        EntitySlot {
            id,
            resolved: OnceCell::new(),
        }
    }

    pub fn get(&self) -> Option<&'c T> {
        self.resolved.get().copied()
    }

    pub fn resolve(&self, entity: &'c T) -> &'c T {
        *self.resolved.get_or_init(|| entity)
    }
}

/// Index tables of one region of one file, as seen from one language
///
/// Every method in the region refers to types and members through these, so they are built once
/// and shared.
#[derive(Default)]
pub struct Indexes<'c> {
    pub classes: Vec<ClassSlot<'c>>,
    pub methods: Vec<EntitySlot<'c, CachedMethod<'c>>>,
    pub fields: Vec<EntitySlot<'c, CachedField<'c>>>,
}
