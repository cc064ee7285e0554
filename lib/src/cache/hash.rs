//! Identities and member hashes
//!
//! Methods and fields are matched across files by hash: a reference in one file and the
//! definition in another only agree on names and descriptors, never on offsets.

use super::{ClassSlot, FieldHash, MethodHash, UniqId};
use crate::descriptors::DescriptorString;
use crate::panda_file::{EntityId, Error, FieldDataAccessor, MethodDataAccessor, PandaFile, Type};
use crate::util::{fnv_hash, fnv_hash_bytes, fnv_hash_item, FNV_INITIAL_SEED};

/// Upper half of the ids of entities which don't come from any file
pub const NO_FILE: u64 = 0xFFFF_FFFF;

const STATIC_MARKER: &[u8] = b"static";

/// Id of an entity defined in a file
pub fn file_entity_id(file: &PandaFile, id: EntityId) -> UniqId {
    (u64::from(file.uniq_id()) << 32) | u64::from(id.offset())
}

pub fn synthetic_class_id(descriptor: &DescriptorString) -> UniqId {
    (NO_FILE << 32) | u64::from(fnv_hash(descriptor.as_bytes()))
}

/// Provisional id of a synthetic method, before it is perturbed by the method hash
pub fn synthetic_method_id(class_descriptor: &DescriptorString, name: &[u8]) -> UniqId {
    let seed = fnv_hash(class_descriptor.as_bytes());
    (NO_FILE << 32) | u64::from(fnv_hash_bytes(name, seed))
}

/// Final id of a synthetic method
///
/// Overloads share a provisional id, so the signature (through the hash) and the argument count
/// are mixed back in.
pub fn perturb_method_id(provisional: UniqId, hash: MethodHash, num_args: u32) -> UniqId {
    provisional.wrapping_add(((hash & 0xFFFF) << 8) + u64::from(num_args))
}

/// Hash of a method from its name, staticness and descriptors (return type first, no receiver)
pub fn method_hash<'a>(
    name: &[u8],
    is_static: bool,
    descriptors: impl IntoIterator<Item = &'a [u8]>,
) -> MethodHash {
    let mut sig = FNV_INITIAL_SEED;
    if is_static {
        sig = fnv_hash_item(fnv_hash(STATIC_MARKER), sig);
    }
    for descriptor in descriptors {
        sig = fnv_hash_item(fnv_hash(descriptor), sig);
    }
    (u64::from(fnv_hash(name)) << 32) | u64::from(sig)
}

/// Method hash over a signature in cache order (where an instance method has `this` at 1)
pub fn signature_hash(name: &[u8], is_static: bool, signature: &[ClassSlot<'_>]) -> MethodHash {
    let descriptors = signature
        .iter()
        .enumerate()
        .filter(|(i, _)| is_static || *i != 1)
        .map(|(_, slot)| slot.descriptor().as_bytes());
    method_hash(name, is_static, descriptors)
}

pub fn field_hash(name: &[u8], type_descriptor: &[u8]) -> FieldHash {
    (u64::from(fnv_hash(name)) << 32) | u64::from(fnv_hash(type_descriptor))
}

/// Descriptor of a type as it appears in a file
pub fn type_descriptor(file: &PandaFile, ty: Type) -> Result<DescriptorString, Error> {
    match ty {
        Type::Primitive(type_id) => {
            DescriptorString::primitive(type_id).ok_or(Error::BadTypeId(type_id.code()))
        }
        Type::Reference(class_id) => Ok(DescriptorString::from(file.string_data(class_id)?)),
    }
}

/// Hash of a method item, matching what the cached definition gets
pub fn file_method_hash(
    file: &PandaFile,
    method: &MethodDataAccessor,
) -> Result<MethodHash, Error> {
    let descriptors = method
        .types_in_proto(true)?
        .into_iter()
        .map(|ty| type_descriptor(file, ty))
        .collect::<Result<Vec<_>, Error>>()?;
    Ok(method_hash(
        method.name()?,
        method.is_static(),
        descriptors.iter().map(DescriptorString::as_bytes),
    ))
}

pub fn file_field_hash(file: &PandaFile, field: &FieldDataAccessor) -> Result<FieldHash, Error> {
    let descriptor = type_descriptor(file, field.field_type())?;
    Ok(field_hash(field.name()?, descriptor.as_bytes()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn static_marker_changes_hash() {
        let descriptors: [&[u8]; 2] = [b"V", b"I"];
        let instance = method_hash(b"foo", false, descriptors);
        let statik = method_hash(b"foo", true, descriptors);
        assert_ne!(instance, statik);
        assert_eq!(instance >> 32, statik >> 32);
    }

    #[test]
    fn descriptor_order_matters() {
        let first = method_hash(b"foo", true, [b"V" as &[u8], b"I", b"J"]);
        let second = method_hash(b"foo", true, [b"V" as &[u8], b"J", b"I"]);
        assert_ne!(first, second);
    }

    #[test]
    fn receiver_is_not_hashed() {
        let with_this = [
            ClassSlot::unresolved("V".into()),
            ClassSlot::unresolved("LA;".into()),
            ClassSlot::unresolved("I".into()),
        ];
        let without_this: [&[u8]; 2] = [b"V", b"I"];
        assert_eq!(
            signature_hash(b"foo", false, &with_this),
            method_hash(b"foo", false, without_this)
        );
    }

    #[test]
    fn overloads_get_distinct_synthetic_ids() {
        let descr = DescriptorString::from("[I");
        let provisional = synthetic_method_id(&descr, b".ctor");
        assert_eq!(provisional >> 32, NO_FILE);

        let one = perturb_method_id(provisional, 0xabcd, 1);
        let two = perturb_method_id(provisional, 0xabcd, 2);
        assert_ne!(one, two);
        assert_eq!(two - one, 1);
    }

    #[test]
    fn field_hash_layout() {
        let hash = field_hash(b"x", b"I");
        assert_eq!(hash >> 32, u64::from(fnv_hash(b"x")));
        assert_eq!(hash & 0xFFFF_FFFF, u64::from(fnv_hash(b"I")));
    }
}
