use crate::panda_file::TypeId;
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Type descriptor, as it appears in bytecode files
///
/// Descriptors are `L...;` for classes, a single character for primitives (see
/// [`TypeId::descriptor_char`]) and some number of `[` followed by a component descriptor for
/// arrays. Two descriptors are the same type exactly when their bytes match, so equality, hashing
/// and ordering all go by value. Clones share the underlying bytes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorString(Arc<[u8]>);

impl DescriptorString {
    pub fn new(bytes: &[u8]) -> DescriptorString {
        DescriptorString(Arc::from(bytes))
    }

    /// Descriptor of a primitive type, if `type_id` is one
    pub fn primitive(type_id: TypeId) -> Option<DescriptorString> {
        type_id
            .descriptor_char()
            .map(|c| DescriptorString::new(&[c]))
    }

    /// Descriptor of an array with `dimensions` dimensions of `element`
    pub fn array_of(element: &DescriptorString, dimensions: usize) -> DescriptorString {
        let mut bytes = vec![b'['; dimensions];
        bytes.extend_from_slice(element.as_bytes());
        DescriptorString::from(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_array(&self) -> bool {
        self.0.first() == Some(&b'[')
    }

    /// Primitive type the descriptor denotes, if it is a single primitive character
    pub fn primitive_type(&self) -> Option<TypeId> {
        match *self.0 {
            [c] => TypeId::from_descriptor_char(c),
            _ => None,
        }
    }

    /// Number of leading `[` (0 for anything which isn't an array)
    pub fn dimensionality(&self) -> usize {
        self.0.iter().take_while(|c| **c == b'[').count()
    }

    /// Component of an array descriptor (`[[I` has component `[I`)
    pub fn component(&self) -> Option<DescriptorString> {
        if self.is_array() {
            Some(DescriptorString::new(&self.0[1..]))
        } else {
            None
        }
    }

    /// Innermost non-array type of an array descriptor (the descriptor itself otherwise)
    pub fn element(&self) -> DescriptorString {
        DescriptorString::new(&self.0[self.dimensionality()..])
    }
}

impl From<&str> for DescriptorString {
    fn from(descriptor: &str) -> DescriptorString {
        DescriptorString::new(descriptor.as_bytes())
    }
}

impl From<&[u8]> for DescriptorString {
    fn from(descriptor: &[u8]) -> DescriptorString {
        DescriptorString::new(descriptor)
    }
}

impl From<Vec<u8>> for DescriptorString {
    fn from(descriptor: Vec<u8>) -> DescriptorString {
        DescriptorString(Arc::from(descriptor))
    }
}

impl Borrow<[u8]> for DescriptorString {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for DescriptorString {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for DescriptorString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for DescriptorString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn arrays() {
        let descr = DescriptorString::from("[[Lpanda/String;");
        assert!(descr.is_array());
        assert_eq!(descr.dimensionality(), 2);
        assert_eq!(descr.component(), Some(DescriptorString::from("[Lpanda/String;")));
        assert_eq!(descr.element(), DescriptorString::from("Lpanda/String;"));
        assert_eq!(
            DescriptorString::array_of(&descr.element(), 2),
            descr
        );

        let object = DescriptorString::from("Lpanda/Object;");
        assert!(!object.is_array());
        assert_eq!(object.dimensionality(), 0);
        assert_eq!(object.component(), None);
    }

    #[test]
    fn primitives() {
        assert_eq!(
            DescriptorString::primitive(TypeId::I32),
            Some(DescriptorString::from("I"))
        );
        assert_eq!(DescriptorString::primitive(TypeId::Reference), None);
        assert_eq!(DescriptorString::from("V").primitive_type(), Some(TypeId::Void));
        assert_eq!(DescriptorString::from("LV;").primitive_type(), None);
    }

    #[test]
    fn value_identity() {
        let first = DescriptorString::from("LA;");
        let second = DescriptorString::new(b"LA;");
        assert_eq!(first, second);

        let mut set = HashSet::new();
        set.insert(first);
        assert!(set.contains(&second));
        assert!(set.contains(b"LA;" as &[u8]));
        assert_eq!(second.to_string(), "LA;");
    }
}
