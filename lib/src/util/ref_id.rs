use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

/// Reference whose identity (for equality and hashing) is the address it points to
///
/// Two loaded files with byte-identical contents are still two different files as far as the
/// per-file caches are concerned, so those caches key on `RefId<'c, PandaFile>` instead of on the
/// file contents.
pub struct RefId<'a, T: ?Sized>(pub &'a T);

impl<'a, T: ?Sized> Clone for RefId<'a, T> {
    fn clone(&self) -> Self {
        RefId(self.0)
    }
}

impl<'a, T: ?Sized> Copy for RefId<'a, T> {}

impl<'a, T: ?Sized> Hash for RefId<'a, T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.0, state)
    }
}

impl<'a, 'b, T: ?Sized> PartialEq<RefId<'b, T>> for RefId<'a, T> {
    fn eq(&self, other: &RefId<'b, T>) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl<'a, T: ?Sized> Eq for RefId<'a, T> {}

impl<'a, T: ?Sized> Deref for RefId<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.0
    }
}

impl<'a, T: ?Sized> fmt::Debug for RefId<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefId({:p})", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn identity_is_address() {
        let first = String::from("a.abc");
        let second = String::from("a.abc");

        assert_eq!(first, second);
        assert_ne!(RefId(&first), RefId(&second));
        assert_eq!(RefId(&first), RefId(&first));

        let mut seen = HashSet::new();
        assert!(seen.insert(RefId(&first)));
        assert!(seen.insert(RefId(&second)));
        assert!(!seen.insert(RefId(&first)));
    }
}
