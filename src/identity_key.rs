use core::any::TypeId;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use std::sync::{Arc, Weak};

/// A non-owning, hashable key derived from a handle's address.
///
/// The key captures the numeric address of its source at construction
/// time and can never be dereferenced again; it serves only for identity
/// comparison and hashing, e.g. to deduplicate user objects inside a
/// [`HandleRegistry`](crate::registry::HandleRegistry).
///
/// The type parameter separates keys at compile time: comparing an
/// `IdentityKey<A>` with an `IdentityKey<B>` is a type error, and the
/// hash mixes in `TypeId::of::<T>()` so identical addresses of different
/// types hash apart.
///
/// A key constructed from an expired [`Weak`] source is *null*
/// ([`is_null`](Self::is_null)). Because the key does not keep its
/// referent alive, identity lookups are only meaningful while the
/// referent outlives every key used for lookup; a registry holding a
/// strong reference is the usual way to guarantee that.
pub struct IdentityKey<T: ?Sized> {
    addr: usize,
    _marker: PhantomData<fn(&T)>,
}

impl<T: ?Sized> IdentityKey<T> {
    /// The null key: compares equal only to other null keys of the same
    /// type.
    #[must_use]
    pub fn null() -> Self {
        Self {
            addr: 0,
            _marker: PhantomData,
        }
    }

    /// Captures the address of a borrowed referent.
    #[must_use]
    pub fn from_ref(referent: &T) -> Self {
        Self {
            addr: referent as *const T as *const () as usize,
            _marker: PhantomData,
        }
    }

    /// Captures the address behind a strong handle.
    #[must_use]
    pub fn from_arc(handle: &Arc<T>) -> Self {
        Self {
            addr: Arc::as_ptr(handle) as *const () as usize,
            _marker: PhantomData,
        }
    }

    /// Captures the address behind a weak handle.
    ///
    /// An expired handle yields the null key.
    #[must_use]
    pub fn from_weak(handle: &Weak<T>) -> Self {
        match handle.upgrade() {
            Some(strong) => Self::from_arc(&strong),
            None => Self::null(),
        }
    }

    /// Returns `true` if this is the null key.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.addr == 0
    }

    /// Returns the captured address value.
    #[must_use]
    pub fn address(&self) -> usize {
        self.addr
    }
}

impl<T: ?Sized> Clone for IdentityKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for IdentityKey<T> {}

impl<T: ?Sized> PartialEq for IdentityKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl<T: ?Sized> Eq for IdentityKey<T> {}

impl<T: ?Sized> PartialOrd for IdentityKey<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: ?Sized> Ord for IdentityKey<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.addr.cmp(&other.addr)
    }
}

impl<T: ?Sized + 'static> Hash for IdentityKey<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr.hash(state);
        TypeId::of::<T>().hash(state);
    }
}

impl<T: ?Sized> fmt::Debug for IdentityKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IdentityKey").field(&self.addr).finish()
    }
}
