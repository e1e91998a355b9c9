use crate::identity_key::IdentityKey;
use crate::types::HashMap;
use std::sync::{Arc, Weak};
use thiserror::Error;

/// Error returned by [`HandleRegistry`] operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryError {
    /// An expired handle was passed where a live one is required.
    #[error("cannot insert an expired handle")]
    NullArgument,
    /// The entry at `index` is stored weakly and its referent is gone.
    #[error("entry {index} has expired")]
    ExpiredEntry {
        /// The offending slot index.
        index: usize,
    },
    /// A slot index was outside the valid range `[0, len)`.
    #[error("index {index} is out of range [0, {len})")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The registry length at the time of the call.
        len: usize,
    },
}

enum Storage<T: ?Sized> {
    Strong(Arc<T>),
    Weak(Weak<T>),
}

struct Slot<T: ?Sized> {
    key: IdentityKey<T>,
    storage: Storage<T>,
}

/// An insertion-ordered, deduplicated collection of handles, each slot
/// switchable between strong and weak storage.
///
/// Handles are identified by address (via [`IdentityKey`]): inserting
/// the same object twice returns the existing index without changing the
/// slot. Every insertion stores the handle strongly; [`weaken`]
/// (Self::weaken) releases the registry's ownership of a slot so the
/// object may be destroyed externally, and [`strengthen`]
/// (Self::strengthen) re-acquires it while the object is still alive.
///
/// Invariants:
/// - Keys never change once assigned, so [`find_key`](Self::find_key)
///   succeeds even after a weak slot expires.
/// - Strong slots never expire.
/// - [`len`](Self::len) counts expired slots.
///
/// Not thread-safe; callers synchronize externally.
#[must_use]
pub struct HandleRegistry<T: ?Sized> {
    slots: Vec<Slot<T>>,
    index: HashMap<IdentityKey<T>, usize>,
}

impl<T: ?Sized + 'static> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + 'static> HandleRegistry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::default(),
        }
    }

    /// Inserts a strong handle, storing it strongly.
    ///
    /// Returns the new index, or the existing index if a handle with the
    /// same address was inserted before (without changing that slot's
    /// storage mode).
    pub fn insert(&mut self, handle: &Arc<T>) -> usize {
        let key = IdentityKey::from_arc(handle);
        if let Some(&existing) = self.index.get(&key) {
            return existing;
        }
        let index = self.slots.len();
        self.slots.push(Slot {
            key,
            storage: Storage::Strong(Arc::clone(handle)),
        });
        self.index.insert(key, index);
        index
    }

    /// Inserts via a weak handle. The slot is stored strongly.
    ///
    /// # Errors
    /// [`RegistryError::NullArgument`] if the handle has expired.
    pub fn insert_weak(&mut self, handle: &Weak<T>) -> Result<usize, RegistryError> {
        let strong = handle.upgrade().ok_or(RegistryError::NullArgument)?;
        Ok(self.insert(&strong))
    }

    /// Converts the slot at `index` to weak storage. Idempotent.
    ///
    /// # Errors
    /// [`RegistryError::IndexOutOfRange`] if `index` is invalid.
    pub fn weaken(&mut self, index: usize) -> Result<(), RegistryError> {
        let len = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(RegistryError::IndexOutOfRange { index, len })?;
        if let Storage::Strong(strong) = &slot.storage {
            slot.storage = Storage::Weak(Arc::downgrade(strong));
        }
        Ok(())
    }

    /// Converts the slot at `index` back to strong storage. Idempotent
    /// while the referent is alive.
    ///
    /// # Errors
    /// [`RegistryError::IndexOutOfRange`] if `index` is invalid,
    /// [`RegistryError::ExpiredEntry`] if the referent is gone.
    pub fn strengthen(&mut self, index: usize) -> Result<(), RegistryError> {
        let len = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(RegistryError::IndexOutOfRange { index, len })?;
        if let Storage::Weak(weak) = &slot.storage {
            let strong = weak
                .upgrade()
                .ok_or(RegistryError::ExpiredEntry { index })?;
            slot.storage = Storage::Strong(strong);
        }
        Ok(())
    }

    /// Returns the strong handle at `index`.
    ///
    /// # Errors
    /// [`RegistryError::IndexOutOfRange`] if `index` is invalid,
    /// [`RegistryError::ExpiredEntry`] if the slot is weak and expired.
    pub fn at(&self, index: usize) -> Result<Arc<T>, RegistryError> {
        let len = self.slots.len();
        let slot = self
            .slots
            .get(index)
            .ok_or(RegistryError::IndexOutOfRange { index, len })?;
        match &slot.storage {
            Storage::Strong(strong) => Ok(Arc::clone(strong)),
            Storage::Weak(weak) => weak
                .upgrade()
                .ok_or(RegistryError::ExpiredEntry { index }),
        }
    }

    /// Returns the strong handle at `index`, or `None` if the slot has
    /// expired (expiry is not an error here).
    ///
    /// # Errors
    /// [`RegistryError::IndexOutOfRange`] if `index` is invalid.
    pub fn get(&self, index: usize) -> Result<Option<Arc<T>>, RegistryError> {
        let len = self.slots.len();
        let slot = self
            .slots
            .get(index)
            .ok_or(RegistryError::IndexOutOfRange { index, len })?;
        Ok(match &slot.storage {
            Storage::Strong(strong) => Some(Arc::clone(strong)),
            Storage::Weak(weak) => weak.upgrade(),
        })
    }

    /// Finds the index of a handle by address.
    #[must_use]
    pub fn find(&self, handle: &Arc<T>) -> Option<usize> {
        self.find_key(IdentityKey::from_arc(handle))
    }

    /// Finds the index of a stored key.
    ///
    /// Keys are retained after expiry, so a lookup with a key captured
    /// earlier still succeeds for expired slots. The null key never
    /// matches.
    #[must_use]
    pub fn find_key(&self, key: IdentityKey<T>) -> Option<usize> {
        if key.is_null() {
            return None;
        }
        self.index.get(&key).copied()
    }

    /// Returns `true` if the slot at `index` is stored strongly.
    ///
    /// # Errors
    /// [`RegistryError::IndexOutOfRange`] if `index` is invalid.
    pub fn is_strong(&self, index: usize) -> Result<bool, RegistryError> {
        let len = self.slots.len();
        let slot = self
            .slots
            .get(index)
            .ok_or(RegistryError::IndexOutOfRange { index, len })?;
        Ok(matches!(slot.storage, Storage::Strong(_)))
    }

    /// Returns `true` if the slot at `index` is weak and its referent is
    /// gone. Strong slots never expire.
    ///
    /// # Errors
    /// [`RegistryError::IndexOutOfRange`] if `index` is invalid.
    pub fn is_expired(&self, index: usize) -> Result<bool, RegistryError> {
        let len = self.slots.len();
        let slot = self
            .slots
            .get(index)
            .ok_or(RegistryError::IndexOutOfRange { index, len })?;
        Ok(match &slot.storage {
            Storage::Strong(_) => false,
            Storage::Weak(weak) => weak.upgrade().is_none(),
        })
    }

    /// Returns the permanent key of the slot at `index`.
    ///
    /// # Errors
    /// [`RegistryError::IndexOutOfRange`] if `index` is invalid.
    pub fn key_at(&self, index: usize) -> Result<IdentityKey<T>, RegistryError> {
        let len = self.slots.len();
        self.slots
            .get(index)
            .map(|slot| slot.key)
            .ok_or(RegistryError::IndexOutOfRange { index, len })
    }

    /// Returns the number of slots, counting expired ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the registry holds no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Visits every slot in insertion order.
    ///
    /// The callback receives the slot index, the handle (or `None` for
    /// an expired slot), whether the slot is stored strongly, and
    /// whether it has expired.
    pub fn enumerate(&self, mut visit: impl FnMut(usize, Option<Arc<T>>, bool, bool)) {
        for (index, slot) in self.slots.iter().enumerate() {
            let (handle, strong) = match &slot.storage {
                Storage::Strong(strong) => (Some(Arc::clone(strong)), true),
                Storage::Weak(weak) => (weak.upgrade(), false),
            };
            let expired = !strong && handle.is_none();
            visit(index, handle, strong, expired);
        }
    }
}
