use std::any::{Any, TypeId};
use std::sync::Arc;
use thiserror::Error;

/// Error returned by checked [`ValueBox`] accessors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValueBoxError {
    /// The box holds no value.
    #[error("value box is empty")]
    Empty,
    /// The box holds a value of a different type.
    #[error("value box holds a different type")]
    TypeMismatch,
}

/// A shared-ownership container holding at most one value of any type.
///
/// The box stores its value behind `Arc<dyn Any>`, so clones of the box
/// (and handles returned by [`get`](Self::get)) share the same value.
/// The stored value's [`TypeId`] acts as the type tag: the box is empty
/// exactly when no tag is present, and every typed accessor validates
/// the tag before granting access.
///
/// The `T: Any + Send + Sync` bounds rule out references, arrays of
/// unsized type, and non-`'static` borrows at compile time, so a box
/// can only ever hold an owned, thread-safe value.
#[derive(Clone, Default)]
pub struct ValueBox {
    value: Option<Arc<dyn Any + Send + Sync>>,
}

impl core::fmt::Debug for ValueBox {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ValueBox")
            .field("type_tag", &self.type_tag())
            .finish()
    }
}

impl ValueBox {
    /// Creates an empty box.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a box already holding `value`.
    #[must_use]
    pub fn with_value<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Some(Arc::new(value)),
        }
    }

    /// Stores `value`, replacing any prior value regardless of its type.
    pub fn set<T: Any + Send + Sync>(&mut self, value: T) {
        self.value = Some(Arc::new(value));
    }

    /// Returns `true` if the box holds no value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// Returns the type tag of the stored value, or `None` if empty.
    #[must_use]
    pub fn type_tag(&self) -> Option<TypeId> {
        self.value.as_deref().map(|value| value.type_id())
    }

    /// Returns `true` if the box holds a value of type `T`.
    #[must_use]
    pub fn has_type<T: Any>(&self) -> bool {
        self.type_tag() == Some(TypeId::of::<T>())
    }

    /// Borrows the stored value as `T`.
    ///
    /// # Errors
    /// [`ValueBoxError::Empty`] if the box is empty,
    /// [`ValueBoxError::TypeMismatch`] if the stored type differs.
    pub fn as_ref<T: Any>(&self) -> Result<&T, ValueBoxError> {
        let value = self.value.as_deref().ok_or(ValueBoxError::Empty)?;
        value.downcast_ref().ok_or(ValueBoxError::TypeMismatch)
    }

    /// Borrows the stored value as `T`, or `None` on emptiness or type
    /// mismatch.
    #[must_use]
    pub fn try_as<T: Any>(&self) -> Option<&T> {
        self.value.as_deref().and_then(|value| value.downcast_ref())
    }

    /// Returns a shared handle to the stored value, or `None` on
    /// emptiness or type mismatch. The box keeps its value.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let value = self.value.clone()?;
        value.downcast().ok()
    }

    /// Transfers ownership of the stored value out of the box.
    ///
    /// On success the box becomes empty. On emptiness or type mismatch
    /// the box is left untouched and `None` is returned.
    pub fn release<T: Any + Send + Sync>(&mut self) -> Option<Arc<T>> {
        if !self.has_type::<T>() {
            return None;
        }
        let value = self.value.take()?;
        match value.downcast() {
            Ok(typed) => Some(typed),
            Err(value) => {
                self.value = Some(value);
                None
            }
        }
    }

    /// Empties the box, dropping this handle to the stored value.
    pub fn reset(&mut self) {
        self.value = None;
    }
}
