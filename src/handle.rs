//! A shared, type-erased container for a resource of known-at-construction type.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::error::Error;

type Erased = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
struct Inner {
    type_id: TypeId,
    type_name: &'static str,
    value: Erased,
    /// Eagerly-built views of `value` as each of its declared base types,
    /// keyed by the base type's identity. An exact-type query never consults
    /// this table; a base-type query does, and also accepts the exact type
    /// trivially (every type is a base of itself).
    bases: Arc<[(TypeId, &'static str, Erased)]>,
}

/// A shared container for a value of arbitrary known-at-construction type.
///
/// Mirrors the semantics of a non-copyable `any`: it may be empty, and if
/// non-empty it carries a stable type identity established at construction.
/// Handles are cheap to clone (an `Arc` bump) and never deep-clone the
/// contained resource.
#[derive(Clone, Default)]
pub struct Handle {
    inner: Option<Inner>,
}

impl Handle {
    /// An empty handle, carrying no value and no type identity.
    #[must_use]
    pub fn empty() -> Self {
        Self { inner: None }
    }

    /// Wraps `value`, declaring no base types besides its own.
    pub fn new<T>(value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self::builder(value).build()
    }

    /// Starts a [`HandleBuilder`] so that base-type views can be declared
    /// before the handle is finalized.
    pub fn builder<T>(value: T) -> HandleBuilder<T>
    where
        T: Any + Send + Sync,
    {
        HandleBuilder {
            value: Arc::new(value),
            bases: Vec::new(),
        }
    }

    #[must_use]
    pub fn has_value(&self) -> bool {
        self.inner.is_some()
    }

    #[must_use]
    pub fn type_id(&self) -> Option<TypeId> {
        self.inner.as_ref().map(|i| i.type_id)
    }

    #[must_use]
    pub fn type_name(&self) -> Option<&'static str> {
        self.inner.as_ref().map(|i| i.type_name)
    }

    /// Downcasts to the exact concrete type the handle was constructed with.
    pub fn downcast<T>(&self) -> Result<Arc<T>, Error>
    where
        T: Any + Send + Sync,
    {
        let inner = self.inner.as_ref().ok_or(Error::TypeMismatch)?;
        if inner.type_id != TypeId::of::<T>() {
            return Err(Error::TypeMismatch);
        }
        Arc::clone(&inner.value)
            .downcast::<T>()
            .map_err(|_| Error::TypeMismatch)
    }

    /// Downcasts to a type declared as a base of the handle's concrete type
    /// at construction time (or to the concrete type itself).
    pub fn downcast_base<B>(&self) -> Result<Arc<B>, Error>
    where
        B: Any + Send + Sync,
    {
        let inner = self.inner.as_ref().ok_or(Error::TypeMismatch)?;

        if inner.type_id == TypeId::of::<B>() {
            return Arc::clone(&inner.value)
                .downcast::<B>()
                .map_err(|_| Error::TypeMismatch);
        }

        let wanted = TypeId::of::<B>();
        inner
            .bases
            .iter()
            .find(|(tid, _, _)| *tid == wanted)
            .ok_or(Error::TypeMismatch)
            .and_then(|(_, _, view)| {
                Arc::clone(view).downcast::<B>().map_err(|_| Error::TypeMismatch)
            })
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(inner) => f
                .debug_struct("Handle")
                .field("type", &inner.type_name)
                .finish(),
            None => f.write_str("Handle(empty)"),
        }
    }
}

/// Builds a [`Handle`], declaring which base types it may be downcast to
/// in addition to its own concrete type.
pub struct HandleBuilder<T> {
    value: Arc<T>,
    bases: Vec<(TypeId, &'static str, Erased)>,
}

impl<T> HandleBuilder<T>
where
    T: Any + Send + Sync,
{
    /// Declares that this handle may also be downcast to `B`, via `as_base`.
    pub fn with_base<B, F>(mut self, as_base: F) -> Self
    where
        B: Any + Send + Sync,
        F: FnOnce(Arc<T>) -> Arc<B>,
    {
        let view: Arc<B> = as_base(Arc::clone(&self.value));
        self.bases.push((
            TypeId::of::<B>(),
            std::any::type_name::<B>(),
            view as Erased,
        ));
        self
    }

    #[must_use]
    pub fn build(self) -> Handle {
        Handle {
            inner: Some(Inner {
                type_id: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
                value: self.value as Erased,
                bases: Arc::from(self.bases),
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct MeshFile {
        name: &'static str,
    }

    struct MD5Mesh {
        joints: usize,
    }

    struct AudioClip;

    #[test]
    fn empty_handle_has_no_value() {
        let handle = Handle::empty();
        assert!(!handle.has_value());
        assert!(handle.downcast::<MD5Mesh>().is_err());
    }

    #[test]
    fn exact_downcast_succeeds() {
        let handle = Handle::new(MD5Mesh { joints: 12 });
        let mesh = handle.downcast::<MD5Mesh>().unwrap();
        assert_eq!(mesh.joints, 12);
    }

    #[test]
    fn exact_downcast_rejects_unrelated_type() {
        let handle = Handle::new(MD5Mesh { joints: 12 });
        assert!(matches!(handle.downcast::<AudioClip>(), Err(Error::TypeMismatch)));
    }

    #[test]
    fn base_downcast_uses_declared_view() {
        let handle = Handle::builder(MD5Mesh { joints: 4 })
            .with_base::<MeshFile, _>(|_mesh| Arc::new(MeshFile { name: "bob" }))
            .build();

        let as_base = handle.downcast_base::<MeshFile>().unwrap();
        assert_eq!(as_base.name, "bob");
        // The concrete type is still reachable too.
        assert_eq!(handle.downcast::<MD5Mesh>().unwrap().joints, 4);
    }

    #[test]
    fn base_downcast_rejects_undeclared_base() {
        let handle = Handle::new(MD5Mesh { joints: 4 });
        assert!(matches!(
            handle.downcast_base::<MeshFile>(),
            Err(Error::TypeMismatch)
        ));
    }

    #[test]
    fn base_downcast_accepts_concrete_type_as_its_own_base() {
        let handle = Handle::new(MD5Mesh { joints: 9 });
        assert_eq!(handle.downcast_base::<MD5Mesh>().unwrap().joints, 9);
    }

    #[test]
    fn downcasts_share_the_same_payload() {
        let handle = Handle::new(MD5Mesh { joints: 1 });
        let a = handle.downcast::<MD5Mesh>().unwrap();
        let b = handle.downcast::<MD5Mesh>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
