//! Per-extension handler chains and the type-to-extension map.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Error;
use crate::mount::MountPointHandle;
use crate::path::VPathBuf;
use crate::stream::ByteStream;

/// The arguments a single extension handler sees, plus the ability to
/// delegate to the next-most-recently-registered handler in the chain.
///
/// Delegation is modeled as a reborrow of the remaining chain rather than a
/// captured closure, which sidesteps holding two live mutable borrows of the
/// same stream: `call_next` only exists while the current handler's `&mut
/// HandlerContext` is on the stack, and it reborrows `stream` for the
/// duration of the nested call.
pub struct HandlerContext<'a> {
    extension: &'a str,
    mount_point: &'a VPathBuf,
    stream: &'a mut dyn ByteStream,
    mount_point_handle: &'a MountPointHandle,
    remaining: &'a [Arc<dyn ExtensionHandler>],
}

impl<'a> HandlerContext<'a> {
    #[must_use]
    pub fn extension(&self) -> &str {
        self.extension
    }

    #[must_use]
    pub fn mount_point(&self) -> &VPathBuf {
        self.mount_point
    }

    #[must_use]
    pub fn stream(&mut self) -> &mut dyn ByteStream {
        self.stream
    }

    #[must_use]
    pub fn mount_point_handle(&self) -> &MountPointHandle {
        self.mount_point_handle
    }

    /// Whether a previously-registered handler remains to delegate to.
    #[must_use]
    pub fn has_next(&self) -> bool {
        !self.remaining.is_empty()
    }

    /// Invokes the next-most-recently-registered handler in the chain, if
    /// any. Calling this with no handler left to call is a no-op that
    /// reports success, mirroring "the final handler gets `None` for next".
    pub fn call_next(&mut self) -> Result<bool, Error> {
        let Some((next, rest)) = self.remaining.split_first() else {
            return Ok(true);
        };
        let mut nested = HandlerContext {
            extension: self.extension,
            mount_point: self.mount_point,
            stream: &mut *self.stream,
            mount_point_handle: self.mount_point_handle,
            remaining: rest,
        };
        next.handle(&mut nested)
    }
}

/// A single extension handler. Implemented for any `Fn` with a matching
/// signature, so most registrations are plain closures.
pub trait ExtensionHandler: Send + Sync {
    fn handle(&self, ctx: &mut HandlerContext<'_>) -> Result<bool, Error>;
}

impl<F> ExtensionHandler for F
where
    F: Fn(&mut HandlerContext<'_>) -> Result<bool, Error> + Send + Sync,
{
    fn handle(&self, ctx: &mut HandlerContext<'_>) -> Result<bool, Error> {
        self(ctx)
    }
}

/// Per-extension ordered handler chains, plus the resource-type to
/// canonical-extension map.
#[derive(Default)]
pub struct ExtensionRegistry {
    handlers: HashMap<String, Vec<Arc<dyn ExtensionHandler>>>,
    type_ext: HashMap<TypeId, String>,
}

impl ExtensionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` to the chain for `ext` and sets `T`'s canonical
    /// extension to `ext`, overwriting any previous mapping for `T`.
    pub fn register<T: Any>(&mut self, ext: impl Into<String>, handler: impl ExtensionHandler + 'static) {
        let ext = ext.into();
        self.handlers
            .entry(ext.clone())
            .or_default()
            .push(Arc::new(handler));
        self.type_ext.insert(TypeId::of::<T>(), ext);
    }

    #[must_use]
    pub fn extension_for<T: Any>(&self) -> Option<&str> {
        self.type_ext.get(&TypeId::of::<T>()).map(String::as_str)
    }

    /// Runs the chain registered for `ext`, newest registration first, over
    /// `stream`. Returns `Ok(true)`/`Ok(false)` per the outermost handler's
    /// verdict, or `Err(UnknownExtension)` if nothing is registered for `ext`.
    pub fn dispatch(
        &self,
        ext: &str,
        mount_point: &VPathBuf,
        stream: &mut dyn ByteStream,
        mount_point_handle: &MountPointHandle,
    ) -> Result<bool, Error> {
        let chain = self
            .handlers
            .get(ext)
            .filter(|chain| !chain.is_empty())
            .ok_or_else(|| Error::UnknownExtension(ext.to_owned()))?;

        // Registration order is oldest-first; invocation order is newest-first.
        let newest_first: Vec<Arc<dyn ExtensionHandler>> = chain.iter().rev().cloned().collect();
        let (first, rest) = newest_first
            .split_first()
            .expect("chain was checked non-empty above");

        let mut ctx = HandlerContext {
            extension: ext,
            mount_point,
            stream,
            mount_point_handle,
            remaining: rest,
        };
        first.handle(&mut ctx)
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::handle::Handle;

    #[test]
    fn unknown_extension_is_reported() {
        let registry = ExtensionRegistry::new();
        let mp_handle = MountPointHandle::new();
        let mp = VPathBuf::new("/assets/bob").unwrap();
        let mut stream = Cursor::new(Vec::<u8>::new());
        let err = registry
            .dispatch(".md5mesh", &mp, &mut stream, &mp_handle)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownExtension(ext) if ext == ".md5mesh"));
    }

    #[test]
    fn newest_handler_runs_first_and_can_delegate() {
        let mut registry = ExtensionRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let order1 = Arc::clone(&order);
        registry.register::<i32>(".md5mesh", move |ctx: &mut HandlerContext<'_>| {
            order1.lock().unwrap().push("h1");
            let _ = ctx.call_next();
            Ok(true)
        });

        let order2 = Arc::clone(&order);
        registry.register::<i32>(".md5mesh", move |ctx: &mut HandlerContext<'_>| {
            order2.lock().unwrap().push("h2");
            ctx.mount_point_handle().mount(Handle::new(7i32)).unwrap();
            let _ = ctx.call_next();
            Ok(true)
        });

        let mp_handle = MountPointHandle::new();
        let mp = VPathBuf::new("/assets/bob").unwrap();
        let mut stream = Cursor::new(Vec::<u8>::new());
        let accepted = registry
            .dispatch(".md5mesh", &mp, &mut stream, &mp_handle)
            .unwrap();
        assert!(accepted);
        assert_eq!(*order.lock().unwrap(), vec!["h2", "h1"]);
        assert_eq!(*mp_handle.take().unwrap().downcast::<i32>().unwrap(), 7);
    }

    #[test]
    fn omitting_next_still_succeeds() {
        let mut registry = ExtensionRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls1 = Arc::clone(&calls);
        registry.register::<i32>(".wav", move |_ctx: &mut HandlerContext<'_>| {
            calls1.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        });

        let mp_handle = MountPointHandle::new();
        let mp = VPathBuf::new("/assets/song").unwrap();
        let mut stream = Cursor::new(Vec::<u8>::new());
        let accepted = registry
            .dispatch(".wav", &mp, &mut stream, &mp_handle)
            .unwrap();
        assert!(accepted);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
