//! Backing stores: the three concrete ways a mount point can be resolved.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, error};
use parking_lot::{Mutex, RwLock};

use crate::error::Error;
use crate::handle::Handle;
use crate::mount::MountPointHandle;
use crate::path::VPathBuf;
use crate::pipeline::ExtensionRegistry;

/// One of the three ways a mount contributes resources to a lookup.
///
/// `mount`/`register_extension` on [`crate::VirtualFs`] run before any store
/// is shared across threads; `lookup` runs only afterward, so every
/// implementation only needs `&self`, not `&mut self`.
pub trait BackingStore: Send + Sync {
    /// Attempts to resolve `relative` (a path already stripped of the mount
    /// point prefix, and *without* a filename extension) against this store,
    /// for a load requesting `ext` (the caller's target type's canonical
    /// extension). `Ok(None)` means "not present here", distinct from an
    /// error. Stores that don't need to compose an on-disk filename (the
    /// one-item and in-memory stores) ignore `ext` entirely.
    fn lookup(&self, relative: &VPathBuf, ext: &str) -> Result<Option<Handle>, Error>;
}

/// A single pre-built resource, exposed at exactly one path relative to its
/// owning directory's mount point and nowhere else.
pub struct OneItemStore {
    relative: VPathBuf,
    resource: Handle,
}

impl OneItemStore {
    #[must_use]
    pub fn new(relative: VPathBuf, resource: Handle) -> Self {
        Self { relative, resource }
    }
}

impl BackingStore for OneItemStore {
    fn lookup(&self, relative: &VPathBuf, _ext: &str) -> Result<Option<Handle>, Error> {
        if relative == &self.relative {
            Ok(Some(self.resource.clone()))
        } else {
            Ok(None)
        }
    }
}

/// A real OS directory, loaded lazily and cached by virtual path.
///
/// Paths are resolved relative to a canonicalized root captured at
/// construction; every candidate real path is re-canonicalized and checked to
/// still live under that root before it is opened, so a symlink cannot be
/// used to read outside the mounted directory. The virtual leaf handed to
/// `lookup` never carries a filename extension of its own - the on-disk
/// candidate is composed as `root ⊕ leaf ⊕ ext`, where `ext` comes from the
/// requesting `load<T>` call's canonical extension for `T`, not from the
/// virtual path.
pub struct RealDirectoryStore {
    root: PathBuf,
    registry: Arc<RwLock<ExtensionRegistry>>,
    cache: Mutex<std::collections::HashMap<(VPathBuf, String), Handle>>,
}

impl RealDirectoryStore {
    /// Fails if `root` does not exist or cannot be canonicalized.
    pub fn new(root: impl AsRef<Path>, registry: Arc<RwLock<ExtensionRegistry>>) -> Result<Self, Error> {
        let root = root.as_ref().canonicalize()?;
        Ok(Self {
            root,
            registry,
            cache: Mutex::new(std::collections::HashMap::new()),
        })
    }

    fn real_path(&self, relative: &VPathBuf, ext: &str) -> PathBuf {
        // `relative` starts with '/'; strip it so `PathBuf::join` doesn't
        // treat it as an absolute replacement of `root`.
        self.root.join(format!("{}{ext}", &relative.as_str()[1..]))
    }

    /// Canonicalizes `candidate` and confirms it still lives under `root`,
    /// guarding against a symlink inside the mounted tree pointing outside
    /// it. Deliberately checks existence first: canonicalizing a path that
    /// doesn't exist is an error, not a `None`, so doing it in the other
    /// order would turn a plain "not found" into an I/O error.
    fn contained_real_path(&self, candidate: &Path) -> Result<Option<PathBuf>, Error> {
        if !candidate.exists() {
            return Ok(None);
        }
        let resolved = candidate.canonicalize()?;
        if resolved.starts_with(&self.root) {
            Ok(Some(resolved))
        } else {
            error!(
                "path {} escapes mounted root {}, rejecting",
                resolved.display(),
                self.root.display()
            );
            Err(Error::PathEscape(resolved.display().to_string()))
        }
    }
}

impl BackingStore for RealDirectoryStore {
    fn lookup(&self, relative: &VPathBuf, ext: &str) -> Result<Option<Handle>, Error> {
        let key = (relative.clone(), ext.to_owned());

        // The cache lock is held across the whole miss path - existence
        // check, dispatch, and insert - not just the initial probe. A
        // handler only ever touches its own `MountPointHandle`, never this
        // store, so there is no re-entrancy risk in holding it that long,
        // and it is what makes two concurrent lookups of the same path
        // materialize the resource exactly once instead of racing.
        let mut cache = self.cache.lock();
        if let Some(cached) = cache.get(&key) {
            debug!("cache hit for {relative}{ext} under {}", self.root.display());
            return Ok(Some(cached.clone()));
        }

        let candidate = self.real_path(relative, ext);
        let Some(real_path) = self.contained_real_path(&candidate)? else {
            return Ok(None);
        };

        if real_path.is_dir() {
            // Directories are addressed structurally (via the owning
            // VirtualDirectory), not materialized as resources themselves.
            return Ok(None);
        }

        let mount_point_handle = MountPointHandle::new();
        let mut file = File::open(&real_path)?;
        debug!("materializing {relative}{ext} from {}", real_path.display());

        let registry = self.registry.read();
        let accepted = registry.dispatch(ext, relative, &mut file, &mount_point_handle)?;
        drop(registry);

        if !accepted {
            return Err(Error::HandlerRejected(ext.to_owned(), relative.clone()));
        }

        let resource = mount_point_handle
            .take()
            .ok_or_else(|| Error::HandlerRejected(ext.to_owned(), relative.clone()))?;

        // Negative results are never cached: a file that doesn't exist yet
        // may show up later, and the cost of re-probing a miss is cheap
        // compared to the complexity of invalidating a negative cache entry.
        cache.insert(key, resource.clone());
        Ok(Some(resource))
    }
}

/// An always-empty in-memory directory. A placeholder backing store for
/// mount points that exist purely to be written to later via explicit file
/// mounts layered on top, or to reserve a namespace.
#[derive(Default)]
pub struct InMemoryStore;

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl BackingStore for InMemoryStore {
    fn lookup(&self, _relative: &VPathBuf, _ext: &str) -> Result<Option<Handle>, Error> {
        Ok(None)
    }
}
