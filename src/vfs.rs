//! The aggregate entry point: a layered mount table over named resources.

use std::any::Any;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::RwLock;

use crate::dir::VirtualDirectory;
use crate::error::Error;
use crate::handle::Handle;
use crate::mount::MountPointHandle;
use crate::path::VPathBuf;
use crate::pipeline::{ExtensionHandler, ExtensionRegistry};
use crate::store::{InMemoryStore, OneItemStore, RealDirectoryStore};

/// A layered, type-aware virtual file system.
///
/// Mounting (`mount`, `register_extension`) happens during a setup phase and
/// takes `&mut self`. Once setup is done, `VirtualFs` is typically wrapped in
/// an `Arc` and `try_load`/`load` may be called concurrently from many
/// threads, since they only need `&self` - the mount list itself is never
/// mutated after setup, and the interior state each store keeps (the
/// real-directory cache, the shared extension registry) is independently
/// synchronised.
#[derive(Default)]
pub struct VirtualFs {
    // Insertion order. A path can match more than one mount point (e.g. "/"
    // and "/assets/" both prefix "/assets/bob.txt"); `try_load` scans this
    // in reverse, so whichever was mounted most recently is tried first.
    mounts: Vec<(VPathBuf, VirtualDirectory)>,
    registry: Arc<RwLock<ExtensionRegistry>>,
}

impl VirtualFs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` at the end of the chain for `ext`, and records
    /// `ext` as `T`'s canonical extension.
    pub fn register_extension<T: Any>(&mut self, ext: impl Into<String>, handler: impl ExtensionHandler + 'static) {
        self.registry.write().register::<T>(ext, handler);
    }

    /// Mounts `real_path` at `mp`. Equivalent to
    /// `mount_or_create(mp, real_path, false)` - a missing `real_path` is always
    /// [`Error::NotFound`], never created.
    ///
    /// If `mp` is a directory path, `real_path` must be an existing
    /// directory: a real-directory backing store is pushed at `mp`, and
    /// subsequent `load`s under `mp` are materialised lazily from it. A
    /// `real_path` that exists as a plain file is a [`Error::NotADirectory`].
    ///
    /// If `mp` is a file path, `real_path` must already exist as a file: it
    /// is run through the extension pipeline immediately and the resulting
    /// resource is mounted as a single item at `mp`.
    ///
    /// A directory `mp` may also be used with a file `real_path` - the file
    /// is mounted at `mp`'s own name (`mp` joined with the real file's file
    /// name), rather than at `mp` itself, since a directory mount point
    /// cannot itself carry a single resource.
    pub fn mount(&mut self, mp: &VPathBuf, real_path: impl AsRef<Path>) -> Result<(), Error> {
        self.mount_or_create(mp, real_path, false)
    }

    /// As [`VirtualFs::mount`], except when `create_if_not_exists` is set
    /// and `mp` is a directory path whose `real_path` doesn't exist yet: the
    /// directory is created rather than reported as [`Error::NotFound`].
    /// Creating a missing *file* target is not supported regardless of this
    /// flag - requesting it reports [`Error::Unsupported`] rather than
    /// silently falling back to [`Error::NotFound`] or creating an empty
    /// placeholder file.
    pub fn mount_or_create(
        &mut self,
        mp: &VPathBuf,
        real_path: impl AsRef<Path>,
        create_if_not_exists: bool,
    ) -> Result<(), Error> {
        let real_path = real_path.as_ref();

        if !real_path.exists() {
            return if mp.is_directory() {
                if create_if_not_exists {
                    self.mount_directory(mp, real_path, true)
                } else {
                    Err(Error::NotFound(mp.clone()))
                }
            } else if create_if_not_exists {
                Err(Error::Unsupported)
            } else {
                Err(Error::NotFound(mp.clone()))
            };
        }

        if mp.is_directory() {
            if real_path.is_file() {
                let stem = real_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| Error::InvalidPath(real_path.display().to_string()))?;
                let exact_mp = mp.join(&VPathBuf::new(format!("/{stem}"))?)?;
                return self.mount_file_pipeline(&exact_mp, real_path);
            }
            return self.mount_directory(mp, real_path, create_if_not_exists);
        }

        if real_path.is_dir() {
            return Err(Error::InvalidMount(mp.clone()));
        }
        self.mount_file_pipeline(mp, real_path)
    }

    fn mount_directory(&mut self, mp: &VPathBuf, real_path: &Path, create_if_not_exists: bool) -> Result<(), Error> {
        if !mp.is_directory() {
            return Err(Error::InvalidMount(mp.clone()));
        }
        if real_path.is_file() {
            // `mount` only reaches here once it has already confirmed
            // `real_path` isn't an existing plain file; this check guards
            // against it becoming one between that check and here.
            return Err(Error::NotADirectory(real_path.display().to_string()));
        }
        if !real_path.exists() {
            if !create_if_not_exists {
                return Err(Error::NotFound(mp.clone()));
            }
            std::fs::create_dir_all(real_path)?;
        }
        let store = RealDirectoryStore::new(real_path, Arc::clone(&self.registry))?;
        let shadows = self.has_mount(mp);
        self.directory_entry(mp).push(Box::new(store));
        info!(
            "mounted real directory {} at {mp}{}",
            real_path.display(),
            if shadows { ", shadowing an earlier mount" } else { "" }
        );
        Ok(())
    }

    fn mount_file_pipeline(&mut self, exact_mp: &VPathBuf, real_path: &Path) -> Result<(), Error> {
        // Callers only reach here once `mount`/`mount_or_create` has already
        // confirmed `real_path` exists; a missing file target is handled
        // earlier, before any extension-pipeline dispatch is attempted.
        debug_assert!(real_path.exists());

        let ext = real_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .ok_or_else(|| Error::UnknownExtension(exact_mp.to_string()))?;

        let mount_point_handle = MountPointHandle::new();
        let mut file = std::fs::File::open(real_path)?;

        let accepted = self
            .registry
            .read()
            .dispatch(&ext, exact_mp, &mut file, &mount_point_handle)?;
        if !accepted {
            return Err(Error::HandlerRejected(ext, exact_mp.clone()));
        }

        let resource = mount_point_handle
            .take()
            .ok_or_else(|| Error::HandlerRejected(ext, exact_mp.clone()))?;

        debug!("dispatched {} through the extension pipeline for {exact_mp}", real_path.display());
        self.mount_one_item(exact_mp, resource)
    }

    /// Mounts an already-constructed resource as a single item at `mp`
    /// (a file path), with no backing real file at all.
    pub fn mount_one_item(&mut self, mp: &VPathBuf, resource: Handle) -> Result<(), Error> {
        if !mp.is_file() {
            return Err(Error::InvalidMount(mp.clone()));
        }
        let containing_dir = mp.directory()?;
        let relative = mp.file()?;
        let shadows = self.has_mount(&containing_dir);
        self.directory_entry(&containing_dir)
            .push(Box::new(OneItemStore::new(relative, resource)));
        info!(
            "mounted item at {mp}{}",
            if shadows { ", shadowing an earlier mount" } else { "" }
        );
        Ok(())
    }

    /// Mounts an in-memory placeholder directory at `mp`, with nothing in it
    /// until later mounts or explicit item mounts layer resources on top.
    pub fn mount_in_memory(&mut self, mp: &VPathBuf) -> Result<(), Error> {
        if !mp.is_directory() {
            return Err(Error::InvalidMount(mp.clone()));
        }
        let shadows = self.has_mount(mp);
        self.directory_entry(mp).push(Box::new(InMemoryStore::new()));
        info!(
            "mounted in-memory directory at {mp}{}",
            if shadows { ", shadowing an earlier mount" } else { "" }
        );
        Ok(())
    }

    /// Whether some store is already mounted at exactly `mp`.
    fn has_mount(&self, mp: &VPathBuf) -> bool {
        self.mounts.iter().any(|(existing, _)| existing == mp)
    }

    fn directory_entry(&mut self, mp: &VPathBuf) -> &mut VirtualDirectory {
        if let Some(idx) = self.mounts.iter().position(|(existing, _)| existing == mp) {
            return &mut self.mounts[idx].1;
        }
        self.mounts.push((mp.clone(), VirtualDirectory::new()));
        &mut self.mounts.last_mut().expect("just pushed").1
    }

    /// Attempts to load the resource at `path`, as type `T`.
    ///
    /// `path` carries no filename extension of its own - the extension used
    /// to locate a candidate file in a real-directory mount comes from `T`'s
    /// canonical extension, registered via [`VirtualFs::register_extension`].
    /// Fails with [`Error::UnknownType`] if `T` has none.
    ///
    /// Scans the mount list in reverse insertion order - latest mount wins -
    /// and delegates to the first mount point whose prefix matches `path`.
    /// Returns `Ok(None)` if nothing is mounted at `path` at all. A resource
    /// that *is* mounted at `path` but was constructed as a different
    /// concrete type (and isn't declared as a base of `T`, or `T` of it)
    /// also reports as `Ok(None)`: the type mismatch is not surfaced as an
    /// error, matching how a missing file behaves, and lets the scan keep
    /// looking at earlier mounts.
    pub fn try_load<T: Any + Send + Sync>(&self, path: &VPathBuf) -> Result<Option<Arc<T>>, Error> {
        let ext = self
            .registry
            .read()
            .extension_for::<T>()
            .map(str::to_owned)
            .ok_or(Error::UnknownType)?;

        for (mp, dir) in self.mounts.iter().rev() {
            let Some(relative) = mp.matches(path)? else {
                continue;
            };
            let Some(handle) = dir.lookup(&relative, &ext)? else {
                continue;
            };
            match handle.downcast_base::<T>() {
                Ok(value) => {
                    debug!("resolved {path} via mount point {mp}");
                    return Ok(Some(value));
                }
                Err(Error::TypeMismatch) => continue,
                Err(e) => return Err(e),
            }
        }
        warn!("{path} did not resolve against any mount point");
        Ok(None)
    }

    /// Like [`VirtualFs::try_load`], but reports a missing resource as
    /// [`Error::NotFound`] instead of `Ok(None)`.
    pub fn load<T: Any + Send + Sync>(&self, path: &VPathBuf) -> Result<Arc<T>, Error> {
        self.try_load(path)?.ok_or_else(|| Error::NotFound(path.clone()))
    }
}
