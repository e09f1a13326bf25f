//! The one-shot capability handed to an extension handler.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::Error;
use crate::handle::Handle;

/// A single-use capability passed into an extension handler.
///
/// The only thing a handler may do with it is call [`MountPointHandle::mount`]
/// exactly once, attaching the resource it constructed to the mount location
/// the pipeline driver already decided on. A second call fails with
/// [`Error::AlreadyMounted`]; the one-shot flag is atomic, so two handlers
/// racing on the same handle see exactly one winner.
///
/// The two concrete uses (attaching a one-item directory to the VFS mount
/// list, versus handing a resource back to a real-directory's own cache) are
/// unified here: both are just "the driver retrieves whatever was mounted,
/// after dispatch returns" via [`MountPointHandle::take`], which is
/// crate-private. Handlers can't tell the two cases apart, by design.
#[derive(Default)]
pub struct MountPointHandle {
    mounted: AtomicBool,
    slot: Mutex<Option<Handle>>,
}

impl MountPointHandle {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Attaches `resource` to this handle's mount location. May be called at
    /// most once.
    pub fn mount(&self, resource: Handle) -> Result<(), Error> {
        if self.mounted.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyMounted);
        }
        *self.slot.lock() = Some(resource);
        Ok(())
    }

    /// Retrieves whatever was mounted, if anything. Used by the pipeline
    /// driver after dispatch returns successfully.
    pub(crate) fn take(&self) -> Option<Handle> {
        self.slot.lock().take()
    }
}
