//! A layered, type-aware virtual file system for loading game and
//! application resources out of a process-embedded namespace.
//!
//! A [`VirtualFs`] binds virtual paths ([`VPathBuf`]) to real directories,
//! real files, or resources built entirely in memory. Loads are dispatched
//! through a per-extension chain of handlers ([`ExtensionHandler`]) that
//! decode raw bytes into a concrete type, stored behind a type-erased
//! [`Handle`] that the caller downcasts back to that type (or to one of its
//! declared base types).
//!
//! Mounting the same directory path more than once layers the mounts: the
//! most recently mounted layer is searched first, so later mounts shadow
//! earlier ones without removing them. See [`VirtualFs::mount`].

mod dir;
mod error;
mod handle;
mod mount;
mod path;
mod pipeline;
mod store;
mod stream;
mod vfs;

pub use error::Error;
pub use handle::{Handle, HandleBuilder};
pub use mount::MountPointHandle;
pub use path::VPathBuf;
pub use pipeline::{ExtensionHandler, ExtensionRegistry, HandlerContext};
pub use store::{BackingStore, InMemoryStore, OneItemStore, RealDirectoryStore};
pub use stream::ByteStream;
pub use vfs::VirtualFs;
