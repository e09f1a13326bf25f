//! The abstract byte source handed to extension handlers.

use std::io::{Read, Seek};

/// A seekable read source. Most handlers only read from a mounted file, so
/// this is deliberately narrower than a full read/write/seek stdio stand-in.
pub trait ByteStream: Read + Seek {}

impl<T: Read + Seek> ByteStream for T {}
