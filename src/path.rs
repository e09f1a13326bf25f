//! Absolute, opaque ASCII paths inside the virtual file system.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// An absolute path inside the virtual file system.
///
/// A [`VPathBuf`] is an opaque ASCII string, not a normalised filesystem
/// path: repeated separators (`//`) are preserved verbatim, and no case or
/// Unicode normalisation is performed. The only two invariants enforced at
/// construction are that the path starts with `/`, and that whether it ends
/// with `/` determines whether it is a *directory path* or a *file path*.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VPathBuf(String);

impl VPathBuf {
    /// Builds a virtual path, failing unless `raw` begins with `/`.
    pub fn new(raw: impl Into<String>) -> Result<Self, Error> {
        let raw = raw.into();
        if !raw.starts_with('/') {
            return Err(Error::InvalidPath(raw));
        }
        Ok(Self(raw))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` iff this path ends with `/`.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.0.ends_with('/')
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        !self.is_directory()
    }

    /// Everything up to and including the final `/`. Fails on a directory path.
    pub fn directory(&self) -> Result<Self, Error> {
        if self.is_directory() {
            return Err(Error::InvalidPath(self.0.clone()));
        }
        let idx = self.0.rfind('/').expect("file path always contains a /");
        Ok(Self(self.0[..=idx].to_owned()))
    }

    /// Everything from the final `/` onward (inclusive). Fails on a directory path.
    pub fn file(&self) -> Result<Self, Error> {
        if self.is_directory() {
            return Err(Error::InvalidPath(self.0.clone()));
        }
        let idx = self.0.rfind('/').expect("file path always contains a /");
        Ok(Self(self.0[idx..].to_owned()))
    }

    /// Concatenates a directory path with any other path, dropping the
    /// joined path's leading `/` so the two do not double up.
    pub fn join(&self, other: &Self) -> Result<Self, Error> {
        if !self.is_directory() {
            return Err(Error::InvalidPath(self.0.clone()));
        }
        let mut joined = self.0.clone();
        joined.push_str(&other.0[1..]);
        Ok(Self(joined))
    }

    /// If `self` is a directory path that prefixes `other`, returns the
    /// remainder of `other` starting with the slash that terminated `self`.
    /// Fails if `self` is not a directory path.
    pub fn matches(&self, other: &Self) -> Result<Option<Self>, Error> {
        if !self.is_directory() {
            return Err(Error::InvalidPath(self.0.clone()));
        }
        if !other.0.starts_with(self.0.as_str()) {
            return Ok(None);
        }
        // Keep the separator that terminates `self`.
        Ok(Some(Self(other.0[self.0.len() - 1..].to_owned())))
    }
}

impl TryFrom<String> for VPathBuf {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self, Error> {
        Self::new(raw)
    }
}

impl From<VPathBuf> for String {
    fn from(path: VPathBuf) -> Self {
        path.0
    }
}

impl fmt::Display for VPathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
