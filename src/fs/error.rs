//! Error type for the ext2 engine.

use std::fmt;
use std::io;

/// An error produced by the ext2 engine.
#[derive(Debug)]
pub enum Error {
    /// The underlying device read/write failed or returned short.
    Io(io::Error),
    /// The superblock's magic number did not match, or its `log_block_size` is unsupported.
    BadSuperblock,
    /// A metadata structure violates an on-disk invariant (inode out of range, directory
    /// `rec_len` breaks the sum invariant, indirect-block index overflow, ...).
    CorruptMetadata(&'static str),
    /// The allocator has no free blocks or inodes left.
    NoSpace,
    /// A lookup or path resolution did not find its target.
    NotFound,
    /// `DirectoryOps::insert` was called with a name that already exists in the directory.
    NameExists,
    /// `DirectoryOps::insert` was called with an inode that already has an entry in the
    /// directory.
    DuplicateInode,
    /// A bitmap bit was freed while it was already clear.
    DoubleFree,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::BadSuperblock => write!(f, "bad superblock"),
            Self::CorruptMetadata(what) => write!(f, "corrupt metadata: {what}"),
            Self::NoSpace => write!(f, "no space left on device"),
            Self::NotFound => write!(f, "not found"),
            Self::NameExists => write!(f, "name already exists"),
            Self::DuplicateInode => write!(f, "inode already linked in directory"),
            Self::DoubleFree => write!(f, "double free"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Result type used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;
