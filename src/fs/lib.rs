//! A user-space ext2 metadata engine.
//!
//! Opens a raw block image, interprets its on-disk structures, and offers read/write operations
//! at the granularity of inodes, directory entries, data blocks, bitmaps, and the superblock.
//! The engine is single-owner (see [`filesystem::Filesystem`]'s doc comment): no parallelism is
//! assumed or provided, and every call runs to completion before the next begins.

pub mod bitmap;
pub mod blockmap;
pub mod buffer;
pub mod device;
pub mod dir;
pub mod dirent;
pub mod error;
pub mod file;
pub mod filesystem;
pub mod group;
pub mod inode;
pub mod layout;
pub mod superblock;
pub mod sync;
pub mod util;

pub use error::Error;
pub use error::Result;
pub use filesystem::DirListing;
pub use filesystem::Filesystem;
pub use inode::FileKind;
pub use layout::RawInode;
