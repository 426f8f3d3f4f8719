//! Bit-exact on-disk structures for the ext2 format.
//!
//! Field names and layout follow the ext2 revision-0 baseline: the structures here are read and
//! written verbatim from/to the device, byte for byte, little-endian.

use std::mem::size_of;

/// The byte offset of the superblock from the beginning of the device.
pub const SUPERBLOCK_OFFSET: u64 = 1024;
/// The ext2 magic number.
pub const EXT2_MAGIC: u16 = 0xef53;

/// Filesystem state: clean.
pub const FS_STATE_CLEAN: u16 = 1;
/// Filesystem state: has errors.
pub const FS_STATE_ERROR: u16 = 2;

/// Error handling action: ignore.
pub const ERR_ACTION_IGNORE: u16 = 1;

/// The root directory's inode number.
pub const ROOT_INODE: u32 = 2;
/// The first non-reserved inode in a freshly created filesystem.
pub const FIRST_NON_RESERVED_INODE: u32 = 11;

/// The number of direct block pointers in an inode.
pub const DIRECT_BLOCKS_COUNT: usize = 12;
/// Index of the single-indirect pointer within `INode::block`.
pub const IND_BLOCK: usize = 12;
/// Index of the (unsupported) double-indirect pointer.
pub const DIND_BLOCK: usize = 13;
/// Index of the (unsupported) triple-indirect pointer.
pub const TIND_BLOCK: usize = 14;

/// Inode type bits: FIFO.
pub const IFIFO: u16 = 0x1000;
/// Inode type bits: character device.
pub const IFCHR: u16 = 0x2000;
/// Inode type bits: directory.
pub const IFDIR: u16 = 0x4000;
/// Inode type bits: block device.
pub const IFBLK: u16 = 0x6000;
/// Inode type bits: regular file.
pub const IFREG: u16 = 0x8000;
/// Inode type bits: symbolic link.
pub const IFLNK: u16 = 0xa000;
/// Inode type bits: socket.
pub const IFSOCK: u16 = 0xc000;
/// Mask isolating the type bits of `mode`.
pub const IFMT: u16 = 0xf000;

/// Directory entry file-type tag: unknown.
pub const FT_UNKNOWN: u8 = 0;
/// Directory entry file-type tag: regular file.
pub const FT_REG_FILE: u8 = 1;
/// Directory entry file-type tag: directory.
pub const FT_DIR: u8 = 2;

/// The ext2 superblock, as stored on disk.
///
/// Unlike the raw structures elsewhere in this codebase, this one is `#[repr(C)]` rather than
/// `packed`: every field already falls on a boundary its own type requires (the format was
/// designed for plain C structs on little-endian hosts), so dropping `packed` changes nothing
/// about the byte layout while letting the rest of the engine take ordinary references into
/// `block`, `free_blocks_count`, and friends.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawSuperblock {
    /// Total number of inodes in the filesystem.
    pub total_inodes: u32,
    /// Total number of blocks in the filesystem.
    pub total_blocks: u32,
    /// Number of blocks reserved for the superuser.
    pub reserved_blocks: u32,
    /// Total number of unallocated blocks.
    pub free_blocks: u32,
    /// Total number of unallocated inodes.
    pub free_inodes: u32,
    /// Block number of the block containing the superblock.
    pub first_data_block: u32,
    /// `log2(block_size) - 10`.
    pub log_block_size: u32,
    /// `log2(fragment_size) - 10`.
    pub log_fragment_size: u32,
    /// Number of blocks per block group.
    pub blocks_per_group: u32,
    /// Number of fragments per block group.
    pub fragments_per_group: u32,
    /// Number of inodes per block group.
    pub inodes_per_group: u32,
    /// Timestamp of the last mount.
    pub last_mount_time: u32,
    /// Timestamp of the last write.
    pub last_write_time: u32,
    /// Number of mounts since the last consistency check.
    pub mount_count: u16,
    /// Number of mounts allowed before a consistency check is required.
    pub max_mount_count: u16,
    /// The ext2 signature, must equal [`EXT2_MAGIC`].
    pub magic: u16,
    /// Filesystem state.
    pub state: u16,
    /// Action to perform when an error is detected.
    pub errors: u16,
    /// Minor revision level.
    pub minor_rev_level: u16,
    /// Timestamp of the last consistency check.
    pub last_check: u32,
    /// Interval in seconds between mandatory consistency checks.
    pub check_interval: u32,
    /// Identifier of the OS that created the filesystem.
    pub creator_os: u32,
    /// Revision level.
    pub rev_level: u32,
    /// UID allowed to use reserved blocks.
    pub def_resuid: u16,
    /// GID allowed to use reserved blocks.
    pub def_resgid: u16,

    // -- revision 1 and later --
    /// First inode usable for standard files.
    pub first_inode: u32,
    /// Size of an inode structure in bytes.
    pub inode_size: u16,
    /// Block group hosting this superblock copy.
    pub block_group_nr: u16,
    /// Optional feature flags.
    pub feature_compat: u32,
    /// Required feature flags.
    pub feature_incompat: u32,
    /// Required-for-write feature flags.
    pub feature_ro_compat: u32,
    /// Volume UUID.
    pub uuid: [u8; 16],
    /// Volume name.
    pub volume_name: [u8; 16],
    /// Path of the last mount point.
    pub last_mounted: [u8; 64],
    /// Compression algorithm bitmap.
    pub algo_bitmap: u32,
    /// Number of blocks to preallocate for files.
    pub prealloc_blocks: u8,
    /// Number of blocks to preallocate for directories.
    pub prealloc_dir_blocks: u8,
    _unused: u16,
    /// Journal UUID.
    pub journal_uuid: [u8; 16],
    /// Journal inode.
    pub journal_inode: u32,
    /// Journal device.
    pub journal_dev: u32,
    /// Head of the orphan inode list.
    pub last_orphan: u32,

    _padding: [u8; 788],
}

const _: () = assert!(size_of::<RawSuperblock>() == 1024);

impl RawSuperblock {
    /// Returns a zeroed superblock.
    pub fn zeroed() -> Self {
        unsafe { std::mem::zeroed() }
    }

    /// Returns the filesystem's block size in bytes.
    pub fn block_size(&self) -> u32 {
        1024 << self.log_block_size
    }

    /// Returns the size in bytes of an on-disk inode record.
    pub fn inode_size(&self) -> u16 {
        if self.rev_level >= 1 { self.inode_size } else { 128 }
    }

    /// Returns the number of block groups in the filesystem.
    pub fn num_groups(&self) -> u32 {
        crate::util::ceil_division(self.total_blocks as u64, self.blocks_per_group as u64) as u32
    }
}

/// A block group descriptor, 32 bytes, part of the block group descriptor table (BGDT).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawGroupDesc {
    /// Block address of the block usage bitmap.
    pub block_bitmap: u32,
    /// Block address of the inode usage bitmap.
    pub inode_bitmap: u32,
    /// Starting block address of the inode table.
    pub inode_table: u32,
    /// Number of unallocated blocks in the group.
    pub free_blocks_count: u16,
    /// Number of unallocated inodes in the group.
    pub free_inodes_count: u16,
    /// Number of directories in the group.
    pub used_dirs_count: u16,
    _padding: [u8; 14],
}

const _: () = assert!(size_of::<RawGroupDesc>() == 32);

impl RawGroupDesc {
    /// Returns a zeroed group descriptor.
    pub fn zeroed() -> Self {
        unsafe { std::mem::zeroed() }
    }
}

/// An inode, 128 bytes, describing the metadata of a file or directory.
///
/// The name of the file is not included in the inode but in the directory entry associated with
/// it, since several entries can refer to the same inode (hard links).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawInode {
    /// Type and permissions.
    pub mode: u16,
    /// User ID.
    pub uid: u16,
    /// Lower 32 bits of the size in bytes.
    pub size: u32,
    /// Timestamp of the last access.
    pub atime: u32,
    /// Timestamp of the last modification of the content.
    pub ctime: u32,
    /// Timestamp of the last modification of the metadata.
    pub mtime: u32,
    /// Timestamp of deletion, 0 if the inode is live.
    pub dtime: u32,
    /// Group ID.
    pub gid: u16,
    /// Number of hard links to this inode.
    pub links_count: u16,
    /// Number of 512-byte sectors used by this inode's content.
    pub blocks: u32,
    /// Inode flags.
    pub flags: u32,
    /// OS-specific value.
    pub osd1: u32,
    /// Block pointers: 0..12 direct, 12 single-indirect, 13/14 unused (double/triple-indirect).
    pub block: [u32; 15],
    /// Generation number, used by NFS.
    pub generation: u32,
    /// File ACL block (unused).
    pub file_acl: u32,
    /// Directory ACL / high 32 bits of size (unused).
    pub dir_acl: u32,
    /// Fragment block address (unused).
    pub faddr: u32,
    /// OS-specific value.
    pub osd2: [u8; 12],
}

const _: () = assert!(size_of::<RawInode>() == 128);

impl RawInode {
    /// Returns a zeroed inode.
    pub fn zeroed() -> Self {
        unsafe { std::mem::zeroed() }
    }

    /// Returns the inode's type, masking out the permission bits.
    pub fn file_type(&self) -> u16 {
        self.mode & IFMT
    }

    /// Tells whether the inode describes a directory.
    pub fn is_dir(&self) -> bool {
        self.file_type() == IFDIR
    }
}
