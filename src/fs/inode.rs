//! Locate, read, and write inode records; allocate/free inodes; maintain link counts.

use crate::bitmap::BitmapAllocator;
use crate::buffer::BufferLayer;
use crate::device::BlockDevice;
use crate::error::Error;
use crate::error::Result;
use crate::group::GroupDescTable;
use crate::layout::DIRECT_BLOCKS_COUNT;
use crate::layout::IFDIR;
use crate::layout::IFREG;
use crate::layout::IND_BLOCK;
use crate::layout::RawInode;
use crate::layout::RawSuperblock;
use crate::superblock;
use crate::util::as_bytes;
use crate::util::as_bytes_mut;

/// The kind of file a newly created inode represents.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// A regular file.
    RegularFile,
    /// A directory.
    Dir,
}

impl FileKind {
    fn mode_bits(self) -> u16 {
        match self {
            Self::RegularFile => IFREG,
            Self::Dir => IFDIR,
        }
    }
}

/// Derived location of an inode on disk.
struct Location {
    /// Disk block holding the inode record.
    block: u32,
    /// Byte offset of the record within that block.
    offset: usize,
}

fn locate(ino: u32, sb: &RawSuperblock, groups: &GroupDescTable) -> Result<Location> {
    if ino == 0 || ino > sb.total_inodes {
        return Err(Error::CorruptMetadata("inode number out of range"));
    }
    let inode_size = sb.inode_size() as u64;
    let block_size = sb.block_size() as u64;
    let index = (ino - 1) % sb.inodes_per_group;
    let group = (ino - 1) / sb.inodes_per_group;
    let block_within_table = (index as u64 * inode_size) / block_size;
    let offset = ((index as u64 * inode_size) % block_size) as usize;
    let gd = groups.get(group);
    Ok(Location {
        block: gd.inode_table + block_within_table as u32,
        offset,
    })
}

/// Reads, writes, and manages the lifecycle of inode records.
pub struct InodeTable;

impl InodeTable {
    /// Reads inode `ino`.
    pub fn read<D: BlockDevice>(
        buffers: &mut BufferLayer<D>,
        sb: &RawSuperblock,
        groups: &GroupDescTable,
        ino: u32,
    ) -> Result<RawInode> {
        let loc = locate(ino, sb, groups)?;
        let buf = buffers.get(loc.block)?;
        let inode_size = sb.inode_size() as usize;
        let mut inode = RawInode::zeroed();
        as_bytes_mut(&mut inode).copy_from_slice(&buf.data[loc.offset..loc.offset + inode_size.min(std::mem::size_of::<RawInode>())]);
        Ok(inode)
    }

    /// Writes `inode` back to `ino`'s record.
    pub fn write<D: BlockDevice>(
        buffers: &mut BufferLayer<D>,
        sb: &RawSuperblock,
        groups: &GroupDescTable,
        ino: u32,
        inode: &RawInode,
    ) -> Result<()> {
        let loc = locate(ino, sb, groups)?;
        let mut buf = buffers.get(loc.block)?;
        let inode_size = sb.inode_size() as usize;
        let len = inode_size.min(std::mem::size_of::<RawInode>());
        buf.data[loc.offset..loc.offset + len].copy_from_slice(&as_bytes(inode)[..len]);
        buf.mark_dirty();
        buffers.release(buf)
    }

    /// Allocates a fresh inode of the given `kind` and initializes it.
    pub fn create<D: BlockDevice>(
        buffers: &mut BufferLayer<D>,
        sb: &mut RawSuperblock,
        groups: &mut GroupDescTable,
        kind: FileKind,
        mode: u16,
    ) -> Result<(u32, RawInode)> {
        let ino = BitmapAllocator::alloc_inode(buffers, groups, sb, kind == FileKind::Dir)?;
        let now = superblock::now();
        let mut inode = RawInode::zeroed();
        inode.mode = kind.mode_bits() | (mode & 0o7777);
        inode.size = 0;
        inode.atime = now;
        inode.ctime = now;
        inode.mtime = now;
        inode.dtime = 0;
        inode.links_count = 1;
        inode.blocks = 0;
        Self::write(buffers, sb, groups, ino, &inode)?;
        Ok((ino, inode))
    }

    /// Increments `ino`'s link count.
    pub fn add_link<D: BlockDevice>(
        buffers: &mut BufferLayer<D>,
        sb: &RawSuperblock,
        groups: &GroupDescTable,
        ino: u32,
    ) -> Result<()> {
        let mut inode = Self::read(buffers, sb, groups, ino)?;
        inode.links_count += 1;
        Self::write(buffers, sb, groups, ino, &inode)
    }

    /// Decrements `ino`'s link count. If it reaches zero, releases the inode's content blocks,
    /// the indirect block itself, and the inode's bitmap bit.
    pub fn remove_link<D: BlockDevice>(
        buffers: &mut BufferLayer<D>,
        sb: &mut RawSuperblock,
        groups: &mut GroupDescTable,
        ino: u32,
    ) -> Result<()> {
        let mut inode = Self::read(buffers, sb, groups, ino)?;
        inode.links_count -= 1;
        if inode.links_count > 0 {
            return Self::write(buffers, sb, groups, ino, &inode);
        }

        let sectors_per_block = sb.block_size() / 512;
        let direct_content_blocks = DIRECT_BLOCKS_COUNT as u32 * sectors_per_block;
        for ptr in &inode.block[..DIRECT_BLOCKS_COUNT] {
            if *ptr != 0 {
                BitmapAllocator::free_block(buffers, groups, sb, *ptr)?;
            }
        }
        if inode.blocks > direct_content_blocks && inode.block[IND_BLOCK] != 0 {
            let ind = buffers.get(inode.block[IND_BLOCK])?;
            let entries_per_block = sb.block_size() as usize / 4;
            for i in 0..entries_per_block {
                let off = i * 4;
                let ptr = u32::from_le_bytes(ind.data[off..off + 4].try_into().unwrap());
                if ptr != 0 {
                    BitmapAllocator::free_block(buffers, groups, sb, ptr)?;
                }
            }
            buffers.release(ind)?;
            BitmapAllocator::free_block(buffers, groups, sb, inode.block[IND_BLOCK])?;
        }

        inode.block = [0; 15];
        inode.blocks = 0;
        inode.size = 0;
        inode.dtime = superblock::now();
        inode.links_count = 0;
        Self::write(buffers, sb, groups, ino, &inode)?;
        BitmapAllocator::free_inode(buffers, groups, sb, ino)
    }
}
