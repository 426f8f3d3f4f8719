//! File-level operations composing [`BlockMap`], [`BitmapAllocator`], [`InodeTable`],
//! [`DirectoryOps`], and [`Sync`].

use crate::bitmap::BitmapAllocator;
use crate::blockmap::BlockMap;
use crate::buffer::BufferLayer;
use crate::device::BlockDevice;
use crate::dir::DirectoryOps;
use crate::error::Result;
use crate::group::GroupDescTable;
use crate::inode::FileKind;
use crate::inode::InodeTable;
use crate::layout::DIRECT_BLOCKS_COUNT;
use crate::layout::FT_DIR;
use crate::layout::FT_REG_FILE;
use crate::layout::IND_BLOCK;
use crate::layout::RawSuperblock;
use crate::sync::Sync;

fn group_of(ino: u32, sb: &RawSuperblock) -> u32 {
    (ino - 1) / sb.inodes_per_group
}

/// Creates, reads, and overwrites regular files and directories.
pub struct FileOps;

impl FileOps {
    /// Creates a new regular file in `parent_ino` named `name`, with content `data`.
    pub fn create<D: BlockDevice>(
        buffers: &mut BufferLayer<D>,
        sb: &mut RawSuperblock,
        groups: &mut GroupDescTable,
        parent_ino: u32,
        name: &[u8],
        data: &[u8],
        mode: u16,
    ) -> Result<u32> {
        let (ino, mut inode) = InodeTable::create(buffers, sb, groups, FileKind::RegularFile, mode)?;
        let block_size = sb.block_size() as usize;
        let hint = group_of(parent_ino, sb);

        for (i, chunk) in data.chunks(block_size).enumerate() {
            let blk = BitmapAllocator::alloc_block(buffers, groups, sb, hint)?;
            BlockMap::assign(buffers, sb, groups, &mut inode, i as u32, blk)?;
            let mut buf = buffers.get(blk)?;
            buf.data.fill(0);
            buf.data[..chunk.len()].copy_from_slice(chunk);
            buf.mark_dirty();
            buffers.release(buf)?;
        }
        inode.size = data.len() as u32;
        InodeTable::write(buffers, sb, groups, ino, &inode)?;

        DirectoryOps::insert(buffers, sb, groups, parent_ino, name, ino, FT_REG_FILE)?;
        Sync::now(buffers, sb, groups)?;
        Ok(ino)
    }

    /// Replaces the content of an existing regular file, freeing any data blocks beyond the new
    /// size and allocating fresh ones for growth.
    pub fn overwrite<D: BlockDevice>(
        buffers: &mut BufferLayer<D>,
        sb: &mut RawSuperblock,
        groups: &mut GroupDescTable,
        ino: u32,
        data: &[u8],
    ) -> Result<()> {
        let mut inode = InodeTable::read(buffers, sb, groups, ino)?;
        let block_size = sb.block_size() as usize;
        let sectors_per_block = sb.block_size() / 512;
        let old_blocks = inode.blocks / sectors_per_block;
        let new_blocks = data.len().div_ceil(block_size) as u32;
        let hint = group_of(ino, sb);

        for (i, chunk) in data.chunks(block_size).enumerate() {
            let i = i as u32;
            let existing = BlockMap::resolve(buffers, sb, &inode, i)?;
            let blk = if existing != 0 {
                existing
            } else {
                let blk = BitmapAllocator::alloc_block(buffers, groups, sb, hint)?;
                BlockMap::assign(buffers, sb, groups, &mut inode, i, blk)?;
                blk
            };
            let mut buf = buffers.get(blk)?;
            buf.data.fill(0);
            buf.data[..chunk.len()].copy_from_slice(chunk);
            buf.mark_dirty();
            buffers.release(buf)?;
        }

        for i in new_blocks..old_blocks {
            let phys = BlockMap::resolve(buffers, sb, &inode, i)?;
            if phys != 0 {
                BitmapAllocator::free_block(buffers, groups, sb, phys)?;
            }
            BlockMap::clear(buffers, &mut inode, i)?;
        }

        if new_blocks <= DIRECT_BLOCKS_COUNT as u32 && inode.block[IND_BLOCK] != 0 {
            BitmapAllocator::free_block(buffers, groups, sb, inode.block[IND_BLOCK])?;
            inode.block[IND_BLOCK] = 0;
        }

        let indirect_sectors = if inode.block[IND_BLOCK] != 0 { sectors_per_block } else { 0 };
        inode.blocks = new_blocks * sectors_per_block + indirect_sectors;
        inode.size = data.len() as u32;
        InodeTable::write(buffers, sb, groups, ino, &inode)?;
        Sync::now(buffers, sb, groups)
    }

    /// Reads the full content of `ino`, truncated to its recorded size.
    pub fn read<D: BlockDevice>(
        buffers: &mut BufferLayer<D>,
        sb: &RawSuperblock,
        groups: &GroupDescTable,
        ino: u32,
    ) -> Result<Vec<u8>> {
        let inode = InodeTable::read(buffers, sb, groups, ino)?;
        let block_size = sb.block_size() as usize;
        let sectors_per_block = sb.block_size() / 512;
        let num_blocks = inode.blocks / sectors_per_block;

        let mut out = Vec::with_capacity(num_blocks as usize * block_size);
        for i in 0..num_blocks {
            let phys = BlockMap::resolve(buffers, sb, &inode, i)?;
            if phys == 0 {
                out.extend(std::iter::repeat_n(0u8, block_size));
                continue;
            }
            let buf = buffers.get(phys)?;
            out.extend_from_slice(&buf.data);
        }
        out.truncate(inode.size as usize);
        Ok(out)
    }

    /// Creates a new directory named `name` in `parent_ino`, wired up with its mandatory `.` and
    /// `..` entries.
    pub fn mkdir<D: BlockDevice>(
        buffers: &mut BufferLayer<D>,
        sb: &mut RawSuperblock,
        groups: &mut GroupDescTable,
        parent_ino: u32,
        name: &[u8],
        mode: u16,
    ) -> Result<u32> {
        let (ino, _) = InodeTable::create(buffers, sb, groups, FileKind::Dir, mode)?;
        DirectoryOps::init_new_dir(buffers, sb, groups, ino, parent_ino)?;
        DirectoryOps::insert(buffers, sb, groups, parent_ino, name, ino, FT_DIR)?;
        InodeTable::add_link(buffers, sb, groups, parent_ino)?;
        Sync::now(buffers, sb, groups)?;
        Ok(ino)
    }

    /// Removes the entry `name` from `parent_ino` and drops a link on the target inode, freeing
    /// it once its link count reaches zero.
    pub fn unlink<D: BlockDevice>(
        buffers: &mut BufferLayer<D>,
        sb: &mut RawSuperblock,
        groups: &mut GroupDescTable,
        parent_ino: u32,
        name: &[u8],
    ) -> Result<()> {
        let ino = DirectoryOps::lookup(buffers, sb, groups, parent_ino, name)?;
        InodeTable::remove_link(buffers, sb, groups, ino)?;
        DirectoryOps::remove(buffers, sb, groups, parent_ino, name)?;
        Sync::now(buffers, sb, groups)
    }
}
