//! Resolve a logical file-block index to a physical block number using the direct pointers and
//! one level of single-indirection.

use crate::bitmap::BitmapAllocator;
use crate::buffer::BufferLayer;
use crate::device::BlockDevice;
use crate::error::Error;
use crate::error::Result;
use crate::group::GroupDescTable;
use crate::layout::DIRECT_BLOCKS_COUNT;
use crate::layout::IND_BLOCK;
use crate::layout::RawInode;
use crate::layout::RawSuperblock;

/// Translates logical file-block indices to physical disk blocks and back.
pub struct BlockMap;

impl BlockMap {
    /// Resolves logical block `idx` to a physical block number.
    ///
    /// Returns `0` for a hole (an index within range that was never assigned). Out-of-range
    /// indices within the single-indirect table are a [`Error::CorruptMetadata`].
    pub fn resolve<D: BlockDevice>(
        buffers: &mut BufferLayer<D>,
        sb: &RawSuperblock,
        inode: &RawInode,
        idx: u32,
    ) -> Result<u32> {
        if (idx as usize) < DIRECT_BLOCKS_COUNT {
            return Ok(inode.block[idx as usize]);
        }
        let rel = idx - DIRECT_BLOCKS_COUNT as u32;
        let entries_per_block = sb.block_size() / 4;
        if rel >= entries_per_block {
            return Err(Error::CorruptMetadata("single-indirect index overflow"));
        }
        let ind = inode.block[IND_BLOCK];
        if ind == 0 {
            return Ok(0);
        }
        let buf = buffers.get(ind)?;
        let off = rel as usize * 4;
        Ok(u32::from_le_bytes(buf.data[off..off + 4].try_into().unwrap()))
    }

    /// Assigns physical block `physical_block` to logical index `idx`, allocating the
    /// single-indirect block on first use.
    pub fn assign<D: BlockDevice>(
        buffers: &mut BufferLayer<D>,
        sb: &mut RawSuperblock,
        groups: &mut GroupDescTable,
        inode: &mut RawInode,
        idx: u32,
        physical_block: u32,
    ) -> Result<()> {
        let sectors_per_block = sb.block_size() / 512;
        if (idx as usize) < DIRECT_BLOCKS_COUNT {
            if inode.block[idx as usize] == 0 {
                inode.blocks += sectors_per_block;
            }
            inode.block[idx as usize] = physical_block;
            return Ok(());
        }

        let rel = idx - DIRECT_BLOCKS_COUNT as u32;
        let entries_per_block = sb.block_size() / 4;
        if rel >= entries_per_block {
            return Err(Error::CorruptMetadata("single-indirect index overflow"));
        }

        if inode.block[IND_BLOCK] == 0 {
            let ind_block = BitmapAllocator::alloc_block(buffers, groups, sb, 0)?;
            let mut buf = buffers.get(ind_block)?;
            buf.data.fill(0);
            buf.mark_dirty();
            buffers.release(buf)?;
            inode.block[IND_BLOCK] = ind_block;
            inode.blocks += sectors_per_block;
        }

        let mut buf = buffers.get(inode.block[IND_BLOCK])?;
        let off = rel as usize * 4;
        let prev = u32::from_le_bytes(buf.data[off..off + 4].try_into().unwrap());
        buf.data[off..off + 4].copy_from_slice(&physical_block.to_le_bytes());
        buf.mark_dirty();
        buffers.release(buf)?;
        if prev == 0 {
            inode.blocks += sectors_per_block;
        }
        Ok(())
    }

    /// Clears the pointer at logical index `idx` back to a hole (zero), without allocating or
    /// freeing any block and without touching `inode.blocks` — callers recompute that once all
    /// shrinking for a given operation is done.
    pub fn clear<D: BlockDevice>(
        buffers: &mut BufferLayer<D>,
        inode: &mut RawInode,
        idx: u32,
    ) -> Result<()> {
        if (idx as usize) < DIRECT_BLOCKS_COUNT {
            inode.block[idx as usize] = 0;
            return Ok(());
        }
        let ind = inode.block[IND_BLOCK];
        if ind == 0 {
            return Ok(());
        }
        let rel = idx - DIRECT_BLOCKS_COUNT as u32;
        let mut buf = buffers.get(ind)?;
        let off = rel as usize * 4;
        buf.data[off..off + 4].copy_from_slice(&0u32.to_le_bytes());
        buf.mark_dirty();
        buffers.release(buf)
    }
}
