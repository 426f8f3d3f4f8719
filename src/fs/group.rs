//! In-memory mirror of the block group descriptor table (BGDT).

use crate::buffer::BufferLayer;
use crate::device::BlockDevice;
use crate::error::Result;
use crate::layout::RawGroupDesc;
use crate::layout::RawSuperblock;
use crate::superblock;
use crate::util::as_bytes;
use crate::util::as_bytes_mut;
use crate::util::ceil_division;
use std::mem::size_of;

/// The in-memory array of block group descriptors, loaded from the block(s) immediately
/// following the primary superblock.
pub struct GroupDescTable {
    groups: Vec<RawGroupDesc>,
}

impl GroupDescTable {
    /// Loads the table for a filesystem described by `sb`.
    pub fn read<D: BlockDevice>(
        buffers: &mut BufferLayer<D>,
        sb: &RawSuperblock,
    ) -> Result<Self> {
        let block_size = sb.block_size();
        let num_groups = sb.num_groups();
        let bgdt_size =
            ceil_division(num_groups as u64 * size_of::<RawGroupDesc>() as u64, block_size as u64);
        let start = superblock::bgdt_start_block(block_size);

        let mut raw = Vec::with_capacity((bgdt_size * block_size as u64) as usize);
        for i in 0..bgdt_size {
            let buf = buffers.get(start + i as u32)?;
            raw.extend_from_slice(&buf.data);
        }

        let mut groups = Vec::with_capacity(num_groups as usize);
        for i in 0..num_groups as usize {
            let off = i * size_of::<RawGroupDesc>();
            let mut gd = RawGroupDesc::zeroed();
            as_bytes_mut(&mut gd).copy_from_slice(&raw[off..off + size_of::<RawGroupDesc>()]);
            groups.push(gd);
        }
        Ok(Self { groups })
    }

    /// Writes every group descriptor block back to disk.
    pub fn sync<D: BlockDevice>(
        &self,
        buffers: &mut BufferLayer<D>,
        sb: &RawSuperblock,
    ) -> Result<()> {
        let block_size = sb.block_size();
        let bgdt_size = ceil_division(
            self.groups.len() as u64 * size_of::<RawGroupDesc>() as u64,
            block_size as u64,
        );
        let start = superblock::bgdt_start_block(block_size);

        let mut raw = vec![0u8; (bgdt_size * block_size as u64) as usize];
        for (i, gd) in self.groups.iter().enumerate() {
            let off = i * size_of::<RawGroupDesc>();
            raw[off..off + size_of::<RawGroupDesc>()].copy_from_slice(as_bytes(gd));
        }
        for i in 0..bgdt_size {
            let off = (i as usize) * block_size as usize;
            let mut buf = buffers.get(start + i as u32)?;
            buf.data.copy_from_slice(&raw[off..off + block_size as usize]);
            buf.mark_dirty();
            buffers.release(buf)?;
        }
        Ok(())
    }

    /// Returns the number of groups in the table.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns `true` if the table has no groups (never true for a valid filesystem).
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Returns an immutable reference to group `i`'s descriptor.
    pub fn get(&self, i: u32) -> &RawGroupDesc {
        &self.groups[i as usize]
    }

    /// Returns a mutable reference to group `i`'s descriptor.
    pub fn get_mut(&mut self, i: u32) -> &mut RawGroupDesc {
        &mut self.groups[i as usize]
    }
}
