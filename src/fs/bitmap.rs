//! Block and inode allocation over the per-group bitmaps.

use crate::buffer::BufferLayer;
use crate::device::BlockDevice;
use crate::error::Error;
use crate::error::Result;
use crate::group::GroupDescTable;
use crate::layout::RawSuperblock;

/// Scans `data` one 32-bit word at a time and returns the bit index of the first zero bit.
///
/// Ordering is ascending word, ascending bit within word, matching the on-disk byte order
/// (little-endian words).
fn first_free_bit(data: &[u8]) -> Option<u32> {
    for (i, word) in data.chunks_exact(4).enumerate() {
        let word = u32::from_le_bytes(word.try_into().unwrap());
        if word != u32::MAX {
            let bit = (!word).trailing_zeros();
            return Some(i as u32 * 32 + bit);
        }
    }
    None
}

fn bit_is_set(data: &[u8], bit: u32) -> bool {
    let byte = bit as usize / 8;
    let shift = bit % 8;
    data[byte] & (1 << shift) != 0
}

fn set_bit(data: &mut [u8], bit: u32) {
    let byte = bit as usize / 8;
    let shift = bit % 8;
    data[byte] |= 1 << shift;
}

fn clear_bit(data: &mut [u8], bit: u32) {
    let byte = bit as usize / 8;
    let shift = bit % 8;
    data[byte] &= !(1 << shift);
}

/// Allocates and frees blocks and inodes via the per-group bitmaps.
pub struct BitmapAllocator;

impl BitmapAllocator {
    /// Scans groups starting at `hint_group` for a free block, allocates it, and returns its
    /// 1-based global block number.
    pub fn alloc_block<D: BlockDevice>(
        buffers: &mut BufferLayer<D>,
        groups: &mut GroupDescTable,
        sb: &mut RawSuperblock,
        hint_group: u32,
    ) -> Result<u32> {
        let num_groups = groups.len() as u32;
        for group in hint_group..num_groups {
            let gd = groups.get(group);
            let mut buf = buffers.get(gd.block_bitmap)?;
            if let Some(bit) = first_free_bit(&buf.data) {
                if bit >= sb.blocks_per_group {
                    continue;
                }
                set_bit(&mut buf.data, bit);
                buf.mark_dirty();
                buffers.release(buf)?;

                let gd = groups.get_mut(group);
                gd.free_blocks_count -= 1;
                sb.free_blocks -= 1;

                return Ok(bit + group * sb.blocks_per_group + 1);
            }
        }
        Err(Error::NoSpace)
    }

    /// Scans groups from 0 for a free inode, allocates it, and returns its 1-based inode number.
    ///
    /// `is_dir` bumps the group's directory count, mirroring the caller's `FileKind`.
    pub fn alloc_inode<D: BlockDevice>(
        buffers: &mut BufferLayer<D>,
        groups: &mut GroupDescTable,
        sb: &mut RawSuperblock,
        is_dir: bool,
    ) -> Result<u32> {
        let num_groups = groups.len() as u32;
        for group in 0..num_groups {
            let gd = groups.get(group);
            let mut buf = buffers.get(gd.inode_bitmap)?;
            if let Some(bit) = first_free_bit(&buf.data) {
                if bit >= sb.inodes_per_group {
                    continue;
                }
                set_bit(&mut buf.data, bit);
                buf.mark_dirty();
                buffers.release(buf)?;

                let gd = groups.get_mut(group);
                gd.free_inodes_count -= 1;
                if is_dir {
                    gd.used_dirs_count += 1;
                }
                sb.free_inodes -= 1;

                return Ok(bit + group * sb.inodes_per_group + 1);
            }
        }
        Err(Error::NoSpace)
    }

    /// Clears the bit for `block_no` and restores the free-block counters.
    pub fn free_block<D: BlockDevice>(
        buffers: &mut BufferLayer<D>,
        groups: &mut GroupDescTable,
        sb: &mut RawSuperblock,
        block_no: u32,
    ) -> Result<()> {
        let group = (block_no - 1) / sb.blocks_per_group;
        let bit = (block_no - 1) % sb.blocks_per_group;
        let gd = groups.get(group);
        let mut buf = buffers.get(gd.block_bitmap)?;
        if !bit_is_set(&buf.data, bit) {
            return Err(Error::DoubleFree);
        }
        clear_bit(&mut buf.data, bit);
        buf.mark_dirty();
        buffers.release(buf)?;

        let gd = groups.get_mut(group);
        gd.free_blocks_count += 1;
        sb.free_blocks += 1;
        Ok(())
    }

    /// Clears the bit for `ino` and restores the free-inode counters.
    pub fn free_inode<D: BlockDevice>(
        buffers: &mut BufferLayer<D>,
        groups: &mut GroupDescTable,
        sb: &mut RawSuperblock,
        ino: u32,
    ) -> Result<()> {
        let group = (ino - 1) / sb.inodes_per_group;
        let bit = (ino - 1) % sb.inodes_per_group;
        let gd = groups.get(group);
        let mut buf = buffers.get(gd.inode_bitmap)?;
        if !bit_is_set(&buf.data, bit) {
            return Err(Error::DoubleFree);
        }
        clear_bit(&mut buf.data, bit);
        buf.mark_dirty();
        buffers.release(buf)?;

        let gd = groups.get_mut(group);
        gd.free_inodes_count += 1;
        sb.free_inodes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn first_free_bit_basics() {
        assert_eq!(first_free_bit(&[0xff, 0xff, 0xff, 0xff]), None);
        assert_eq!(first_free_bit(&[0x01, 0x00, 0x00, 0x00]), Some(1));
        assert_eq!(first_free_bit(&[0xff, 0x01, 0x00, 0x00]), Some(9));
        assert_eq!(first_free_bit(&[0xff, 0xff, 0xff, 0xfe]), Some(24));
    }

    #[test]
    fn bit_toggling() {
        let mut data = vec![0u8; 4];
        assert!(!bit_is_set(&data, 5));
        set_bit(&mut data, 5);
        assert!(bit_is_set(&data, 5));
        clear_bit(&mut data, 5);
        assert!(!bit_is_set(&data, 5));
    }
}
