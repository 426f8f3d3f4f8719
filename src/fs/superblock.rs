//! Parsed, in-memory mirror of the on-disk superblock.

use crate::buffer::BufferLayer;
use crate::device::BlockDevice;
use crate::error::Error;
use crate::error::Result;
use crate::layout::EXT2_MAGIC;
use crate::layout::FS_STATE_CLEAN;
use crate::layout::RawSuperblock;
use crate::layout::SUPERBLOCK_OFFSET;
use crate::util::as_bytes;
use crate::util::as_bytes_mut;
use crate::util::log2;
use std::mem::size_of;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Returns the current time as a Unix timestamp, as stored in on-disk time fields.
pub fn now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs() as u32
}

/// Reads and validates the superblock at the fixed byte offset 1024.
pub fn read<D: BlockDevice>(buffers: &mut BufferLayer<D>) -> Result<RawSuperblock> {
    let bytes = buffers.get_at(SUPERBLOCK_OFFSET, size_of::<RawSuperblock>())?;
    let mut sb = RawSuperblock::zeroed();
    as_bytes_mut(&mut sb).copy_from_slice(&bytes);
    if sb.magic != EXT2_MAGIC {
        return Err(Error::BadSuperblock);
    }
    let block_size = sb.block_size();
    if !matches!(block_size, 1024 | 2048 | 4096) {
        return Err(Error::BadSuperblock);
    }
    if log2(block_size as u64).is_none() {
        return Err(Error::BadSuperblock);
    }
    Ok(sb)
}

/// Writes the superblock back to its fixed byte offset, stamping the write timestamp first.
pub fn sync<D: BlockDevice>(buffers: &mut BufferLayer<D>, sb: &mut RawSuperblock) -> Result<()> {
    sb.last_write_time = now();
    sb.state = FS_STATE_CLEAN;
    buffers.put_at(SUPERBLOCK_OFFSET, as_bytes(sb))
}

/// Returns the block number at which the group descriptor table begins: the block immediately
/// following the primary superblock.
pub fn bgdt_start_block(block_size: u32) -> u32 {
    if block_size == 1024 { 2 } else { 1 }
}
