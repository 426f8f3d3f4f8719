//! Flushes the in-memory superblock and group-descriptor mirrors back to disk.

use crate::buffer::BufferLayer;
use crate::device::BlockDevice;
use crate::error::Result;
use crate::group::GroupDescTable;
use crate::layout::RawSuperblock;
use crate::superblock;

/// Commits the superblock and the group descriptor table. Both writes complete before
/// returning.
pub struct Sync;

impl Sync {
    /// Stamps `wtime` and writes the superblock, then the group descriptor table.
    pub fn now<D: BlockDevice>(
        buffers: &mut BufferLayer<D>,
        sb: &mut RawSuperblock,
        groups: &GroupDescTable,
    ) -> Result<()> {
        superblock::sync(buffers, sb)?;
        groups.sync(buffers, sb)
    }
}
