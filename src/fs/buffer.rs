//! Read-through buffering for fixed-size logical blocks.

use crate::device::BlockDevice;
use crate::error::Result;

/// Buffer status flag: the payload reflects on-disk content.
pub const VALID: u8 = 0b001;
/// Buffer status flag: the payload has been modified and not yet flushed.
pub const DIRTY: u8 = 0b010;
/// Buffer status flag, reserved for a future locking layer. The single-owner engine never checks
/// it.
pub const BUSY: u8 = 0b100;

/// A block-sized, in-memory view of a logical block, borrowed from a [`BufferLayer`] for the
/// duration of a critical section.
pub struct Buffer {
    /// The logical block index this buffer mirrors. Not meaningful for the superblock buffer,
    /// which is always addressed at a fixed byte offset rather than a block number.
    pub block: u32,
    /// The block's bytes.
    pub data: Vec<u8>,
    flags: u8,
}

impl Buffer {
    /// Marks the buffer as modified; it must be flushed before being dropped.
    pub fn mark_dirty(&mut self) {
        self.flags |= DIRTY;
    }

    /// Tells whether the buffer holds unflushed modifications.
    pub fn is_dirty(&self) -> bool {
        self.flags & DIRTY != 0
    }
}

/// Owns the [`BlockDevice`] and mediates every block-granularity read/write.
///
/// The reference implementation performs no caching: every [`BufferLayer::get`] re-reads the
/// device and every [`BufferLayer::flush`]/[`BufferLayer::release`] writes straight through. An
/// LRU cache keyed by block number could be introduced later as long as flush stays synchronous.
pub struct BufferLayer<D: BlockDevice> {
    device: D,
    block_size: u32,
}

impl<D: BlockDevice> BufferLayer<D> {
    /// Wraps `device`, addressing it in blocks of `block_size` bytes.
    pub fn new(device: D, block_size: u32) -> Self {
        Self { device, block_size }
    }

    /// Returns the configured block size.
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Reconfigures the block size used for block-addressed reads/writes.
    ///
    /// Used once at mount time: the superblock (read via [`BufferLayer::get_at`], which ignores
    /// block size) tells us the real block size after the layer has already been constructed.
    pub fn set_block_size(&mut self, block_size: u32) {
        self.block_size = block_size;
    }

    /// Reads logical block `block` into a fresh [`Buffer`].
    pub fn get(&mut self, block: u32) -> Result<Buffer> {
        let mut data = vec![0u8; self.block_size as usize];
        let offset = block as u64 * self.block_size as u64;
        self.device.read(offset, &mut data)?;
        Ok(Buffer {
            block,
            data,
            flags: VALID,
        })
    }

    /// Reads a `len`-byte span at a fixed byte offset, bypassing block addressing. Used for the
    /// superblock, which is not aligned to the filesystem's own block size.
    pub fn get_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut data = vec![0u8; len];
        self.device.read(offset, &mut data)?;
        Ok(data)
    }

    /// Writes `data` at a fixed byte offset, bypassing block addressing.
    pub fn put_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.device.write(offset, data)
    }

    /// Writes a dirty buffer through to the device and clears its dirty flag.
    pub fn flush(&mut self, buf: &mut Buffer) -> Result<()> {
        let offset = buf.block as u64 * self.block_size as u64;
        self.device.write(offset, &buf.data)?;
        buf.flags &= !DIRTY;
        Ok(())
    }

    /// Releases a buffer, flushing it first if it is still dirty.
    pub fn release(&mut self, mut buf: Buffer) -> Result<()> {
        if buf.is_dirty() {
            self.flush(&mut buf)?;
        }
        Ok(())
    }

    /// Returns the device's total size in bytes.
    pub fn device_size(&self) -> Result<u64> {
        self.device.size()
    }
}
