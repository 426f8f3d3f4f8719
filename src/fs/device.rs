//! The bottom layer: an opaque, byte-addressable backing store.

use crate::error::Result;
use std::ffi::c_long;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::os::fd::AsRawFd;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;

macro_rules! ioc {
    ($a:expr, $b:expr, $c:expr, $d:expr) => {
        (($a) << 30) | (($b) << 8) | ($c) | (($d) << 16)
    };
}

macro_rules! ior {
    ($a:expr, $b:expr, $c:ty) => {
        ioc!(2, $a, $b, std::mem::size_of::<$c>() as c_long)
    };
}

/// ioctl command: get the size of a block device, in bytes.
const BLKGETSIZE64: c_long = ior!(0x12, 114, u64);

/// A byte-addressable backing store offering positional reads and writes.
///
/// No caching happens at this layer; every call reaches the underlying storage.
pub trait BlockDevice {
    /// Reads `dst.len()` bytes starting at byte `offset`.
    fn read(&mut self, offset: u64, dst: &mut [u8]) -> Result<()>;

    /// Writes `src` starting at byte `offset`.
    fn write(&mut self, offset: u64, src: &[u8]) -> Result<()>;

    /// Returns the size of the device in bytes.
    fn size(&self) -> Result<u64>;
}

/// A [`BlockDevice`] backed by a host file (a raw disk image, or a block device node).
pub struct FileBlockDevice {
    file: File,
}

impl FileBlockDevice {
    /// Opens the image at `path` for reading and writing.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self { file })
    }
}

impl BlockDevice for FileBlockDevice {
    fn read(&mut self, offset: u64, dst: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(dst)?;
        Ok(())
    }

    fn write(&mut self, offset: u64, src: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(src)?;
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        let file_type = self.file.metadata()?.file_type();
        if file_type.is_block_device() || file_type.is_char_device() {
            let mut size: u64 = 0;
            let ret = unsafe { libc::ioctl(self.file.as_raw_fd(), BLKGETSIZE64 as _, &mut size) };
            if ret < 0 {
                return Err(std::io::Error::last_os_error().into());
            }
            return Ok(size);
        }
        Ok(self.file.metadata()?.len())
    }
}

/// Test-only support: an in-memory [`BlockDevice`] and a builder for small, hand-laid-out ext2
/// images, used across this crate's test modules in place of a real disk image.
#[cfg(test)]
pub(crate) mod support {
    use super::BlockDevice;
    use crate::error::Error;
    use crate::error::Result;
    use crate::layout::FS_STATE_CLEAN;
    use crate::layout::IFDIR;
    use crate::layout::RawGroupDesc;
    use crate::layout::RawInode;
    use crate::layout::RawSuperblock;
    use crate::layout::ROOT_INODE;
    use crate::layout::SUPERBLOCK_OFFSET;
    use crate::util::as_bytes;
    use std::mem::size_of;

    /// A [`BlockDevice`] backed by a plain in-memory buffer.
    pub(crate) struct MemBlockDevice {
        data: Vec<u8>,
    }

    impl BlockDevice for MemBlockDevice {
        fn read(&mut self, offset: u64, dst: &mut [u8]) -> Result<()> {
            let off = offset as usize;
            if off + dst.len() > self.data.len() {
                return Err(Error::CorruptMetadata("read past end of device"));
            }
            dst.copy_from_slice(&self.data[off..off + dst.len()]);
            Ok(())
        }

        fn write(&mut self, offset: u64, src: &[u8]) -> Result<()> {
            let off = offset as usize;
            if off + src.len() > self.data.len() {
                return Err(Error::CorruptMetadata("write past end of device"));
            }
            self.data[off..off + src.len()].copy_from_slice(src);
            Ok(())
        }

        fn size(&self) -> Result<u64> {
            Ok(self.data.len() as u64)
        }
    }

    /// The block size used by every image this builder produces.
    pub(crate) const BLOCK_SIZE: u32 = 1024;
    /// A single group holding this many blocks.
    pub(crate) const BLOCKS_PER_GROUP: u32 = 256;
    /// A single group holding this many inodes.
    pub(crate) const INODES_PER_GROUP: u32 = 64;

    fn set_bits(bitmap: &mut [u8], count: u32) {
        for bit in 0..count {
            bitmap[(bit / 8) as usize] |= 1 << (bit % 8);
        }
    }

    /// Builds a fresh, minimal single-group ext2 image: a valid superblock and group descriptor,
    /// the metadata blocks (bitmaps, inode table) marked used, the root inode (`ino` 2) allocated
    /// and given an `IFDIR` mode, but with no directory content yet — callers finish setup by
    /// calling `DirectoryOps::init_new_dir` on the mounted filesystem, the same way
    /// `FileOps::mkdir` would for any other directory.
    pub(crate) fn build_fresh_image() -> MemBlockDevice {
        let block_size = BLOCK_SIZE;
        let total_blocks = BLOCKS_PER_GROUP;
        let total_inodes = INODES_PER_GROUP;
        let inode_size = size_of::<RawInode>() as u32;

        // Layout: 0 boot, 1 superblock, 2 BGDT, 3 block bitmap, 4 inode bitmap,
        // 5..5+itable_blocks inode table, then data blocks.
        let itable_blocks = (total_inodes * inode_size).div_ceil(block_size);
        let block_bitmap_blk = 3u32;
        let inode_bitmap_blk = 4u32;
        let inode_table_blk = 5u32;
        let metadata_blocks = inode_table_blk + itable_blocks;

        let mut data = vec![0u8; total_blocks as usize * block_size as usize];

        let mut sb = RawSuperblock::zeroed();
        sb.total_inodes = total_inodes;
        sb.total_blocks = total_blocks;
        sb.free_blocks = total_blocks - metadata_blocks;
        sb.free_inodes = total_inodes - 10;
        sb.first_data_block = 1;
        sb.log_block_size = 0;
        sb.blocks_per_group = BLOCKS_PER_GROUP;
        sb.fragments_per_group = BLOCKS_PER_GROUP;
        sb.inodes_per_group = INODES_PER_GROUP;
        sb.magic = crate::layout::EXT2_MAGIC;
        sb.state = FS_STATE_CLEAN;
        sb.errors = crate::layout::ERR_ACTION_IGNORE;
        sb.rev_level = 1;
        sb.first_inode = 11;
        sb.inode_size = inode_size as u16;
        let sb_bytes = as_bytes(&sb);
        data[SUPERBLOCK_OFFSET as usize..SUPERBLOCK_OFFSET as usize + sb_bytes.len()]
            .copy_from_slice(sb_bytes);

        let mut gd = RawGroupDesc::zeroed();
        gd.block_bitmap = block_bitmap_blk;
        gd.inode_bitmap = inode_bitmap_blk;
        gd.inode_table = inode_table_blk;
        gd.free_blocks_count = (total_blocks - metadata_blocks) as u16;
        gd.free_inodes_count = (total_inodes - 10) as u16;
        gd.used_dirs_count = 1;
        let gd_bytes = as_bytes(&gd);
        let bgdt_off = 2 * block_size as usize;
        data[bgdt_off..bgdt_off + gd_bytes.len()].copy_from_slice(gd_bytes);

        let block_bitmap_off = block_bitmap_blk as usize * block_size as usize;
        set_bits(&mut data[block_bitmap_off..block_bitmap_off + block_size as usize], metadata_blocks);

        let inode_bitmap_off = inode_bitmap_blk as usize * block_size as usize;
        set_bits(&mut data[inode_bitmap_off..inode_bitmap_off + block_size as usize], 10);

        let root_off =
            inode_table_blk as usize * block_size as usize + (ROOT_INODE - 1) as usize * inode_size as usize;
        let mut root = RawInode::zeroed();
        root.mode = IFDIR | 0o755;
        root.links_count = 2;
        let root_bytes = as_bytes(&root);
        data[root_off..root_off + root_bytes.len()].copy_from_slice(root_bytes);

        MemBlockDevice { data }
    }
}
