//! Directory-entry lookup, insertion, removal, and path resolution.

use crate::bitmap::BitmapAllocator;
use crate::blockmap::BlockMap;
use crate::buffer::BufferLayer;
use crate::device::BlockDevice;
use crate::dirent::DirentIterator;
use crate::dirent::NAME_OFF;
use crate::dirent::name as entry_name;
use crate::dirent::read_header;
use crate::dirent::write_entry;
use crate::error::Error;
use crate::error::Result;
use crate::group::GroupDescTable;
use crate::inode::InodeTable;
use crate::layout::FT_DIR;
use crate::layout::ROOT_INODE;
use crate::layout::RawInode;
use crate::layout::RawSuperblock;
use crate::util::round_up_4;

/// Returns the number of logical data blocks currently assigned to `inode`.
fn blocks_count(inode: &RawInode, sb: &RawSuperblock) -> u32 {
    inode.blocks / (sb.block_size() / 512)
}

/// Packs and unpacks directory contents, and resolves paths against them.
pub struct DirectoryOps;

impl DirectoryOps {
    /// Looks up `name` within `dir_ino`'s entries.
    pub fn lookup<D: BlockDevice>(
        buffers: &mut BufferLayer<D>,
        sb: &RawSuperblock,
        groups: &GroupDescTable,
        dir_ino: u32,
        name: &[u8],
    ) -> Result<u32> {
        let inode = InodeTable::read(buffers, sb, groups, dir_ino)?;
        for blk in 0..blocks_count(&inode, sb) {
            let phys = BlockMap::resolve(buffers, sb, &inode, blk)?;
            if phys == 0 {
                continue;
            }
            let buf = buffers.get(phys)?;
            for entry in DirentIterator::new(&buf.data) {
                let (off, header) = entry?;
                if !header.is_free() && entry_name(&buf.data, off, &header) == name {
                    return Ok(header.inode);
                }
            }
        }
        Err(Error::NotFound)
    }

    /// Inserts a new `(name, child_ino)` entry into `dir_ino`, of the given directory-entry
    /// `file_type` tag.
    pub fn insert<D: BlockDevice>(
        buffers: &mut BufferLayer<D>,
        sb: &mut RawSuperblock,
        groups: &mut GroupDescTable,
        dir_ino: u32,
        name: &[u8],
        child_ino: u32,
        file_type: u8,
    ) -> Result<()> {
        let mut inode = InodeTable::read(buffers, sb, groups, dir_ino)?;
        let need = round_up_4(NAME_OFF + name.len()) as u16;

        // Reject duplicate names/inodes up front.
        for blk in 0..blocks_count(&inode, sb) {
            let phys = BlockMap::resolve(buffers, sb, &inode, blk)?;
            if phys == 0 {
                continue;
            }
            let buf = buffers.get(phys)?;
            for entry in DirentIterator::new(&buf.data) {
                let (off, header) = entry?;
                if header.is_free() {
                    continue;
                }
                if entry_name(&buf.data, off, &header) == name {
                    return Err(Error::NameExists);
                }
                if header.inode == child_ino {
                    return Err(Error::DuplicateInode);
                }
            }
        }

        // Look for slack to reuse: either a tombstone large enough, or a live entry whose
        // rec_len exceeds its minimal size.
        for blk in 0..blocks_count(&inode, sb) {
            let phys = BlockMap::resolve(buffers, sb, &inode, blk)?;
            if phys == 0 {
                continue;
            }
            let mut buf = buffers.get(phys)?;
            let mut slot = None;
            for entry in DirentIterator::new(&buf.data) {
                let (off, header) = entry?;
                if header.is_free() && header.rec_len >= need {
                    slot = Some((off, header.rec_len, None));
                    break;
                }
                let minimal = header.minimal_rec_len();
                if !header.is_free() && header.rec_len > minimal && header.rec_len - minimal >= need {
                    slot = Some((off, header.rec_len - minimal, Some((off, minimal))));
                    break;
                }
            }
            if let Some((new_off, new_len, shrink)) = slot {
                let (new_off, new_len) = if let Some((shrink_off, shrink_len)) = shrink {
                    buf.data[shrink_off + 4..shrink_off + 6].copy_from_slice(&shrink_len.to_le_bytes());
                    (shrink_off + shrink_len as usize, new_len)
                } else {
                    (new_off, new_len)
                };
                write_entry(&mut buf.data, new_off, child_ino, new_len, file_type, name)?;
                buf.mark_dirty();
                buffers.release(buf)?;
                return Ok(());
            }
            buffers.release(buf)?;
        }

        // No existing block has room: allocate a fresh one sized to fill with this entry.
        let next_blk = blocks_count(&inode, sb);
        let phys = BitmapAllocator::alloc_block(buffers, groups, sb, 0)?;
        BlockMap::assign(buffers, sb, groups, &mut inode, next_blk, phys)?;
        let block_size = sb.block_size();
        inode.size = (next_blk + 1) * block_size;
        let mut buf = buffers.get(phys)?;
        buf.data.fill(0);
        write_entry(&mut buf.data, 0, child_ino, block_size as u16, file_type, name)?;
        buf.mark_dirty();
        buffers.release(buf)?;
        InodeTable::write(buffers, sb, groups, dir_ino, &inode)
    }

    /// Removes the entry named `name` from `dir_ino`, coalescing its space into the preceding
    /// entry in the same block.
    pub fn remove<D: BlockDevice>(
        buffers: &mut BufferLayer<D>,
        sb: &RawSuperblock,
        groups: &GroupDescTable,
        dir_ino: u32,
        name: &[u8],
    ) -> Result<()> {
        let inode = InodeTable::read(buffers, sb, groups, dir_ino)?;
        for blk in 0..blocks_count(&inode, sb) {
            let phys = BlockMap::resolve(buffers, sb, &inode, blk)?;
            if phys == 0 {
                continue;
            }
            let mut buf = buffers.get(phys)?;
            let mut prev_off = None;
            let mut target = None;
            for entry in DirentIterator::new(&buf.data) {
                let (off, header) = entry?;
                if !header.is_free() && entry_name(&buf.data, off, &header) == name {
                    target = Some((off, header.rec_len));
                    break;
                }
                prev_off = Some(off);
            }
            if let Some((off, rec_len)) = target {
                buf.data[off..off + 4].copy_from_slice(&0u32.to_le_bytes());
                if let Some(prev_off) = prev_off {
                    let prev_header = read_header(&buf.data, prev_off)?;
                    let grown = prev_header.rec_len + rec_len;
                    buf.data[prev_off + 4..prev_off + 6].copy_from_slice(&grown.to_le_bytes());
                }
                buf.mark_dirty();
                buffers.release(buf)?;
                return Ok(());
            }
            buffers.release(buf)?;
        }
        Err(Error::NotFound)
    }

    /// Resolves a `/`-separated path starting from the root directory.
    pub fn path_resolve<D: BlockDevice>(
        buffers: &mut BufferLayer<D>,
        sb: &RawSuperblock,
        groups: &GroupDescTable,
        path: &str,
    ) -> Result<u32> {
        let mut ino = ROOT_INODE;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            ino = Self::lookup(buffers, sb, groups, ino, component.as_bytes())?;
        }
        Ok(ino)
    }

    /// Initializes a freshly created directory's first block with the mandatory `.` and `..`
    /// entries.
    pub fn init_new_dir<D: BlockDevice>(
        buffers: &mut BufferLayer<D>,
        sb: &mut RawSuperblock,
        groups: &mut GroupDescTable,
        ino: u32,
        parent_ino: u32,
    ) -> Result<()> {
        let mut inode = InodeTable::read(buffers, sb, groups, ino)?;
        let block_size = sb.block_size();
        let phys = BitmapAllocator::alloc_block(buffers, groups, sb, 0)?;
        BlockMap::assign(buffers, sb, groups, &mut inode, 0, phys)?;
        inode.size = block_size;
        inode.links_count = 2;

        let mut buf = buffers.get(phys)?;
        buf.data.fill(0);
        write_entry(&mut buf.data, 0, ino, 12, FT_DIR, b".")?;
        write_entry(&mut buf.data, 12, parent_ino, (block_size - 12) as u16, FT_DIR, b"..")?;
        buf.mark_dirty();
        buffers.release(buf)?;

        InodeTable::write(buffers, sb, groups, ino, &inode)
    }
}
