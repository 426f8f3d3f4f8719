//! The top-level handle tying the engine's layers together.

use crate::buffer::BufferLayer;
use crate::device::BlockDevice;
use crate::device::FileBlockDevice;
use crate::dir::DirectoryOps;
use crate::error::Result;
use crate::file::FileOps;
use crate::group::GroupDescTable;
use crate::inode::InodeTable;
use crate::layout::ROOT_INODE;
use crate::layout::RawInode;
use crate::layout::RawSuperblock;
use crate::superblock;
use crate::sync::Sync;
use std::path::Path;

/// A directory entry as returned by [`Filesystem::ls`]: inode, name, whether it is a directory,
/// size in bytes, and mode bits.
pub struct DirListing {
    pub ino: u32,
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub mode: u16,
}

/// An open ext2 filesystem.
///
/// Owns the [`BufferLayer`] (and through it the [`BlockDevice`]), the in-memory [`RawSuperblock`]
/// mirror, and the [`GroupDescTable`] mirror. Every operation takes `&mut self`: there is no
/// process-wide state, and no two operations run concurrently (§5: single-owner).
pub struct Filesystem<D: BlockDevice> {
    buffers: BufferLayer<D>,
    sb: RawSuperblock,
    groups: GroupDescTable,
}

impl Filesystem<FileBlockDevice> {
    /// Opens and mounts the image at `path`.
    pub fn mount_file(path: &Path) -> Result<Self> {
        let device = FileBlockDevice::open(path)?;
        Self::mount(device)
    }
}

impl<D: BlockDevice> Filesystem<D> {
    /// Mounts a filesystem already wrapped in a [`BlockDevice`].
    ///
    /// Reads and validates the superblock, then loads the group descriptor table.
    pub fn mount(device: D) -> Result<Self> {
        // The superblock lives at byte offset 1024 regardless of block size, so it is read
        // through `get_at`, which bypasses block addressing entirely. Only once the real block
        // size is known does the layer get reconfigured for block-addressed access.
        let mut buffers = BufferLayer::new(device, 1024);
        let sb = superblock::read(&mut buffers)?;
        buffers.set_block_size(sb.block_size());
        let groups = GroupDescTable::read(&mut buffers, &sb)?;

        Ok(Self { buffers, sb, groups })
    }

    /// A no-op hook reserved for a future per-inode locking layer.
    pub fn lock_inode(&self, _ino: u32) {}

    /// A no-op hook reserved for a future per-inode locking layer.
    pub fn unlock_inode(&self, _ino: u32) {}

    /// Returns a read-only view of the in-memory superblock.
    pub fn superblock(&self) -> &RawSuperblock {
        &self.sb
    }

    /// Returns a read-only view of the in-memory group descriptor table.
    pub fn groups(&self) -> &GroupDescTable {
        &self.groups
    }

    /// Returns the inode number of the root directory.
    pub fn root_ino(&self) -> u32 {
        ROOT_INODE
    }

    /// Reads an inode record.
    pub fn read_inode(&mut self, ino: u32) -> Result<RawInode> {
        InodeTable::read(&mut self.buffers, &self.sb, &self.groups, ino)
    }

    /// Reads a file's full content, truncated to its recorded size.
    pub fn read_file(&mut self, ino: u32) -> Result<Vec<u8>> {
        FileOps::read(&mut self.buffers, &self.sb, &self.groups, ino)
    }

    /// Resolves `path` and reads its content.
    pub fn read_path(&mut self, path: &str) -> Result<Vec<u8>> {
        let ino = self.path_resolve(path)?;
        self.read_file(ino)
    }

    /// Resolves a `/`-separated path starting at the root directory.
    pub fn path_resolve(&mut self, path: &str) -> Result<u32> {
        DirectoryOps::path_resolve(&mut self.buffers, &self.sb, &self.groups, path)
    }

    /// Lists the entries of directory `dir_ino`.
    pub fn ls(&mut self, dir_ino: u32) -> Result<Vec<DirListing>> {
        use crate::blockmap::BlockMap;
        use crate::dirent::DirentIterator;
        use crate::dirent::name as entry_name;

        let dir = self.read_inode(dir_ino)?;
        let sectors_per_block = self.sb.block_size() / 512;
        let num_blocks = dir.blocks / sectors_per_block;

        let mut entries = Vec::new();
        for blk in 0..num_blocks {
            let phys = BlockMap::resolve(&mut self.buffers, &self.sb, &dir, blk)?;
            if phys == 0 {
                continue;
            }
            let buf = self.buffers.get(phys)?;
            for entry in DirentIterator::new(&buf.data) {
                let (off, header) = entry?;
                if header.is_free() {
                    continue;
                }
                let name = String::from_utf8_lossy(entry_name(&buf.data, off, &header)).into_owned();
                let child = InodeTable::read(&mut self.buffers, &self.sb, &self.groups, header.inode)?;
                entries.push(DirListing {
                    ino: header.inode,
                    name,
                    is_dir: child.is_dir(),
                    size: child.size as u64,
                    mode: child.mode,
                });
            }
        }
        Ok(entries)
    }

    /// Creates a new regular file in `parent_ino`.
    pub fn write_file(&mut self, parent_ino: u32, name: &str, data: &[u8], mode: u16) -> Result<u32> {
        FileOps::create(
            &mut self.buffers,
            &mut self.sb,
            &mut self.groups,
            parent_ino,
            name.as_bytes(),
            data,
            mode,
        )
    }

    /// Replaces the content of an existing regular file.
    pub fn overwrite_file(&mut self, ino: u32, data: &[u8]) -> Result<()> {
        FileOps::overwrite(&mut self.buffers, &mut self.sb, &mut self.groups, ino, data)
    }

    /// Creates a new directory in `parent_ino`.
    pub fn mkdir(&mut self, parent_ino: u32, name: &str, mode: u16) -> Result<u32> {
        FileOps::mkdir(
            &mut self.buffers,
            &mut self.sb,
            &mut self.groups,
            parent_ino,
            name.as_bytes(),
            mode,
        )
    }

    /// Removes `name` from `parent_ino`, dropping a link on its target inode.
    pub fn unlink(&mut self, parent_ino: u32, name: &str) -> Result<()> {
        FileOps::unlink(&mut self.buffers, &mut self.sb, &mut self.groups, parent_ino, name.as_bytes())
    }

    /// Flushes the in-memory superblock and group descriptor table to disk.
    pub fn sync(&mut self) -> Result<()> {
        Sync::now(&mut self.buffers, &mut self.sb, &self.groups)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::device::support::build_fresh_image;
    use crate::error::Error;

    fn mounted() -> Filesystem<crate::device::support::MemBlockDevice> {
        let device = build_fresh_image();
        let mut fs = Filesystem::mount(device).expect("mount");
        DirectoryOps::init_new_dir(&mut fs.buffers, &mut fs.sb, &mut fs.groups, ROOT_INODE, ROOT_INODE)
            .expect("init root dir content");
        fs
    }

    #[test]
    fn mounts_fresh_image() {
        let fs = mounted();
        assert_eq!(fs.superblock().magic, crate::layout::EXT2_MAGIC);
        assert_eq!(fs.root_ino(), ROOT_INODE);
    }

    #[test]
    fn root_lists_dot_and_dotdot() {
        let mut fs = mounted();
        let entries = fs.ls(ROOT_INODE).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"."));
        assert!(names.contains(&".."));
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut fs = mounted();
        let content = b"hello, ext2";
        let ino = fs.write_file(ROOT_INODE, "greeting.txt", content, 0o644).unwrap();
        let data = fs.read_file(ino).unwrap();
        assert_eq!(data, content);
    }

    #[test]
    fn write_rejects_duplicate_name() {
        let mut fs = mounted();
        fs.write_file(ROOT_INODE, "dup.txt", b"a", 0o644).unwrap();
        let err = fs.write_file(ROOT_INODE, "dup.txt", b"b", 0o644).unwrap_err();
        assert!(matches!(err, Error::NameExists));
    }

    #[test]
    fn large_file_uses_indirect_block() {
        let mut fs = mounted();
        let block_size = fs.superblock().block_size() as usize;
        let content = vec![0xAAu8; block_size * 13 + 17];
        let ino = fs.write_file(ROOT_INODE, "big.bin", &content, 0o644).unwrap();
        let inode = fs.read_inode(ino).unwrap();
        assert_ne!(inode.block[crate::layout::IND_BLOCK], 0);
        let data = fs.read_file(ino).unwrap();
        assert_eq!(data, content);
    }

    #[test]
    fn mkdir_then_path_resolve() {
        let mut fs = mounted();
        let sub = fs.mkdir(ROOT_INODE, "sub", 0o755).unwrap();
        let resolved = fs.path_resolve("/sub").unwrap();
        assert_eq!(resolved, sub);

        let file_ino = fs.write_file(sub, "leaf.txt", b"leaf", 0o644).unwrap();
        assert_eq!(fs.path_resolve("/sub/leaf.txt").unwrap(), file_ino);
    }

    #[test]
    fn mkdir_parent_link_count_grows() {
        let mut fs = mounted();
        let before = fs.read_inode(ROOT_INODE).unwrap().links_count;
        fs.mkdir(ROOT_INODE, "child", 0o755).unwrap();
        let after = fs.read_inode(ROOT_INODE).unwrap().links_count;
        assert_eq!(after, before + 1);
    }

    #[test]
    fn unlink_frees_blocks_and_removes_entry() {
        let mut fs = mounted();
        let free_before = fs.superblock().free_blocks;
        let ino = fs.write_file(ROOT_INODE, "temp.txt", b"temporary content", 0o644).unwrap();
        fs.unlink(ROOT_INODE, "temp.txt").unwrap();

        let err = fs.path_resolve("/temp.txt").unwrap_err();
        assert!(matches!(err, Error::NotFound));
        assert_eq!(fs.superblock().free_blocks, free_before);

        let inode = fs.read_inode(ino).unwrap();
        assert_eq!(inode.links_count, 0);
        assert!(inode.dtime != 0);
    }

    #[test]
    fn overwrite_shrinks_and_frees_trailing_blocks() {
        let mut fs = mounted();
        let block_size = fs.superblock().block_size() as usize;
        let ino = fs.write_file(ROOT_INODE, "shrink.bin", &vec![1u8; block_size * 3], 0o644).unwrap();
        let free_after_write = fs.superblock().free_blocks;

        fs.overwrite_file(ino, &vec![2u8; 10]).unwrap();
        assert!(fs.superblock().free_blocks > free_after_write);

        let data = fs.read_file(ino).unwrap();
        assert_eq!(data, vec![2u8; 10]);

        let sectors_per_block = fs.superblock().block_size() / 512;
        let inode = fs.read_inode(ino).unwrap();
        assert_eq!(inode.block[1], 0);
        assert_eq!(inode.block[2], 0);
        assert_eq!(inode.blocks, sectors_per_block);

        // A second overwrite must not double-free the blocks the first shrink already released.
        fs.overwrite_file(ino, &vec![3u8; 5]).unwrap();
        assert_eq!(fs.read_file(ino).unwrap(), vec![3u8; 5]);
    }

    #[test]
    fn overwrite_shrink_frees_indirect_block_once_unneeded() {
        let mut fs = mounted();
        let block_size = fs.superblock().block_size() as usize;
        let direct_blocks = crate::layout::DIRECT_BLOCKS_COUNT;
        let big = vec![1u8; block_size * (direct_blocks + 2)];
        let ino = fs.write_file(ROOT_INODE, "big.bin", &big, 0o644).unwrap();

        let inode = fs.read_inode(ino).unwrap();
        assert_ne!(inode.block[crate::layout::IND_BLOCK], 0);

        fs.overwrite_file(ino, &vec![2u8; 10]).unwrap();
        let inode = fs.read_inode(ino).unwrap();
        assert_eq!(inode.block[crate::layout::IND_BLOCK], 0);
        assert_eq!(inode.blocks, fs.superblock().block_size() / 512);
    }

    #[test]
    fn mkdir_child_links_count_is_two() {
        let mut fs = mounted();
        let ino = fs.mkdir(ROOT_INODE, "child", 0o755).unwrap();
        let child = fs.read_inode(ino).unwrap();
        assert_eq!(child.links_count, 2);
    }

    #[test]
    fn insert_reuses_slack_without_growing_directory() {
        let mut fs = mounted();
        fs.write_file(ROOT_INODE, "a.txt", b"a", 0o644).unwrap();
        let size_before = fs.read_inode(ROOT_INODE).unwrap().size;
        fs.unlink(ROOT_INODE, "a.txt").unwrap();
        fs.write_file(ROOT_INODE, "b.txt", b"b", 0o644).unwrap();
        let size_after = fs.read_inode(ROOT_INODE).unwrap().size;
        assert_eq!(size_before, size_after);
    }
}
