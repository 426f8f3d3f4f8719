//! Packing and unpacking of the variable-length directory-entry stream within a single data
//! block.
//!
//! Raw pointer walking is replaced by [`DirentIterator`], which validates the per-block
//! invariants (4-byte alignment, `rec_len` never crossing the block boundary) as it advances and
//! raises [`Error::CorruptMetadata`] instead of reading past the block.

use crate::error::Error;
use crate::error::Result;
use crate::util::round_up_4;

/// Byte offset of the name within an entry: `inode(4) + rec_len(2) + name_len(1) + file_type(1)`.
pub const NAME_OFF: usize = 8;
/// Alignment `rec_len` must respect.
pub const ALIGN: usize = 4;

/// A decoded directory entry header (the name is read separately via [`DirEntryHeader::name`]).
#[derive(Clone, Copy)]
pub struct DirEntryHeader {
    /// The inode the entry points to. `0` marks a tombstone.
    pub inode: u32,
    /// The length in bytes of this entry, header and name included.
    pub rec_len: u16,
    /// The length in bytes of the name.
    pub name_len: u8,
    /// The entry's file-type tag.
    pub file_type: u8,
}

impl DirEntryHeader {
    /// Tells whether the entry is a tombstone.
    pub fn is_free(&self) -> bool {
        self.inode == 0
    }

    /// The minimal `rec_len` this entry would need if it held no trailing slack.
    pub fn minimal_rec_len(&self) -> u16 {
        round_up_4(NAME_OFF + self.name_len as usize) as u16
    }
}

/// Reads the entry header at byte offset `off` of `block`.
pub fn read_header(block: &[u8], off: usize) -> Result<DirEntryHeader> {
    if off + NAME_OFF > block.len() {
        return Err(Error::CorruptMetadata("directory entry header past block end"));
    }
    let inode = u32::from_le_bytes(block[off..off + 4].try_into().unwrap());
    let rec_len = u16::from_le_bytes(block[off + 4..off + 6].try_into().unwrap());
    let name_len = block[off + 6];
    let file_type = block[off + 7];

    if rec_len as usize % ALIGN != 0 {
        return Err(Error::CorruptMetadata("directory entry rec_len not 4-byte aligned"));
    }
    if (rec_len as usize) < NAME_OFF + name_len as usize {
        return Err(Error::CorruptMetadata("directory entry rec_len too small for name"));
    }
    if off + rec_len as usize > block.len() {
        return Err(Error::CorruptMetadata("directory entry crosses block boundary"));
    }
    Ok(DirEntryHeader {
        inode,
        rec_len,
        name_len,
        file_type,
    })
}

/// Returns the name bytes of the entry described by `header`, located at `off` in `block`.
pub fn name<'a>(block: &'a [u8], off: usize, header: &DirEntryHeader) -> &'a [u8] {
    &block[off + NAME_OFF..off + NAME_OFF + header.name_len as usize]
}

/// Writes a new entry at byte offset `off` of `block`.
pub fn write_entry(
    block: &mut [u8],
    off: usize,
    inode: u32,
    rec_len: u16,
    file_type: u8,
    name: &[u8],
) -> Result<()> {
    if rec_len as usize % ALIGN != 0 || (rec_len as usize) < NAME_OFF + name.len() {
        return Err(Error::CorruptMetadata("invalid rec_len for new directory entry"));
    }
    if off + rec_len as usize > block.len() {
        return Err(Error::CorruptMetadata("new directory entry crosses block boundary"));
    }
    block[off..off + 4].copy_from_slice(&inode.to_le_bytes());
    block[off + 4..off + 6].copy_from_slice(&rec_len.to_le_bytes());
    block[off + 6] = name.len() as u8;
    block[off + 7] = file_type;
    block[off + NAME_OFF..off + NAME_OFF + name.len()].copy_from_slice(name);
    Ok(())
}

/// Walks every entry of a single directory data block in order, yielding `(offset, header)`
/// pairs and validating the per-entry invariants as it goes.
pub struct DirentIterator<'a> {
    block: &'a [u8],
    pos: usize,
}

impl<'a> DirentIterator<'a> {
    /// Creates an iterator over `block`.
    pub fn new(block: &'a [u8]) -> Self {
        Self { block, pos: 0 }
    }
}

impl<'a> Iterator for DirentIterator<'a> {
    type Item = Result<(usize, DirEntryHeader)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.block.len() {
            return None;
        }
        match read_header(self.block, self.pos) {
            Ok(header) => {
                let off = self.pos;
                self.pos += header.rec_len as usize;
                Some(Ok((off, header)))
            }
            Err(e) => {
                self.pos = self.block.len();
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn write_then_read_header_round_trips() {
        let mut block = vec![0u8; 64];
        write_entry(&mut block, 0, 42, 16, crate::layout::FT_REG_FILE, b"a.txt").unwrap();
        let header = read_header(&block, 0).unwrap();
        assert_eq!(header.inode, 42);
        assert_eq!(header.rec_len, 16);
        assert_eq!(header.name_len, 5);
        assert_eq!(name(&block, 0, &header), b"a.txt");
    }

    #[test]
    fn minimal_rec_len_rounds_up_to_four() {
        let header = DirEntryHeader {
            inode: 1,
            rec_len: 32,
            name_len: 5,
            file_type: 1,
        };
        // 8 (fixed header) + 5 (name) = 13, rounded up to 16.
        assert_eq!(header.minimal_rec_len(), 16);
    }

    #[test]
    fn rejects_misaligned_rec_len() {
        let mut block = vec![0u8; 32];
        block[4..6].copy_from_slice(&13u16.to_le_bytes());
        assert!(read_header(&block, 0).is_err());
    }

    #[test]
    fn rejects_entry_crossing_block_boundary() {
        let mut block = vec![0u8; 32];
        block[4..6].copy_from_slice(&64u16.to_le_bytes());
        assert!(read_header(&block, 0).is_err());
    }

    #[test]
    fn iterator_walks_every_entry_in_order() {
        let mut block = vec![0u8; 32];
        write_entry(&mut block, 0, 2, 12, crate::layout::FT_DIR, b".").unwrap();
        write_entry(&mut block, 12, 2, 20, crate::layout::FT_DIR, b"..").unwrap();
        let offsets: Vec<usize> = DirentIterator::new(&block).map(|e| e.unwrap().0).collect();
        assert_eq!(offsets, vec![0, 12]);
    }
}
