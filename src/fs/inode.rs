//! the inode table, its allocation bitmap and the overflow chain
use log::debug;

use super::{Errno, PageFs, DIRECT_SPAN, INODE_COUNT, INODE_DISK_SIZE, PAGE_SIZE};

/// The inode-table page.
const TABLE_PAGE: u32 = 1;

/// One file or directory's metadata and block mapping.
///
/// `size` counts only the bytes stored in this record's own direct span
/// (at most [DIRECT_SPAN]); once the span is full, `iptr` names an
/// overflow inode that continues the file, itself a fully-formed inode
/// with its own direct pointers and, possibly, its own overflow. The
/// cumulative file size is the sum over the whole chain
/// ([get_isize](PageFs::get_isize)).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Inode {
    /// count of directory entries pointing at this inode
    pub refs: u32,
    /// permission bits plus the file-type tag in the high bits
    pub mode: u32,
    /// bytes stored in this record's own direct span
    pub size: u32,
    /// direct page numbers, 0 = unused
    pub ptrs: [u32; 2],
    /// overflow inode number, 0 = none
    pub iptr: u32,
}

impl Inode {
    /// Decode the 24-byte on-disk record: six little-endian u32 words.
    pub fn decode(buf: &[u8]) -> Self {
        let word = |i: usize| {
            u32::from_le_bytes(buf[i * 4..i * 4 + 4].try_into().unwrap())
        };
        Inode {
            refs: word(0),
            mode: word(1),
            size: word(2),
            ptrs: [word(3), word(4)],
            iptr: word(5),
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        let words = [
            self.refs, self.mode, self.size, self.ptrs[0], self.ptrs[1], self.iptr,
        ];
        for (i, w) in words.into_iter().enumerate() {
            buf[i * 4..i * 4 + 4].copy_from_slice(&w.to_le_bytes());
        }
    }

    pub fn is_dir(&self) -> bool {
        self.mode & libc::S_IFMT as u32 == libc::S_IFDIR as u32
    }

    /// How many direct pages are currently linked.
    pub(crate) fn blocks_in_use(&self) -> usize {
        self.ptrs.iter().filter(|p| **p != 0).count()
    }
}

impl PageFs {
    /// Load inode `inum` from the table page. The caller passes a number it
    /// obtained from allocation or path resolution; unallocated slots decode
    /// as zeroed records.
    #[inline]
    pub fn get_inode(&self, inum: u32) -> Inode {
        let start = inum as usize * INODE_DISK_SIZE;
        Inode::decode(&self.pages.page(TABLE_PAGE)[start..start + INODE_DISK_SIZE])
    }

    #[inline]
    pub(crate) fn save_inode(&mut self, inum: u32, node: &Inode) {
        let start = inum as usize * INODE_DISK_SIZE;
        node.encode(&mut self.pages.page_mut(TABLE_PAGE)[start..start + INODE_DISK_SIZE]);
    }

    #[inline]
    pub fn has_inode(&self, inum: u32) -> bool {
        self.pages.ibitmap()[inum as usize]
    }

    /// Claim the first free inode-table slot and initialise it with
    /// `refs = 1` and the given mode. Slot 0 is the root and never scanned.
    pub fn alloc_inode(&mut self, mode: u32) -> Result<u32, Errno> {
        let inum = self.pages.ibitmap()[1..INODE_COUNT]
            .first_zero()
            .map(|i| (i + 1) as u32)
            .ok_or(libc::ENOSPC)?;
        self.pages.ibitmap_mut().set(inum as usize, true);
        self.save_inode(
            inum,
            &Inode {
                refs: 1,
                mode,
                ..Inode::default()
            },
        );
        debug!("alloc_inode({mode:o}) -> {inum}");
        Ok(inum)
    }

    /// Release inode `inum`: its overflow chain first, then its own pages,
    /// then the record and bitmap bit. Invoked when the last directory
    /// reference is dropped — never while `refs > 0`.
    pub(crate) fn free_inode(&mut self, inum: u32) {
        debug!("free_inode({inum})");
        let node = self.get_inode(inum);
        if node.iptr != 0 {
            self.free_inode(node.iptr);
        }
        for pnum in node.ptrs {
            if pnum != 0 {
                self.pages.free_page(pnum);
            }
        }
        self.save_inode(inum, &Inode::default());
        self.pages.ibitmap_mut().set(inum as usize, false);
    }

    /// Cumulative logical size: this record's own span plus the whole
    /// overflow chain behind it.
    pub fn get_isize(&self, inum: u32) -> u64 {
        let mut total = 0u64;
        let mut cur = inum;
        loop {
            let node = self.get_inode(cur);
            total += node.size as u64;
            if node.iptr == 0 {
                return total;
            }
            cur = node.iptr;
        }
    }

    /// Grow inode `inum` by `additional` bytes, allocating pages into
    /// `ptrs[0]` then `ptrs[1]` and chaining an overflow inode (same mode)
    /// once the direct span is exhausted.
    ///
    /// Not atomic: on `ENOSPC` the pages and overflow links acquired so far
    /// stay in place, as does the already-updated `size`. There is no
    /// rollback anywhere in the engine (see DESIGN.md).
    pub fn grow_inode(&mut self, inum: u32, additional: u64) -> Result<(), Errno> {
        if additional == 0 {
            return Ok(());
        }
        let mut node = self.get_inode(inum);
        if node.iptr != 0 {
            // own span already full, the growth belongs to the chain
            return self.grow_inode(node.iptr, additional);
        }

        let own = additional.min((DIRECT_SPAN - node.size) as u64) as u32;
        node.size += own;
        let needed = node.size.div_ceil(PAGE_SIZE as u32) as usize;
        while node.blocks_in_use() < needed {
            let slot = node.blocks_in_use();
            match self.pages.alloc_page() {
                Ok(pnum) => node.ptrs[slot] = pnum,
                Err(e) => {
                    self.save_inode(inum, &node);
                    return Err(e);
                }
            }
        }

        let rest = additional - own as u64;
        if rest > 0 {
            let over = match self.alloc_inode(node.mode) {
                Ok(over) => over,
                Err(e) => {
                    self.save_inode(inum, &node);
                    return Err(e);
                }
            };
            node.iptr = over;
            self.save_inode(inum, &node);
            return self.grow_inode(over, rest);
        }
        self.save_inode(inum, &node);
        Ok(())
    }

    /// Shrink inode `inum` to exactly `target` cumulative bytes. Only
    /// shrinking is supported here; `EINVAL` if `target` exceeds the current
    /// cumulative size.
    ///
    /// Pages are released from the tail: the overflow chain first, each
    /// link freed and unlinked once it is reduced to nothing, then
    /// `ptrs[1]`, then `ptrs[0]`.
    pub fn shrink_inode(&mut self, inum: u32, target: u64) -> Result<(), Errno> {
        if target > self.get_isize(inum) {
            return Err(libc::EINVAL);
        }
        self.shrink_to(inum, target);
        Ok(())
    }

    fn shrink_to(&mut self, inum: u32, target: u64) {
        let mut node = self.get_inode(inum);
        if node.iptr != 0 {
            let chain_target = target.saturating_sub(DIRECT_SPAN as u64);
            self.shrink_to(node.iptr, chain_target);
            if chain_target == 0 {
                // the overflow link holds nothing now; release its table slot
                self.free_inode(node.iptr);
                node.iptr = 0;
            }
        }
        node.size = target.min(DIRECT_SPAN as u64) as u32;
        let needed = node.size.div_ceil(PAGE_SIZE as u32) as usize;
        while node.blocks_in_use() > needed {
            let slot = node.blocks_in_use() - 1;
            self.pages.free_page(node.ptrs[slot]);
            node.ptrs[slot] = 0;
        }
        self.save_inode(inum, &node);
    }
}
