//! the page arena and its allocation bitmap
use std::{fs::OpenOptions, path::Path};

use bitvec::prelude::*;
use log::debug;
use memmap2::MmapMut;

use super::{Errno, FIRST_DATA_PAGE, IBITMAP_OFFSET, INODE_COUNT, PAGE_COUNT, PAGE_SIZE, VOLUME_SIZE};

/// A fixed-size byte arena divided into 4096-byte pages, backed by a
/// memory-mapped image file.
///
/// Page 0 holds the page-allocation bitmap followed by the inode-allocation
/// bitmap; page 1 holds the inode table; everything from
/// [FIRST_DATA_PAGE] up is handed out by [alloc_page](Pages::alloc_page).
#[derive(Debug)]
pub struct Pages {
    map: MmapMut,
}

impl Pages {
    /// Create a fresh image of exactly [VOLUME_SIZE] bytes and map it.
    /// Fails if the file already exists.
    ///
    /// The reserved pages 0 and 1 are marked allocated here and are never
    /// returned by the allocator afterwards.
    pub fn create<P>(image_path: P) -> anyhow::Result<Self>
    where
        P: AsRef<Path>,
    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(image_path.as_ref())?;
        file.set_len(VOLUME_SIZE)?;

        // Safety: the file was just created with read/write permissions and
        // sized to VOLUME_SIZE; see the memmap2 docs on map_mut failure modes.
        let map = unsafe { MmapMut::map_mut(&file)? };
        let mut pages = Pages { map };

        let pbitmap = pages.pbitmap_mut();
        pbitmap.set(0, true);
        pbitmap.set(1, true);
        Ok(pages)
    }

    /// Map an existing image file.
    pub fn attach<P>(image_path: P) -> anyhow::Result<Self>
    where
        P: AsRef<Path>,
    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(image_path.as_ref())?;

        // Safety: same contract as in `create`.
        let map = unsafe { MmapMut::map_mut(&file)? };
        anyhow::ensure!(
            map.len() as u64 == VOLUME_SIZE,
            "image is {} bytes, expected {VOLUME_SIZE}",
            map.len()
        );
        Ok(Pages { map })
    }

    /// The 4096-byte window of page `pnum`.
    #[inline]
    pub fn page(&self, pnum: u32) -> &[u8] {
        let start = pnum as usize * PAGE_SIZE;
        &self.map[start..start + PAGE_SIZE]
    }

    #[inline]
    pub fn page_mut(&mut self, pnum: u32) -> &mut [u8] {
        let start = pnum as usize * PAGE_SIZE;
        &mut self.map[start..start + PAGE_SIZE]
    }

    /// One bit per page, bit index == page number. `Lsb0` reproduces the
    /// on-disk layout: bit `i` lives in byte `i / 8` under flag `1 << (i % 8)`.
    #[inline]
    pub fn pbitmap(&self) -> &BitSlice<u8, Lsb0> {
        BitSlice::from_slice(&self.map[..IBITMAP_OFFSET])
    }

    #[inline]
    pub(crate) fn pbitmap_mut(&mut self) -> &mut BitSlice<u8, Lsb0> {
        BitSlice::from_slice_mut(&mut self.map[..IBITMAP_OFFSET])
    }

    /// One bit per inode-table slot, packed immediately after the page bitmap.
    #[inline]
    pub fn ibitmap(&self) -> &BitSlice<u8, Lsb0> {
        &BitSlice::from_slice(&self.map[IBITMAP_OFFSET..IBITMAP_OFFSET + INODE_COUNT.div_ceil(8)])
            [..INODE_COUNT]
    }

    #[inline]
    pub(crate) fn ibitmap_mut(&mut self) -> &mut BitSlice<u8, Lsb0> {
        BitSlice::from_slice_mut(
            &mut self.map[IBITMAP_OFFSET..IBITMAP_OFFSET + INODE_COUNT.div_ceil(8)],
        )
    }

    /// Mark and return the first free page, scanning from [FIRST_DATA_PAGE].
    pub fn alloc_page(&mut self) -> Result<u32, Errno> {
        let first = FIRST_DATA_PAGE as usize;
        let pnum = self.pbitmap()[first..PAGE_COUNT]
            .first_zero()
            .map(|i| (i + first) as u32)
            .ok_or(libc::ENOSPC)?;
        self.pbitmap_mut().set(pnum as usize, true);
        debug!("alloc_page() -> {pnum}");
        Ok(pnum)
    }

    /// Clear page `pnum`'s bit unconditionally. The caller must not free a
    /// page that is still referenced by an inode.
    pub fn free_page(&mut self, pnum: u32) {
        debug_assert!(pnum >= FIRST_DATA_PAGE);
        debug!("free_page({pnum})");
        self.pbitmap_mut().set(pnum as usize, false);
    }

    /// Number of data pages currently free.
    pub fn free_pages(&self) -> usize {
        self.pbitmap()[FIRST_DATA_PAGE as usize..PAGE_COUNT].count_zeros()
    }

    /// Flush the mapping back to the image file.
    pub fn flush(&self) -> anyhow::Result<()> {
        Ok(self.map.flush()?)
    }
}
