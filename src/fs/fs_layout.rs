//! what the volume looks like and how a handle to it is obtained
use std::path::Path;

use log::info;

use super::{pages::Pages, Inode, ROOT_INODE};

/// A handle to one mounted volume.
///
/// All engine state lives inside the arena; the handle owns the mapping,
/// so exclusive access is enforced by the borrow checker — every mutating
/// operation takes `&mut self`. Sharing one handle across threads requires
/// an external `Mutex`.
#[derive(Debug)]
pub struct PageFs {
    pub(crate) pages: Pages,
}

impl PageFs {
    /// Format a fresh volume at `image_path` and return a handle to it.
    ///
    /// Layout after formatting: pages 0 and 1 reserved (bitmaps, inode
    /// table), inode 0 is the root directory with no data pages yet — its
    /// first page is allocated by the first entry insertion.
    pub fn create<P>(image_path: P) -> anyhow::Result<Self>
    where
        P: AsRef<Path>,
    {
        let pages = Pages::create(image_path.as_ref())?;
        let mut fs = PageFs { pages };

        fs.pages.ibitmap_mut().set(ROOT_INODE as usize, true);
        let root = Inode {
            refs: 1,
            mode: libc::S_IFDIR as u32 | 0o755,
            ..Inode::default()
        };
        fs.save_inode(ROOT_INODE, &root);
        info!("formatted volume at {:?}", image_path.as_ref());
        Ok(fs)
    }

    /// Attach to an already-formatted volume.
    pub fn attach<P>(image_path: P) -> anyhow::Result<Self>
    where
        P: AsRef<Path>,
    {
        let pages = Pages::attach(image_path.as_ref())?;
        let fs = PageFs { pages };
        anyhow::ensure!(
            fs.has_inode(ROOT_INODE) && fs.get_inode(ROOT_INODE).is_dir(),
            "no root directory, image is not a pagefs volume"
        );
        Ok(fs)
    }

    /// Attach if the image exists, format it otherwise.
    pub fn open<P>(image_path: P) -> anyhow::Result<Self>
    where
        P: AsRef<Path>,
    {
        if image_path.as_ref().exists() {
            Self::attach(image_path)
        } else {
            Self::create(image_path)
        }
    }

    /// Flush every dirty page back to the image file.
    pub fn flush(&self) -> anyhow::Result<()> {
        self.pages.flush()
    }

    /// Number of data pages still free on the volume.
    pub fn free_pages(&self) -> usize {
        self.pages.free_pages()
    }
}
