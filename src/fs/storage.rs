//! the public engine API: POSIX-like operations keyed by path
use log::debug;

use super::{directory::path_components, Errno, PageFs, DIRECT_SPAN, PAGE_SIZE};

/// Metadata projected from an inode by [stat](PageFs::stat).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// permission bits plus file-type tag
    pub mode: u32,
    /// cumulative size across the overflow chain
    pub size: u64,
    /// hard-link count
    pub nlink: u32,
}

impl PageFs {
    /// Copy out of the inode's blocks starting at `offset`, hopping the
    /// overflow chain and splitting at page boundaries. The caller
    /// guarantees `offset + buf.len()` is within the cumulative size, so
    /// every page and chain link on the way exists.
    pub(crate) fn read_at(&self, inum: u32, buf: &mut [u8], offset: u64) {
        let mut cur = inum;
        let mut off = offset;
        let mut done = 0usize;
        while done < buf.len() {
            while off >= DIRECT_SPAN as u64 {
                cur = self.get_inode(cur).iptr;
                off -= DIRECT_SPAN as u64;
            }
            let node = self.get_inode(cur);
            let slot = (off / PAGE_SIZE as u64) as usize;
            let in_page = (off % PAGE_SIZE as u64) as usize;
            let n = (buf.len() - done).min(PAGE_SIZE - in_page);
            buf[done..done + n]
                .copy_from_slice(&self.pages.page(node.ptrs[slot])[in_page..in_page + n]);
            done += n;
            off += n as u64;
        }
    }

    /// Mirror of [read_at](Self::read_at) for the write direction; same
    /// caller contract.
    pub(crate) fn write_at(&mut self, inum: u32, buf: &[u8], offset: u64) {
        let mut cur = inum;
        let mut off = offset;
        let mut done = 0usize;
        while done < buf.len() {
            while off >= DIRECT_SPAN as u64 {
                cur = self.get_inode(cur).iptr;
                off -= DIRECT_SPAN as u64;
            }
            let node = self.get_inode(cur);
            let slot = (off / PAGE_SIZE as u64) as usize;
            let in_page = (off % PAGE_SIZE as u64) as usize;
            let n = (buf.len() - done).min(PAGE_SIZE - in_page);
            self.pages.page_mut(node.ptrs[slot])[in_page..in_page + n]
                .copy_from_slice(&buf[done..done + n]);
            done += n;
            off += n as u64;
        }
    }

    /// Metadata for the file or directory at `path`.
    pub fn stat(&self, path: &str) -> Result<FileStat, Errno> {
        let inum = self.tree_lookup(path)?;
        let node = self.get_inode(inum);
        Ok(FileStat {
            mode: node.mode,
            size: self.get_isize(inum),
            nlink: node.refs,
        })
    }

    /// Read into `buf` starting at `offset`; returns the byte count, short
    /// when the file ends first. Never allocates storage.
    pub fn read(&self, path: &str, buf: &mut [u8], offset: u64) -> Result<usize, Errno> {
        let inum = self.tree_lookup(path)?;
        let total = self.get_isize(inum);
        if offset >= total {
            return Ok(0);
        }
        let n = buf.len().min((total - offset) as usize);
        self.read_at(inum, &mut buf[..n], offset);
        Ok(n)
    }

    /// Write `buf` at `offset`, growing the file first when the write
    /// reaches past its current end.
    pub fn write(&mut self, path: &str, buf: &[u8], offset: u64) -> Result<usize, Errno> {
        let inum = self.tree_lookup(path)?;
        let end = offset + buf.len() as u64;
        let total = self.get_isize(inum);
        if end > total {
            self.grow_inode(inum, end - total)?;
        }
        self.write_at(inum, buf, offset);
        Ok(buf.len())
    }

    /// Grow or shrink the file at `path` to exactly `new_size` bytes.
    pub fn truncate(&mut self, path: &str, new_size: u64) -> Result<(), Errno> {
        let inum = self.tree_lookup(path)?;
        let total = self.get_isize(inum);
        if new_size < total {
            self.shrink_inode(inum, new_size)
        } else {
            self.grow_inode(inum, new_size - total)
        }
    }

    /// Create a file or directory at `path`. `EEXIST` when the parent
    /// already holds the name.
    pub fn mknod(&mut self, path: &str, mode: u32, is_dir: bool) -> Result<(), Errno> {
        let (parent, name) = self.lookup_parent(path)?;
        if self.directory_lookup(parent, name).is_ok() {
            return Err(libc::EEXIST);
        }
        // normalise the file-type tag so path resolution can trust the mode
        let mode = if is_dir {
            mode & 0o7777 | libc::S_IFDIR as u32
        } else if mode & libc::S_IFMT as u32 == 0 {
            mode | libc::S_IFREG as u32
        } else {
            mode
        };
        let inum = self.alloc_inode(mode)?;
        debug!("mknod({path:?}, {mode:o}) -> inode {inum}");
        match self.directory_put(parent, name, inum, is_dir) {
            Ok(()) => Ok(()),
            Err(e) => {
                // the fresh inode never became reachable; release its slot
                self.free_inode(inum);
                Err(e)
            }
        }
    }

    /// Remove the directory entry at `path`; the target inode is released
    /// once its last reference is gone.
    pub fn unlink(&mut self, path: &str) -> Result<(), Errno> {
        let (parent, name) = self.lookup_parent(path)?;
        self.directory_delete(parent, name)
    }

    /// Create a second directory entry for the inode at `from`. `to` must
    /// not exist yet. A failed insert leaves the bumped link count in
    /// place — the engine never rolls back partial mutation.
    pub fn link(&mut self, from: &str, to: &str) -> Result<(), Errno> {
        let inum = self.tree_lookup(from)?;
        if self.tree_lookup(to).is_ok() {
            return Err(libc::EEXIST);
        }
        let (to_parent, to_name) = self.lookup_parent(to)?;
        let mut node = self.get_inode(inum);
        node.refs += 1;
        self.save_inode(inum, &node);
        self.directory_put(to_parent, to_name, inum, node.is_dir())
    }

    /// Rename within `from`'s parent directory. Entries never move between
    /// directories; only the final component of `to` is used.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<(), Errno> {
        let (parent, old_name) = self.lookup_parent(from)?;
        let new_name = path_components(to).last().ok_or(libc::EINVAL)?;
        self.change_directory_name(parent, old_name, new_name)
    }

    /// Replace the permission bits of the file at `path`, keeping its
    /// file-type tag.
    pub fn chmod(&mut self, path: &str, mode: u32) -> Result<(), Errno> {
        let inum = self.tree_lookup(path)?;
        let mut node = self.get_inode(inum);
        node.mode = node.mode & libc::S_IFMT as u32 | mode & 0o7777;
        self.save_inode(inum, &node);
        Ok(())
    }

    /// Names stored in the directory at `path`, in entry order.
    pub fn list(&self, path: &str) -> Result<Vec<String>, Errno> {
        let inum = self.tree_lookup(path)?;
        Ok(self
            .directory_entries(inum)?
            .into_iter()
            .map(|entry| entry.name)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::{DIRENT_SIZE, ROOT_INODE};
    use super::*;
    use std::path::PathBuf;

    fn tmp_fs(name: &str) -> (PageFs, PathBuf) {
        let path = PathBuf::from(format!("/tmp/pagefs_{name}.img"));
        if path.exists() {
            std::fs::remove_file(&path).unwrap();
        }
        (PageFs::create(&path).unwrap(), path)
    }

    fn pattern(n: usize) -> Vec<u8> {
        (0..n).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_write_read_roundtrip_spans() {
        // single block, block boundaries, two blocks, and the indirect chain
        for n in [1usize, 4095, 4096, 4097, 8192, 8193, 20000] {
            let (mut fs, path) = tmp_fs(&format!("st_roundtrip_{n}"));
            fs.mknod("/data", 0o644, false).unwrap();
            let data = pattern(n);
            assert_eq!(fs.write("/data", &data, 0), Ok(n));
            assert_eq!(fs.stat("/data").unwrap().size, n as u64);

            let mut back = vec![0u8; n];
            assert_eq!(fs.read("/data", &mut back, 0), Ok(n));
            assert_eq!(back, data, "mismatch for n = {n}");
            std::fs::remove_file(&path).unwrap();
        }
    }

    #[test]
    fn test_read_is_short_past_eof() {
        let (mut fs, path) = tmp_fs("st_short_read");
        fs.mknod("/f", 0o644, false).unwrap();
        fs.write("/f", b"hello", 0).unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(fs.read("/f", &mut buf, 0), Ok(5));
        assert_eq!(&buf[..5], b"hello");
        assert_eq!(fs.read("/f", &mut buf, 3), Ok(2));
        assert_eq!(&buf[..2], b"lo");
        assert_eq!(fs.read("/f", &mut buf, 5), Ok(0));
        assert_eq!(fs.read("/f", &mut buf, 100), Ok(0));
        // a read never grows the file
        assert_eq!(fs.stat("/f").unwrap().size, 5);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_at_offset_grows_and_overwrites() {
        let (mut fs, path) = tmp_fs("st_offset_write");
        fs.mknod("/f", 0o644, false).unwrap();
        fs.write("/f", &pattern(9000), 0).unwrap();
        // overwrite a window straddling the direct/indirect boundary
        fs.write("/f", &[0xee; 200], 8100).unwrap();

        let mut back = vec![0u8; 9000];
        fs.read("/f", &mut back, 0).unwrap();
        assert_eq!(&back[..8100], &pattern(9000)[..8100]);
        assert!(back[8100..8300].iter().all(|b| *b == 0xee));
        assert_eq!(&back[8300..], &pattern(9000)[8300..]);

        // writing past the end extends the file
        fs.write("/f", b"tail", 12000).unwrap();
        assert_eq!(fs.stat("/f").unwrap().size, 12004);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_stat_is_idempotent() {
        let (mut fs, path) = tmp_fs("st_stat");
        fs.mknod("/f", 0o640, false).unwrap();
        fs.write("/f", &pattern(300), 0).unwrap();
        let first = fs.stat("/f").unwrap();
        let second = fs.stat("/f").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.mode, libc::S_IFREG as u32 | 0o640);
        assert_eq!(first.size, 300);
        assert_eq!(first.nlink, 1);
        assert_eq!(fs.stat("/missing"), Err(libc::ENOENT));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_mknod_duplicate_fails() {
        let (mut fs, path) = tmp_fs("st_mknod_dup");
        fs.mknod("/f", 0o644, false).unwrap();
        let inum = fs.directory_lookup(ROOT_INODE, "f").unwrap();
        assert!(fs.has_inode(inum));
        assert_eq!(fs.mknod("/f", 0o644, false), Err(libc::EEXIST));
        // only one entry in the root
        assert_eq!(fs.list("/").unwrap(), ["f"]);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_mknod_missing_parent() {
        let (mut fs, path) = tmp_fs("st_mknod_noparent");
        assert_eq!(fs.mknod("/no/such", 0o644, false), Err(libc::ENOENT));
        fs.mknod("/plain", 0o644, false).unwrap();
        assert_eq!(fs.mknod("/plain/under", 0o644, false), Err(libc::ENOTDIR));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_unlink_releases_and_allows_slot_reuse() {
        let (mut fs, path) = tmp_fs("st_unlink");
        fs.mknod("/f", 0o644, false).unwrap();
        let inum = fs.directory_lookup(ROOT_INODE, "f").unwrap();
        fs.write("/f", &pattern(5000), 0).unwrap();
        let free_before = fs.free_pages();

        fs.unlink("/f").unwrap();
        assert_eq!(fs.tree_lookup("/f"), Err(libc::ENOENT));
        assert!(!fs.has_inode(inum));
        assert!(fs.free_pages() > free_before);
        assert_eq!(fs.alloc_inode(0o100644), Ok(inum));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_truncate_roundtrip_releases_pages() {
        let (mut fs, path) = tmp_fs("st_truncate");
        fs.mknod("/f", 0o644, false).unwrap();
        let free_before = fs.free_pages();
        fs.truncate("/f", 20000).unwrap();
        assert_eq!(fs.stat("/f").unwrap().size, 20000);
        fs.truncate("/f", 0).unwrap();
        assert_eq!(fs.stat("/f").unwrap().size, 0);
        assert_eq!(fs.free_pages(), free_before);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_truncate_shrink_keeps_prefix() {
        let (mut fs, path) = tmp_fs("st_trunc_prefix");
        fs.mknod("/f", 0o644, false).unwrap();
        fs.write("/f", &pattern(10000), 0).unwrap();
        fs.truncate("/f", 100).unwrap();
        let mut buf = [0u8; 200];
        assert_eq!(fs.read("/f", &mut buf, 0), Ok(100));
        assert_eq!(&buf[..100], &pattern(10000)[..100]);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_nested_directory_scenario() {
        let (mut fs, path) = tmp_fs("st_nested");
        fs.mknod("/a", 0o755, true).unwrap();
        fs.mknod("/a/b", 0o644, false).unwrap();
        fs.write("/a/b", &pattern(9000), 0).unwrap();

        let st = fs.stat("/a/b").unwrap();
        assert!(st.size >= 9000);
        assert_eq!(fs.list("/a").unwrap(), ["b"]);

        let dir_st = fs.stat("/a").unwrap();
        assert_eq!(dir_st.mode & libc::S_IFMT as u32, libc::S_IFDIR as u32);
        assert_eq!(dir_st.size, DIRENT_SIZE as u64);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_link_then_unlink_original() {
        let (mut fs, path) = tmp_fs("st_link");
        fs.mknod("/a", 0o755, true).unwrap();
        fs.mknod("/a/b", 0o644, false).unwrap();
        fs.write("/a/b", b"shared content", 0).unwrap();

        fs.link("/a/b", "/a/c").unwrap();
        assert_eq!(fs.stat("/a/b").unwrap().nlink, 2);
        assert_eq!(
            fs.tree_lookup("/a/b").unwrap(),
            fs.tree_lookup("/a/c").unwrap()
        );

        fs.unlink("/a/b").unwrap();
        assert_eq!(fs.tree_lookup("/a/b"), Err(libc::ENOENT));
        let st = fs.stat("/a/c").unwrap();
        assert_eq!(st.nlink, 1);
        let mut buf = [0u8; 32];
        let n = fs.read("/a/c", &mut buf, 0).unwrap();
        assert_eq!(&buf[..n], b"shared content");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_link_rejects_existing_target() {
        let (mut fs, path) = tmp_fs("st_link_exists");
        fs.mknod("/a", 0o644, false).unwrap();
        fs.mknod("/b", 0o644, false).unwrap();
        assert_eq!(fs.link("/a", "/b"), Err(libc::EEXIST));
        assert_eq!(fs.link("/missing", "/c"), Err(libc::ENOENT));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_rename_within_directory() {
        let (mut fs, path) = tmp_fs("st_rename");
        fs.mknod("/dir", 0o755, true).unwrap();
        fs.mknod("/dir/old", 0o644, false).unwrap();
        fs.write("/dir/old", b"payload", 0).unwrap();

        fs.rename("/dir/old", "/dir/new").unwrap();
        assert_eq!(fs.tree_lookup("/dir/old"), Err(libc::ENOENT));
        let mut buf = [0u8; 16];
        let n = fs.read("/dir/new", &mut buf, 0).unwrap();
        assert_eq!(&buf[..n], b"payload");
        assert_eq!(fs.rename("/dir/missing", "/dir/x"), Err(libc::ENOENT));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_chmod_keeps_file_type() {
        let (mut fs, path) = tmp_fs("st_chmod");
        fs.mknod("/f", 0o644, false).unwrap();
        fs.chmod("/f", 0o600).unwrap();
        let st = fs.stat("/f").unwrap();
        assert_eq!(st.mode, libc::S_IFREG as u32 | 0o600);
        assert_eq!(fs.chmod("/missing", 0o600), Err(libc::ENOENT));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_list_root_and_errors() {
        let (mut fs, path) = tmp_fs("st_list");
        assert!(fs.list("/").unwrap().is_empty());
        fs.mknod("/x", 0o644, false).unwrap();
        fs.mknod("/y", 0o755, true).unwrap();
        assert_eq!(fs.list("/").unwrap(), ["x", "y"]);
        assert_eq!(fs.list("/x"), Err(libc::ENOTDIR));
        assert_eq!(fs.list("/none"), Err(libc::ENOENT));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_volume_exhaustion_surfaces_enospc() {
        let (mut fs, path) = tmp_fs("st_enospc");
        fs.mknod("/big", 0o644, false).unwrap();
        // 254 data pages exist; ask for more than they can hold
        let too_big = 255 * super::PAGE_SIZE as u64;
        assert_eq!(fs.truncate("/big", too_big), Err(libc::ENOSPC));
        std::fs::remove_file(&path).unwrap();
    }
}
