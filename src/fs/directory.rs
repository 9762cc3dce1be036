//! fixed-stride directory entries and path resolution
use log::debug;

use super::{Errno, PageFs, DIRENT_SIZE, DIR_NAME_LEN, ROOT_INODE};

/// One directory entry: a name bound to an inode number.
///
/// On disk this is a 64-byte record: 48 bytes of NUL-padded name, the
/// target inode number and an is-directory flag as little-endian u32,
/// then 8 reserved bytes. Entries sit back-to-back in the directory
/// inode's data; the directory `size` is always a multiple of the stride.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dirent {
    pub name: String,
    pub inum: u32,
    pub is_dir: bool,
}

impl Dirent {
    fn decode(buf: &[u8]) -> Self {
        let end = buf[..DIR_NAME_LEN]
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(DIR_NAME_LEN);
        Dirent {
            name: String::from_utf8_lossy(&buf[..end]).into_owned(),
            inum: u32::from_le_bytes(buf[48..52].try_into().unwrap()),
            is_dir: u32::from_le_bytes(buf[52..56].try_into().unwrap()) != 0,
        }
    }

    fn encode(&self, buf: &mut [u8]) {
        buf[..DIRENT_SIZE].fill(0);
        buf[..self.name.len()].copy_from_slice(self.name.as_bytes());
        buf[48..52].copy_from_slice(&self.inum.to_le_bytes());
        buf[52..56].copy_from_slice(&u32::from(self.is_dir).to_le_bytes());
    }
}

/// Path components: split on `/`, empty segments dropped. The root path
/// yields no components at all.
pub(crate) fn path_components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

impl PageFs {
    fn read_dirent(&self, dir: u32, index: u64) -> Dirent {
        let mut buf = [0u8; DIRENT_SIZE];
        self.read_at(dir, &mut buf, index * DIRENT_SIZE as u64);
        Dirent::decode(&buf)
    }

    fn write_dirent(&mut self, dir: u32, index: u64, entry: &Dirent) {
        let mut buf = [0u8; DIRENT_SIZE];
        entry.encode(&mut buf);
        self.write_at(dir, &buf, index * DIRENT_SIZE as u64);
    }

    fn entry_count(&self, dir: u32) -> u64 {
        self.get_isize(dir) / DIRENT_SIZE as u64
    }

    /// Linear scan for `name`; the matching entry's inode number, or
    /// `ENOENT`.
    pub fn directory_lookup(&self, dir: u32, name: &str) -> Result<u32, Errno> {
        self.entry_position(dir, name)
            .map(|(_, entry)| entry.inum)
            .ok_or(libc::ENOENT)
    }

    fn entry_position(&self, dir: u32, name: &str) -> Option<(u64, Dirent)> {
        (0..self.entry_count(dir))
            .map(|i| (i, self.read_dirent(dir, i)))
            .find(|(_, entry)| entry.name == name)
    }

    /// Append an entry: grow the directory by one stride, write at the new
    /// tail. Does not check for duplicates — creation paths pre-check via
    /// [directory_lookup](Self::directory_lookup).
    pub fn directory_put(
        &mut self,
        dir: u32,
        name: &str,
        inum: u32,
        is_dir: bool,
    ) -> Result<(), Errno> {
        if name.is_empty() || name.len() >= DIR_NAME_LEN {
            return Err(libc::ENAMETOOLONG);
        }
        let tail = self.entry_count(dir);
        self.grow_inode(dir, DIRENT_SIZE as u64)?;
        self.write_dirent(
            dir,
            tail,
            &Dirent {
                name: name.to_owned(),
                inum,
                is_dir,
            },
        );
        Ok(())
    }

    /// Remove the entry for `name`: drop the target's reference (freeing
    /// the inode at zero), left-shift every later entry one stride, shrink
    /// the directory by one stride.
    pub fn directory_delete(&mut self, dir: u32, name: &str) -> Result<(), Errno> {
        let (pos, entry) = self.entry_position(dir, name).ok_or(libc::ENOENT)?;
        debug!("directory_delete({dir}, {name:?}) -> inode {}", entry.inum);

        let mut target = self.get_inode(entry.inum);
        target.refs -= 1;
        if target.refs == 0 {
            self.free_inode(entry.inum);
        } else {
            self.save_inode(entry.inum, &target);
        }

        let count = self.entry_count(dir);
        for i in pos + 1..count {
            let shifted = self.read_dirent(dir, i);
            self.write_dirent(dir, i - 1, &shifted);
        }
        self.shrink_inode(dir, (count - 1) * DIRENT_SIZE as u64)
    }

    /// Rename the entry for `old` to `new` in place. A taken destination
    /// name is rejected with `EEXIST` (see DESIGN.md).
    pub fn change_directory_name(&mut self, dir: u32, old: &str, new: &str) -> Result<(), Errno> {
        if new.is_empty() || new.len() >= DIR_NAME_LEN {
            return Err(libc::ENAMETOOLONG);
        }
        if self.entry_position(dir, new).is_some() {
            return Err(libc::EEXIST);
        }
        let (pos, mut entry) = self.entry_position(dir, old).ok_or(libc::ENOENT)?;
        entry.name = new.to_owned();
        self.write_dirent(dir, pos, &entry);
        Ok(())
    }

    /// Every entry of directory `dir`, in stored order.
    pub fn directory_entries(&self, dir: u32) -> Result<Vec<Dirent>, Errno> {
        if !self.get_inode(dir).is_dir() {
            return Err(libc::ENOTDIR);
        }
        Ok((0..self.entry_count(dir))
            .map(|i| self.read_dirent(dir, i))
            .collect())
    }

    /// Resolve a slash-separated path from the root, one component at a
    /// time. `/` resolves to the root inode without any lookup.
    pub fn tree_lookup(&self, path: &str) -> Result<u32, Errno> {
        let mut inum = ROOT_INODE;
        for component in path_components(path) {
            if !self.get_inode(inum).is_dir() {
                return Err(libc::ENOTDIR);
            }
            inum = self.directory_lookup(inum, component)?;
        }
        Ok(inum)
    }

    /// Resolve everything but the final component; returns the parent
    /// directory's inode number and the final name. `EINVAL` for the root
    /// path, which has no parent.
    pub(crate) fn lookup_parent<'p>(&self, path: &'p str) -> Result<(u32, &'p str), Errno> {
        let components: Vec<&str> = path_components(path).collect();
        let (name, parents) = components.split_last().ok_or(libc::EINVAL)?;
        let mut inum = ROOT_INODE;
        for component in parents {
            if !self.get_inode(inum).is_dir() {
                return Err(libc::ENOTDIR);
            }
            inum = self.directory_lookup(inum, component)?;
        }
        if !self.get_inode(inum).is_dir() {
            return Err(libc::ENOTDIR);
        }
        Ok((inum, name))
    }
}
