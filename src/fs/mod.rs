//! the filesystem engine: arena, allocators, inodes, directories, storage API
pub mod directory;
pub mod fs_layout;
pub mod inode;
pub mod pages;
pub mod storage;

pub use directory::*;
pub use fs_layout::*;
pub use inode::*;
pub use pages::*;
pub use storage::*;

/// POSIX-style error code returned by every engine operation
pub type Errno = i32;

/// fixed addressable unit of the arena
pub const PAGE_SIZE: usize = 4096;
/// number of pages in the arena (1 MiB volume)
pub const PAGE_COUNT: usize = 256;
/// total image size
pub const VOLUME_SIZE: u64 = (PAGE_SIZE * PAGE_COUNT) as u64;

/// page 0 holds both bitmaps, page 1 holds the inode table
pub const FIRST_DATA_PAGE: u32 = 2;
/// byte offset of the inode bitmap inside page 0, right after the page bitmap
pub const IBITMAP_OFFSET: usize = PAGE_COUNT / 8;

/// on-disk inode record size: six little-endian u32 words
pub const INODE_DISK_SIZE: usize = 24;
/// the whole inode table must fit the one reserved page
pub const INODE_COUNT: usize = PAGE_SIZE / INODE_DISK_SIZE;
/// the root directory's fixed inode number
pub const ROOT_INODE: u32 = 0;

/// bytes addressable through one inode's two direct pointers
pub const DIRECT_SPAN: u32 = 2 * PAGE_SIZE as u32;

/// fixed stride of one directory entry
pub const DIRENT_SIZE: usize = 64;
/// dirent name capacity, NUL terminator included
pub const DIR_NAME_LEN: usize = 48;
