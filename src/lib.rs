pub mod cli_interface;
mod fs;
pub mod mkfs;
pub use fs::*;
