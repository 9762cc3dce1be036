//! format a fresh volume image
use std::path::Path;

use anyhow::Context;
use log::info;

use crate::{PageFs, PAGE_COUNT, PAGE_SIZE};

/// Create and format a new image at `image_path`. Refuses to overwrite an
/// existing file. The image is always `PAGE_COUNT * PAGE_SIZE` bytes.
pub fn mkfs<P>(image_path: P) -> anyhow::Result<()>
where
    P: AsRef<Path>,
{
    let path = image_path.as_ref();
    let fs = PageFs::create(path)
        .with_context(|| format!("creating volume image at {path:?}"))?;
    fs.flush()?;
    info!("mkfs: {PAGE_COUNT} pages of {PAGE_SIZE} bytes at {path:?}");
    Ok(())
}
