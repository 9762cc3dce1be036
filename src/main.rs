use std::io::{Read, Write};

use anyhow::anyhow;
use clap::Parser;
use pagefs::{cli_interface::PageFsCli, Errno, PageFs};

/// Map an engine error code onto a printable failure.
fn engine_err(errno: Errno) -> anyhow::Error {
    anyhow!(std::io::Error::from_raw_os_error(errno))
}

fn main() -> anyhow::Result<()> {
    env_logger::builder().format_timestamp_nanos().init();
    let args = PageFsCli::parse();
    match args {
        PageFsCli::Mkfs(args) => {
            pagefs::mkfs::mkfs(args.image)?;
        }
        PageFsCli::Stat(args) => {
            let fs = PageFs::attach(args.image)?;
            let st = fs.stat(&args.path).map_err(engine_err)?;
            println!(
                "{}: mode {:06o}, size {}, nlink {}",
                args.path, st.mode, st.size, st.nlink
            );
        }
        PageFsCli::Ls(args) => {
            let fs = PageFs::attach(args.image)?;
            for name in fs.list(&args.path).map_err(engine_err)? {
                println!("{name}");
            }
        }
        PageFsCli::Mkdir(args) => {
            let mut fs = PageFs::attach(args.image)?;
            fs.mknod(&args.path, 0o755, true).map_err(engine_err)?;
            fs.flush()?;
        }
        PageFsCli::Touch(args) => {
            let mut fs = PageFs::attach(args.image)?;
            fs.mknod(&args.path, 0o644, false).map_err(engine_err)?;
            fs.flush()?;
        }
        PageFsCli::Write(args) => {
            let mut fs = PageFs::attach(args.image)?;
            if fs.tree_lookup(&args.path).is_err() {
                fs.mknod(&args.path, 0o644, false).map_err(engine_err)?;
            }
            let mut data = Vec::new();
            std::io::stdin().read_to_end(&mut data)?;
            let written = fs.write(&args.path, &data, args.offset).map_err(engine_err)?;
            fs.flush()?;
            eprintln!("wrote {written} bytes at offset {}", args.offset);
        }
        PageFsCli::Cat(args) => {
            let fs = PageFs::attach(args.image)?;
            let size = fs.stat(&args.path).map_err(engine_err)?.size;
            let mut data = vec![0u8; size as usize];
            fs.read(&args.path, &mut data, 0).map_err(engine_err)?;
            std::io::stdout().write_all(&data)?;
        }
        PageFsCli::Truncate(args) => {
            let mut fs = PageFs::attach(args.image)?;
            fs.truncate(&args.path, args.size).map_err(engine_err)?;
            fs.flush()?;
        }
        PageFsCli::Rm(args) => {
            let mut fs = PageFs::attach(args.image)?;
            fs.unlink(&args.path).map_err(engine_err)?;
            fs.flush()?;
        }
        PageFsCli::Mv(args) => {
            let mut fs = PageFs::attach(args.image)?;
            fs.rename(&args.from, &args.to).map_err(engine_err)?;
            fs.flush()?;
        }
        PageFsCli::Ln(args) => {
            let mut fs = PageFs::attach(args.image)?;
            fs.link(&args.from, &args.to).map_err(engine_err)?;
            fs.flush()?;
        }
        PageFsCli::Chmod(args) => {
            let mut fs = PageFs::attach(args.image)?;
            let mode = u32::from_str_radix(&args.mode, 8)
                .map_err(|_| anyhow!("mode must be octal, e.g. 644"))?;
            fs.chmod(&args.path, mode).map_err(engine_err)?;
            fs.flush()?;
        }
    }
    Ok(())
}
