use clap::Parser;

/// debugfs-style tool for pagefs volume images
#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about, long_about)]
pub enum PageFsCli {
    /// format a new volume image
    Mkfs(ImageArg),
    /// print metadata of a file or directory
    Stat(PathArgs),
    /// list a directory's entries
    Ls(PathArgs),
    /// create a directory
    Mkdir(PathArgs),
    /// create an empty file
    Touch(PathArgs),
    /// write stdin into a file at an offset, creating it if needed
    Write(WriteArgs),
    /// print a file's contents to stdout
    Cat(PathArgs),
    /// grow or shrink a file to an exact size
    Truncate(TruncateArgs),
    /// remove a directory entry
    Rm(PathArgs),
    /// rename an entry within its directory
    Mv(TwoPathArgs),
    /// add a hard link
    Ln(TwoPathArgs),
    /// change permission bits
    Chmod(ChmodArgs),
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct ImageArg {
    /// the path of the volume image file
    #[clap(short, long)]
    pub image: String,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct PathArgs {
    /// the path of the volume image file
    #[clap(short, long)]
    pub image: String,
    /// path inside the volume, e.g. /a/b
    pub path: String,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct WriteArgs {
    /// the path of the volume image file
    #[clap(short, long)]
    pub image: String,
    /// path inside the volume
    pub path: String,
    /// byte offset to write at
    #[clap(short, long, default_value_t = 0)]
    pub offset: u64,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct TruncateArgs {
    /// the path of the volume image file
    #[clap(short, long)]
    pub image: String,
    /// path inside the volume
    pub path: String,
    /// target size in bytes
    #[clap(short, long)]
    pub size: u64,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct TwoPathArgs {
    /// the path of the volume image file
    #[clap(short, long)]
    pub image: String,
    /// source path inside the volume
    pub from: String,
    /// destination path inside the volume
    pub to: String,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct ChmodArgs {
    /// the path of the volume image file
    #[clap(short, long)]
    pub image: String,
    /// path inside the volume
    pub path: String,
    /// octal permission bits, e.g. 644
    pub mode: String,
}
