use clap::{ArgGroup, Parser};
use std::path::PathBuf;

const AFTER_HELP: &str = "Examples:
  mov_to_mkv -d /path/to/mov/files
  mov_to_mkv -d /path/to/mov/files --dry-run
  mov_to_mkv --single /path/to/JPC_AV_00001.mov
  mov_to_mkv --single file1.mov file2.mov --no-access";

const AFTER_LONG_HELP: &str = "Examples:
  mov_to_mkv -d /path/to/mov/files
  mov_to_mkv -d /path/to/mov/files --dry-run
  mov_to_mkv --single /path/to/JPC_AV_00001.mov
  mov_to_mkv --single file1.mov file2.mov --no-access

Input/output:
  Input:  JPC_AV_00001.mov
  Output: JPC_AV_00001/
          ├── JPC_AV_00001.mkv             (FFV1/FLAC preservation)
          ├── JPC_AV_00001_access.mp4      (H.264/AAC access)
          └── JPC_AV_00001_conversion.log  (conversion log)

Technical notes:
  • Uses -apply_cropping 0 to preserve the full stored frame (e.g. 720x486)
  • FFV1 settings: level 3, slicecrc 1, 24 slices
  • Access derivative: CRF 28, fast preset
  • Existing outputs are never overwritten
  • Original .mov files are left untouched";

/// Convert v210/mov files to FFV1/MKV preservation copies and H.264/MP4 access derivatives.
#[derive(Debug, Parser)]
#[command(
    name = "mov_to_mkv",
    version,
    about = "Convert .mov files to FFV1/MKV preservation copies and H.264/MP4 access derivatives",
    after_help = AFTER_HELP,
    after_long_help = AFTER_LONG_HELP,
    group(ArgGroup::new("input").required(true).args(["directory", "single"]))
)]
pub struct Args {
    /// Directory containing .mov files (not searched recursively).
    #[arg(short = 'd', long, value_name = "PATH")]
    pub directory: Option<PathBuf>,

    /// Process specific .mov file(s) directly.
    #[arg(long, value_name = "FILE", num_args = 1..)]
    pub single: Vec<PathBuf>,

    /// Preview the plan without converting anything.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip the H.264/MP4 access derivative.
    #[arg(long)]
    pub no_access: bool,

    /// Disable colored output.
    #[arg(long)]
    pub no_color: bool,

    /// ffmpeg binary to invoke.
    #[arg(long, value_name = "PATH", env = "MOV_TO_MKV_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// Show debug diagnostics on stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Where the source files come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Directory(PathBuf),
    Files(Vec<PathBuf>),
}

impl Args {
    pub fn input(&self) -> Input {
        match &self.directory {
            Some(dir) => Input::Directory(dir.clone()),
            None => Input::Files(self.single.clone()),
        }
    }
}
