use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Extension (without the dot) of the camera files we convert.
pub const MOV_EXTENSION: &str = "mov";

/// Every path a single conversion writes to.
///
/// All three files live inside `dir`, which is a sibling of the source
/// named after the source's base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSet {
    pub dir: PathBuf,
    pub preservation: PathBuf,
    pub access: PathBuf,
    pub log: PathBuf,
}

impl OutputSet {
    /// Derive the outputs for `source`, e.g. `tapes/JPC_AV_00001.mov` gives
    /// `tapes/JPC_AV_00001/JPC_AV_00001.mkv` and friends.
    pub fn for_source(source: &Path) -> Self {
        let base = base_name(source);
        let parent = source.parent().unwrap_or_else(|| Path::new(""));
        let dir = parent.join(base);

        OutputSet {
            preservation: dir.join(with_suffix(base, ".mkv")),
            access: dir.join(with_suffix(base, "_access.mp4")),
            log: dir.join(with_suffix(base, "_conversion.log")),
            dir,
        }
    }
}

/// File name with its extension removed, byte for byte
pub fn base_name(path: &Path) -> &OsStr {
    path.file_stem().unwrap_or_default()
}

fn with_suffix(base: &OsStr, suffix: &str) -> OsString {
    let mut name = base.to_os_string();
    name.push(suffix);
    name
}

/// Case-insensitive `.mov` check
pub fn has_mov_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case(MOV_EXTENSION))
        .unwrap_or(false)
}

/// Path relative to the output directory's parent, for display: `base/base.mkv`
pub fn display_relative(dir: &Path, file: &Path) -> String {
    let dir_name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}/{}", dir_name, file_name)
}
