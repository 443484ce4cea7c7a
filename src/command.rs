use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::paths::OutputSet;

/// FFV1 archival settings: level 3, range coder, large context model,
/// every frame a keyframe, per-slice CRCs, 24 slices.
const FFV1_VIDEO: &[&str] = &[
    "-c:v", "ffv1", "-level", "3", "-coder", "1", "-context", "1", "-g", "1", "-slicecrc", "1",
    "-slices", "24",
];

const FFV1_AUDIO: &[&str] = &["-c:a", "flac", "-f", "matroska"];

const ACCESS_VIDEO: &[&str] = &["-c:v", "libx264", "-preset", "fast", "-crf", "28"];

const ACCESS_AUDIO: &[&str] = &["-c:a", "aac", "-b:a", "128k", "-movflags", "+faststart"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Preservation,
    Access,
}

impl StepKind {
    /// Heading used in the conversion log
    pub fn label(self) -> &'static str {
        match self {
            StepKind::Preservation => "FFV1/MKV Preservation Copy",
            StepKind::Access => "H.264/MP4 Access Derivative",
        }
    }

    /// Short name used on the terminal
    pub fn short_name(self) -> &'static str {
        match self {
            StepKind::Preservation => "FFV1/MKV",
            StepKind::Access => "H.264/MP4 access",
        }
    }
}

/// One ffmpeg invocation, minus the program name.
#[derive(Debug, Clone)]
pub struct EncodeStep {
    pub kind: StepKind,
    pub args: Vec<OsString>,
    pub output: PathBuf,
}

impl EncodeStep {
    /// Command line as it is written to the log
    pub fn command_line(&self, program: &Path) -> String {
        let mut line = program.to_string_lossy().into_owned();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// Build the encode steps for one source, preservation first.
pub fn build_steps(source: &Path, outputs: &OutputSet, skip_access: bool) -> Vec<EncodeStep> {
    let mut steps = vec![encode_step(
        StepKind::Preservation,
        source,
        &outputs.preservation,
        &[FFV1_VIDEO, FFV1_AUDIO],
    )];

    if !skip_access {
        steps.push(encode_step(
            StepKind::Access,
            source,
            &outputs.access,
            &[ACCESS_VIDEO, ACCESS_AUDIO],
        ));
    }

    steps
}

fn encode_step(kind: StepKind, source: &Path, output: &Path, codec_args: &[&[&str]]) -> EncodeStep {
    let mut args: Vec<OsString> = Vec::new();

    // Keep the full stored frame (e.g. 720x486) instead of applying clap cropping.
    args.extend(["-apply_cropping", "0", "-i"].map(OsString::from));
    args.push(source.as_os_str().to_owned());

    // Video and audio only; timecode/data tracks have no place in the target container.
    args.extend(["-map", "0:v", "-map", "0:a"].map(OsString::from));

    for group in codec_args {
        args.extend(group.iter().map(OsString::from));
    }

    // Never overwrite.
    args.push(OsString::from("-n"));
    args.push(output.as_os_str().to_owned());

    EncodeStep {
        kind,
        args,
        output: output.to_path_buf(),
    }
}
