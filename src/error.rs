use std::path::PathBuf;

/// Conditions the batch controller has to tell apart.
///
/// Everything else travels as an `anyhow::Error` with context attached.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The transcoder binary could not be located. Fatal to the whole batch.
    #[error("{} not found. Please install ffmpeg.", program.display())]
    ToolNotFound { program: PathBuf },

    #[error("File not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Not a .mov file: {}", .0.display())]
    NotMov(PathBuf),

    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Failed to create output directory {}: {source}", path.display())]
    CreateOutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write conversion log {}: {source}", path.display())]
    WriteLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConvertError {
    pub fn tool_not_found(program: impl Into<PathBuf>) -> Self {
        Self::ToolNotFound {
            program: program.into(),
        }
    }

    /// True for errors that must stop the batch rather than the current item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ToolNotFound { .. })
    }
}

/// Failures of the tag extractor. All of them are per file.
#[derive(Debug, thiserror::Error)]
pub enum TagError {
    #[error("{} not found. Please install ffprobe.", program.display())]
    ToolNotFound { program: PathBuf },

    #[error("ffprobe failed on {} ({status})", path.display())]
    ProbeFailed {
        path: PathBuf,
        status: String,
        stdout: String,
        stderr: String,
    },

    #[error("Unreadable ffprobe output for {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to run {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
