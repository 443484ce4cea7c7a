use chrono::{DateTime, Local, TimeDelta};
use std::fs;
use std::path::{Path, PathBuf};

use crate::command::{EncodeStep, StepKind};
use crate::error::ConvertError;

const HEAVY_RULE: &str =
    "======================================================================";
const LIGHT_RULE: &str =
    "----------------------------------------------------------------------";

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Why a step did not produce its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepFailure {
    ExitStatus(i32),
    Signal,
    ToolNotFound,
    OutputExists,
    Spawn(String),
}

impl StepFailure {
    pub fn message(&self) -> String {
        match self {
            StepFailure::ExitStatus(code) => format!("ffmpeg returned {}", code),
            StepFailure::Signal => "ffmpeg was terminated by a signal".to_string(),
            StepFailure::ToolNotFound => "ffmpeg not found".to_string(),
            StepFailure::OutputExists => "output file already exists".to_string(),
            StepFailure::Spawn(reason) => format!("failed to start ffmpeg: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Success,
    Failed(StepFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub kind: StepKind,
    pub status: StepStatus,
    pub stdout: String,
    pub stderr: String,
}

/// What was persisted for one source, returned by [`RunLog::finalize`].
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub source: PathBuf,
    pub source_size: Option<u64>,
    pub started: DateTime<Local>,
    pub completed: DateTime<Local>,
    pub elapsed: TimeDelta,
    pub steps: Vec<StepReport>,
    pub success: bool,
}

/// Per-file conversion log.
///
/// Everything is accumulated in memory and written to `path` exactly once,
/// by [`RunLog::finalize`], whatever happened along the way.
#[derive(Debug)]
pub struct RunLog {
    path: PathBuf,
    source: PathBuf,
    source_size: Option<u64>,
    started: DateTime<Local>,
    lines: Vec<String>,
    steps: Vec<StepReport>,
}

impl RunLog {
    pub fn new(path: &Path, source: &Path) -> Self {
        let source_size = fs::metadata(source).ok().map(|m| m.len());

        let mut log = RunLog {
            path: path.to_path_buf(),
            source: source.to_path_buf(),
            source_size,
            started: Local::now(),
            lines: Vec::new(),
            steps: Vec::new(),
        };
        log.add_header();
        log
    }

    fn add_header(&mut self) {
        self.lines.push(HEAVY_RULE.to_string());
        self.lines.push("MOV to MKV Conversion Log".to_string());
        self.lines.push(HEAVY_RULE.to_string());
        self.lines.push(String::new());
        self.lines
            .push(format!("Timestamp:    {}", format_timestamp(&self.started)));
        self.lines
            .push(format!("Source file:  {}", self.source.display()));
        match self.source_size {
            Some(size) => self.lines.push(format!("Source size:  {}", format_size(size))),
            None => self.lines.push("Source size:  (unable to read)".to_string()),
        }
        self.lines.push(String::new());
    }

    /// Step heading plus the exact command about to run
    pub fn log_command(&mut self, step: &EncodeStep, program: &Path) {
        self.lines.push(LIGHT_RULE.to_string());
        self.lines.push(step.kind.label().to_string());
        self.lines.push(LIGHT_RULE.to_string());
        self.lines.push(String::new());
        self.lines.push("Command:".to_string());
        self.lines.push(format!("  {}", step.command_line(program)));
        self.lines.push(String::new());

        self.steps.push(StepReport {
            kind: step.kind,
            status: StepStatus::Pending,
            stdout: String::new(),
            stderr: String::new(),
        });
    }

    /// Captured streams of the last logged command. Blank streams are left out.
    pub fn log_output(&mut self, stdout: &str, stderr: &str) {
        self.push_stream("STDOUT:", stdout);
        self.push_stream("STDERR:", stderr);

        if let Some(step) = self.steps.last_mut() {
            step.stdout.push_str(stdout);
            step.stderr.push_str(stderr);
        }
    }

    fn push_stream(&mut self, heading: &str, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.lines.push(heading.to_string());
        for line in text.lines() {
            self.lines.push(format!("  {}", line));
        }
        self.lines.push(String::new());
    }

    pub fn log_success(&mut self, output: &Path) {
        self.lines.push("Result: SUCCESS".to_string());
        if let Ok(metadata) = fs::metadata(output) {
            self.lines
                .push(format!("Output size:  {}", format_size(metadata.len())));
        }
        self.lines.push(String::new());
        self.set_status(StepStatus::Success);
    }

    pub fn log_failure(&mut self, failure: StepFailure) {
        self.lines.push("Result: FAILED".to_string());
        self.lines.push(format!("Error: {}", failure.message()));
        self.lines.push(String::new());
        self.set_status(StepStatus::Failed(failure));
    }

    /// Record a step that was never started because an earlier one failed
    pub fn log_skipped(&mut self, kind: StepKind) {
        self.steps.push(StepReport {
            kind,
            status: StepStatus::Pending,
            stdout: String::new(),
            stderr: String::new(),
        });
    }

    fn set_status(&mut self, status: StepStatus) {
        if let Some(step) = self.steps.last_mut() {
            step.status = status;
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the summary block and write the log to disk.
    pub fn finalize(mut self, success: bool) -> Result<RunRecord, ConvertError> {
        let completed = Local::now();
        let elapsed = completed - self.started;

        self.lines.push(HEAVY_RULE.to_string());
        self.lines.push("Summary".to_string());
        self.lines.push(HEAVY_RULE.to_string());
        self.lines.push(String::new());
        self.lines
            .push(format!("Completed:    {}", format_timestamp(&completed)));
        self.lines
            .push(format!("Elapsed:      {}", format_elapsed(elapsed)));
        self.lines.push(format!(
            "Status:       {}",
            if success { "SUCCESS" } else { "FAILED" }
        ));
        self.lines.push(String::new());

        fs::write(&self.path, self.lines.join("\n")).map_err(|source| ConvertError::WriteLog {
            path: self.path.clone(),
            source,
        })?;

        tracing::debug!(log = %self.path.display(), success, "conversion log written");

        Ok(RunRecord {
            source: self.source,
            source_size: self.source_size,
            started: self.started,
            completed,
            elapsed,
            steps: self.steps,
            success,
        })
    }
}

/// Local time as `2026-10-17T09:30:00.123456`
pub fn format_timestamp(time: &DateTime<Local>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// `1,234,567 bytes (0.00 GiB)`
pub fn format_size(bytes: u64) -> String {
    format!(
        "{} bytes ({:.2} GiB)",
        group_thousands(bytes),
        bytes as f64 / BYTES_PER_GIB
    )
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// `HH:MM:SS.mmm`
pub fn format_elapsed(elapsed: TimeDelta) -> String {
    let millis = elapsed.num_milliseconds().max(0);
    let total_seconds = millis / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total_seconds / 3600,
        (total_seconds % 3600) / 60,
        total_seconds % 60,
        millis % 1000
    )
}
