use std::io;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use crate::command::{EncodeStep, StepKind};
use crate::console::{Console, Status};
use crate::error::ConvertError;
use crate::run_log::{RunLog, StepFailure};

/// How one source file came out of the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Converted,
    Failed { step: StepKind, failure: StepFailure },
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Converted)
    }
}

/// Runs the encode steps of one source through ffmpeg, one after another.
pub struct TranscodeRunner<'a> {
    program: PathBuf,
    console: &'a Console,
}

impl<'a> TranscodeRunner<'a> {
    pub fn new(program: impl Into<PathBuf>, console: &'a Console) -> Self {
        TranscodeRunner {
            program: program.into(),
            console,
        }
    }

    /// Run `steps` in order, stopping at the first one that fails.
    ///
    /// A missing ffmpeg binary is returned as `Err` after it has been
    /// written to `log`; every other failure is an [`ItemOutcome::Failed`].
    pub fn run(&self, steps: &[EncodeStep], log: &mut RunLog) -> Result<ItemOutcome, ConvertError> {
        for (index, step) in steps.iter().enumerate() {
            log.log_command(step, &self.program);

            let failure = match self.run_step(step) {
                Ok(output) => {
                    log.log_output(
                        &String::from_utf8_lossy(&output.stdout),
                        &String::from_utf8_lossy(&output.stderr),
                    );
                    match output.status.code() {
                        Some(0) => None,
                        Some(code) => Some(StepFailure::ExitStatus(code)),
                        None => Some(StepFailure::Signal),
                    }
                }
                Err(failure) => Some(failure),
            };

            match failure {
                None => {
                    log.log_success(&step.output);
                    self.console.status(
                        Status::Success,
                        &format!("{} complete", step.kind.short_name()),
                        3,
                    );
                }
                Some(StepFailure::ToolNotFound) => {
                    log.log_failure(StepFailure::ToolNotFound);
                    return Err(ConvertError::tool_not_found(&self.program));
                }
                Some(failure) => {
                    tracing::debug!(
                        step = step.kind.label(),
                        error = %failure.message(),
                        "encode step failed"
                    );
                    self.console.status(
                        Status::Error,
                        &format!("{} error: {}", step.kind.short_name(), failure.message()),
                        3,
                    );
                    log.log_failure(failure.clone());
                    for skipped in &steps[index + 1..] {
                        log.log_skipped(skipped.kind);
                    }
                    return Ok(ItemOutcome::Failed {
                        step: step.kind,
                        failure,
                    });
                }
            }
        }

        Ok(ItemOutcome::Converted)
    }

    fn run_step(&self, step: &EncodeStep) -> Result<Output, StepFailure> {
        // ffmpeg's -n refuses too, but an existing preservation file must
        // survive even if the tool stops honouring it.
        if step.output.exists() {
            return Err(StepFailure::OutputExists);
        }

        tracing::debug!(command = %step.command_line(&self.program), "running ffmpeg");

        Command::new(&self.program)
            .args(&step.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => StepFailure::ToolNotFound,
                _ => StepFailure::Spawn(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::build_steps;
    use crate::paths::OutputSet;
    use crate::run_log::StepStatus;
    use std::fs;
    use std::path::Path;

    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-ffmpeg");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn prepare(dir: &Path) -> (PathBuf, OutputSet) {
        let source = dir.join("sample.mov");
        fs::write(&source, b"v210").unwrap();
        let outputs = OutputSet::for_source(&source);
        fs::create_dir_all(&outputs.dir).unwrap();
        (source, outputs)
    }

    #[cfg(unix)]
    #[test]
    fn test_all_steps_succeed() {
        let tmp = tempfile::tempdir().unwrap();
        let (source, outputs) = prepare(tmp.path());
        let program = fake_ffmpeg(
            tmp.path(),
            "for last; do :; done\necho encoding >&2\nprintf data > \"$last\"",
        );
        let console = Console::plain();
        let runner = TranscodeRunner::new(&program, &console);

        let steps = build_steps(&source, &outputs, false);
        let mut log = RunLog::new(&outputs.log, &source);
        let outcome = runner.run(&steps, &mut log).unwrap();
        assert_eq!(outcome, ItemOutcome::Converted);

        let record = log.finalize(outcome.is_success()).unwrap();
        assert_eq!(record.steps.len(), 2);
        assert!(record.steps.iter().all(|s| s.status == StepStatus::Success));
        assert_eq!(record.steps[0].stderr.trim(), "encoding");
        assert!(outputs.preservation.exists());
        assert!(outputs.access.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_skips_remaining_steps() {
        let tmp = tempfile::tempdir().unwrap();
        let (source, outputs) = prepare(tmp.path());
        let program = fake_ffmpeg(tmp.path(), "echo 'Invalid data found' >&2\nexit 3");
        let console = Console::plain();
        let runner = TranscodeRunner::new(&program, &console);

        let steps = build_steps(&source, &outputs, false);
        let mut log = RunLog::new(&outputs.log, &source);
        let outcome = runner.run(&steps, &mut log).unwrap();
        assert_eq!(
            outcome,
            ItemOutcome::Failed {
                step: StepKind::Preservation,
                failure: StepFailure::ExitStatus(3),
            }
        );

        let record = log.finalize(false).unwrap();
        assert_eq!(record.steps[1].kind, StepKind::Access);
        assert_eq!(record.steps[1].status, StepStatus::Pending);
        assert!(!outputs.access.exists());

        let text = fs::read_to_string(&outputs.log).unwrap();
        assert!(text.contains("  Invalid data found"));
        assert!(text.contains("Error: ffmpeg returned 3"));
    }

    #[cfg(unix)]
    #[test]
    fn test_access_failure_keeps_preservation_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let (source, outputs) = prepare(tmp.path());
        let program = fake_ffmpeg(
            tmp.path(),
            "for last; do :; done\n\
             case \"$last\" in *.mp4) echo 'Unknown encoder libx264' >&2; exit 1;; esac\n\
             printf data > \"$last\"",
        );
        let console = Console::plain();
        let runner = TranscodeRunner::new(&program, &console);

        let steps = build_steps(&source, &outputs, false);
        let mut log = RunLog::new(&outputs.log, &source);
        let outcome = runner.run(&steps, &mut log).unwrap();
        assert_eq!(
            outcome,
            ItemOutcome::Failed {
                step: StepKind::Access,
                failure: StepFailure::ExitStatus(1),
            }
        );

        let record = log.finalize(false).unwrap();
        assert_eq!(record.steps.len(), 2);
        assert_eq!(record.steps[0].status, StepStatus::Success);
        assert_eq!(
            record.steps[1].status,
            StepStatus::Failed(StepFailure::ExitStatus(1))
        );
        assert!(outputs.preservation.exists());
        assert!(!outputs.access.exists());

        let text = fs::read_to_string(&outputs.log).unwrap();
        assert_eq!(text.matches("Result: SUCCESS").count(), 1);
        assert_eq!(text.matches("Result: FAILED").count(), 1);
        assert!(text.contains("  Unknown encoder libx264"));
        assert!(text.contains("Status:       FAILED"));
    }

    #[cfg(unix)]
    #[test]
    fn test_existing_output_is_never_overwritten() {
        let tmp = tempfile::tempdir().unwrap();
        let (source, outputs) = prepare(tmp.path());
        fs::write(&outputs.preservation, b"precious").unwrap();
        let program = fake_ffmpeg(tmp.path(), "for last; do :; done\nprintf clobbered > \"$last\"");
        let console = Console::plain();
        let runner = TranscodeRunner::new(&program, &console);

        let steps = build_steps(&source, &outputs, false);
        let mut log = RunLog::new(&outputs.log, &source);
        let outcome = runner.run(&steps, &mut log).unwrap();

        assert_eq!(
            outcome,
            ItemOutcome::Failed {
                step: StepKind::Preservation,
                failure: StepFailure::OutputExists,
            }
        );
        assert_eq!(fs::read(&outputs.preservation).unwrap(), b"precious");
        assert!(!outputs.access.exists());
    }

    #[test]
    fn test_missing_tool_is_fatal_and_logged() {
        let tmp = tempfile::tempdir().unwrap();
        let (source, outputs) = prepare(tmp.path());
        let program = tmp.path().join("no-such-ffmpeg");
        let console = Console::plain();
        let runner = TranscodeRunner::new(&program, &console);

        let steps = build_steps(&source, &outputs, false);
        let mut log = RunLog::new(&outputs.log, &source);
        let err = runner.run(&steps, &mut log).unwrap_err();
        assert!(err.is_fatal());

        let record = log.finalize(false).unwrap();
        assert_eq!(
            record.steps[0].status,
            StepStatus::Failed(StepFailure::ToolNotFound)
        );
        let text = fs::read_to_string(&outputs.log).unwrap();
        assert!(text.contains("Error: ffmpeg not found"));
        assert!(text.contains("Status:       FAILED"));
    }
}
