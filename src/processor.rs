use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

use crate::args::Input;
use crate::command::build_steps;
use crate::console::{Console, Status};
use crate::error::ConvertError;
use crate::paths::{display_relative, has_mov_extension, OutputSet, MOV_EXTENSION};
use crate::run_log::RunLog;
use crate::runner::{ItemOutcome, TranscodeRunner};

#[derive(Debug, Clone)]
pub struct Options {
    pub dry_run: bool,
    pub skip_access: bool,
    pub ffmpeg: PathBuf,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub dry_run: bool,
}

impl BatchSummary {
    /// Items that actually went through the runner
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Drives the conversion of a whole batch, one file at a time.
pub struct Processor {
    options: Options,
    console: Console,
}

impl Processor {
    pub fn new(options: Options, console: Console) -> Self {
        Processor { options, console }
    }

    /// Resolve, print the banner, convert everything and print the summary.
    pub fn run(&self, input: &Input) -> Result<BatchSummary> {
        let sources = resolve_sources(input)?;

        self.print_banner(input, sources.len());
        let start = Instant::now();

        let summary = self.process_files(&sources)?;

        let elapsed = start.elapsed().as_secs();
        println!(
            "  {}",
            self.console.dim(&format!(
                "Elapsed: {:02}:{:02}:{:02}",
                elapsed / 3600,
                (elapsed % 3600) / 60,
                elapsed % 60
            ))
        );
        println!();

        Ok(summary)
    }

    /// Convert `sources` in order. Only a missing ffmpeg stops the loop early.
    pub fn process_files(&self, sources: &[PathBuf]) -> Result<BatchSummary> {
        let mut summary = BatchSummary {
            total: sources.len(),
            dry_run: self.options.dry_run,
            ..Default::default()
        };

        if sources.is_empty() {
            self.console
                .status(Status::Warning, "No .mov files to process", 0);
            return Ok(summary);
        }

        println!();
        println!(
            "{}",
            self.console
                .bold(&format!("Found {} .mov file(s) to convert", sources.len()))
        );
        println!();
        println!("{}", self.console.rule());

        let runner = TranscodeRunner::new(&self.options.ffmpeg, &self.console);

        for (i, source) in sources.iter().enumerate() {
            let outputs = OutputSet::for_source(source);
            self.print_plan(i + 1, sources.len(), source, &outputs);

            if self.options.dry_run {
                self.console.status(Status::Skip, "Skipped (dry run)", 3);
                continue;
            }

            match self.process_item(&runner, source, &outputs) {
                Ok(true) => summary.succeeded += 1,
                Ok(false) => summary.failed += 1,
                Err(e) if e.is_fatal() => {
                    return Err(e).with_context(|| format!("Aborting at {}", source.display()));
                }
                Err(e) => {
                    self.console.status(Status::Error, &e.to_string(), 3);
                    summary.failed += 1;
                }
            }
        }

        self.print_summary(&summary);
        Ok(summary)
    }

    /// Returns whether the item converted; `Err` for errors outside the encode steps.
    fn process_item(
        &self,
        runner: &TranscodeRunner,
        source: &Path,
        outputs: &OutputSet,
    ) -> Result<bool, ConvertError> {
        fs::create_dir_all(&outputs.dir).map_err(|source| ConvertError::CreateOutputDir {
            path: outputs.dir.clone(),
            source,
        })?;

        let steps = build_steps(source, outputs, self.options.skip_access);
        let mut log = RunLog::new(&outputs.log, source);

        let outcome = match runner.run(&steps, &mut log) {
            Ok(outcome) => outcome,
            Err(fatal) => {
                // Leave a log behind even when the batch is about to stop.
                if let Err(e) = log.finalize(false) {
                    tracing::error!(error = %e, "could not finalize log before aborting");
                }
                return Err(fatal);
            }
        };

        let log_name = display_relative(&outputs.dir, log.path());
        let success = outcome.is_success();
        log.finalize(success)?;

        if let ItemOutcome::Failed { step, failure } = &outcome {
            tracing::debug!(
                source = %source.display(),
                step = step.label(),
                error = %failure.message(),
                "conversion failed"
            );
        }
        self.console
            .status(Status::Success, &format!("Log saved: {}", log_name), 3);

        Ok(success)
    }

    fn print_banner(&self, input: &Input, count: usize) {
        let mode = match input {
            Input::Directory(dir) => format!("Directory: {}", dir.display()),
            Input::Files(_) => format!("Processing {} specified file(s)", count),
        };

        println!();
        println!("{}", self.console.heading(&"─".repeat(60)));
        println!("{}", self.console.heading("  MOV to MKV Conversion"));
        println!("{}", self.console.heading(&"─".repeat(60)));
        println!("  {}", mode);
        if self.options.dry_run {
            println!("  {}", self.console.yellow(&self.console.bold("DRY RUN")));
        }
        if self.options.skip_access {
            println!("  {}", self.console.dim("Skipping access derivatives"));
        }
    }

    fn print_plan(&self, index: usize, total: usize, source: &Path, outputs: &OutputSet) {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let arrow = self.console.dim("→");

        println!();
        println!(
            "{} {}",
            self.console.bold(&format!("[{}/{}]", index, total)),
            self.console.cyan(&name)
        );
        println!(
            "       {} {}",
            arrow,
            display_relative(&outputs.dir, &outputs.preservation)
        );
        if !self.options.skip_access {
            println!(
                "       {} {}",
                arrow,
                display_relative(&outputs.dir, &outputs.access)
            );
        }
        println!("       {} {}", arrow, display_relative(&outputs.dir, &outputs.log));
    }

    fn print_summary(&self, summary: &BatchSummary) {
        println!();
        println!("{}", self.console.rule());
        println!();
        println!("{}", self.console.bold("SUMMARY"));
        if summary.dry_run {
            println!(
                "  {}",
                self.console.yellow("DRY RUN - No files were converted")
            );
            println!("  Would convert: {}", summary.total);
        } else {
            println!("  Attempted: {}", summary.attempted());
            println!("  {} {}", self.console.green("Converted:"), summary.succeeded);
            println!("  {}    {}", self.console.red("Errors:"), summary.failed);
        }
        println!();
    }
}

/// Turn the command-line input into the ordered list of files to convert.
///
/// Explicit files are all checked before anything runs.
pub fn resolve_sources(input: &Input) -> Result<Vec<PathBuf>, ConvertError> {
    match input {
        Input::Directory(dir) => collect_directory(dir),
        Input::Files(files) => {
            for file in files {
                if !file.exists() {
                    return Err(ConvertError::InputNotFound(file.clone()));
                }
                if !has_mov_extension(file) {
                    return Err(ConvertError::NotMov(file.clone()));
                }
            }
            Ok(files.clone())
        }
    }
}

/// `.mov` files directly inside `dir`, sorted by name.
pub fn collect_directory(dir: &Path) -> Result<Vec<PathBuf>, ConvertError> {
    if !dir.exists() {
        return Err(ConvertError::DirectoryNotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(ConvertError::NotADirectory(dir.to_path_buf()));
    }

    let mut files = Vec::new();

    for entry_result in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry_result {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable directory entry");
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        // Same as a `*.mov` glob: the scan is case-sensitive, `--single` is not.
        if path.extension() == Some(OsStr::new(MOV_EXTENSION)) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::write(path, b"v210").unwrap();
    }

    fn processor(dry_run: bool, skip_access: bool, ffmpeg: PathBuf) -> Processor {
        Processor::new(
            Options {
                dry_run,
                skip_access,
                ffmpeg,
            },
            Console::plain(),
        )
    }

    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-ffmpeg");
        fs::write(
            &path,
            "#!/bin/sh\nfor last; do :; done\n\
             if [ -e \"$last\" ]; then echo \"File '$last' already exists. Exiting.\" >&2; exit 1; fi\n\
             printf encoded > \"$last\"\n",
        )
        .unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_collect_directory_is_sorted_and_shallow() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("b.mov"));
        touch(&tmp.path().join("a.mov"));
        touch(&tmp.path().join("CAM.MOV"));
        touch(&tmp.path().join("notes.txt"));
        fs::create_dir(tmp.path().join("nested")).unwrap();
        touch(&tmp.path().join("nested").join("c.mov"));

        let files = collect_directory(tmp.path()).unwrap();
        assert_eq!(
            files,
            vec![tmp.path().join("a.mov"), tmp.path().join("b.mov")]
        );
    }

    #[test]
    fn test_collect_directory_rejects_missing_and_files() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("gone");
        assert!(matches!(
            collect_directory(&missing),
            Err(ConvertError::DirectoryNotFound(_))
        ));

        let file = tmp.path().join("a.mov");
        touch(&file);
        assert!(matches!(
            collect_directory(&file),
            Err(ConvertError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_explicit_files_are_validated_up_front() {
        let tmp = tempfile::tempdir().unwrap();
        let good = tmp.path().join("good.mov");
        let clip = tmp.path().join("clip.mp4");
        touch(&good);
        touch(&clip);

        let err = resolve_sources(&Input::Files(vec![good.clone(), clip])).unwrap_err();
        assert!(matches!(err, ConvertError::NotMov(_)));

        let err = resolve_sources(&Input::Files(vec![tmp.path().join("missing.mov")]))
            .unwrap_err();
        assert!(matches!(err, ConvertError::InputNotFound(_)));

        let upper = tmp.path().join("UPPER.MOV");
        touch(&upper);
        let files = resolve_sources(&Input::Files(vec![upper.clone(), good.clone()])).unwrap();
        assert_eq!(files, vec![upper, good]);
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("sample.mov");
        touch(&source);

        // A missing binary proves ffmpeg is never invoked.
        let summary = processor(true, false, tmp.path().join("no-ffmpeg"))
            .process_files(&[source])
            .unwrap();

        assert_eq!(summary.total, 1);
        assert_eq!(summary.attempted(), 0);
        assert!(summary.dry_run);
        assert!(!tmp.path().join("sample").exists());
    }

    #[test]
    fn test_empty_batch() {
        let summary = processor(false, false, PathBuf::from("ffmpeg"))
            .process_files(&[])
            .unwrap();
        assert_eq!(summary, BatchSummary::default());
    }

    #[cfg(unix)]
    #[test]
    fn test_batch_converts_every_file() {
        let tmp = tempfile::tempdir().unwrap();
        let media = tmp.path().join("media");
        fs::create_dir(&media).unwrap();
        touch(&media.join("one.mov"));
        touch(&media.join("two.mov"));
        let ffmpeg = fake_ffmpeg(tmp.path());

        let sources = collect_directory(&media).unwrap();
        let summary = processor(false, false, ffmpeg)
            .process_files(&sources)
            .unwrap();

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 0);
        for base in ["one", "two"] {
            let dir = media.join(base);
            assert!(dir.join(format!("{}.mkv", base)).exists());
            assert!(dir.join(format!("{}_access.mp4", base)).exists());
            assert!(dir.join(format!("{}_conversion.log", base)).exists());
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_collision_fails_item_and_batch_continues() {
        let tmp = tempfile::tempdir().unwrap();
        let media = tmp.path().join("media");
        fs::create_dir_all(media.join("first")).unwrap();
        touch(&media.join("first.mov"));
        touch(&media.join("second.mov"));
        fs::write(media.join("first").join("first.mkv"), b"archived").unwrap();
        let ffmpeg = fake_ffmpeg(tmp.path());

        let sources = collect_directory(&media).unwrap();
        let summary = processor(false, false, ffmpeg)
            .process_files(&sources)
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.attempted(), summary.total);
        assert_eq!(
            fs::read(media.join("first").join("first.mkv")).unwrap(),
            b"archived"
        );
        assert!(!media.join("first").join("first_access.mp4").exists());

        let log = fs::read_to_string(media.join("first").join("first_conversion.log")).unwrap();
        assert!(log.contains("Result: FAILED"));
        assert!(log.contains("Status:       FAILED"));
        assert!(media.join("second").join("second.mkv").exists());
    }

    #[test]
    fn test_missing_ffmpeg_aborts_batch() {
        let tmp = tempfile::tempdir().unwrap();
        let first = tmp.path().join("first.mov");
        let second = tmp.path().join("second.mov");
        touch(&first);
        touch(&second);

        let err = processor(false, false, tmp.path().join("no-ffmpeg"))
            .process_files(&[first, second])
            .unwrap_err();

        let convert = err.downcast_ref::<ConvertError>().unwrap();
        assert!(convert.is_fatal());

        let log = fs::read_to_string(tmp.path().join("first").join("first_conversion.log"))
            .unwrap();
        assert!(log.contains("Status:       FAILED"));
        assert!(!tmp.path().join("second").exists());
    }
}
