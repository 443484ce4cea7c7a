//! Container tag extraction for `.mkv` files.
//!
//! Each file is probed with ffprobe and its format-level tags are written
//! next to it as `<stem>_output_tags.json` and `<stem>_output_tags.txt`.

use serde::{Deserialize, Serialize};
use serde_json::ser::{Formatter, PrettyFormatter};
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use walkdir::WalkDir;

use crate::console::{Console, Status};
use crate::error::TagError;

/// Order of the keys in the text sidecar. Keys not listed only appear in the JSON.
pub const TEXT_TAG_ORDER: &[&str] = &[
    "ENCODER",
    "VIDEO_STREAM_HASH",
    "AUDIO_STREAM_HASH",
    "COLLECTION",
    "TITLE",
    "CATALOG_NUMBER",
    "DESCRIPTION",
    "DATE_DIGITIZED",
    "ENCODER_SETTINGS",
    "ENCODED_BY",
    "ORIGINAL_MEDIA_TYPE",
    "DATE_TAGGED",
    "TERMS_OF_USE",
    "_TECHNICAL_NOTES",
    "_ORIGINAL_FPS",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRecord {
    pub file: String,
    pub tags: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: ProbeFormat,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    tags: Map<String, Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TagSummary {
    pub found: usize,
    pub extracted: usize,
    pub failed: usize,
}

pub struct TagExtractor {
    program: PathBuf,
}

impl TagExtractor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        TagExtractor {
            program: program.into(),
        }
    }

    pub fn extract(&self, path: &Path) -> Result<TagRecord, TagError> {
        tracing::debug!(file = %path.display(), "probing");

        let output = Command::new(&self.program)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| match source.kind() {
                io::ErrorKind::NotFound => TagError::ToolNotFound {
                    program: self.program.clone(),
                },
                _ => TagError::Spawn {
                    program: self.program.clone(),
                    source,
                },
            })?;

        if !output.status.success() {
            return Err(TagError::ProbeFailed {
                path: path.to_path_buf(),
                status: output.status.to_string(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        parse_probe_output(path, &output.stdout)
    }
}

/// Keep only `format.tags` from ffprobe's JSON, keyed by the file name.
pub fn parse_probe_output(path: &Path, json: &[u8]) -> Result<TagRecord, TagError> {
    let probe: ProbeOutput = serde_json::from_slice(json).map_err(|source| TagError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(TagRecord {
        file: file_name(path),
        tags: probe.format.tags,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `(json, txt)` sidecar paths. The stem stops at the first dot of the name.
pub fn sidecar_paths(path: &Path) -> (PathBuf, PathBuf) {
    let name = file_name(path);
    let stem = name.split('.').next().unwrap_or_default();
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    (
        dir.join(format!("{}_output_tags.json", stem)),
        dir.join(format!("{}_output_tags.txt", stem)),
    )
}

/// Four-space indented JSON, tags in probe order, non-ASCII written as `\uXXXX`.
pub fn render_json(record: &TagRecord) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = AsciiFormatter(PrettyFormatter::with_indent(b"    "));
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    record.serialize(&mut ser)?;
    Ok(buf)
}

/// Pretty printing with every non-ASCII character escaped as UTF-16 units,
/// the layout of the sidecars already sitting in the archive.
struct AsciiFormatter<'a>(PrettyFormatter<'a>);

impl Formatter for AsciiFormatter<'_> {
    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }

    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.0.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.0.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object_value(writer)
    }
}

pub fn render_text(record: &TagRecord) -> String {
    let mut text = format!("file: {}\n\n", record.file);

    for key in TEXT_TAG_ORDER {
        let Some(value) = record.tags.get(*key) else {
            continue;
        };
        match *key {
            // The two stream hashes share one block.
            "VIDEO_STREAM_HASH" => {
                text.push_str(&format!("{}: {}\n", key, tag_value(value)));
                if !record.tags.contains_key("AUDIO_STREAM_HASH") {
                    text.push('\n');
                }
            }
            _ => text.push_str(&format!("{}: {}\n\n", key, tag_value(value))),
        }
    }

    text
}

fn tag_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Write both sidecars, returning their paths.
pub fn save_sidecars(path: &Path, record: &TagRecord) -> Result<(PathBuf, PathBuf), TagError> {
    let (json_path, txt_path) = sidecar_paths(path);

    let json = render_json(record).map_err(|source| TagError::Write {
        path: json_path.clone(),
        source: source.into(),
    })?;
    fs::write(&json_path, json).map_err(|source| TagError::Write {
        path: json_path.clone(),
        source,
    })?;
    fs::write(&txt_path, render_text(record)).map_err(|source| TagError::Write {
        path: txt_path.clone(),
        source,
    })?;

    Ok((json_path, txt_path))
}

/// Every `*.mkv` file under `dir`, at any depth, in name order.
pub fn find_mkv_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".mkv"))
        .map(|e| e.into_path())
        .collect()
}

/// Extract and save tags for every `.mkv` below `dir`. A missing directory is
/// reported and yields an empty summary.
pub fn process_directory(extractor: &TagExtractor, dir: &Path, console: &Console) -> TagSummary {
    let mut summary = TagSummary::default();

    if !dir.is_dir() {
        console.error(&format!("The directory '{}' does not exist.", dir.display()));
        return summary;
    }

    for path in find_mkv_files(dir) {
        summary.found += 1;
        let name = file_name(&path);
        println!();
        println!("{}", console.cyan(&format!("Found file: {}", name)));

        let record = match extractor.extract(&path) {
            Ok(record) => record,
            Err(e) => {
                report_failure(console, &name, &e);
                summary.failed += 1;
                continue;
            }
        };

        let (json_path, txt_path) = sidecar_paths(&path);
        for existing in [&json_path, &txt_path] {
            if existing.exists() {
                console.status(
                    Status::Warning,
                    &console.yellow(&format!(
                        "{} exists and will be overwritten.",
                        existing.display()
                    )),
                    0,
                );
            }
        }

        println!("{}", console.cyan(&format!("Processing: {}", name)));
        match save_sidecars(&path, &record) {
            Ok((json_path, txt_path)) => {
                for saved in [json_path, txt_path] {
                    console.status(
                        Status::Success,
                        &console.green(&format!("Saved (or overwritten): {}", saved.display())),
                        0,
                    );
                }
                println!("{}", console.green(&format!("Completed: {}", name)));
                summary.extracted += 1;
            }
            Err(e) => {
                report_failure(console, &name, &e);
                summary.failed += 1;
            }
        }
        println!("{}", console.magenta(&"-".repeat(70)));
    }

    summary
}

fn report_failure(console: &Console, name: &str, error: &TagError) {
    console.status(
        Status::Error,
        &console.red(&format!("Failed to extract metadata from {}: {}", name, error)),
        0,
    );
    if let TagError::ProbeFailed { stdout, stderr, .. } = error {
        if !stdout.trim().is_empty() {
            println!("{}", console.yellow(&format!("stdout: {}", stdout.trim())));
        }
        if !stderr.trim().is_empty() {
            println!("{}", console.yellow(&format!("stderr: {}", stderr.trim())));
        }
    }
}
