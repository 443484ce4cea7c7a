use clap::Parser;
use mov_preserve::console::Console;
use mov_preserve::tags::{process_directory, TagExtractor, TagSummary};
use std::path::PathBuf;

/// Extract the format tags of every MKV file in one or more directory trees,
/// saving them as JSON and TXT next to each file.
#[derive(Debug, Parser)]
#[command(
    name = "mkv_tag_extract",
    version,
    after_help = "Example:\n  mkv_tag_extract /archive/2024 /archive/2025"
)]
struct Args {
    /// Directories to search (recursively) for .mkv files.
    #[arg(required = true, value_name = "DIR")]
    directories: Vec<PathBuf>,

    /// ffprobe binary to invoke.
    #[arg(long, value_name = "PATH", env = "MKV_TAG_EXTRACT_FFPROBE", default_value = "ffprobe")]
    ffprobe: PathBuf,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,

    /// Show debug diagnostics on stderr.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    mov_preserve::init_tracing(args.verbose);

    let console = Console::detect(args.no_color);
    let extractor = TagExtractor::new(args.ffprobe);

    let mut total = TagSummary::default();
    for dir in &args.directories {
        let summary = process_directory(&extractor, dir, &console);
        total.found += summary.found;
        total.extracted += summary.extracted;
        total.failed += summary.failed;
    }

    println!();
    println!(
        "{} {} .mkv file(s), {} extracted, {} failed",
        console.bold("Done:"),
        total.found,
        total.extracted,
        total.failed
    );
}
