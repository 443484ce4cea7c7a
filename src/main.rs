use clap::Parser;
use mov_preserve::args::Args;
use mov_preserve::console::Console;
use mov_preserve::processor::{Options, Processor};

fn main() {
    // Usage errors exit with 2 from clap itself.
    let args = Args::parse();
    let console = Console::detect(args.no_color);

    if let Err(e) = run(args, &console) {
        console.error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run(args: Args, console: &Console) -> anyhow::Result<()> {
    mov_preserve::init_tracing(args.verbose);

    let input = args.input();
    let processor = Processor::new(
        Options {
            dry_run: args.dry_run,
            skip_access: args.no_access,
            ffmpeg: args.ffmpeg,
        },
        *console,
    );

    processor.run(&input)?;

    Ok(())
}
