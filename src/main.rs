use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rocksmith2gpx::{convert, ProgressEvent};

#[derive(Parser)]
#[command(name = "tabs_converter", about = "Converts Rocksmith 2014 .psarc archives to Guitar Pro .gpx tablature")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Raise logging from info to debug.
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a .psarc archive into a .gpx tablature file.
    Convert {
        input: PathBuf,
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Convert { input, output } => run_convert(&input, &output),
    }
}

fn run_convert(input: &std::path::Path, output: &std::path::Path) -> ExitCode {
    let mut report_progress = |event: ProgressEvent| {
        eprintln!("[{:>3}%] {}", event.percent, event.stage);
    };

    match convert(input, output, Some(&mut report_progress)) {
        Ok(result) => {
            eprintln!(
                "converted {} track(s) to {}",
                result.track_count,
                result.output_path.display()
            );
            for warning in &result.warnings {
                eprintln!("warning: {warning}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
