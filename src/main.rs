mod downsample;
mod folders;
mod gps_time;
mod index;
mod progress;
mod sync_log;

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::Parser;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::folders::DatasetFolders;

const AFTER_HELP: &str = "\
IMPORTANT NOTE: Do not include a trailing file separator in the
DATA_FOLDER or CAMERA_FOLDER names!";

#[derive(Parser)]
#[command(
    name = "czmil-image-index",
    version,
    about = "Down-sample CZMIL camera images into a folder next to the LiDAR data and timestamp the CameraSync file",
    after_help = AFTER_HELP
)]
struct Cli {
    /// Folder containing the CZMIL LiDAR data files (*.cpf, *.cwf, *.csf and *.cif)
    data_folder: PathBuf,

    /// Folder containing the CZMIL camera images and the CameraSync file
    camera_folder: PathBuf,
}

/// Exit status for every fatal condition, as the legacy tool used.
const FATAL_EXIT: i32 = -1;

fn main() {
    std::process::exit(run_cli(std::env::args_os()));
}

/// Parse `args`, run, and map the outcome to a process exit status.
fn run_cli<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            e.print().ok();
            if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                return 0;
            }
            eprintln!("\n{}\n", AFTER_HELP);
            return FATAL_EXIT;
        }
    };

    match run(&cli) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("\nError: {:#}\n", e);
            FATAL_EXIT
        }
    }
}

/// `005% of files converted`, the legacy progress line.
fn progress_line(percent: u32) -> String {
    format!("{:03}% of files converted", percent)
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let t_total = std::time::Instant::now();

    println!("\n\n {} v{} \n\n", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    std::io::stdout().flush()?;

    let folders = DatasetFolders::resolve(&cli.data_folder, &cli.camera_folder)?;

    let pb = ProgressBar::with_draw_target(Some(100), ProgressDrawTarget::stdout());
    pb.set_style(ProgressStyle::default_bar().template("{msg}")?);

    let program = std::env::args()
        .next()
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());

    // A hidden bar (stdout is not a terminal) would swallow every update.
    let piped = pb.is_hidden();

    let summary = index::build_index(&folders, &program, &|percent: u32| {
        if piped {
            let mut out = std::io::stdout().lock();
            write!(out, "{}\r", progress_line(percent)).ok();
            out.flush().ok();
        } else {
            pb.set_position(percent as u64);
            pb.set_message(progress_line(percent));
        }
    })?;

    pb.finish_and_clear();
    println!("100% of files converted\n");

    if summary.week_rollover {
        eprintln!("Records crossed a GPS week boundary; later timestamps carry one extra week");
    }

    eprintln!(
        "Done! {} records, {} images scaled, {} skipped ({:.2}s)",
        summary.records,
        summary.images_scaled,
        summary.images_skipped,
        t_total.elapsed().as_secs_f64()
    );

    Ok(())
}
