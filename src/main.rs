//! Inspect and filter DCD trajectories.
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use dcdtraj::{DcdError, DcdReader, DcdWriter, Frame, FrameSelection, Range, Result, WriterOptions};
use tracing::{info, Level};

fn frame_selection_parser(selection: &str) -> std::result::Result<FrameSelection, String> {
    let range: Range = selection.parse().map_err(|err| format!("{err}"))?;
    Ok(FrameSelection::Range(range))
}

#[derive(Parser)]
#[command(name = "dcdtraj")]
#[command(about = "Inspect and filter DCD trajectories")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log what is going on in more detail.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a summary of the header of a trajectory.
    Info {
        /// Input path (dcd).
        input: PathBuf,

        /// Also print the step and time of every frame, separated by a tab.
        #[arg(long)]
        frames: bool,
    },

    /// Filter a trajectory according to a frame selection.
    ///
    /// The output is a CHARMM trajectory in native byte order, in which every frame stores all
    /// atoms. The unit cell, fourth dimension and charges are kept if the input has them.
    Filter {
        /// Input path (dcd).
        input: PathBuf,

        /// Output path (dcd).
        output: PathBuf,

        /// Frame selection in the format `start:stop:step`. Each of these values optional.
        ///
        /// - `:100` will select the first 100 frames.
        ///
        /// - `3:14` will select the 4th up to and including the 14th frames, 11 frames in total.
        ///
        /// - `:100:2` will select every second frame from the the first 100 frames, 50 in total.
        #[arg(short, long, value_parser = frame_selection_parser)]
        frame_selection: Option<FrameSelection>,

        /// Write the trajectory in reverse.
        ///
        /// Selection functions the same regardless of whether this flag is set.
        #[arg(long)]
        reverse: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Info { input, frames } => info(&input, frames),
        Commands::Filter {
            input,
            output,
            frame_selection,
            reverse,
        } => filter(&input, &output, &frame_selection.unwrap_or_default(), reverse),
    }
}

fn info(input: &Path, frames: bool) -> Result<()> {
    let mut reader = DcdReader::open(input)?;
    let mut stdout = std::io::stdout().lock();
    let write_err = DcdError::BadWrite;
    writeln!(stdout, "{}", reader.header()).map_err(write_err)?;
    writeln!(stdout, "frames:\t{}", reader.n_frames()).map_err(write_err)?;

    if frames {
        let mut frame = Frame::default();
        for _ in 0..reader.n_frames() {
            reader.read_frame(&mut frame)?;
            writeln!(stdout, "{}\t{:.3}", frame.step, frame.time).map_err(write_err)?;
        }
    }
    Ok(())
}

fn filter(input: &Path, output: &Path, selection: &FrameSelection, reverse: bool) -> Result<()> {
    let mut reader = DcdReader::open(input)?;
    let header = reader.header();
    let mut options = WriterOptions::new(format!("Filtered from {}", input.display()))
        .with_kind(header.kind)
        .with_steps(
            header.starting_frame,
            header.save_frequency,
            header.time_step as f32,
        );
    options.has_unit_cell = header.has_unit_cell;
    options.has_4_dimensions = header.has_4_dimensions;
    options.has_charges = header.has_charges;

    let mut selected = Vec::new();
    for idx in 0..reader.n_frames() {
        match selection.is_included(idx) {
            Some(true) => selected.push(idx),
            Some(false) => continue,
            None => break,
        }
    }
    if reverse {
        selected.reverse();
    }

    let mut writer = DcdWriter::create(output, reader.n_atoms(), &options)?;
    // The first frame holds the positions of any fixed atoms, which later frames leave untouched.
    let mut frame = Frame::default();
    if !selected.is_empty() {
        reader.read_frame(&mut frame)?;
    }
    for &idx in &selected {
        reader.goto_frame(idx)?;
        reader.read_frame(&mut frame)?;
        writer.write_frame(&frame)?;
    }
    info!(
        selected = selected.len(),
        total = reader.n_frames(),
        output = %output.display(),
        "wrote filtered trajectory"
    );
    writer.close()
}
