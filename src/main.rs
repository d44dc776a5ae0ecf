//! MCTF CLI - block-based time-domain motion decorrelation
//!
//! `analyze` predicts the odd pictures from the even ones and writes the
//! high-band, frame-type and motion streams; `synthesize` inverts the
//! transform and rebuilds the odd pictures.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::info;

use mctf::io::{create_output, open_input};
use mctf::pipeline::{AnalyzeIo, ModeIo, SynthesizeIo};
use mctf::{init, InitConfig, MctfConfig, TemporalFilter};

#[derive(Parser)]
#[command(name = "mctf")]
#[command(about = "Motion-compensated temporal filtering", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug output
    #[arg(long)]
    debug: bool,

    /// Number of threads for the prediction loop
    #[arg(long)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decorrelate: predict the odd pictures and write the high band
    Analyze(AnalyzeArgs),

    /// Correlate: rebuild the odd pictures from the high band
    Synthesize(SynthesizeArgs),
}

/// Parameters shared by both directions
///
/// The short flags keep the historical assignments, which is why `-h` names
/// the high-band file and help is reachable through `--help` only.
#[derive(Args)]
struct CommonArgs {
    /// Number of overlapped pixels between blocks; zero or a power of two
    #[arg(short = 'v', long = "block_overlaping", default_value_t = 0)]
    block_overlaping: usize,

    /// Size of the blocks in the motion compensation
    #[arg(short = 'b', long = "block_size", default_value_t = 16)]
    block_size: usize,

    /// File with the even pictures
    #[arg(short = 'e', long = "even_fn", default_value = "even")]
    even_fn: PathBuf,

    /// File with the frame types
    #[arg(short = 'f', long = "frame_types_fn", default_value = "frame_types")]
    frame_types_fn: PathBuf,

    /// File with the high-subband pictures
    #[arg(short = 'h', long = "high_fn", default_value = "high")]
    high_fn: PathBuf,

    /// Input file with the motion fields
    #[arg(short = 'i', long = "motion_in_fn", default_value = "motion_in")]
    motion_in_fn: PathBuf,

    /// File with the odd pictures
    #[arg(short = 'o', long = "odd_fn", default_value = "odd")]
    odd_fn: PathBuf,

    /// Number of images to process; must be odd
    #[arg(short = 'p', long = "pictures", default_value_t = 33)]
    pictures: usize,

    /// Size of the X dimension of the pictures
    #[arg(short = 'x', long = "pixels_in_x", default_value_t = 352)]
    pixels_in_x: usize,

    /// Size of the Y dimension of the pictures
    #[arg(short = 'y', long = "pixels_in_y", default_value_t = 288)]
    pixels_in_y: usize,

    /// Size of the searching area of the motion estimation
    #[arg(short = 's', long = "search_range", default_value_t = 4)]
    search_range: usize,

    /// Sub-pixel accuracy of the motion estimation
    #[arg(short = 'a', long = "subpixel_accuracy", default_value_t = 0)]
    subpixel_accuracy: usize,

    /// If nonzero, every predicted picture is coded as B
    #[arg(short = 'B', long = "always_B", default_value_t = 0)]
    always_b: i32,

    /// Optional output file with the subsampled prediction pictures
    #[arg(long = "prediction_fn")]
    prediction_fn: Option<PathBuf>,

    #[arg(long, action = ArgAction::Help, help = "Print help")]
    help: Option<bool>,
}

#[derive(Args)]
#[command(disable_help_flag = true)]
struct AnalyzeArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Output file with the motion fields
    #[arg(short = 't', long = "motion_out_fn", default_value = "motion_out")]
    motion_out_fn: PathBuf,
}

#[derive(Args)]
#[command(disable_help_flag = true)]
struct SynthesizeArgs {
    #[command(flatten)]
    common: CommonArgs,
}

fn build_config(common: &CommonArgs) -> mctf::Result<MctfConfig> {
    MctfConfig::builder()
        .dimensions(common.pixels_in_x, common.pixels_in_y)
        .block_size(common.block_size)
        .block_overlap(common.block_overlaping)
        .pictures(common.pictures)
        .search_range(common.search_range)
        .subpixel_accuracy(common.subpixel_accuracy)
        .always_b(common.always_b != 0)
        .build()
}

fn analyze(args: AnalyzeArgs) -> mctf::Result<()> {
    let config = build_config(&args.common)?;
    let mut filter = TemporalFilter::new(config)?;

    let mut even = open_input(&args.common.even_fn)?;
    let mut odd = open_input(&args.common.odd_fn)?;
    let mut motion_in = open_input(&args.common.motion_in_fn)?;
    let mut high = create_output(&args.common.high_fn)?;
    let mut frame_types = create_output(&args.common.frame_types_fn)?;
    let mut motion_out = create_output(&args.motion_out_fn)?;
    let mut prediction = match &args.common.prediction_fn {
        Some(path) => {
            info!("writing predictions to \"{}\"", path.display());
            Some(create_output(path)?)
        }
        None => None,
    };

    filter.run(ModeIo::Analyze(AnalyzeIo {
        even: &mut even,
        odd: &mut odd,
        motion_in: &mut motion_in,
        high: &mut high,
        frame_types: &mut frame_types,
        motion_out: &mut motion_out,
        prediction: prediction.as_mut().map(|w| w as &mut dyn Write),
    }))
}

fn synthesize(args: SynthesizeArgs) -> mctf::Result<()> {
    let config = build_config(&args.common)?;
    let mut filter = TemporalFilter::new(config)?;

    let mut even = open_input(&args.common.even_fn)?;
    let mut high = open_input(&args.common.high_fn)?;
    let mut motion_in = open_input(&args.common.motion_in_fn)?;
    let mut frame_types = open_input(&args.common.frame_types_fn)?;
    let mut odd = create_output(&args.common.odd_fn)?;
    let mut prediction = match &args.common.prediction_fn {
        Some(path) => {
            info!("writing predictions to \"{}\"", path.display());
            Some(create_output(path)?)
        }
        None => None,
    };

    filter.run(ModeIo::Synthesize(SynthesizeIo {
        even: &mut even,
        high: &mut high,
        motion_in: &mut motion_in,
        frame_types: &mut frame_types,
        odd: &mut odd,
        prediction: prediction.as_mut().map(|w| w as &mut dyn Write),
    }))
}

fn run(cli: Cli) -> mctf::Result<()> {
    init(InitConfig {
        max_threads: cli.threads,
        verbose: cli.verbose,
        debug: cli.debug,
    })?;

    match cli.command {
        Commands::Analyze(args) => analyze(args),
        Commands::Synthesize(args) => synthesize(args),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("mctf: {e}");
            ExitCode::FAILURE
        }
    }
}
