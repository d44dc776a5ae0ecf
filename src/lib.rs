//! MCTF - Motion-compensated temporal filtering in Rust
//!
//! This crate implements the decorrelation/reconstruction core of a
//! scalable wavelet video codec. Given a sequence of frames split into
//! even (reference) and odd (predicted) subsequences plus one precomputed
//! motion field per odd frame, it either
//!
//! - **analyzes**: predicts each odd frame from its even neighbours with
//!   overlapped block motion compensation (OBMC), elects a frame type (I
//!   or B) with an entropy-based rate heuristic, and emits the
//!   high-temporal-frequency residue stream, or
//! - **synthesizes**: inverts the process and reconstructs the odd frames.
//!
//! # Architecture
//!
//! - `plane`: bordered sample buffers and pictures
//! - `dwt`: reversible 5/3 wavelet transform (blending and resampling)
//! - `resample`: chroma expansion/reduction, subpixel interpolation
//! - `motion`: motion vector fields and their stream format
//! - `predict`: the OBMC prediction engine
//! - `entropy`: symbol histograms and Shannon-entropy rate estimates
//! - `decide`: the I/B frame-type election
//! - `io`: plane and stream byte codecs
//! - `pipeline`: the analysis/synthesis driver
//!
//! # Usage
//!
//! ```rust,ignore
//! use mctf::{MctfConfig, TemporalFilter};
//! use mctf::pipeline::{AnalyzeIo, ModeIo};
//!
//! let config = MctfConfig::builder()
//!     .dimensions(352, 288)
//!     .block_size(16)
//!     .block_overlap(4)
//!     .pictures(33)
//!     .build()?;
//!
//! let mut filter = TemporalFilter::new(config)?;
//! filter.run(ModeIo::Analyze(AnalyzeIo {
//!     even: &mut even,
//!     odd: &mut odd,
//!     motion_in: &mut motion_in,
//!     high: &mut high,
//!     frame_types: &mut frame_types,
//!     motion_out: &mut motion_out,
//!     prediction: None,
//! }))?;
//! ```

pub mod config;
pub mod decide;
pub mod dwt;
pub mod entropy;
pub mod error;
pub mod io;
pub mod motion;
pub mod pipeline;
pub mod plane;
pub mod predict;
pub mod resample;

pub use config::MctfConfig;
pub use error::{Error, Result};
pub use pipeline::TemporalFilter;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runtime initialization options (thread pool and logging)
#[derive(Debug, Clone, Default)]
pub struct InitConfig {
    /// Maximum number of threads for the parallel prediction loop
    pub max_threads: Option<usize>,
    /// Enable info-level logging
    pub verbose: bool,
    /// Enable debug-level logging
    pub debug: bool,
}

/// Initialize the library with the given runtime options
pub fn init(config: InitConfig) -> Result<()> {
    if let Some(threads) = config.max_threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| Error::config(format!("failed to initialize thread pool: {}", e)))?;
    }

    if config.verbose || config.debug {
        let level = if config.debug { "debug" } else { "info" };
        tracing_subscriber::fmt().with_env_filter(level).init();
    }

    Ok(())
}
