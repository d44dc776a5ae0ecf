//! Analysis/synthesis driver for the temporal transform
//!
//! One algorithmic core serves both directions, parameterized by [`ModeIo`]:
//!
//! - **Analysis** reads even and odd pictures plus a motion field per pair,
//!   predicts the odd picture from its two even neighbours, and writes the
//!   high-band stream, the frame-type stream and the surviving motion
//!   fields.
//! - **Synthesis** reads the high band, the frame types and the motion
//!   fields, recomputes the identical prediction and writes the
//!   reconstructed odd pictures.
//!
//! ## Per-pair state machine
//!
//! ```text
//! INIT: read even[0] into reference[0]; expand chroma; expand subpixel; fill borders
//! loop i in 0..pictures/2:
//!   read odd[i] (analysis) or high[i] (synthesis, de-biased by -128)
//!   read even[i+1] into reference[1]; expand; fill borders
//!   read mv[i]
//!   OBMC predict -> prediction; clip; reduce to 4:2:0
//!   decide + write (analysis) or reconstruct + write (synthesis)
//!   swap reference[0] <-> reference[1]
//! ```
//!
//! Every buffer is allocated in [`TemporalFilter::new`] and reused across
//! pairs; the reference window rotation is an O(1) swap of the two slots.

use std::io::{ErrorKind, Read, Write};

use tracing::{debug, info};

use crate::config::MctfConfig;
use crate::decide::{elect, CostEstimate, FrameType};
use crate::dwt::Dwt2d;
use crate::entropy::{estimated_size, SymbolHistogram};
use crate::error::{Error, Result};
use crate::io::PlaneCodec;
use crate::motion::MotionField;
use crate::plane::{clip_s8, clip_u8, Picture, COMPONENTS};
use crate::predict::ObmcPredictor;
use crate::resample::{expand_chroma, interpolate_subpixel, reduce_chroma, reduce_subpixel};

// ─────────────────────────────────────────────────────────────────────────────
// Stream bundles
// ─────────────────────────────────────────────────────────────────────────────

/// Streams consumed and produced by an analysis run
pub struct AnalyzeIo<'a> {
    /// Even pictures, raw planar 4:2:0 (read)
    pub even: &'a mut dyn Read,
    /// Odd pictures, raw planar 4:2:0 (read)
    pub odd: &'a mut dyn Read,
    /// Motion fields (read)
    pub motion_in: &'a mut dyn Read,
    /// High-band pictures (written)
    pub high: &'a mut dyn Write,
    /// One 'I'/'B' byte per odd picture (written)
    pub frame_types: &'a mut dyn Write,
    /// Motion fields surviving the election (written)
    pub motion_out: &'a mut dyn Write,
    /// Optional tap for the subsampled prediction pictures
    pub prediction: Option<&'a mut dyn Write>,
}

/// Streams consumed and produced by a synthesis run
pub struct SynthesizeIo<'a> {
    /// Even pictures, raw planar 4:2:0 (read)
    pub even: &'a mut dyn Read,
    /// High-band pictures (read)
    pub high: &'a mut dyn Read,
    /// Motion fields (read)
    pub motion_in: &'a mut dyn Read,
    /// One 'I'/'B' byte per odd picture (read)
    pub frame_types: &'a mut dyn Read,
    /// Reconstructed odd pictures (written)
    pub odd: &'a mut dyn Write,
    /// Optional tap for the subsampled prediction pictures
    pub prediction: Option<&'a mut dyn Write>,
}

/// Transform direction plus its streams
pub enum ModeIo<'a> {
    /// Decorrelate: odd pictures in, high band out
    Analyze(AnalyzeIo<'a>),
    /// Correlate: high band in, odd pictures out
    Synthesize(SynthesizeIo<'a>),
}

impl<'a> ModeIo<'a> {
    fn name(&self) -> &'static str {
        match self {
            ModeIo::Analyze(_) => "analyze",
            ModeIo::Synthesize(_) => "synthesize",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Temporal filter
// ─────────────────────────────────────────────────────────────────────────────

/// The MCTF decorrelation/reconstruction core
///
/// Owns every plane and motion buffer for the whole run; the OBMC predictor
/// owns only its per-component scratch.
pub struct TemporalFilter {
    config: MctfConfig,
    dwt: Dwt2d,
    predictor: ObmcPredictor,
    codec: PlaneCodec,
    /// Rolling pair: slot 0 precedes the current odd picture, slot 1 follows
    reference: [Picture; 2],
    /// The true odd picture (analysis) or its reconstruction (synthesis)
    predicted: Picture,
    /// Motion-compensated estimate at working resolution, then reduced in
    /// place to 4:2:0
    prediction: Picture,
    /// Signed residue at 4:2:0 resolution
    residue: Picture,
    mv: MotionField,
    zero_mv: MotionField,
    predicted_hist: SymbolHistogram,
    residue_hist: SymbolHistogram,
    motion_hist: SymbolHistogram,
}

impl TemporalFilter {
    /// Validate the configuration and allocate every buffer for the run.
    pub fn new(config: MctfConfig) -> Result<Self> {
        config.validate()?;

        let sh = config.scaled_height();
        let sw = config.scaled_width();
        let sb = config.scaled_border();
        let disk_dims = [
            config.component_dims(0),
            config.component_dims(1),
            config.component_dims(2),
        ];
        let blocks_y = config.blocks_in_y();
        let blocks_x = config.blocks_in_x();

        info!(
            "temporal filter: {}x{} pixels, {}x{} blocks, border {}",
            config.pixels_in_x,
            config.pixels_in_y,
            blocks_x,
            blocks_y,
            config.picture_border()
        );

        Ok(TemporalFilter {
            dwt: Dwt2d::new(sh.max(sw)),
            predictor: ObmcPredictor::new(&config),
            codec: PlaneCodec::new(config.pixels_in_x),
            reference: [
                Picture::new([(sh, sw); COMPONENTS], sb),
                Picture::new([(sh, sw); COMPONENTS], sb),
            ],
            predicted: Picture::new(disk_dims, 0),
            prediction: Picture::new([(sh, sw); COMPONENTS], 0),
            residue: Picture::new(disk_dims, 0),
            mv: MotionField::new(blocks_y, blocks_x),
            zero_mv: MotionField::new(blocks_y, blocks_x),
            predicted_hist: SymbolHistogram::new(),
            residue_hist: SymbolHistogram::new(),
            motion_hist: SymbolHistogram::new(),
            config,
        })
    }

    /// Geometry in use
    pub fn config(&self) -> &MctfConfig {
        &self.config
    }

    /// Run the whole transform over the given streams.
    pub fn run(&mut self, mut io: ModeIo) -> Result<()> {
        info!("{}: processing {} picture pairs", io.name(), self.config.pairs());

        self.load_reference(0, even_stream(&mut io), 0)?;

        for i in 0..self.config.pairs() {
            match &mut io {
                ModeIo::Analyze(streams) => {
                    debug!("reading odd picture {}", i);
                    self.read_predicted(streams.odd, i)?;
                }
                ModeIo::Synthesize(streams) => {
                    debug!("reading high-band picture {}", i);
                    self.read_residue(streams.high, i)?;
                }
            }

            debug!("reading even picture {}", i + 1);
            self.load_reference(1, even_stream(&mut io), i + 1)?;

            debug!("reading motion field {}", i);
            self.read_motion(motion_stream(&mut io), i)?;

            self.compute_prediction();
            self.write_prediction_tap(&mut io)?;

            match &mut io {
                ModeIo::Analyze(streams) => self.decide_and_write(streams, i)?,
                ModeIo::Synthesize(streams) => self.reconstruct_and_write(streams, i)?,
            }

            self.reference.swap(0, 1);
        }

        flush(&mut io)
    }

    /// Read a 4:2:0 picture into a reference slot and expand it to the
    /// working grid: chroma to luma size, everything to subpixel
    /// resolution, halo filled by edge replication.
    fn load_reference(&mut self, slot: usize, reader: &mut (dyn Read + '_), index: usize) -> Result<()> {
        let h = self.config.pixels_in_y;
        let w = self.config.pixels_in_x;
        for c in 0..COMPONENTS {
            let (ch, cw) = self.config.component_dims(c);
            self.codec
                .read_plane(reader, self.reference[slot].plane_mut(c), ch, cw, "even", index)?;
        }
        for c in 1..COMPONENTS {
            expand_chroma(&mut self.dwt, self.reference[slot].plane_mut(c), h, w);
        }
        for c in 0..COMPONENTS {
            interpolate_subpixel(
                &mut self.dwt,
                self.reference[slot].plane_mut(c),
                h,
                w,
                self.config.subpixel_accuracy,
            );
            self.reference[slot].plane_mut(c).fill_border();
        }
        Ok(())
    }

    fn read_predicted(&mut self, reader: &mut (dyn Read + '_), picture: usize) -> Result<()> {
        for c in 0..COMPONENTS {
            let (ch, cw) = self.config.component_dims(c);
            self.codec
                .read_plane(reader, self.predicted.plane_mut(c), ch, cw, "odd", picture)?;
        }
        Ok(())
    }

    /// Read one high-band picture and de-bias it to signed residue samples.
    fn read_residue(&mut self, reader: &mut (dyn Read + '_), picture: usize) -> Result<()> {
        for c in 0..COMPONENTS {
            let (ch, cw) = self.config.component_dims(c);
            self.codec
                .read_plane(reader, self.residue.plane_mut(c), ch, cw, "high", picture)?;
            let plane = self.residue.plane_mut(c);
            for y in 0..ch {
                for sample in plane.row_mut(y)[..cw].iter_mut() {
                    *sample -= 128;
                }
            }
        }
        Ok(())
    }

    fn read_motion(&mut self, reader: &mut (dyn Read + '_), picture: usize) -> Result<()> {
        self.mv.read_from(reader).map_err(|e| match e {
            Error::Io(io) if io.kind() == ErrorKind::UnexpectedEof => Error::ShortRead {
                stream: "motion_in",
                picture,
            },
            other => other,
        })
    }

    /// Run OBMC at working resolution, then reduce the prediction in place
    /// to the on-disk 4:2:0 geometry.
    fn compute_prediction(&mut self) {
        self.predictor
            .predict(&mut self.prediction, &self.reference, &self.mv);

        let h = self.config.pixels_in_y;
        let w = self.config.pixels_in_x;
        for c in 0..COMPONENTS {
            reduce_subpixel(
                &mut self.dwt,
                self.prediction.plane_mut(c),
                h,
                w,
                self.config.subpixel_accuracy,
            );
        }
        for c in 1..COMPONENTS {
            reduce_chroma(&mut self.dwt, self.prediction.plane_mut(c), h, w);
        }
    }

    fn write_prediction_tap(&mut self, io: &mut ModeIo) -> Result<()> {
        let tap = match io {
            ModeIo::Analyze(streams) => streams.prediction.as_mut(),
            ModeIo::Synthesize(streams) => streams.prediction.as_mut(),
        };
        if let Some(writer) = tap {
            for c in 0..COMPONENTS {
                let (ch, cw) = self.config.component_dims(c);
                self.codec
                    .write_plane(&mut **writer, self.prediction.plane(c), ch, cw)?;
            }
        }
        Ok(())
    }

    /// Analysis tail: residue, rate estimates, election, stream writes.
    fn decide_and_write(&mut self, streams: &mut AnalyzeIo, picture: usize) -> Result<()> {
        for c in 0..COMPONENTS {
            let (ch, cw) = self.config.component_dims(c);
            for y in 0..ch {
                let truth = &self.predicted.plane(c).row(y)[..cw];
                let estimate = &self.prediction.plane(c).row(y)[..cw];
                let out = &mut self.residue.plane_mut(c).row_mut(y)[..cw];
                for x in 0..cw {
                    out[x] = clip_s8(truth[x] as i32 - estimate[x] as i32);
                }
            }
        }

        let frame_type = if self.config.always_b {
            FrameType::B
        } else {
            let h = self.config.pixels_in_y;
            let w = self.config.pixels_in_x;

            self.motion_hist.clear();
            self.mv.accumulate_histogram(&mut self.motion_hist);
            self.predicted_hist.clear();
            self.predicted_hist.add_plane(self.predicted.plane(0), h, w, 0);
            self.residue_hist.clear();
            self.residue_hist.add_plane(self.residue.plane(0), h, w, 128);

            let cost = CostEstimate {
                predicted: estimated_size(self.predicted_hist.entropy(), h * w),
                residue: estimated_size(self.residue_hist.entropy(), h * w),
                motion: estimated_size(
                    self.motion_hist.entropy(),
                    self.config.blocks_in_y() * self.config.blocks_in_x(),
                ),
            };
            debug!(
                "picture {}: predicted_size={} residue_size={} motion_size={}",
                picture, cost.predicted, cost.residue, cost.motion
            );
            elect(cost)
        };

        frame_type.write_to(streams.frame_types)?;
        debug!("picture {}: elected {:?}", picture, frame_type);

        match frame_type {
            FrameType::I => {
                // The high band carries the raw picture in this slot, and
                // the surviving motion field is all zeros.
                for c in 0..COMPONENTS {
                    let (ch, cw) = self.config.component_dims(c);
                    for y in 0..ch {
                        let src = &self.predicted.plane(c).row(y)[..cw];
                        self.residue.plane_mut(c).row_mut(y)[..cw].copy_from_slice(src);
                    }
                    self.codec
                        .write_plane(streams.high, self.residue.plane(c), ch, cw)?;
                }
                self.zero_mv.write_to(streams.motion_out)?;
            }
            FrameType::B => {
                for c in 0..COMPONENTS {
                    let (ch, cw) = self.config.component_dims(c);
                    let plane = self.residue.plane_mut(c);
                    for y in 0..ch {
                        for sample in plane.row_mut(y)[..cw].iter_mut() {
                            *sample = clip_u8(*sample as i32 + 128);
                        }
                    }
                    self.codec
                        .write_plane(streams.high, self.residue.plane(c), ch, cw)?;
                }
                self.mv.write_to(streams.motion_out)?;
            }
        }
        Ok(())
    }

    /// Synthesis tail: read the type, combine, write the odd picture.
    fn reconstruct_and_write(&mut self, streams: &mut SynthesizeIo, picture: usize) -> Result<()> {
        let frame_type = FrameType::read_from(streams.frame_types).map_err(|e| match e {
            Error::Io(io) if io.kind() == ErrorKind::UnexpectedEof => Error::ShortRead {
                stream: "frame_types",
                picture,
            },
            other => other,
        })?;
        debug!("picture {}: type {:?}", picture, frame_type);

        for c in 0..COMPONENTS {
            let (ch, cw) = self.config.component_dims(c);
            for y in 0..ch {
                let residue = &self.residue.plane(c).row(y)[..cw];
                let estimate = &self.prediction.plane(c).row(y)[..cw];
                let out = &mut self.predicted.plane_mut(c).row_mut(y)[..cw];
                match frame_type {
                    // I slots hold the raw picture: the +128 undoes the read
                    // de-bias exactly, so no clip is applied.
                    FrameType::I => {
                        for x in 0..cw {
                            out[x] = residue[x] + 128;
                        }
                    }
                    FrameType::B => {
                        for x in 0..cw {
                            out[x] = clip_u8(residue[x] as i32 + estimate[x] as i32);
                        }
                    }
                }
            }
        }

        debug!("writing odd picture {}", picture);
        for c in 0..COMPONENTS {
            let (ch, cw) = self.config.component_dims(c);
            self.codec
                .write_plane(streams.odd, self.predicted.plane(c), ch, cw)?;
        }
        Ok(())
    }
}

fn even_stream<'s, 'a>(io: &'s mut ModeIo<'a>) -> &'s mut (dyn Read + 'a) {
    match io {
        ModeIo::Analyze(streams) => &mut *streams.even,
        ModeIo::Synthesize(streams) => &mut *streams.even,
    }
}

fn motion_stream<'s, 'a>(io: &'s mut ModeIo<'a>) -> &'s mut (dyn Read + 'a) {
    match io {
        ModeIo::Analyze(streams) => &mut *streams.motion_in,
        ModeIo::Synthesize(streams) => &mut *streams.motion_in,
    }
}

fn flush(io: &mut ModeIo) -> Result<()> {
    match io {
        ModeIo::Analyze(streams) => {
            streams.high.flush()?;
            streams.frame_types.flush()?;
            streams.motion_out.flush()?;
            if let Some(writer) = streams.prediction.as_mut() {
                writer.flush()?;
            }
        }
        ModeIo::Synthesize(streams) => {
            streams.odd.flush()?;
            if let Some(writer) = streams.prediction.as_mut() {
                writer.flush()?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn tiny_config() -> MctfConfig {
        MctfConfig::builder()
            .dimensions(16, 16)
            .block_size(8)
            .pictures(3)
            .search_range(1)
            .build()
            .unwrap()
    }

    fn flat_frame(config: &MctfConfig, luma: u8, chroma: u8) -> Vec<u8> {
        let (h, w) = config.component_dims(0);
        let (ch, cw) = config.component_dims(1);
        let mut frame = vec![luma; h * w];
        frame.extend(std::iter::repeat(chroma).take(2 * ch * cw));
        frame
    }

    fn frame_bytes(config: &MctfConfig) -> usize {
        let (h, w) = config.component_dims(0);
        let (ch, cw) = config.component_dims(1);
        h * w + 2 * ch * cw
    }

    fn motion_bytes(config: &MctfConfig) -> usize {
        4 * config.blocks_in_y() * config.blocks_in_x()
    }

    #[test]
    fn test_analysis_of_identical_frames_writes_biased_zero_residue() {
        // Zero motion, equal even and odd frames: the residue is exactly
        // zero, stored as 128, and the all-B override keeps the election out
        // of the way.
        let config = MctfConfig::builder()
            .dimensions(16, 16)
            .block_size(8)
            .pictures(3)
            .search_range(1)
            .always_b(true)
            .build()
            .unwrap();

        let gray = flat_frame(&config, 90, 110);
        let mut even = Cursor::new([gray.clone(), gray.clone()].concat());
        let mut odd = Cursor::new(gray.clone());
        let mut motion_in = Cursor::new(vec![0u8; motion_bytes(&config)]);
        let mut high = Vec::new();
        let mut frame_types = Vec::new();
        let mut motion_out = Vec::new();

        let mut filter = TemporalFilter::new(config.clone()).unwrap();
        filter
            .run(ModeIo::Analyze(AnalyzeIo {
                even: &mut even,
                odd: &mut odd,
                motion_in: &mut motion_in,
                high: &mut high,
                frame_types: &mut frame_types,
                motion_out: &mut motion_out,
                prediction: None,
            }))
            .unwrap();

        assert_eq!(frame_types, b"B");
        assert_eq!(high.len(), frame_bytes(&config));
        assert!(high.iter().all(|&b| b == 128));
        assert_eq!(motion_out, vec![0u8; motion_bytes(&config)]);
    }

    #[test]
    fn test_flat_scene_elects_i_with_zero_entropies() {
        // All entropies are zero, so predicted_size (0) <= residue_size +
        // motion_size (0) elects I and the high band carries the raw odd
        // picture.
        let config = tiny_config();
        let gray = flat_frame(&config, 128, 128);
        let mut even = Cursor::new([gray.clone(), gray.clone()].concat());
        let mut odd = Cursor::new(gray.clone());
        let mut motion_in = Cursor::new(vec![0u8; motion_bytes(&config)]);
        let mut high = Vec::new();
        let mut frame_types = Vec::new();
        let mut motion_out = Vec::new();

        let mut filter = TemporalFilter::new(config.clone()).unwrap();
        filter
            .run(ModeIo::Analyze(AnalyzeIo {
                even: &mut even,
                odd: &mut odd,
                motion_in: &mut motion_in,
                high: &mut high,
                frame_types: &mut frame_types,
                motion_out: &mut motion_out,
                prediction: None,
            }))
            .unwrap();

        assert_eq!(frame_types, b"I");
        assert_eq!(high, gray);
        assert_eq!(motion_out, vec![0u8; motion_bytes(&config)]);
    }

    #[test]
    fn test_synthesis_of_i_frame_carries_the_high_band_through() {
        let config = tiny_config();
        let gray = flat_frame(&config, 90, 110);
        let stored: Vec<u8> = (0..frame_bytes(&config))
            .map(|i| (i % 251) as u8)
            .collect();

        let mut even = Cursor::new([gray.clone(), gray.clone()].concat());
        let mut high = Cursor::new(stored.clone());
        let mut motion_in = Cursor::new(vec![0u8; motion_bytes(&config)]);
        let mut frame_types = Cursor::new(b"I".to_vec());
        let mut odd = Vec::new();

        let mut filter = TemporalFilter::new(config.clone()).unwrap();
        filter
            .run(ModeIo::Synthesize(SynthesizeIo {
                even: &mut even,
                high: &mut high,
                motion_in: &mut motion_in,
                frame_types: &mut frame_types,
                odd: &mut odd,
                prediction: None,
            }))
            .unwrap();

        // -128 at read, +128 at reconstruction: byte-exact carry-through.
        assert_eq!(odd, stored);
    }

    #[test]
    fn test_truncated_frame_type_stream_is_fatal() {
        let config = tiny_config();
        let gray = flat_frame(&config, 90, 110);
        let mut even = Cursor::new([gray.clone(), gray.clone()].concat());
        let mut high = Cursor::new(vec![128u8; frame_bytes(&config)]);
        let mut motion_in = Cursor::new(vec![0u8; motion_bytes(&config)]);
        let mut frame_types = Cursor::new(Vec::new());
        let mut odd = Vec::new();

        let mut filter = TemporalFilter::new(config.clone()).unwrap();
        let err = filter
            .run(ModeIo::Synthesize(SynthesizeIo {
                even: &mut even,
                high: &mut high,
                motion_in: &mut motion_in,
                frame_types: &mut frame_types,
                odd: &mut odd,
                prediction: None,
            }))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ShortRead {
                stream: "frame_types",
                ..
            }
        ));
    }

    #[test]
    fn test_truncated_even_stream_is_fatal() {
        let config = tiny_config();
        let mut even = Cursor::new(vec![0u8; frame_bytes(&config) / 2]);
        let mut odd = Cursor::new(Vec::new());
        let mut motion_in = Cursor::new(Vec::new());
        let mut high = Vec::new();
        let mut frame_types = Vec::new();
        let mut motion_out = Vec::new();

        let mut filter = TemporalFilter::new(config.clone()).unwrap();
        let err = filter
            .run(ModeIo::Analyze(AnalyzeIo {
                even: &mut even,
                odd: &mut odd,
                motion_in: &mut motion_in,
                high: &mut high,
                frame_types: &mut frame_types,
                motion_out: &mut motion_out,
                prediction: None,
            }))
            .unwrap_err();
        assert!(matches!(err, Error::ShortRead { stream: "even", .. }));
    }
}
