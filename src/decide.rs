//! Frame-type election
//!
//! After prediction and residue computation the analyzer picks, per odd
//! frame, between coding the frame directly (I) and coding the
//! motion-compensated residual plus its motion field (B). The comparison is
//! a byte-count heuristic on marginal entropies: luma-only entropies scaled
//! by luma area for the textures, motion entropy scaled by the block count.
//! Chroma is deliberately not part of the estimate.

use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::error::Result;

/// Per-frame coding decision, one ASCII byte in the type stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// Directly coded frame; the high band carries the raw picture
    I,
    /// Bidirectionally predicted frame; the high band carries the residue
    B,
}

impl FrameType {
    /// Stream byte for this type
    pub fn to_byte(self) -> u8 {
        match self {
            FrameType::I => b'I',
            FrameType::B => b'B',
        }
    }

    /// Decode a stream byte; anything that is not `'I'` decodes as B, which
    /// is how the reference decoder reads the stream.
    pub fn from_byte(byte: u8) -> Self {
        if byte == b'I' {
            FrameType::I
        } else {
            FrameType::B
        }
    }

    /// Append this type to the stream
    pub fn write_to<W: Write + ?Sized>(self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.to_byte())?;
        Ok(())
    }

    /// Read the next type from the stream
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        Ok(Self::from_byte(reader.read_u8()?))
    }
}

/// Estimated compressed sizes feeding the election
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostEstimate {
    /// Entropy-estimated size of the raw predicted frame (luma)
    pub predicted: u64,
    /// Entropy-estimated size of the residue (luma)
    pub residue: u64,
    /// Entropy-estimated size of the motion field
    pub motion: u64,
}

/// Elect the frame type: I when coding the frame directly is estimated to
/// cost no more than residue plus motion.
pub fn elect(cost: CostEstimate) -> FrameType {
    if cost.predicted <= cost.residue + cost.motion {
        FrameType::I
    } else {
        FrameType::B
    }
}
