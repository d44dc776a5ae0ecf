//! Motion vector fields
//!
//! One field per predicted picture: a signed 8-bit component per block, per
//! prediction direction (previous/next reference) and per axis. Components
//! are expressed in subpixel steps, so a value of 1 moves one sample on the
//! `2^subpixel_accuracy`-times-finer working grid.
//!
//! The on-disk stream is raw `i8` components in `[dir][axis][by][bx]` order,
//! which is exactly the iteration order of the backing tensor.

use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};
use ndarray::Array4;

use crate::entropy::SymbolHistogram;
use crate::error::Result;

/// Prediction direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    /// The even picture preceding the predicted one
    Prev = 0,
    /// The even picture following it
    Next = 1,
}

/// Motion vector axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MvAxis {
    /// Vertical displacement
    Y = 0,
    /// Horizontal displacement
    X = 1,
}

/// A `[dir][axis][by][bx]` field of signed 8-bit motion components
#[derive(Debug, Clone)]
pub struct MotionField {
    mv: Array4<i8>,
}

impl MotionField {
    /// Allocate an all-zero field for a `blocks_in_y x blocks_in_x` grid.
    pub fn new(blocks_in_y: usize, blocks_in_x: usize) -> Self {
        MotionField {
            mv: Array4::zeros((2, 2, blocks_in_y, blocks_in_x)),
        }
    }

    /// Grid height in blocks
    pub fn blocks_in_y(&self) -> usize {
        self.mv.shape()[2]
    }

    /// Grid width in blocks
    pub fn blocks_in_x(&self) -> usize {
        self.mv.shape()[3]
    }

    /// One component of one block's vector
    #[inline]
    pub fn get(&self, dir: Dir, axis: MvAxis, by: usize, bx: usize) -> i8 {
        self.mv[[dir as usize, axis as usize, by, bx]]
    }

    /// Set one component of one block's vector
    #[inline]
    pub fn set(&mut self, dir: Dir, axis: MvAxis, by: usize, bx: usize, value: i8) {
        self.mv[[dir as usize, axis as usize, by, bx]] = value;
    }

    /// Zero the whole field
    pub fn clear(&mut self) {
        self.mv.fill(0);
    }

    /// Read one field from the motion stream.
    pub fn read_from<R: Read + ?Sized>(&mut self, reader: &mut R) -> Result<()> {
        for component in self.mv.iter_mut() {
            *component = reader.read_i8()?;
        }
        Ok(())
    }

    /// Append this field to the motion stream.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        for &component in self.mv.iter() {
            writer.write_i8(component)?;
        }
        Ok(())
    }

    /// Count every component (biased by +128) into a histogram for the rate
    /// decision.
    pub fn accumulate_histogram(&self, hist: &mut SymbolHistogram) {
        for &component in self.mv.iter() {
            hist.record(component as i16, 128);
        }
    }
}
