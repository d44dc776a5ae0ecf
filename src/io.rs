//! Byte-stream adapters for texture planes and stream files
//!
//! Texture samples live on disk as unsigned bytes and in memory as signed
//! 16-bit working samples. The codec widens on read and saturates to
//! [0, 255] on write, so nothing out of range ever reaches a stream. A
//! truncated frame surfaces as [`Error::ShortRead`] carrying the stream name
//! and picture index.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::plane::{clip_u8, Plane};

/// Open a stream file for reading, wrapping it in a buffered reader.
pub fn open_input(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| Error::FileOpen {
            path: path.to_path_buf(),
            source,
        })
}

/// Create (truncate) a stream file for writing, wrapping it in a buffered
/// writer.
pub fn create_output(path: &Path) -> Result<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| Error::FileOpen {
            path: path.to_path_buf(),
            source,
        })
}

/// Plane reader/writer with a once-allocated row buffer
#[derive(Debug)]
pub struct PlaneCodec {
    row: Vec<u8>,
}

impl PlaneCodec {
    /// Create a codec able to move rows up to `max_width` samples wide.
    pub fn new(max_width: usize) -> Self {
        PlaneCodec {
            row: vec![0; max_width],
        }
    }

    /// Read the top-left `h x w` region of `plane` from a byte stream,
    /// widening to working samples.
    pub fn read_plane<R: Read + ?Sized>(
        &mut self,
        reader: &mut R,
        plane: &mut Plane,
        h: usize,
        w: usize,
        stream: &'static str,
        picture: usize,
    ) -> Result<()> {
        for y in 0..h {
            let buf = &mut self.row[..w];
            reader.read_exact(buf).map_err(|e| {
                if e.kind() == ErrorKind::UnexpectedEof {
                    Error::ShortRead { stream, picture }
                } else {
                    Error::Io(e)
                }
            })?;
            for (dst, &src) in plane.row_mut(y)[..w].iter_mut().zip(buf.iter()) {
                *dst = src as i16;
            }
        }
        Ok(())
    }

    /// Write the top-left `h x w` region of `plane` to a byte stream,
    /// saturating every sample to [0, 255].
    pub fn write_plane<W: Write + ?Sized>(
        &mut self,
        writer: &mut W,
        plane: &Plane,
        h: usize,
        w: usize,
    ) -> Result<()> {
        for y in 0..h {
            let src = &plane.row(y)[..w];
            for (dst, &sample) in self.row[..w].iter_mut().zip(src.iter()) {
                *dst = clip_u8(sample as i32) as u8;
            }
            writer.write_all(&self.row[..w])?;
        }
        Ok(())
    }
}
