//! Chroma and subpixel resampling on top of the wavelet operator
//!
//! Both directions piggy-back on the 5/3 transform: upsampling places the
//! existing samples in the top-left quadrant of a doubled canvas, zeroes the
//! three high-frequency quadrants and runs one level of synthesis;
//! downsampling runs one level of analysis and keeps the low-low quadrant.
//!
//! Subpixel interpolation repeats the same quadrant step once per accuracy
//! level, doubling the grid each time. The per-level zero fill is written
//! exactly the way the reference pipeline performs it: the whole area
//! outside the current top-left quadrant is cleared before each synthesis.

use crate::dwt::Dwt2d;
use crate::plane::Plane;

/// Zero everything outside the top-left `h/2 x w/2` quadrant of the
/// `h x w` region.
fn zero_high_quadrants(plane: &mut Plane, h: usize, w: usize) {
    for y in 0..h / 2 {
        plane.row_mut(y)[w / 2..w].fill(0);
    }
    for y in h / 2..h {
        plane.row_mut(y)[..w].fill(0);
    }
}

/// Upsample a 4:2:0 chroma plane to luma resolution.
///
/// The `luma_h/2 x luma_w/2` chroma rectangle must already sit in the
/// top-left of the plane; it is interpreted as the LL band of a one-level
/// decomposition with zero high bands.
pub fn expand_chroma(dwt: &mut Dwt2d, plane: &mut Plane, luma_h: usize, luma_w: usize) {
    zero_high_quadrants(plane, luma_h, luma_w);
    dwt.synthesize(plane, luma_h, luma_w, 1);
}

/// Downsample a luma-sized chroma plane back to 4:2:0.
///
/// After this call the `luma_h/2 x luma_w/2` top-left rectangle holds the
/// reduced plane.
pub fn reduce_chroma(dwt: &mut Dwt2d, plane: &mut Plane, luma_h: usize, luma_w: usize) {
    dwt.analyze(plane, luma_h, luma_w, 1);
}

/// Interpolate a `h x w` plane up to subpixel accuracy `accuracy`.
///
/// Each level doubles the grid: the previous content ends up as the
/// top-left quadrant of the next canvas, the rest is cleared, and one level
/// of synthesis fills the new samples. The caller is responsible for the
/// final border fill.
pub fn interpolate_subpixel(
    dwt: &mut Dwt2d,
    plane: &mut Plane,
    h: usize,
    w: usize,
    accuracy: usize,
) {
    for s in 1..=accuracy {
        let sh = h << s;
        let sw = w << s;
        zero_high_quadrants(plane, sh, sw);
        dwt.synthesize(plane, sh, sw, 1);
    }
}

/// Undo `accuracy` levels of subpixel interpolation by repeated analysis.
///
/// The reduced picture lands in the top-left `h x w` rectangle.
pub fn reduce_subpixel(dwt: &mut Dwt2d, plane: &mut Plane, h: usize, w: usize, accuracy: usize) {
    dwt.analyze(plane, h << accuracy, w << accuracy, accuracy);
}
