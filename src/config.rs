//! Configuration for the temporal filtering core
//!
//! All geometry knobs of the pipeline live here: picture dimensions, block
//! layout, overlap, motion search radius and subpixel accuracy, plus the
//! `always_B` election override. `validate()` enforces the rules the rest of
//! the crate relies on, so a validated configuration never produces a
//! mis-tiled subband scatter or an odd chroma dimension.

use crate::error::{Error, Result};
use crate::plane::COMPONENTS;

/// Geometry and policy for one analysis or synthesis run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MctfConfig {
    /// Overlap border between blocks in pixels; zero or a power of two
    pub block_overlap: usize,
    /// Block side in pixels; a power of two
    pub block_size: usize,
    /// Luma height in pixels
    pub pixels_in_y: usize,
    /// Luma width in pixels
    pub pixels_in_x: usize,
    /// Total number of frames; must be odd
    pub pictures: usize,
    /// Motion search radius; only informs the halo size
    pub search_range: usize,
    /// Subpixel expansion levels; vectors address a `2^s`-finer grid
    pub subpixel_accuracy: usize,
    /// Force every predicted frame to be coded as B
    pub always_b: bool,
}

impl Default for MctfConfig {
    fn default() -> Self {
        MctfConfig {
            block_overlap: 0,
            block_size: 16,
            pixels_in_y: 288,
            pixels_in_x: 352,
            pictures: 33,
            search_range: 4,
            subpixel_accuracy: 0,
            always_b: false,
        }
    }
}

impl MctfConfig {
    /// Start building a configuration from the defaults
    pub fn builder() -> MctfConfigBuilder {
        MctfConfigBuilder {
            config: MctfConfig::default(),
        }
    }

    /// Check the geometry rules; every constructor path runs this.
    pub fn validate(&self) -> Result<()> {
        if self.pixels_in_y == 0 || self.pixels_in_x == 0 {
            return Err(Error::geometry("picture dimensions must be nonzero"));
        }
        if !self.block_size.is_power_of_two() || self.block_size < 2 {
            return Err(Error::geometry(format!(
                "block_size ({}) must be a power of two of at least 2",
                self.block_size
            )));
        }
        if self.pixels_in_y % self.block_size != 0 {
            return Err(Error::geometry(format!(
                "pixels_in_y ({}) is not a multiple of block_size ({})",
                self.pixels_in_y, self.block_size
            )));
        }
        if self.pixels_in_x % self.block_size != 0 {
            return Err(Error::geometry(format!(
                "pixels_in_x ({}) is not a multiple of block_size ({})",
                self.pixels_in_x, self.block_size
            )));
        }
        if self.pictures % 2 == 0 {
            return Err(Error::config(format!(
                "pictures ({}) must be odd",
                self.pictures
            )));
        }
        if self.block_overlap != 0 {
            if !self.block_overlap.is_power_of_two() {
                return Err(Error::config(format!(
                    "block_overlaping ({}) must be zero or a power of two",
                    self.block_overlap
                )));
            }
            if self.block_overlap > self.block_size {
                return Err(Error::config(format!(
                    "block_overlaping ({}) must not exceed block_size ({})",
                    self.block_overlap, self.block_size
                )));
            }
        }
        Ok(())
    }

    /// Block grid height
    pub fn blocks_in_y(&self) -> usize {
        self.pixels_in_y / self.block_size
    }

    /// Block grid width
    pub fn blocks_in_x(&self) -> usize {
        self.pixels_in_x / self.block_size
    }

    /// Number of frame pairs to process
    pub fn pairs(&self) -> usize {
        self.pictures / 2
    }

    /// Reference halo at pixel resolution: `4 * search_range + block_overlap`
    pub fn picture_border(&self) -> usize {
        4 * self.search_range + self.block_overlap
    }

    /// Luma height on the subpixel-expanded working grid
    pub fn scaled_height(&self) -> usize {
        self.pixels_in_y << self.subpixel_accuracy
    }

    /// Luma width on the subpixel-expanded working grid
    pub fn scaled_width(&self) -> usize {
        self.pixels_in_x << self.subpixel_accuracy
    }

    /// Reference halo on the working grid
    pub fn scaled_border(&self) -> usize {
        self.picture_border() << self.subpixel_accuracy
    }

    /// On-disk 4:2:0 dimensions of one component
    pub fn component_dims(&self, c: usize) -> (usize, usize) {
        debug_assert!(c < COMPONENTS);
        if c == 0 {
            (self.pixels_in_y, self.pixels_in_x)
        } else {
            (self.pixels_in_y / 2, self.pixels_in_x / 2)
        }
    }
}

/// Builder for [`MctfConfig`]
#[derive(Debug, Clone)]
pub struct MctfConfigBuilder {
    config: MctfConfig,
}

impl MctfConfigBuilder {
    /// Set the luma dimensions (width, height)
    pub fn dimensions(mut self, width: usize, height: usize) -> Self {
        self.config.pixels_in_x = width;
        self.config.pixels_in_y = height;
        self
    }

    /// Set the block side
    pub fn block_size(mut self, block_size: usize) -> Self {
        self.config.block_size = block_size;
        self
    }

    /// Set the overlap border
    pub fn block_overlap(mut self, block_overlap: usize) -> Self {
        self.config.block_overlap = block_overlap;
        self
    }

    /// Set the total frame count
    pub fn pictures(mut self, pictures: usize) -> Self {
        self.config.pictures = pictures;
        self
    }

    /// Set the motion search radius
    pub fn search_range(mut self, search_range: usize) -> Self {
        self.config.search_range = search_range;
        self
    }

    /// Set the subpixel accuracy
    pub fn subpixel_accuracy(mut self, subpixel_accuracy: usize) -> Self {
        self.config.subpixel_accuracy = subpixel_accuracy;
        self
    }

    /// Force B elections
    pub fn always_b(mut self, always_b: bool) -> Self {
        self.config.always_b = always_b;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<MctfConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MctfConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.blocks_in_y(), 18);
        assert_eq!(config.blocks_in_x(), 22);
        assert_eq!(config.pairs(), 16);
        assert_eq!(config.picture_border(), 16);
    }

    #[test]
    fn test_builder() {
        let config = MctfConfig::builder()
            .dimensions(64, 32)
            .block_size(16)
            .block_overlap(4)
            .pictures(5)
            .subpixel_accuracy(1)
            .build()
            .unwrap();
        assert_eq!(config.blocks_in_y(), 2);
        assert_eq!(config.blocks_in_x(), 4);
        assert_eq!(config.scaled_height(), 64);
        assert_eq!(config.scaled_width(), 128);
        assert_eq!(config.component_dims(1), (16, 32));
    }

    #[test]
    fn test_rejects_non_divisible_dimensions() {
        let config = MctfConfig::builder().dimensions(100, 96).build();
        assert!(config.is_err());
    }

    #[test]
    fn test_rejects_even_picture_count() {
        let config = MctfConfig::builder()
            .dimensions(64, 32)
            .pictures(4)
            .build();
        assert!(config.is_err());
    }

    #[test]
    fn test_rejects_non_power_of_two_overlap() {
        let config = MctfConfig::builder()
            .dimensions(64, 32)
            .block_overlap(3)
            .build();
        assert!(config.is_err());

        let config = MctfConfig::builder()
            .dimensions(64, 32)
            .block_overlap(32)
            .build();
        assert!(config.is_err()); // exceeds block_size

        let config = MctfConfig::builder()
            .dimensions(64, 32)
            .block_overlap(8)
            .build();
        assert!(config.is_ok());
    }

    #[test]
    fn test_scaled_border() {
        let config = MctfConfig::builder()
            .dimensions(64, 32)
            .block_overlap(4)
            .search_range(2)
            .subpixel_accuracy(1)
            .build()
            .unwrap();
        assert_eq!(config.picture_border(), 12);
        assert_eq!(config.scaled_border(), 24);
    }
}
