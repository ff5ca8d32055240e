//! Image pyramid construction for single-channel images.
//!
//! Samples are converted to `f32` at level 0. Each coarser level uses a 2x2
//! box filter followed by 2x decimation: `dst = (a + b + c + d) / 4`, with
//! width and height halved (rounding down). Under the pixel-center convention
//! this maps level `l` coordinates to level `l + 1` by an exact factor of 0.5.
//!
//! Levels are reference counted, so [`ImagePyramid::slice`] shares pixel
//! data with its parent instead of copying it.

use crate::image::{ImageView, OwnedImage, Pixel};
use crate::util::{AlignError, AlignResult};
use std::ops::Index;
use std::sync::Arc;

/// Shortest side, in pixels, the coarsest pyramid level may have.
pub const MIN_LEVEL_SIDE: usize = 8;

/// Image pyramid, level 0 being the base resolution.
#[derive(Clone, Debug)]
pub struct ImagePyramid {
    levels: Vec<Arc<OwnedImage<f32>>>,
}

impl ImagePyramid {
    /// Builds a pyramid with exactly `num_levels` levels (at least 1).
    ///
    /// Use [`ImagePyramid::max_levels_for_size`] to pick a count the image
    /// supports; building stops early only if a level would become empty.
    pub fn build<P: Pixel>(base: ImageView<'_, P>, num_levels: usize) -> AlignResult<Self> {
        if base.channels() != 1 {
            return Err(AlignError::NotSingleChannel {
                which: "pyramid base",
                channels: base.channels(),
            });
        }
        let num_levels = num_levels.max(1);
        let mut levels = Vec::with_capacity(num_levels);
        levels.push(Arc::new(OwnedImage::from_view(base)?));

        while levels.len() < num_levels {
            let prev = &levels[levels.len() - 1];
            let src = prev.view();
            if src.width() < 2 || src.height() < 2 {
                break;
            }
            levels.push(Arc::new(downsample_box(src)?));
        }

        Ok(Self { levels })
    }

    /// Returns the maximum level count an image of the given size supports.
    ///
    /// The coarsest level keeps its shorter side at or above
    /// [`MIN_LEVEL_SIDE`]. Images smaller than that still get one level.
    pub fn max_levels_for_size(width: usize, height: usize) -> usize {
        let mut side = width.min(height);
        let mut levels = 1;
        while side / 2 >= MIN_LEVEL_SIDE {
            side /= 2;
            levels += 1;
        }
        levels
    }

    /// Returns the number of levels.
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Returns a view for a specific pyramid level.
    pub fn level(&self, index: usize) -> Option<ImageView<'_, f32>> {
        self.levels.get(index).map(|level| level.view())
    }

    /// Returns a pyramid of `count` levels starting at `start`, sharing pixel data.
    pub fn slice(&self, start: usize, count: usize) -> AlignResult<Self> {
        let end = start
            .checked_add(count)
            .filter(|&end| count > 0 && end <= self.levels.len())
            .ok_or(AlignError::IndexOutOfBounds {
                index: start.saturating_add(count),
                len: self.levels.len(),
                context: "pyramid slice",
            })?;
        Ok(Self {
            levels: self.levels[start..end].to_vec(),
        })
    }
}

impl Index<usize> for ImagePyramid {
    type Output = OwnedImage<f32>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.levels[index]
    }
}

fn downsample_box(src: ImageView<'_, f32>) -> AlignResult<OwnedImage<f32>> {
    let dst_width = src.width() / 2;
    let dst_height = src.height() / 2;
    let mut dst = Vec::with_capacity(dst_width * dst_height);

    for y in 0..dst_height {
        let row0 = src.row(y * 2).ok_or(AlignError::IndexOutOfBounds {
            index: y * 2,
            len: src.height(),
            context: "row",
        })?;
        let row1 = src.row(y * 2 + 1).ok_or(AlignError::IndexOutOfBounds {
            index: y * 2 + 1,
            len: src.height(),
            context: "row",
        })?;
        for x in 0..dst_width {
            let sum = row0[2 * x] + row0[2 * x + 1] + row1[2 * x] + row1[2 * x + 1];
            dst.push(sum * 0.25);
        }
    }

    OwnedImage::new(dst, dst_width, dst_height)
}

#[cfg(test)]
mod tests {
    use super::{ImagePyramid, MIN_LEVEL_SIDE};
    use crate::image::ImageView;

    #[test]
    fn max_levels_keeps_coarsest_side_usable() {
        assert_eq!(ImagePyramid::max_levels_for_size(4, 4), 1);
        assert_eq!(ImagePyramid::max_levels_for_size(15, 100), 1);
        assert_eq!(ImagePyramid::max_levels_for_size(16, 16), 2);
        assert_eq!(ImagePyramid::max_levels_for_size(64, 48), 3);
        assert_eq!(ImagePyramid::max_levels_for_size(640, 480), 6);
        let side = MIN_LEVEL_SIDE << 4;
        assert_eq!(ImagePyramid::max_levels_for_size(side, side), 5);
    }

    #[test]
    fn slice_shares_levels() {
        let data: Vec<u8> = (0..=255).collect();
        let view = ImageView::from_slice(&data, 16, 16).unwrap();
        let pyramid = ImagePyramid::build(view, 3).unwrap();
        let sliced = pyramid.slice(1, 2).unwrap();
        assert_eq!(sliced.num_levels(), 2);
        assert_eq!(sliced[0].data(), pyramid[1].data());
        assert!(pyramid.slice(2, 2).is_err());
        assert!(pyramid.slice(0, 0).is_err());
    }
}
