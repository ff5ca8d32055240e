//! Image views, owned buffers and pixel-level helpers.
//!
//! `ImageView` is a borrowed 2D view into a 1D buffer with an explicit stride.
//! The stride counts elements between the starts of consecutive rows, so a
//! stride larger than `width * channels` represents padded rows. Multi-channel
//! views are interleaved; the alignment engine rejects them at prepare time.
//!
//! Pixel centers sit at `(x + 0.5, y + 0.5)`. This keeps the 2x pyramid
//! downsampling an exact coordinate scaling and is the convention used by
//! [`is_in_image`] and [`sample_bilinear`].

use crate::util::{AlignError, AlignResult};
use nalgebra::{Point2, RealField};

pub mod gradient;
#[cfg(feature = "image-io")]
pub mod io;
pub mod pyramid;

/// Scalar sample types accepted as alignment input.
pub trait Pixel: Copy {
    /// Converts the sample to `f32` intensity.
    fn to_f32(self) -> f32;
}

impl Pixel for u8 {
    #[inline]
    fn to_f32(self) -> f32 {
        f32::from(self)
    }
}

impl Pixel for u16 {
    #[inline]
    fn to_f32(self) -> f32 {
        f32::from(self)
    }
}

impl Pixel for f32 {
    #[inline]
    fn to_f32(self) -> f32 {
        self
    }
}

/// Borrowed 2D image view with an explicit stride.
#[derive(Copy, Clone, Debug)]
pub struct ImageView<'a, T> {
    data: &'a [T],
    width: usize,
    height: usize,
    stride: usize,
    channels: usize,
}

impl<'a, T> ImageView<'a, T> {
    /// Creates a contiguous single-channel view with `stride == width`.
    pub fn from_slice(data: &'a [T], width: usize, height: usize) -> AlignResult<Self> {
        Self::new(data, width, height, width)
    }

    /// Creates a single-channel view with an explicit stride.
    pub fn new(data: &'a [T], width: usize, height: usize, stride: usize) -> AlignResult<Self> {
        Self::with_layout(data, width, height, stride, 1)
    }

    /// Creates a contiguous view over interleaved multi-channel samples.
    pub fn interleaved(
        data: &'a [T],
        width: usize,
        height: usize,
        channels: usize,
    ) -> AlignResult<Self> {
        let stride = width
            .checked_mul(channels)
            .ok_or(AlignError::InvalidDimensions { width, height })?;
        Self::with_layout(data, width, height, stride, channels)
    }

    fn with_layout(
        data: &'a [T],
        width: usize,
        height: usize,
        stride: usize,
        channels: usize,
    ) -> AlignResult<Self> {
        if channels == 0 {
            return Err(AlignError::InvalidDimensions { width, height });
        }
        let row_len = width
            .checked_mul(channels)
            .ok_or(AlignError::InvalidDimensions { width, height })?;
        let needed = required_len(row_len, height, stride)?;
        if data.len() < needed {
            return Err(AlignError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
            channels,
        })
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the stride in elements between row starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the number of interleaved channels per pixel.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Returns the backing slice including any row padding.
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Returns the first channel of pixel `(x, y)` if it is within bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<&'a T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y
            .checked_mul(self.stride)?
            .checked_add(x.checked_mul(self.channels)?)?;
        self.data.get(idx)
    }

    /// Returns the samples of row `y` (`width * channels` elements).
    pub fn row(&self, y: usize) -> Option<&'a [T]> {
        if y >= self.height {
            return None;
        }
        let start = y.checked_mul(self.stride)?;
        let end = start.checked_add(self.width * self.channels)?;
        self.data.get(start..end)
    }
}

fn required_len(row_len: usize, height: usize, stride: usize) -> AlignResult<usize> {
    if row_len == 0 || height == 0 {
        return Err(AlignError::InvalidDimensions {
            width: row_len,
            height,
        });
    }
    if stride < row_len {
        return Err(AlignError::InvalidStride {
            width: row_len,
            stride,
        });
    }
    (height - 1)
        .checked_mul(stride)
        .and_then(|v| v.checked_add(row_len))
        .ok_or(AlignError::InvalidDimensions {
            width: row_len,
            height,
        })
}

/// Owned contiguous single-channel image buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct OwnedImage<T = f32> {
    data: Vec<T>,
    width: usize,
    height: usize,
}

impl<T> OwnedImage<T> {
    /// Wraps a row-major buffer of exactly `width * height` samples.
    pub fn new(data: Vec<T>, width: usize, height: usize) -> AlignResult<Self> {
        if width == 0 || height == 0 {
            return Err(AlignError::InvalidDimensions { width, height });
        }
        let needed = width
            .checked_mul(height)
            .ok_or(AlignError::InvalidDimensions { width, height })?;
        if data.len() < needed {
            return Err(AlignError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        if data.len() > needed {
            return Err(AlignError::InvalidDimensions { width, height });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Returns a borrowed view of the image.
    pub fn view(&self) -> ImageView<'_, T> {
        ImageView {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.width,
            channels: 1,
        }
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the row-major sample buffer.
    pub fn data(&self) -> &[T] {
        &self.data
    }
}

impl OwnedImage<f32> {
    /// Copies the first channel of a view into a contiguous `f32` buffer.
    pub fn from_view<P: Pixel>(view: ImageView<'_, P>) -> AlignResult<Self> {
        let width = view.width();
        let height = view.height();
        let channels = view.channels();
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            let row = view.row(y).ok_or(AlignError::IndexOutOfBounds {
                index: y,
                len: height,
                context: "row",
            })?;
            data.extend(row.iter().step_by(channels).map(|&v| v.to_f32()));
        }
        Self::new(data, width, height)
    }
}

/// Tests whether a point addresses a pixel at least `border` pixels inside the image.
///
/// Coordinates refer to pixel centers: the point is shifted by half a pixel
/// and floored before the bounds test, so `(0.4, 0.4)` lies outside a border
/// of 0 while `(0.5, 0.5)` is the first valid position. Concrete policies use
/// this predicate to decide which samples count as constraints.
#[inline]
pub fn is_in_image<S: RealField + Copy>(
    p: &Point2<S>,
    width: usize,
    height: usize,
    border: usize,
) -> bool {
    let half = nalgebra::convert::<f64, S>(0.5);
    let (Some(x), Some(y)) = (
        nalgebra::try_convert::<S, f64>((p.x - half).floor()),
        nalgebra::try_convert::<S, f64>((p.y - half).floor()),
    ) else {
        return false;
    };
    if !x.is_finite() || !y.is_finite() {
        return false;
    }
    let r = border as f64;
    x >= r && y >= r && x < width as f64 - r && y < height as f64 - r
}

/// Bilinearly samples a single-channel image at a pixel-center coordinate.
///
/// The caller guarantees `is_in_image(p, width, height, 1)`-style validity;
/// out-of-range neighbors are clamped to the border.
#[inline]
pub fn sample_bilinear(img: ImageView<'_, f32>, p: &Point2<f32>) -> f32 {
    let fx = p.x - 0.5;
    let fy = p.y - 0.5;
    let x0f = fx.floor();
    let y0f = fy.floor();
    let ax = fx - x0f;
    let ay = fy - y0f;

    let max_x = img.width() as isize - 1;
    let max_y = img.height() as isize - 1;
    let x0 = (x0f as isize).clamp(0, max_x) as usize;
    let y0 = (y0f as isize).clamp(0, max_y) as usize;
    let x1 = (x0f as isize + 1).clamp(0, max_x) as usize;
    let y1 = (y0f as isize + 1).clamp(0, max_y) as usize;

    let data = img.as_slice();
    let stride = img.stride();
    let v00 = data[y0 * stride + x0];
    let v10 = data[y0 * stride + x1];
    let v01 = data[y1 * stride + x0];
    let v11 = data[y1 * stride + x1];

    let top = v00 + (v10 - v00) * ax;
    let bottom = v01 + (v11 - v01) * ax;
    top + (bottom - top) * ay
}

#[cfg(test)]
mod tests {
    use super::{is_in_image, sample_bilinear, ImageView, OwnedImage};
    use nalgebra::Point2;

    #[test]
    fn is_in_image_respects_half_pixel_offset() {
        assert!(!is_in_image(&Point2::new(0.4f32, 0.4), 10, 10, 0));
        assert!(is_in_image(&Point2::new(0.5f32, 0.5), 10, 10, 0));
        assert!(is_in_image(&Point2::new(5.0f32, 5.0), 10, 10, 2));
        assert!(!is_in_image(&Point2::new(10.5f32, 5.0), 10, 10, 0));
        assert!(is_in_image(&Point2::new(10.4f32, 5.0), 10, 10, 0));
    }

    #[test]
    fn is_in_image_applies_border_on_every_side() {
        for border in 0..4usize {
            for yi in 0..10usize {
                for xi in 0..10usize {
                    let p = Point2::new(xi as f64 + 0.5, yi as f64 + 0.5);
                    let expected =
                        xi >= border && yi >= border && xi < 10 - border && yi < 10 - border;
                    assert_eq!(is_in_image(&p, 10, 10, border), expected, "{xi} {yi} {border}");
                }
            }
        }
    }

    #[test]
    fn is_in_image_rejects_non_finite_points() {
        assert!(!is_in_image(&Point2::new(f32::NAN, 3.0), 10, 10, 0));
        assert!(!is_in_image(&Point2::new(3.0, f32::INFINITY), 10, 10, 0));
    }

    #[test]
    fn bilinear_hits_pixel_centers_exactly() {
        let img = OwnedImage::new(vec![0.0f32, 10.0, 20.0, 30.0], 2, 2).unwrap();
        let view = img.view();
        assert_eq!(sample_bilinear(view, &Point2::new(0.5, 0.5)), 0.0);
        assert_eq!(sample_bilinear(view, &Point2::new(1.5, 0.5)), 10.0);
        assert_eq!(sample_bilinear(view, &Point2::new(0.5, 1.5)), 20.0);
        assert!((sample_bilinear(view, &Point2::new(1.0, 1.0)) - 15.0).abs() < 1e-6);
    }

    #[test]
    fn from_view_takes_first_channel() {
        let data = [1u8, 100, 2, 100, 3, 100, 4, 100];
        let view = ImageView::interleaved(&data, 2, 2, 2).unwrap();
        assert_eq!(view.channels(), 2);
        let owned = OwnedImage::from_view(view).unwrap();
        assert_eq!(owned.data(), &[1.0, 2.0, 3.0, 4.0]);
    }
}
