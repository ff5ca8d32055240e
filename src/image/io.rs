//! Convenience helpers for loading images via the `image` crate.
//!
//! Available when the `image-io` feature is enabled.

use crate::image::{ImageView, OwnedImage};
use crate::util::{AlignError, AlignResult};
use std::path::Path;

/// Creates a borrowed view from a grayscale image buffer.
pub fn view_from_gray_image(img: &image::GrayImage) -> AlignResult<ImageView<'_, u8>> {
    let width = img.width() as usize;
    let height = img.height() as usize;
    ImageView::from_slice(img.as_raw(), width, height)
}

/// Converts a grayscale image buffer into an owned `f32` image.
pub fn owned_from_gray_image(img: &image::GrayImage) -> AlignResult<OwnedImage<f32>> {
    OwnedImage::from_view(view_from_gray_image(img)?)
}

/// Loads an image from disk and converts it to a grayscale `f32` image.
pub fn load_gray_image<P: AsRef<Path>>(path: P) -> AlignResult<OwnedImage<f32>> {
    let img = image::open(path).map_err(|err| AlignError::ImageIo {
        reason: err.to_string(),
    })?;
    owned_from_gray_image(&img.to_luma8())
}
