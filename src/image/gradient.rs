//! Image gradients for steepest-descent computations.

use crate::image::{ImageView, OwnedImage};
use crate::util::AlignResult;

/// Horizontal and vertical derivative images of the same size as the input.
#[derive(Clone, Debug)]
pub struct Gradients {
    pub dx: OwnedImage<f32>,
    pub dy: OwnedImage<f32>,
}

/// Computes central-difference gradients with replicated borders.
///
/// Interior pixels use `(f[x+1] - f[x-1]) / 2`; at the border the missing
/// neighbor is replaced by the pixel itself, giving a one-sided difference.
pub fn central_differences(img: ImageView<'_, f32>) -> AlignResult<Gradients> {
    let width = img.width();
    let height = img.height();
    let data = img.as_slice();
    let stride = img.stride();
    let at = |x: usize, y: usize| data[y * stride + x];

    let mut dx = Vec::with_capacity(width * height);
    let mut dy = Vec::with_capacity(width * height);
    for y in 0..height {
        let ym = y.saturating_sub(1);
        let yp = (y + 1).min(height - 1);
        for x in 0..width {
            let xm = x.saturating_sub(1);
            let xp = (x + 1).min(width - 1);
            let gx = (at(xp, y) - at(xm, y)) / (xp - xm).max(1) as f32;
            let gy = (at(x, yp) - at(x, ym)) / (yp - ym).max(1) as f32;
            dx.push(gx);
            dy.push(gy);
        }
    }

    Ok(Gradients {
        dx: OwnedImage::new(dx, width, height)?,
        dy: OwnedImage::new(dy, width, height)?,
    })
}

#[cfg(test)]
mod tests {
    use super::central_differences;
    use crate::image::OwnedImage;

    #[test]
    fn ramp_has_unit_gradient() {
        let width = 6;
        let height = 5;
        let data: Vec<f32> = (0..height)
            .flat_map(|y| (0..width).map(move |x| 2.0 * x as f32 - 3.0 * y as f32))
            .collect();
        let img = OwnedImage::new(data, width, height).unwrap();
        let grad = central_differences(img.view()).unwrap();
        for &g in grad.dx.data() {
            assert!((g - 2.0).abs() < 1e-6);
        }
        for &g in grad.dy.data() {
            assert!((g + 3.0).abs() < 1e-6);
        }
    }
}
