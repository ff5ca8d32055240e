use crate::warp::{level_scale, ParametricWarp, Warp};
use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector2};

/// Pure translation `x + t`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Translation {
    pub t: Vector2<f32>,
}

impl Translation {
    /// Creates a translation by `(tx, ty)`.
    pub fn new(tx: f32, ty: f32) -> Self {
        Self {
            t: Vector2::new(tx, ty),
        }
    }
}

impl Default for Translation {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl Warp for Translation {
    type Scalar = f32;
    type Params = SVector<f32, 2>;

    fn scaled(&self, levels: i32) -> Self {
        Self {
            t: self.t * level_scale(levels),
        }
    }
}

impl ParametricWarp<2> for Translation {
    fn identity() -> Self {
        Self::default()
    }

    fn from_params(params: SVector<f32, 2>) -> Self {
        Self { t: params }
    }

    fn params(&self) -> SVector<f32, 2> {
        self.t
    }

    #[inline]
    fn transform(&self, p: &Point2<f32>) -> Point2<f32> {
        p + self.t
    }

    #[inline]
    fn jacobian(&self, _p: &Point2<f32>) -> SMatrix<f32, 2, 2> {
        SMatrix::<f32, 2, 2>::identity()
    }

    fn to_matrix(&self) -> Matrix3<f32> {
        Matrix3::new_translation(&self.t)
    }

    fn from_matrix(m: &Matrix3<f32>) -> Self {
        Self::new(m[(0, 2)], m[(1, 2)])
    }
}
