use crate::warp::{level_scale, ParametricWarp, Warp};
use nalgebra::{Matrix3, Point2, SMatrix, SVector};

/// Six-parameter affine warp.
///
/// `W(x; p) = [(1 + p1) x + p3 y + p5, p2 x + (1 + p4) y + p6]`, stored as
/// `p = [p1, p2, p3, p4, p5, p6]` so that the zero vector is the identity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    pub p: SVector<f32, 6>,
}

impl Default for Affine {
    fn default() -> Self {
        Self {
            p: SVector::zeros(),
        }
    }
}

impl Warp for Affine {
    type Scalar = f32;
    type Params = SVector<f32, 6>;

    fn scaled(&self, levels: i32) -> Self {
        let s = level_scale(levels);
        let mut p = self.p;
        p[4] *= s;
        p[5] *= s;
        Self { p }
    }
}

impl ParametricWarp<6> for Affine {
    fn identity() -> Self {
        Self::default()
    }

    fn from_params(params: SVector<f32, 6>) -> Self {
        Self { p: params }
    }

    fn params(&self) -> SVector<f32, 6> {
        self.p
    }

    #[inline]
    fn transform(&self, q: &Point2<f32>) -> Point2<f32> {
        let p = &self.p;
        Point2::new(
            (1.0 + p[0]) * q.x + p[2] * q.y + p[4],
            p[1] * q.x + (1.0 + p[3]) * q.y + p[5],
        )
    }

    #[inline]
    fn jacobian(&self, q: &Point2<f32>) -> SMatrix<f32, 2, 6> {
        SMatrix::<f32, 2, 6>::new(
            q.x, 0.0, q.y, 0.0, 1.0, 0.0, //
            0.0, q.x, 0.0, q.y, 0.0, 1.0,
        )
    }

    fn to_matrix(&self) -> Matrix3<f32> {
        let p = &self.p;
        Matrix3::new(
            1.0 + p[0],
            p[2],
            p[4],
            p[1],
            1.0 + p[3],
            p[5],
            0.0,
            0.0,
            1.0,
        )
    }

    fn from_matrix(m: &Matrix3<f32>) -> Self {
        Self {
            p: SVector::from([
                m[(0, 0)] - 1.0,
                m[(1, 0)],
                m[(0, 1)],
                m[(1, 1)] - 1.0,
                m[(0, 2)],
                m[(1, 2)],
            ]),
        }
    }
}
