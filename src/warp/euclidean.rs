use crate::warp::{level_scale, ParametricWarp, Warp};
use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector2};

/// Rotation by `theta` (radians) about the origin followed by translation `t`.
///
/// Parameters are ordered `[tx, ty, theta]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Euclidean {
    pub t: Vector2<f32>,
    pub theta: f32,
}

impl Euclidean {
    /// Creates a rigid transform.
    pub fn new(tx: f32, ty: f32, theta: f32) -> Self {
        Self {
            t: Vector2::new(tx, ty),
            theta,
        }
    }
}

impl Default for Euclidean {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

impl Warp for Euclidean {
    type Scalar = f32;
    type Params = SVector<f32, 3>;

    fn scaled(&self, levels: i32) -> Self {
        Self {
            t: self.t * level_scale(levels),
            theta: self.theta,
        }
    }
}

impl ParametricWarp<3> for Euclidean {
    fn identity() -> Self {
        Self::default()
    }

    fn from_params(params: SVector<f32, 3>) -> Self {
        Self::new(params[0], params[1], params[2])
    }

    fn params(&self) -> SVector<f32, 3> {
        SVector::from([self.t.x, self.t.y, self.theta])
    }

    #[inline]
    fn transform(&self, p: &Point2<f32>) -> Point2<f32> {
        let (s, c) = self.theta.sin_cos();
        Point2::new(
            c * p.x - s * p.y + self.t.x,
            s * p.x + c * p.y + self.t.y,
        )
    }

    #[inline]
    fn jacobian(&self, p: &Point2<f32>) -> SMatrix<f32, 2, 3> {
        let (s, c) = self.theta.sin_cos();
        SMatrix::<f32, 2, 3>::new(
            1.0,
            0.0,
            -s * p.x - c * p.y,
            0.0,
            1.0,
            c * p.x - s * p.y,
        )
    }

    fn to_matrix(&self) -> Matrix3<f32> {
        let (s, c) = self.theta.sin_cos();
        Matrix3::new(c, -s, self.t.x, s, c, self.t.y, 0.0, 0.0, 1.0)
    }

    fn from_matrix(m: &Matrix3<f32>) -> Self {
        Self::new(m[(0, 2)], m[(1, 2)], m[(1, 0)].atan2(m[(0, 0)]))
    }
}
