//! Warp models mapping template coordinates to target coordinates.
//!
//! The engine only needs the [`Warp`] capability: a parameter vector with a
//! magnitude and a way to re-express the same transform at another pyramid
//! level. Concrete policies additionally rely on [`ParametricWarp`], which
//! exposes point mapping, Jacobians and homogeneous matrices.
//!
//! Rescaling by `k` levels conjugates the transform with `diag(2^k, 2^k, 1)`.
//! For the models here that leaves the linear part untouched and scales the
//! translation by `2^k`, which makes `w.scaled(k).scaled(-k) == w` exact up to
//! overflow.

use nalgebra::{Matrix3, Point2, RealField, SMatrix, SVector};

mod affine;
mod euclidean;
mod translation;

pub use affine::Affine;
pub use euclidean::Euclidean;
pub use translation::Translation;

/// Parameter vectors whose length drives the convergence test.
pub trait Parameters<S>: Clone {
    /// Euclidean norm of the vector.
    fn magnitude(&self) -> S;
}

impl<S: RealField + Copy, const D: usize> Parameters<S> for SVector<S, D> {
    fn magnitude(&self) -> S {
        self.norm()
    }
}

/// Geometric transform as seen by the alignment engine.
pub trait Warp: Clone {
    /// Floating-point type of parameters and coordinates.
    type Scalar: RealField + Copy;
    /// Parameter (and parameter-delta) vector.
    type Params: Parameters<Self::Scalar>;

    /// Returns the same transform expressed `levels` pyramid steps finer
    /// (positive) or coarser (negative).
    fn scaled(&self, levels: i32) -> Self;
}

/// Warps with a fixed number of `f32` parameters and a matrix form.
pub trait ParametricWarp<const N: usize>:
    Warp<Scalar = f32, Params = SVector<f32, N>> + Copy
{
    /// The identity transform (all parameters zero).
    fn identity() -> Self;

    /// Builds a warp from its parameter vector.
    fn from_params(params: SVector<f32, N>) -> Self;

    /// Returns the parameter vector.
    fn params(&self) -> SVector<f32, N>;

    /// Maps a template point into the target.
    fn transform(&self, p: &Point2<f32>) -> Point2<f32>;

    /// Derivative of the mapped point with respect to the parameters at `p`.
    fn jacobian(&self, p: &Point2<f32>) -> SMatrix<f32, 2, N>;

    /// Homogeneous 3x3 matrix of the transform.
    fn to_matrix(&self) -> Matrix3<f32>;

    /// Projects a homogeneous matrix back onto this model.
    fn from_matrix(m: &Matrix3<f32>) -> Self;

    /// Adds `delta` to the parameters.
    fn add_delta(&mut self, delta: &SVector<f32, N>) {
        *self = Self::from_params(self.params() + delta);
    }

    /// Replaces `self` with `self ∘ W(delta)⁻¹`.
    ///
    /// Returns `false` and leaves the warp untouched when `W(delta)` is not
    /// invertible.
    fn compose_inverse(&mut self, delta: &SVector<f32, N>) -> bool {
        match Self::from_params(*delta).to_matrix().try_inverse() {
            Some(inv) => {
                *self = Self::from_matrix(&(self.to_matrix() * inv));
                true
            }
            None => false,
        }
    }
}

/// Coordinate scale factor between pyramid levels `levels` steps apart.
#[inline]
pub(crate) fn level_scale(levels: i32) -> f32 {
    2.0f32.powi(levels)
}

#[cfg(test)]
mod tests {
    use super::{Affine, Euclidean, ParametricWarp, Translation};
    use nalgebra::{Point2, SVector};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn assert_round_trip<W: ParametricWarp<N> + std::fmt::Debug, const N: usize>(w: W) {
        for k in -6..=6 {
            let back = w.scaled(k).scaled(-k);
            let diff = (back.params() - w.params()).norm();
            assert!(diff <= 1e-5 * (1.0 + w.params().norm()), "k={k} {w:?} {back:?}");
        }
    }

    fn random_params<const N: usize>(rng: &mut StdRng, range: f32) -> SVector<f32, N> {
        SVector::<f32, N>::from_fn(|_, _| rng.random_range(-range..range))
    }

    #[test]
    fn scaled_round_trips_for_all_models() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            assert_round_trip(Translation::from_params(random_params(&mut rng, 50.0)));
            assert_round_trip(Euclidean::from_params(random_params(&mut rng, 3.0)));
            assert_round_trip(Affine::from_params(random_params(&mut rng, 0.5)));
        }
    }

    fn check_jacobian<W: ParametricWarp<N>, const N: usize>(w: W, p: Point2<f32>) {
        let jac = w.jacobian(&p);
        let h = 1e-2f32;
        for i in 0..N {
            let mut plus = w.params();
            plus[i] += h;
            let mut minus = w.params();
            minus[i] -= h;
            let fp = W::from_params(plus).transform(&p);
            let fm = W::from_params(minus).transform(&p);
            let num = (fp - fm) / (2.0 * h);
            assert!((num.x - jac[(0, i)]).abs() < 1e-2, "param {i} x");
            assert!((num.y - jac[(1, i)]).abs() < 1e-2, "param {i} y");
        }
    }

    #[test]
    fn jacobians_match_finite_differences() {
        let p = Point2::new(7.5f32, -3.25);
        check_jacobian(Translation::from_params(SVector::from([1.0, 2.0])), p);
        check_jacobian(Euclidean::from_params(SVector::from([1.0, 2.0, 0.3])), p);
        check_jacobian(
            Affine::from_params(SVector::from([0.1, -0.05, 0.02, 0.2, 3.0, -1.0])),
            p,
        );
    }

    #[test]
    fn compose_inverse_undoes_delta() {
        let delta = SVector::from([0.2f32, -0.1, 0.05]);
        let mut w = Euclidean::from_params(delta);
        assert!(w.compose_inverse(&delta));
        assert!(w.params().norm() < 1e-5);

        let delta = SVector::from([0.05f32, 0.01, -0.02, 0.03, 1.5, -2.0]);
        let mut w = Affine::from_params(delta);
        assert!(w.compose_inverse(&delta));
        assert!(w.params().norm() < 1e-5);
    }

    #[test]
    fn singular_delta_is_not_composed() {
        let mut w = Affine::from_params(SVector::from([0.1f32, 0.0, 0.0, 0.0, 2.0, 3.0]));
        let before = w;
        let singular = SVector::from([-1.0f32, 0.0, 0.0, -1.0, 0.0, 0.0]);
        assert!(!w.compose_inverse(&singular));
        assert_eq!(w, before);
    }

    #[test]
    fn matrix_form_matches_transform() {
        let w = Euclidean::from_params(SVector::from([4.0f32, -2.0, 0.7]));
        let p = Point2::new(3.0f32, 5.0);
        let m = w.to_matrix();
        let hp = m * p.to_homogeneous();
        let q = w.transform(&p);
        assert!((hp.x - q.x).abs() < 1e-5 && (hp.y - q.y).abs() < 1e-5);
        let back = Euclidean::from_matrix(&m);
        assert!((back.params() - w.params()).norm() < 1e-5);
    }
}
