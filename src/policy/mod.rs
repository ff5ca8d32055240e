//! Concrete Lucas–Kanade style alignment policies.
//!
//! Both policies minimize the sum of squared intensity differences between
//! the template and the warped target with Gauss–Newton steps. They differ in
//! where the steepest-descent images come from and how a step is applied:
//!
//! - [`ForwardAdditive`] differentiates the target at the warped position and
//!   adds the step to the parameters.
//! - [`InverseCompositional`] differentiates the template once per level and
//!   composes the warp with the inverse of the step.
//!
//! A template pixel counts as a constraint when its warped position passes
//! [`is_in_image`](crate::image::is_in_image) with a border of one pixel, so
//! bilinear lookups never leave the target.

mod forward_additive;
mod inverse_compositional;

pub use forward_additive::ForwardAdditive;
pub use inverse_compositional::InverseCompositional;

use crate::align::SingleStepResult;
use crate::warp::Warp;
use nalgebra::{Cholesky, SMatrix, SVector};
use std::ops::Range;

/// Border, in pixels, a warped sample must keep from the target edge.
pub(crate) const SAMPLE_BORDER: usize = 1;

/// Gauss–Newton normal equations accumulated over constraints.
#[derive(Clone, Debug)]
pub(crate) struct NormalEquations<const N: usize> {
    h: SMatrix<f32, N, N>,
    b: SVector<f32, N>,
    sum_errors: f64,
    count: usize,
}

impl<const N: usize> NormalEquations<N> {
    pub(crate) fn zeros() -> Self {
        Self {
            h: SMatrix::zeros(),
            b: SVector::zeros(),
            sum_errors: 0.0,
            count: 0,
        }
    }

    /// Adds one constraint with steepest-descent row `sd` and residual `e`.
    #[inline]
    pub(crate) fn push(&mut self, sd: &SVector<f32, N>, e: f32) {
        for j in 0..N {
            for i in 0..N {
                self.h[(i, j)] += sd[i] * sd[j];
            }
        }
        self.b += sd * e;
        self.sum_errors += f64::from(e) * f64::from(e);
        self.count += 1;
    }

    #[cfg(feature = "rayon")]
    pub(crate) fn merge(mut self, other: Self) -> Self {
        self.h += other.h;
        self.b += other.b;
        self.sum_errors += other.sum_errors;
        self.count += other.count;
        self
    }

    /// Solves `H delta = b`; `None` when `H` is not positive definite.
    pub(crate) fn solve(&self) -> Option<SVector<f32, N>> {
        let delta = Cholesky::new(self.h)?.solve(&self.b);
        delta.iter().all(|v| v.is_finite()).then_some(delta)
    }

    /// Turns the equations into a step; unsolvable systems report no constraints.
    pub(crate) fn into_step<W>(self) -> SingleStepResult<W>
    where
        W: Warp<Scalar = f32, Params = SVector<f32, N>>,
    {
        match self.solve() {
            Some(delta) if self.count > 0 => SingleStepResult {
                delta,
                sum_errors: self.sum_errors as f32,
                num_constraints: self.count,
            },
            _ => SingleStepResult {
                delta: SVector::zeros(),
                sum_errors: 0.0,
                num_constraints: 0,
            },
        }
    }
}

/// Accumulates normal equations row by row, in parallel when enabled.
#[cfg(feature = "rayon")]
pub(crate) fn accumulate_rows<const N: usize, F>(
    rows: Range<usize>,
    parallel: bool,
    row_fn: F,
) -> NormalEquations<N>
where
    F: Fn(usize, &mut NormalEquations<N>) + Sync,
{
    use rayon::prelude::*;

    if !parallel {
        return accumulate_rows_seq(rows, row_fn);
    }
    rows.into_par_iter()
        .fold(NormalEquations::zeros, |mut acc, y| {
            row_fn(y, &mut acc);
            acc
        })
        .reduce(NormalEquations::zeros, NormalEquations::merge)
}

/// Accumulates normal equations row by row.
#[cfg(not(feature = "rayon"))]
pub(crate) fn accumulate_rows<const N: usize, F>(
    rows: Range<usize>,
    _parallel: bool,
    row_fn: F,
) -> NormalEquations<N>
where
    F: Fn(usize, &mut NormalEquations<N>) + Sync,
{
    accumulate_rows_seq(rows, row_fn)
}

fn accumulate_rows_seq<const N: usize, F>(rows: Range<usize>, row_fn: F) -> NormalEquations<N>
where
    F: Fn(usize, &mut NormalEquations<N>),
{
    let mut acc = NormalEquations::zeros();
    for y in rows {
        row_fn(y, &mut acc);
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::{accumulate_rows, NormalEquations};
    use crate::align::SingleStepResult;
    use crate::warp::Translation;
    use nalgebra::Vector2;

    #[test]
    fn solves_well_posed_system() {
        let mut eq = NormalEquations::<2>::zeros();
        eq.push(&Vector2::new(1.0, 0.0), 2.0);
        eq.push(&Vector2::new(0.0, 1.0), -3.0);
        let step: SingleStepResult<Translation> = eq.into_step();
        assert_eq!(step.num_constraints, 2);
        assert!((step.delta.x - 2.0).abs() < 1e-6);
        assert!((step.delta.y + 3.0).abs() < 1e-6);
        assert!((step.sum_errors - 13.0).abs() < 1e-6);
    }

    #[test]
    fn singular_system_reports_no_constraints() {
        let mut eq = NormalEquations::<2>::zeros();
        eq.push(&Vector2::new(1.0, 0.0), 2.0);
        let step: SingleStepResult<Translation> = eq.into_step();
        assert_eq!(step.num_constraints, 0);
    }

    #[test]
    fn row_accumulation_counts_every_row() {
        let eq = accumulate_rows::<2, _>(0..10, true, |y, acc| {
            acc.push(&Vector2::new(1.0, y as f32), 1.0);
        });
        assert_eq!(eq.count, 10);
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn merged_equations_match_single_pass() {
        let mut left = NormalEquations::<2>::zeros();
        let mut right = NormalEquations::<2>::zeros();
        let mut whole = NormalEquations::<2>::zeros();
        for (i, e) in [1.0f32, -2.0, 0.5, 3.0].into_iter().enumerate() {
            let sd = Vector2::new(1.0, i as f32);
            whole.push(&sd, e);
            if i % 2 == 0 {
                left.push(&sd, e);
            } else {
                right.push(&sd, e);
            }
        }
        let merged = left.merge(right);
        assert_eq!(merged.count, whole.count);
        assert!((merged.h - whole.h).norm() < 1e-6);
        assert!((merged.b - whole.b).norm() < 1e-6);
        assert!((merged.sum_errors - whole.sum_errors).abs() < 1e-9);
    }
}
