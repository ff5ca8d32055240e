//! Inverse-compositional Lucas–Kanade (Baker & Matthews).

use crate::align::{AlignContext, AlignmentPolicy, SingleStepResult};
use crate::image::gradient::central_differences;
use crate::image::{is_in_image, sample_bilinear};
use crate::policy::{accumulate_rows, NormalEquations, SAMPLE_BORDER};
use crate::trace::{trace_debug, trace_event};
use crate::util::{AlignError, AlignResult};
use crate::warp::ParametricWarp;
use nalgebra::{Point2, SVector};
use std::marker::PhantomData;

/// Steepest-descent images of the template at one level, row-major.
#[derive(Clone, Debug)]
struct LevelSd<const N: usize> {
    width: usize,
    sd: Vec<SVector<f32, N>>,
}

/// Inverse-compositional Gauss–Newton policy.
///
/// Template gradients and the warp Jacobian at the identity are combined
/// into steepest-descent images once per level. A step only resamples the
/// target; the Hessian is summed over the pixels that are valid for the
/// current warp. Accepted steps update `W ← W ∘ W(Δ)⁻¹`.
#[derive(Clone, Debug)]
pub struct InverseCompositional<W, const N: usize> {
    parallel: bool,
    levels: Vec<LevelSd<N>>,
    _warp: PhantomData<fn() -> W>,
}

impl<W, const N: usize> Default for InverseCompositional<W, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W, const N: usize> InverseCompositional<W, N> {
    /// Creates a sequential policy.
    pub fn new() -> Self {
        Self {
            parallel: false,
            levels: Vec::new(),
            _warp: PhantomData,
        }
    }

    /// Accumulates rows in parallel when the `rayon` feature is enabled.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

impl<W, const N: usize> AlignmentPolicy<W> for InverseCompositional<W, N>
where
    W: ParametricWarp<N> + Sync,
{
    fn prepare(&mut self, ctx: &AlignContext<f32>, _initial: &W) -> AlignResult<()> {
        let template = ctx.template_pyramid();
        let identity = W::identity();
        let mut levels = Vec::with_capacity(ctx.num_levels());
        for level in 0..ctx.num_levels() {
            let view = template.level(level).ok_or(AlignError::IndexOutOfBounds {
                index: level,
                len: template.num_levels(),
                context: "level",
            })?;
            let grad = central_differences(view)?;
            let width = view.width();
            let mut sd = Vec::with_capacity(width * view.height());
            for (idx, (&gx, &gy)) in grad.dx.data().iter().zip(grad.dy.data()).enumerate() {
                let p = Point2::new((idx % width) as f32 + 0.5, (idx / width) as f32 + 0.5);
                let jac = identity.jacobian(&p);
                sd.push(SVector::<f32, N>::from_fn(|i, _| {
                    gx * jac[(0, i)] + gy * jac[(1, i)]
                }));
            }
            levels.push(LevelSd { width, sd });
        }
        self.levels = levels;
        trace_event!("inverse_compositional_prepared", levels = self.levels.len());
        Ok(())
    }

    fn step(&mut self, ctx: &AlignContext<f32>, warp: &W) -> SingleStepResult<W> {
        let Some(data) = self.levels.get(ctx.level()) else {
            return NormalEquations::<N>::zeros().into_step();
        };
        let tpl = ctx.template_image();
        let tgt = ctx.target_image();
        let (tgt_w, tgt_h) = (tgt.width(), tgt.height());

        accumulate_rows(0..tpl.height(), self.parallel, |y, acc| {
            let Some(row) = tpl.row(y) else {
                return;
            };
            let sd_row = &data.sd[y * data.width..(y + 1) * data.width];
            for (x, (&t, sd)) in row.iter().zip(sd_row).enumerate() {
                let p = Point2::new(x as f32 + 0.5, y as f32 + 0.5);
                let q = warp.transform(&p);
                if !is_in_image(&q, tgt_w, tgt_h, SAMPLE_BORDER) {
                    continue;
                }
                acc.push(sd, sample_bilinear(tgt, &q) - t);
            }
        })
        .into_step()
    }

    fn apply_step(&mut self, ctx: &AlignContext<f32>, warp: &mut W, step: &SingleStepResult<W>) {
        if !warp.compose_inverse(&step.delta) {
            trace_debug!("singular_update", level = ctx.level());
        }
    }
}
