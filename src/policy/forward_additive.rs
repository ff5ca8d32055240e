//! Forward-additive Lucas–Kanade.

use crate::align::{AlignContext, AlignmentPolicy, SingleStepResult};
use crate::image::gradient::{central_differences, Gradients};
use crate::image::{is_in_image, sample_bilinear};
use crate::policy::{accumulate_rows, NormalEquations, SAMPLE_BORDER};
use crate::trace::trace_event;
use crate::util::{AlignError, AlignResult};
use crate::warp::ParametricWarp;
use nalgebra::{Point2, SVector};
use std::marker::PhantomData;

/// Forward-additive Gauss–Newton policy.
///
/// Each step samples the target and its gradient at the warped template
/// pixels, so the Hessian is rebuilt every iteration. Target gradients are
/// computed once per level in `prepare`.
#[derive(Clone, Debug)]
pub struct ForwardAdditive<W, const N: usize> {
    parallel: bool,
    gradients: Vec<Gradients>,
    _warp: PhantomData<fn() -> W>,
}

impl<W, const N: usize> Default for ForwardAdditive<W, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W, const N: usize> ForwardAdditive<W, N> {
    /// Creates a sequential policy.
    pub fn new() -> Self {
        Self {
            parallel: false,
            gradients: Vec::new(),
            _warp: PhantomData,
        }
    }

    /// Accumulates rows in parallel when the `rayon` feature is enabled.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

impl<W, const N: usize> AlignmentPolicy<W> for ForwardAdditive<W, N>
where
    W: ParametricWarp<N> + Sync,
{
    fn prepare(&mut self, ctx: &AlignContext<f32>, _initial: &W) -> AlignResult<()> {
        let target = ctx.target_pyramid();
        self.gradients = (0..ctx.num_levels())
            .map(|level| {
                let view = target.level(level).ok_or(AlignError::IndexOutOfBounds {
                    index: level,
                    len: target.num_levels(),
                    context: "level",
                })?;
                central_differences(view)
            })
            .collect::<AlignResult<_>>()?;
        trace_event!("forward_additive_prepared", levels = self.gradients.len());
        Ok(())
    }

    fn step(&mut self, ctx: &AlignContext<f32>, warp: &W) -> SingleStepResult<W> {
        let Some(grad) = self.gradients.get(ctx.level()) else {
            return NormalEquations::<N>::zeros().into_step();
        };
        let tpl = ctx.template_image();
        let tgt = ctx.target_image();
        let (gx_img, gy_img) = (grad.dx.view(), grad.dy.view());
        let (tgt_w, tgt_h) = (tgt.width(), tgt.height());

        accumulate_rows(0..tpl.height(), self.parallel, |y, acc| {
            let Some(row) = tpl.row(y) else {
                return;
            };
            for (x, &t) in row.iter().enumerate() {
                let p = Point2::new(x as f32 + 0.5, y as f32 + 0.5);
                let q = warp.transform(&p);
                if !is_in_image(&q, tgt_w, tgt_h, SAMPLE_BORDER) {
                    continue;
                }
                let gx = sample_bilinear(gx_img, &q);
                let gy = sample_bilinear(gy_img, &q);
                let jac = warp.jacobian(&p);
                let sd = SVector::<f32, N>::from_fn(|i, _| gx * jac[(0, i)] + gy * jac[(1, i)]);
                acc.push(&sd, t - sample_bilinear(tgt, &q));
            }
        })
        .into_step()
    }

    fn apply_step(&mut self, _ctx: &AlignContext<f32>, warp: &mut W, step: &SingleStepResult<W>) {
        warp.add_delta(&step.delta);
    }
}
