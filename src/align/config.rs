//! Run configuration and a one-call alignment helper.

use crate::align::{Aligner, AlignmentPolicy, LevelReport};
use crate::image::{ImageView, Pixel};
use crate::util::{AlignError, AlignResult};
use crate::warp::Warp;

/// Parameters of a prepare + align run.
#[derive(Clone, Debug, PartialEq)]
pub struct AlignConfig {
    /// Requested pyramid levels; clamped to what the images support.
    pub pyramid_levels: usize,
    /// Iteration budget shared by all levels.
    pub max_iterations: usize,
    /// Minimum parameter update length to keep iterating on a level.
    pub eps: f64,
    /// Record every accepted warp in level-0 coordinates.
    pub record_steps: bool,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            pyramid_levels: 4,
            max_iterations: 100,
            eps: 1e-3,
            record_steps: false,
        }
    }
}

impl AlignConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> AlignResult<()> {
        if self.pyramid_levels == 0 {
            return Err(AlignError::InvalidConfig("pyramid_levels must be at least 1"));
        }
        if self.max_iterations == 0 {
            return Err(AlignError::InvalidConfig("max_iterations must be at least 1"));
        }
        if !self.eps.is_finite() || self.eps < 0.0 {
            return Err(AlignError::InvalidConfig(
                "eps must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

/// Result of [`align_images`].
#[derive(Clone, Debug)]
pub struct Alignment<W: Warp> {
    /// Refined warp in level-0 coordinates.
    pub warp: W,
    /// Mean error of the last accepted level-0 step.
    pub last_error: Option<W::Scalar>,
    /// Pyramid levels actually used.
    pub num_levels: usize,
    /// Accepted warps in order, empty unless `record_steps` was set.
    pub steps: Vec<W>,
    /// Per-level summaries, coarsest first.
    pub levels: Vec<LevelReport<W::Scalar>>,
}

/// Prepares an aligner for `template` and `target` and runs one alignment.
pub fn align_images<P, W, T, U>(
    policy: P,
    template: ImageView<'_, T>,
    target: ImageView<'_, U>,
    initial: W,
    cfg: &AlignConfig,
) -> AlignResult<Alignment<W>>
where
    P: AlignmentPolicy<W>,
    W: Warp,
    T: Pixel,
    U: Pixel,
{
    cfg.validate()?;
    let mut aligner = Aligner::new(policy);
    aligner.prepare(template, target, &initial, cfg.pyramid_levels)?;

    let mut warp = initial;
    let mut steps = Vec::new();
    let eps: W::Scalar = nalgebra::convert(cfg.eps);
    aligner.align(
        &mut warp,
        cfg.max_iterations,
        eps,
        cfg.record_steps.then_some(&mut steps),
    )?;

    Ok(Alignment {
        warp,
        last_error: aligner.last_error(),
        num_levels: aligner.num_levels(),
        steps,
        levels: aligner.level_reports().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::AlignConfig;
    use crate::util::AlignError;

    #[test]
    fn default_config_is_valid() {
        assert!(AlignConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let cfg = AlignConfig {
            pyramid_levels: 0,
            ..AlignConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(AlignError::InvalidConfig(_))));

        let cfg = AlignConfig {
            max_iterations: 0,
            ..AlignConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(AlignError::InvalidConfig(_))));

        let cfg = AlignConfig {
            eps: f64::NAN,
            ..AlignConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(AlignError::InvalidConfig(_))));
    }
}
