//! pyralign is a CPU coarse-to-fine image alignment library.
//!
//! An [`Aligner`] builds image pyramids for a template and a target, then
//! refines a parametric [`Warp`] level by level, coarsest first. The per-step
//! math is supplied by an [`AlignmentPolicy`]; forward-additive and
//! inverse-compositional Lucas–Kanade policies are included, with optional
//! row parallelism via the `rayon` feature.

pub mod align;
pub mod image;
pub mod policy;
mod trace;
pub mod util;
pub mod warp;

pub use align::{
    align_images, AlignConfig, AlignContext, Aligner, Alignment, AlignmentPolicy, LevelReport,
    LevelStop, SingleStepResult,
};
pub use crate::image::pyramid::ImagePyramid;
pub use crate::image::{is_in_image, ImageView, OwnedImage, Pixel};
pub use policy::{ForwardAdditive, InverseCompositional};
pub use util::{AlignError, AlignResult};
pub use warp::{Affine, Euclidean, ParametricWarp, Parameters, Translation, Warp};

#[cfg(feature = "image-io")]
pub use crate::image::io;
