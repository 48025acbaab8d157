//! TV-regularized tomographic reconstruction.
//!
//! Reconstructs a 2-D image from noisy, weighted projection measurements
//! by running a Chambolle-Pock primal-dual splitting with an embedded
//! fixed-point solver for the weighted least-squares sub-problem. The
//! projection and regularization operators are trait seams; a dense
//! system-matrix projector and a forward-difference gradient operator are
//! provided.

use ndarray::{Array1, Array2, Array3};

pub mod error;
pub mod operators;
pub mod solver;
pub mod tv;

/// 2-D pixel grid of intensities.
pub type Image = Array2<f32>;
/// Flat measurement vector of length M.
pub type Sinogram = Array1<f32>;
/// Dual field: gradient components stacked along the leading axis.
pub type GradientField = Array3<f32>;

pub use error::{ReconError, ReconResult};
pub use operators::{
    IdentityProjector, MatrixProjector, ProjectionOperator, RegularizationOperator, TV_DUAL_SIGN,
};
pub use solver::{diagonal_majorizer, prox_proj, ChambollePock, SolverParams, MAJORIZER_FLOOR};
pub use tv::GradientOperator;
