//! Chambolle-Pock primal-dual solver for weighted tomographic
//! reconstruction with a total-variation penalty.
//!
//! Minimizes, over non-negative images x:
//!     1/2 || sqrt(weights) * (A x - b) ||^2 + TV-penalty
//! by alternating a projected dual ascent step on the regularizer with a
//! diagonally-majorized fixed-point solve of the data-term proximal step.

use serde::{Deserialize, Serialize};

use crate::error::{ReconError, ReconResult};
use crate::operators::{ProjectionOperator, RegularizationOperator, TV_DUAL_SIGN};
use crate::{GradientField, Image, Sinogram};

/// Lower bound applied to the diagonal majorizer. Pixels outside every
/// ray's support would otherwise produce a zero divisor in the inner
/// update.
pub const MAJORIZER_FLOOR: f32 = 1e-6;

/// Projection of a dual field onto the elementwise box [-beta, beta]:
/// sign(x) * min(|x|, beta). Idempotent.
pub fn prox_proj(field: &GradientField, beta: f32) -> GradientField {
    field.mapv(|v| v.signum() * v.abs().min(beta))
}

/// Jacobi-style diagonal bound on the curvature of the weighted data term:
/// D = adjoint(weights * forward(ones)), floored to [`MAJORIZER_FLOOR`].
///
/// Lets the inner solver replace the dense Hessian with a per-pixel
/// divide instead of a linear solve per iteration.
pub fn diagonal_majorizer<P: ProjectionOperator>(
    projector: &P,
    weights: &Sinogram,
    image_dim: (usize, usize),
) -> ReconResult<Image> {
    let ones = Image::ones(image_dim);
    let projected = projector.forward(&ones)?;
    if projected.len() != weights.len() {
        return Err(ReconError::ShapeMismatch {
            context: "majorizer weights",
            got: vec![weights.len()],
            expected: vec![projected.len()],
        });
    }
    let majorizer = projector.adjoint(&(weights * &projected))?;
    Ok(majorizer.mapv(|v| v.max(MAJORIZER_FLOOR)))
}

/// Hyperparameters of one solve.
///
/// beta:         dual-ball radius (regularization strength)
/// tau:          primal step size
/// sigma:        dual step size
/// theta:        extrapolation factor, typically 1.0
/// n_iter:       outer iteration count (0 returns the initial image)
/// n_inner_iter: fixed-point iterations per outer step
/// tol:          optional early exit on the relative change of the primal
///               iterate; `None` keeps the fixed iteration count
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SolverParams {
    pub beta: f32,
    pub tau: f32,
    pub sigma: f32,
    pub theta: f32,
    pub n_iter: usize,
    pub n_inner_iter: usize,
    #[serde(default)]
    pub tol: Option<f32>,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            beta: 1.0,
            tau: 0.1,
            sigma: 0.1,
            theta: 1.0,
            n_iter: 50,
            n_inner_iter: 5,
            tol: None,
        }
    }
}

impl SolverParams {
    pub fn validate(&self) -> ReconResult<()> {
        for (name, value) in [("tau", self.tau), ("sigma", self.sigma)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ReconError::InvalidParam { name, value });
            }
        }
        if !self.beta.is_finite() || self.beta < 0.0 {
            return Err(ReconError::InvalidParam {
                name: "beta",
                value: self.beta,
            });
        }
        if !self.theta.is_finite() {
            return Err(ReconError::InvalidParam {
                name: "theta",
                value: self.theta,
            });
        }
        if self.n_inner_iter == 0 {
            return Err(ReconError::InvalidParam {
                name: "n_inner_iter",
                value: 0.0,
            });
        }
        if let Some(tol) = self.tol {
            if !tol.is_finite() || tol <= 0.0 {
                return Err(ReconError::InvalidParam { name: "tol", value: tol });
            }
        }
        Ok(())
    }
}

/// The primal-dual solver. Borrows the projection and regularization
/// operators; each `solve` call is independent and keeps no state.
pub struct ChambollePock<'a, P, R> {
    projector: &'a P,
    regularizer: &'a R,
}

impl<'a, P, R> ChambollePock<'a, P, R>
where
    P: ProjectionOperator,
    R: RegularizationOperator,
{
    pub fn new(projector: &'a P, regularizer: &'a R) -> Self {
        Self { projector, regularizer }
    }

    fn a(&self, x: &Image) -> ReconResult<Sinogram> {
        self.projector.forward(x)
    }

    fn at(&self, y: &Sinogram) -> ReconResult<Image> {
        self.projector.adjoint(y)
    }

    fn r(&self, x: &Image) -> ReconResult<GradientField> {
        self.regularizer.transform(x, TV_DUAL_SIGN)
    }

    fn rt(&self, field: &GradientField) -> ReconResult<Image> {
        self.regularizer.transposed_transform(field, TV_DUAL_SIGN)
    }

    /// Run the reconstruction.
    ///
    /// x0:      initial image
    /// b:       measured sinogram, length M
    /// weights: per-measurement confidence, same length as b
    ///
    /// Returns the final extrapolated iterate. Every outer iteration keeps
    /// the image non-negative and the dual field inside its beta-ball.
    pub fn solve(
        &self,
        x0: &Image,
        b: &Sinogram,
        weights: &Sinogram,
        params: &SolverParams,
    ) -> ReconResult<Image> {
        params.validate()?;
        if weights.len() != b.len() {
            return Err(ReconError::ShapeMismatch {
                context: "measurement weights",
                got: vec![weights.len()],
                expected: vec![b.len()],
            });
        }

        let mut xk = x0.clone();
        let mut xbar = x0.clone();
        let mut z = self.r(&xbar)?;
        z.fill(0.0);

        let d_rec = diagonal_majorizer(self.projector, weights, x0.dim())?;

        for _ in 0..params.n_iter {
            // Dual ascent on the regularizer, projected onto the beta-ball.
            let dual_step = &z + &(self.r(&xbar)? * params.sigma);
            z = prox_proj(&dual_step, params.beta);

            let x_km1 = xk.clone();

            // Linearized target for the data-term proximal step.
            let x_temp = &x_km1 - &(self.rt(&z)? * params.tau);

            // Fixed-point solve of the diagonally-majorized sub-problem.
            for _ in 0..params.n_inner_iter {
                let mut residual = self.a(&xk)?;
                residual -= b;
                let gradient = self.at(&(weights * &residual))?;
                let x_rec = &xk - &(&gradient / &d_rec);
                xk = (&d_rec * &x_rec + &x_temp / params.tau) / (&d_rec + 1.0 / params.tau);
                xk.mapv_inplace(|v| v.max(0.0));
            }

            xbar = &xk + &((&xk - &x_km1) * params.theta);

            if let Some(tol) = params.tol {
                let change = (&xk - &x_km1).mapv(|v| v * v).sum().sqrt();
                let scale = xk.mapv(|v| v * v).sum().sqrt();
                if change <= tol * scale.max(f32::EPSILON) {
                    break;
                }
            }
        }

        if xbar.iter().any(|v| !v.is_finite()) {
            return Err(ReconError::NonFinite);
        }
        Ok(xbar)
    }
}
