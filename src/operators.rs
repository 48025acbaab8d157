//! Operator seams consumed by the solver, plus two concrete projectors.

use ndarray::{Array1, Array2};

use crate::error::{ReconError, ReconResult};
use crate::{GradientField, Image, Sinogram};

/// Sign multiplier the solver applies when calling the regularization
/// operator from the primal-dual updates. The flip centers the TV term's
/// contribution in the saddle-point formulation.
pub const TV_DUAL_SIGN: f32 = -1.0;

/// Forward/back projection between image and measurement space.
///
/// `adjoint` must be the exact linear-algebraic transpose of `forward`;
/// the majorizer and the inner gradient step are derived under that
/// assumption.
pub trait ProjectionOperator {
    fn forward(&self, image: &Image) -> ReconResult<Sinogram>;
    fn adjoint(&self, sinogram: &Sinogram) -> ReconResult<Image>;
}

/// Gradient-like transform and its transpose, with a scalar multiplier
/// applied before the transform.
///
/// `transposed_transform(·, s)` must be the transpose of `transform(·, s)`
/// for the same `s`.
pub trait RegularizationOperator {
    fn transform(&self, image: &Image, sign: f32) -> ReconResult<GradientField>;
    fn transposed_transform(&self, field: &GradientField, sign: f32) -> ReconResult<Image>;
}

/// Projector backed by a dense system matrix of shape (M, N), N = h * w.
///
/// forward: y = A vec(x), adjoint: x = unvec(A^T y).
pub struct MatrixProjector {
    matrix: Array2<f32>,
    image_dim: (usize, usize),
}

impl MatrixProjector {
    pub fn new(matrix: Array2<f32>, image_dim: (usize, usize)) -> ReconResult<Self> {
        let (h, w) = image_dim;
        if matrix.ncols() != h * w {
            return Err(ReconError::ShapeMismatch {
                context: "system matrix columns",
                got: vec![matrix.nrows(), matrix.ncols()],
                expected: vec![matrix.nrows(), h * w],
            });
        }
        Ok(Self { matrix, image_dim })
    }

    pub fn n_measurements(&self) -> usize {
        self.matrix.nrows()
    }
}

impl ProjectionOperator for MatrixProjector {
    fn forward(&self, image: &Image) -> ReconResult<Sinogram> {
        if image.dim() != self.image_dim {
            return Err(ReconError::ShapeMismatch {
                context: "forward projection input",
                got: image.shape().to_vec(),
                expected: vec![self.image_dim.0, self.image_dim.1],
            });
        }
        let flat: Array1<f32> = image.iter().copied().collect();
        Ok(self.matrix.dot(&flat))
    }

    fn adjoint(&self, sinogram: &Sinogram) -> ReconResult<Image> {
        if sinogram.len() != self.matrix.nrows() {
            return Err(ReconError::ShapeMismatch {
                context: "back projection input",
                got: vec![sinogram.len()],
                expected: vec![self.matrix.nrows()],
            });
        }
        let flat = self.matrix.t().dot(sinogram);
        Array2::from_shape_vec(self.image_dim, flat.to_vec()).map_err(|_| {
            ReconError::ShapeMismatch {
                context: "back projection output",
                got: vec![flat.len()],
                expected: vec![self.image_dim.0 * self.image_dim.1],
            }
        })
    }
}

/// Identity projector: measurement space is the flattened image. Reduces the
/// reconstruction to non-negative weighted least squares with TV smoothing.
pub struct IdentityProjector {
    image_dim: (usize, usize),
}

impl IdentityProjector {
    pub fn new(image_dim: (usize, usize)) -> Self {
        Self { image_dim }
    }
}

impl ProjectionOperator for IdentityProjector {
    fn forward(&self, image: &Image) -> ReconResult<Sinogram> {
        if image.dim() != self.image_dim {
            return Err(ReconError::ShapeMismatch {
                context: "forward projection input",
                got: image.shape().to_vec(),
                expected: vec![self.image_dim.0, self.image_dim.1],
            });
        }
        Ok(image.iter().copied().collect())
    }

    fn adjoint(&self, sinogram: &Sinogram) -> ReconResult<Image> {
        let (h, w) = self.image_dim;
        if sinogram.len() != h * w {
            return Err(ReconError::ShapeMismatch {
                context: "back projection input",
                got: vec![sinogram.len()],
                expected: vec![h * w],
            });
        }
        Array2::from_shape_vec(self.image_dim, sinogram.to_vec()).map_err(|_| {
            ReconError::ShapeMismatch {
                context: "back projection output",
                got: vec![sinogram.len()],
                expected: vec![h * w],
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array};
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn matrix_projector_forward_matches_hand_computation() {
        // 2 rays over a 1x2 image: first ray sees both pixels, second only
        // the second pixel.
        let a = array![[1.0, 1.0], [0.0, 2.0]];
        let proj = MatrixProjector::new(a, (1, 2)).unwrap();
        let x = array![[3.0, 4.0]];
        let y = proj.forward(&x).unwrap();
        assert_abs_diff_eq!(y[0], 7.0);
        assert_abs_diff_eq!(y[1], 8.0);

        let back = proj.adjoint(&array![1.0, 1.0]).unwrap();
        assert_abs_diff_eq!(back[[0, 0]], 1.0);
        assert_abs_diff_eq!(back[[0, 1]], 3.0);
    }

    #[test]
    fn matrix_projector_is_adjoint_consistent() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = Array::random_using((6, 12), Uniform::new(0.0f32, 1.0), &mut rng);
        let proj = MatrixProjector::new(a, (3, 4)).unwrap();
        let u = Array::random_using((3, 4), Uniform::new(-1.0f32, 1.0), &mut rng);
        let v = Array::random_using(6, Uniform::new(-1.0f32, 1.0), &mut rng);

        let lhs = proj.forward(&u).unwrap().dot(&v);
        let rhs: f32 = (proj.adjoint(&v).unwrap() * &u).sum();
        assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-4);
    }

    #[test]
    fn identity_projector_round_trips() {
        let proj = IdentityProjector::new((2, 3));
        let x = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let y = proj.forward(&x).unwrap();
        let back = proj.adjoint(&y).unwrap();
        assert_eq!(back, x);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let a = Array2::<f32>::zeros((4, 6));
        assert!(MatrixProjector::new(a.clone(), (2, 2)).is_err());

        let proj = MatrixProjector::new(a, (2, 3)).unwrap();
        assert!(proj.forward(&Array2::zeros((3, 2))).is_err());
        assert!(proj.adjoint(&Array::zeros(5)).is_err());
    }
}
