//! Discrete 2-D gradient operator used as the total-variation transform.

use ndarray::Array3;

use crate::error::{ReconError, ReconResult};
use crate::operators::RegularizationOperator;
use crate::{GradientField, Image};

/// Forward differences with a Neumann boundary: the last column of the
/// horizontal component and the last row of the vertical component are zero.
/// `transposed_transform` is the exact transpose (a negative divergence),
/// so the adjointness the solver relies on holds to machine precision.
pub struct GradientOperator;

impl RegularizationOperator for GradientOperator {
    fn transform(&self, image: &Image, sign: f32) -> ReconResult<GradientField> {
        let (h, w) = image.dim();
        let mut field = Array3::zeros((2, h, w));
        for i in 0..h {
            for j in 0..w {
                if j + 1 < w {
                    field[[0, i, j]] = sign * (image[[i, j + 1]] - image[[i, j]]);
                }
                if i + 1 < h {
                    field[[1, i, j]] = sign * (image[[i + 1, j]] - image[[i, j]]);
                }
            }
        }
        Ok(field)
    }

    fn transposed_transform(&self, field: &GradientField, sign: f32) -> ReconResult<Image> {
        let (c, h, w) = field.dim();
        if c != 2 {
            return Err(ReconError::ShapeMismatch {
                context: "gradient field components",
                got: vec![c, h, w],
                expected: vec![2, h, w],
            });
        }
        // Scatter each forward difference back onto its two pixels. Entries
        // in the zero boundary rows/columns of the transform output are
        // ignored, matching the transpose of the zero rows in the forward map.
        let mut out = Image::zeros((h, w));
        for i in 0..h {
            for j in 0..w {
                if j + 1 < w {
                    let v = sign * field[[0, i, j]];
                    out[[i, j]] -= v;
                    out[[i, j + 1]] += v;
                }
                if i + 1 < h {
                    let v = sign * field[[1, i, j]];
                    out[[i, j]] -= v;
                    out[[i + 1, j]] += v;
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::TV_DUAL_SIGN;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array};
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn gradient_of_constant_image_is_zero() {
        let x = Image::from_elem((4, 5), 3.7);
        let g = GradientOperator.transform(&x, 1.0).unwrap();
        assert_eq!(g.dim(), (2, 4, 5));
        assert!(g.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn gradient_matches_forward_differences() {
        let x = array![[0.0, 1.0], [3.0, 6.0]];
        let g = GradientOperator.transform(&x, 1.0).unwrap();
        assert_abs_diff_eq!(g[[0, 0, 0]], 1.0);
        assert_abs_diff_eq!(g[[0, 1, 0]], 3.0);
        assert_abs_diff_eq!(g[[1, 0, 0]], 3.0);
        assert_abs_diff_eq!(g[[1, 0, 1]], 5.0);
        // Neumann boundary
        assert_abs_diff_eq!(g[[0, 0, 1]], 0.0);
        assert_abs_diff_eq!(g[[1, 1, 0]], 0.0);
    }

    #[test]
    fn sign_multiplier_scales_linearly() {
        let mut rng = StdRng::seed_from_u64(11);
        let x = Array::random_using((5, 4), Uniform::new(-1.0f32, 1.0), &mut rng);
        let plus = GradientOperator.transform(&x, 1.0).unwrap();
        let minus = GradientOperator.transform(&x, TV_DUAL_SIGN).unwrap();
        for (a, b) in plus.iter().zip(minus.iter()) {
            assert_abs_diff_eq!(*a, -*b, epsilon = 1e-6);
        }
    }

    #[test]
    fn transform_and_transpose_are_adjoint() {
        let mut rng = StdRng::seed_from_u64(23);
        let u = Array::random_using((6, 7), Uniform::new(-1.0f32, 1.0), &mut rng);
        let v = Array::random_using((2, 6, 7), Uniform::new(-1.0f32, 1.0), &mut rng);

        for sign in [1.0f32, TV_DUAL_SIGN] {
            let lhs: f32 = (&GradientOperator.transform(&u, sign).unwrap() * &v).sum();
            let rhs: f32 = (&GradientOperator.transposed_transform(&v, sign).unwrap() * &u).sum();
            assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-4);
        }
    }

    #[test]
    fn wrong_component_count_is_rejected() {
        let field = Array3::<f32>::zeros((3, 4, 4));
        assert!(GradientOperator.transposed_transform(&field, 1.0).is_err());
    }
}
