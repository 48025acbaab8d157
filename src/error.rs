use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    #[error("shape mismatch in {context}: got {got:?}, expected {expected:?}")]
    ShapeMismatch {
        context: &'static str,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    #[error("hyperparameter {name} is out of range: {value}")]
    InvalidParam { name: &'static str, value: f32 },
    #[error("reconstruction produced non-finite values")]
    NonFinite,
}

pub type ReconResult<T> = Result<T, ReconError>;
