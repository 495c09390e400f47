use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("need at least 3 points for a circle fit, got {0}")]
    TooFewPoints(usize),
    #[error("degenerate point set: {0}")]
    Degenerate(&'static str),
    #[error("circle fit did not converge after {iterations} iterations (cost {cost:.3e})")]
    NotConverged { iterations: usize, cost: f64 },
    #[error("non-finite value in circle fit")]
    NonFinite,
}
