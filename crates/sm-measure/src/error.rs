use sm_fit::FitError;
use thiserror::Error;

use crate::bore::CircleSelector;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeasureError {
    /// A coordinate strip or window required by a measurement selected no
    /// points.
    #[error("empty selection: {stage}")]
    EmptySelection { stage: &'static str },
    #[error("circle fit failed in {stage}: {source}")]
    Fit {
        stage: &'static str,
        #[source]
        source: FitError,
    },
    #[error("{0:?} circle has not been fitted")]
    CircleNotFitted(CircleSelector),
    #[error("missing reference value: {0}")]
    MissingReference(&'static str),
    #[error(transparent)]
    Core(#[from] sm_core::Error),
}

impl MeasureError {
    pub(crate) fn empty(stage: &'static str) -> Self {
        Self::EmptySelection { stage }
    }

    pub(crate) fn fit(stage: &'static str) -> impl FnOnce(FitError) -> Self {
        move |source| Self::Fit { stage, source }
    }
}
