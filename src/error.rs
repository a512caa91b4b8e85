use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FlowError {
    #[error("invalid grid: {0}")]
    InvalidGrid(String),
    #[error("expected {expected} velocity components, got {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("array `{name}` has shape {found:?}, grid expects {expected:?}")]
    ShapeMismatch {
        name: String,
        expected: [usize; 2],
        found: [usize; 2],
    },
    #[error("unsupported method `{0}`")]
    UnsupportedMethod(String),
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(&'static str),
    #[error("no step function registered as `{0}`")]
    UnknownStep(String),
    #[error("step `{step}` works on {step_repr} states but method `{method}` needs {method_repr}")]
    RepresentationMismatch {
        step: String,
        step_repr: &'static str,
        method: String,
        method_repr: &'static str,
    },
    #[error("cannot restrict a {native}-point grid to {size} points")]
    IncompatibleResolution { native: usize, size: usize },
    #[error("time step must be positive and finite, got {0}")]
    InvalidTimeStep(f64),
    #[error("inner step count must be >= 1, got {0}")]
    InvalidStepCount(usize),
    #[error("warmup_steps and outer_steps are both zero; nothing to generate")]
    EmptyTrajectory,
    #[error("non-finite values in record {step} at output size {size} (stride {stride})")]
    NumericalDivergence {
        step: usize,
        size: usize,
        stride: usize,
    },
}
