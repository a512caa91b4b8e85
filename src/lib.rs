mod error;
mod field;
mod grid;

pub mod config;
pub mod downsample;
pub mod finite_volume;
pub mod initial;
pub mod integrate;
pub mod physics;
pub mod pseudo_spectral;
pub mod spectral;
pub mod staggered;
pub mod state;
pub mod step;
pub mod trajectory;

pub use config::GeneratorConfig;
pub use downsample::{MultiResolution, OutputKey, OutputRecord, OutputSpec};
pub use error::FlowError;
pub use field::Field2;
pub use grid::Grid;
pub use initial::{Capabilities, InitialField};
pub use physics::{stable_time_step, PhysicsParams};
pub use spectral::SpectralVorticity;
pub use staggered::{StaggeredField, StaggeredVelocity};
pub use state::{FlowState, Representation};
pub use step::{LearnedStep, ResolvedStep, Step, StepContext, StepRegistry};
pub use trajectory::{
    generate_ensemble, generate_trajectory, GeneratedTrajectory, Method, TrajectoryRequest,
};
