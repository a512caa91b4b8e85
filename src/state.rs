use crate::downsample::{spectral_downsample, velocity_downsample, DownsamplePlan, MultiResolution};
use crate::{FlowError, Grid, SpectralVorticity, StaggeredVelocity};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Representation {
    SpectralVorticity,
    StaggeredVelocity,
}

impl Representation {
    pub fn name(self) -> &'static str {
        match self {
            Representation::SpectralVorticity => "spectral-vorticity",
            Representation::StaggeredVelocity => "staggered-velocity",
        }
    }
}

pub trait FlowField: Clone + Send + Sync + 'static {
    const REPRESENTATION: Representation;

    fn grid(&self) -> Grid;
    fn is_finite(&self) -> bool;
    fn downsample(&self, plan: &DownsamplePlan) -> Result<MultiResolution, FlowError>;
    fn into_state(self) -> FlowState;
}

impl FlowField for SpectralVorticity {
    const REPRESENTATION: Representation = Representation::SpectralVorticity;

    fn grid(&self) -> Grid {
        SpectralVorticity::grid(self)
    }

    fn is_finite(&self) -> bool {
        SpectralVorticity::is_finite(self)
    }

    fn downsample(&self, plan: &DownsamplePlan) -> Result<MultiResolution, FlowError> {
        Ok(spectral_downsample(plan, self))
    }

    fn into_state(self) -> FlowState {
        FlowState::Spectral(self)
    }
}

impl FlowField for StaggeredVelocity {
    const REPRESENTATION: Representation = Representation::StaggeredVelocity;

    fn grid(&self) -> Grid {
        StaggeredVelocity::grid(self)
    }

    fn is_finite(&self) -> bool {
        StaggeredVelocity::is_finite(self)
    }

    fn downsample(&self, plan: &DownsamplePlan) -> Result<MultiResolution, FlowError> {
        velocity_downsample(plan, self)
    }

    fn into_state(self) -> FlowState {
        FlowState::Staggered(self)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FlowState {
    Spectral(SpectralVorticity),
    Staggered(StaggeredVelocity),
}

impl FlowState {
    pub fn representation(&self) -> Representation {
        match self {
            FlowState::Spectral(_) => Representation::SpectralVorticity,
            FlowState::Staggered(_) => Representation::StaggeredVelocity,
        }
    }

    pub fn grid(&self) -> Grid {
        match self {
            FlowState::Spectral(s) => s.grid(),
            FlowState::Staggered(s) => s.grid(),
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            FlowState::Spectral(s) => s.is_finite(),
            FlowState::Staggered(s) => s.is_finite(),
        }
    }

    pub fn downsample(&self, plan: &DownsamplePlan) -> Result<MultiResolution, FlowError> {
        match self {
            FlowState::Spectral(s) => FlowField::downsample(s, plan),
            FlowState::Staggered(s) => FlowField::downsample(s, plan),
        }
    }
}
