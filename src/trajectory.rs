use crate::downsample::{DownsamplePlan, MultiResolution, OutputKey, OutputRecord, OutputSpec};
use crate::initial::{from_user_field, initial_vorticity, random_filtered_velocity, Capabilities, InitialField};
use crate::integrate::{repeated, rollout};
use crate::spectral::reset_plan_cache;
use crate::state::{FlowField, FlowState, Representation};
use crate::step::{ResolvedStep, Step, StepContext, StepRegistry};
use crate::{FlowError, Grid, PhysicsParams};
use log::{debug, info};
use rayon::prelude::*;
use std::str::FromStr;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    PseudoSpectral,
    FiniteVolume,
}

impl Method {
    pub fn name(self) -> &'static str {
        match self {
            Method::PseudoSpectral => "pseudo_spectral",
            Method::FiniteVolume => "finite_volume",
        }
    }

    pub fn representation(self) -> Representation {
        match self {
            Method::PseudoSpectral => Representation::SpectralVorticity,
            Method::FiniteVolume => Representation::StaggeredVelocity,
        }
    }
}

impl FromStr for Method {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pseudo_spectral" => Ok(Method::PseudoSpectral),
            "finite_volume" => Ok(Method::FiniteVolume),
            other => Err(FlowError::UnsupportedMethod(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrajectoryRequest {
    pub grid: Grid,
    pub outputs: Vec<OutputSpec>,
    pub method: Method,
    pub step: String,
    pub physics: PhysicsParams,
    pub seed: u64,
    pub initial_field: Option<InitialField>,
    pub peak_wavenumber: f64,
    pub max_velocity: f64,
    pub inner_steps: usize,
    pub outer_steps: usize,
    pub warmup_steps: usize,
    pub out_vorticity: bool,
    pub capabilities: Capabilities,
}

impl TrajectoryRequest {
    pub fn new(grid: Grid, method: Method) -> Self {
        Self {
            grid,
            outputs: vec![OutputSpec {
                size: grid.width(),
                k: 1,
            }],
            method,
            step: method.name().to_string(),
            physics: PhysicsParams::default(),
            seed: 0,
            initial_field: None,
            peak_wavenumber: 4.0,
            max_velocity: 7.0,
            inner_steps: 25,
            outer_steps: 200,
            warmup_steps: 40,
            out_vorticity: true,
            capabilities: Capabilities::default(),
        }
    }

    pub fn macro_dt(&self) -> f64 {
        self.physics.dt * self.inner_steps as f64
    }
}

#[derive(Clone, Debug)]
pub struct GeneratedTrajectory {
    pub records: Vec<MultiResolution>,
    /// Simulated time of each record, counted from the start of warmup.
    pub times: Vec<f64>,
    pub elapsed: Duration,
    pub final_state: FlowState,
}

impl GeneratedTrajectory {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn stream(&self, key: OutputKey) -> impl Iterator<Item = &OutputRecord> + '_ {
        self.records
            .iter()
            .step_by(key.stride.max(1))
            .filter_map(move |record| record.get(&key))
    }

    pub fn check_finite(&self) -> Result<(), FlowError> {
        for (step, record) in self.records.iter().enumerate() {
            for (key, fields) in record {
                if !fields.is_finite() {
                    return Err(FlowError::NumericalDivergence {
                        step,
                        size: key.size,
                        stride: key.stride,
                    });
                }
            }
        }
        Ok(())
    }
}

pub fn generate_trajectory(
    request: &TrajectoryRequest,
    registry: &StepRegistry,
) -> Result<GeneratedTrajectory, FlowError> {
    reset_plan_cache();
    generate(request, registry)
}

fn generate(
    request: &TrajectoryRequest,
    registry: &StepRegistry,
) -> Result<GeneratedTrajectory, FlowError> {
    if request.warmup_steps == 0 && request.outer_steps == 0 {
        return Err(FlowError::EmptyTrajectory);
    }
    check_time_step(request.physics.dt)?;

    let representation = request.method.representation();
    let plan = DownsamplePlan::new(request.grid, &request.outputs, request.out_vorticity)?;
    if representation == Representation::StaggeredVelocity {
        plan.check_integer_factors()?;
    }

    let ctx = StepContext {
        grid: request.grid,
        physics: request.physics,
    };
    let step = registry.resolve(&request.step, &ctx)?;
    if step.representation() != representation {
        return Err(FlowError::RepresentationMismatch {
            step: request.step.clone(),
            step_repr: step.representation().name(),
            method: request.method.name().to_string(),
            method_repr: representation.name(),
        });
    }

    let velocity = match &request.initial_field {
        Some(field) => from_user_field(field, request.grid, request.capabilities)?,
        None => random_filtered_velocity(
            request.seed,
            request.grid,
            request.max_velocity,
            request.peak_wavenumber,
        ),
    };
    let initial = match request.method {
        Method::PseudoSpectral => {
            FlowState::Spectral(initial_vorticity(&velocity, request.initial_field.as_ref())?)
        }
        Method::FiniteVolume => FlowState::Staggered(velocity),
    };

    info!(
        "generating {} trajectory on {:?}: seed {}, {} warmup + {} outer steps of {} x dt {}",
        request.method.name(),
        request.grid.shape(),
        request.seed,
        request.warmup_steps,
        request.outer_steps,
        request.inner_steps,
        request.physics.dt
    );

    match (initial, step) {
        (FlowState::Spectral(state), ResolvedStep::Spectral(step)) => run(state, step, request, &plan),
        (FlowState::Staggered(state), ResolvedStep::Staggered(step)) => run(state, step, request, &plan),
        (state, step) => Err(FlowError::RepresentationMismatch {
            step: request.step.clone(),
            step_repr: step.representation().name(),
            method: request.method.name().to_string(),
            method_repr: state.representation().name(),
        }),
    }
}

fn run<S: FlowField>(
    initial: S,
    step: Box<dyn Step<S>>,
    request: &TrajectoryRequest,
    plan: &DownsamplePlan,
) -> Result<GeneratedTrajectory, FlowError> {
    let macro_step = repeated(step, request.inner_steps)?;
    let macro_dt = request.macro_dt();
    debug!(
        "{} state, {} inner steps per outer step",
        S::REPRESENTATION.name(),
        macro_step.inner_steps()
    );
    let mut state = initial;

    if request.warmup_steps > 0 {
        let start = Instant::now();
        let (warmed, _) = rollout(&macro_step, request.warmup_steps, state, |_| None::<()>);
        state = warmed;
        let elapsed = start.elapsed();
        debug!(
            "warmup of {} outer steps took {:.3}s",
            request.warmup_steps,
            elapsed.as_secs_f64()
        );
        if request.outer_steps == 0 {
            let record = state.downsample(plan)?;
            return Ok(GeneratedTrajectory {
                records: vec![record],
                times: vec![request.warmup_steps as f64 * macro_dt],
                elapsed,
                final_state: state.into_state(),
            });
        }
    }

    let start = Instant::now();
    let (last, recorded) = rollout(&macro_step, request.outer_steps, state, |s| {
        Some(s.downsample(plan))
    });
    let elapsed = start.elapsed();
    let records = recorded.into_iter().collect::<Result<Vec<_>, _>>()?;
    let times = (1..=request.outer_steps)
        .map(|i| (request.warmup_steps + i) as f64 * macro_dt)
        .collect();
    info!(
        "recorded {} outer steps in {:.3}s",
        records.len(),
        elapsed.as_secs_f64()
    );
    Ok(GeneratedTrajectory {
        records,
        times,
        elapsed,
        final_state: last.into_state(),
    })
}

pub fn generate_ensemble(
    request: &TrajectoryRequest,
    seeds: &[u64],
    registry: &StepRegistry,
) -> Vec<Result<GeneratedTrajectory, FlowError>> {
    reset_plan_cache();
    seeds
        .par_iter()
        .map(|&seed| {
            let mut request = request.clone();
            request.seed = seed;
            generate(&request, registry)
        })
        .collect()
}

pub(crate) fn check_time_step(dt: f64) -> Result<(), FlowError> {
    if dt > 0.0 && dt.is_finite() {
        Ok(())
    } else {
        Err(FlowError::InvalidTimeStep(dt))
    }
}
