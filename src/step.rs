use crate::finite_volume::FiniteVolumeStep;
use crate::pseudo_spectral::PseudoSpectralStep;
use crate::state::{FlowField, Representation};
use crate::{FlowError, Grid, PhysicsParams, SpectralVorticity, StaggeredVelocity};
use log::debug;
use std::collections::BTreeMap;

pub trait Step<S>: Send + Sync {
    fn step(&self, state: &S) -> S;
}

impl<S, F> Step<S> for F
where
    F: Fn(&S) -> S + Send + Sync,
{
    fn step(&self, state: &S) -> S {
        self(state)
    }
}

pub struct LearnedStep<S> {
    name: String,
    forward: Box<dyn Fn(&S) -> S + Send + Sync>,
}

impl<S> LearnedStep<S> {
    pub fn new(name: impl Into<String>, forward: impl Fn(&S) -> S + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            forward: Box::new(forward),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<S: FlowField> Step<S> for LearnedStep<S> {
    fn step(&self, state: &S) -> S {
        let next = (self.forward)(state);
        assert_eq!(
            next.grid(),
            state.grid(),
            "learned step `{}` changed the state grid",
            self.name
        );
        next
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepContext {
    pub grid: Grid,
    pub physics: PhysicsParams,
}

pub enum ResolvedStep {
    Spectral(Box<dyn Step<SpectralVorticity>>),
    Staggered(Box<dyn Step<StaggeredVelocity>>),
}

impl ResolvedStep {
    pub fn representation(&self) -> Representation {
        match self {
            ResolvedStep::Spectral(_) => Representation::SpectralVorticity,
            ResolvedStep::Staggered(_) => Representation::StaggeredVelocity,
        }
    }
}

type StepFactory = Box<dyn Fn(&StepContext) -> Result<ResolvedStep, FlowError> + Send + Sync>;

pub struct StepRegistry {
    factories: BTreeMap<String, StepFactory>,
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl StepRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("pseudo_spectral", |ctx| {
            Ok(ResolvedStep::Spectral(Box::new(PseudoSpectralStep::new(
                ctx.grid,
                ctx.physics,
            ))))
        });
        registry.register("finite_volume", |ctx| {
            Ok(ResolvedStep::Staggered(Box::new(FiniteVolumeStep::new(
                ctx.grid,
                ctx.physics,
            ))))
        });
        registry
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(&StepContext) -> Result<ResolvedStep, FlowError> + Send + Sync + 'static,
    ) {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn resolve(&self, name: &str, ctx: &StepContext) -> Result<ResolvedStep, FlowError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| FlowError::UnknownStep(name.to_string()))?;
        let step = factory(ctx)?;
        debug!(
            "resolved step `{name}` for {} states on a {:?} grid",
            step.representation().name(),
            ctx.grid.shape()
        );
        Ok(step)
    }
}
