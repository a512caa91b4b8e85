use crate::step::Step;
use crate::FlowError;

pub struct Repeated<S> {
    step: Box<dyn Step<S>>,
    inner_steps: usize,
}

pub fn repeated<S>(step: Box<dyn Step<S>>, inner_steps: usize) -> Result<Repeated<S>, FlowError> {
    if inner_steps == 0 {
        return Err(FlowError::InvalidStepCount(inner_steps));
    }
    Ok(Repeated { step, inner_steps })
}

impl<S> Repeated<S> {
    pub fn inner_steps(&self) -> usize {
        self.inner_steps
    }
}

impl<S> Step<S> for Repeated<S> {
    fn step(&self, state: &S) -> S {
        let mut next = self.step.step(state);
        for _ in 1..self.inner_steps {
            next = self.step.step(&next);
        }
        next
    }
}

/// `project` sees every post-step state; `None` keeps nothing.
pub fn rollout<S, T, M>(
    macro_step: &M,
    outer_steps: usize,
    initial: S,
    mut project: impl FnMut(&S) -> Option<T>,
) -> (S, Vec<T>)
where
    M: Step<S> + ?Sized,
{
    let mut state = initial;
    let mut kept = Vec::with_capacity(outer_steps);
    for _ in 0..outer_steps {
        state = macro_step.step(&state);
        if let Some(value) = project(&state) {
            kept.push(value);
        }
    }
    (state, kept)
}
