use crate::spectral::{irfft2, rfft2, Wavenumbers};
use crate::staggered::{curl_2d, project, StaggeredVelocity};
use crate::{Field2, FlowError, Grid, SpectralVorticity};
use log::debug;
use num_complex::Complex64;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use std::collections::BTreeMap;

pub const VELOCITY_KEYS: [&str; 3] = ["vx", "vy", "vz"];
pub const VORTICITY_KEY: &str = "vorticity";

const DENSITY_VARIANCE: f64 = 0.25;
pub const DEFAULT_FILTER_ITERATIONS: usize = 3;

fn log_normal_density(k: f64, mode: f64) -> f64 {
    if k <= 0.0 {
        return 0.0;
    }
    let mean = mode.ln() + DENSITY_VARIANCE;
    let log_k = k.ln();
    (-0.5 * (log_k - mean).powi(2) / DENSITY_VARIANCE - log_k).exp()
}

fn filtered_noise(rng: &mut ChaCha8Rng, grid: Grid, peak_wavenumber: f64) -> Field2 {
    let noise: Vec<f64> = (0..grid.len()).map(|_| StandardNormal.sample(&mut *rng)).collect();
    let noise = Field2::from_raw(grid, noise);
    let k = Wavenumbers::for_grid(grid);
    let hat = rfft2(&noise).map_with_mode(|kx, ky, c| {
        let magnitude = k.magnitude_squared(kx, ky).sqrt();
        if magnitude == 0.0 {
            Complex64::default()
        } else {
            c * log_normal_density(magnitude, peak_wavenumber)
        }
    });
    irfft2(&hat)
}

pub fn random_filtered_velocity(
    seed: u64,
    grid: Grid,
    max_velocity: f64,
    peak_wavenumber: f64,
) -> StaggeredVelocity {
    random_filtered_velocity_with_iterations(
        seed,
        grid,
        max_velocity,
        peak_wavenumber,
        DEFAULT_FILTER_ITERATIONS,
    )
}

pub fn random_filtered_velocity_with_iterations(
    seed: u64,
    grid: Grid,
    max_velocity: f64,
    peak_wavenumber: f64,
    iterations: usize,
) -> StaggeredVelocity {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let vx = filtered_noise(&mut rng, grid, peak_wavenumber);
    let vy = filtered_noise(&mut rng, grid, peak_wavenumber);
    let mut velocity = StaggeredVelocity::from_arrays(vx, vy);
    for _ in 0..iterations {
        velocity = project(&velocity);
        let speed = velocity.max_speed();
        if speed > 0.0 {
            velocity = velocity.scale(max_velocity / speed);
        }
    }
    debug!(
        "random initial velocity: seed {seed}, peak {peak_wavenumber}, max speed {:.4}",
        velocity.max_speed()
    );
    velocity
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub supports_user_initial_velocity: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            supports_user_initial_velocity: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InitialField {
    pub velocity: Vec<Field2>,
    pub vorticity: Option<Field2>,
}

impl InitialField {
    pub fn new(velocity: Vec<Field2>) -> Self {
        Self {
            velocity,
            vorticity: None,
        }
    }

    pub fn with_vorticity(mut self, vorticity: Field2) -> Self {
        self.vorticity = Some(vorticity);
        self
    }

    pub fn from_record(record: &BTreeMap<String, Field2>) -> Self {
        let velocity = VELOCITY_KEYS
            .iter()
            .map_while(|key| record.get(*key).cloned())
            .collect();
        Self {
            velocity,
            vorticity: record.get(VORTICITY_KEY).cloned(),
        }
    }
}

pub fn from_user_field(
    initial: &InitialField,
    grid: Grid,
    capabilities: Capabilities,
) -> Result<StaggeredVelocity, FlowError> {
    if !capabilities.supports_user_initial_velocity {
        return Err(FlowError::UnsupportedFeature(
            "this step configuration does not accept a user initial velocity",
        ));
    }
    if initial.velocity.len() != grid.ndim() {
        return Err(FlowError::DimensionMismatch {
            expected: grid.ndim(),
            found: initial.velocity.len(),
        });
    }
    let mut components = VELOCITY_KEYS
        .iter()
        .zip(&initial.velocity)
        .map(|(name, array)| regrid(name, array, grid))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();
    match (components.next(), components.next()) {
        (Some(vx), Some(vy)) => Ok(StaggeredVelocity::from_arrays(vx, vy)),
        _ => Err(FlowError::DimensionMismatch {
            expected: grid.ndim(),
            found: initial.velocity.len(),
        }),
    }
}

fn regrid(name: &str, array: &Field2, grid: Grid) -> Result<Field2, FlowError> {
    if array.shape() != grid.shape() {
        return Err(FlowError::ShapeMismatch {
            name: name.to_string(),
            expected: grid.shape(),
            found: array.shape(),
        });
    }
    Ok(Field2::from_raw(grid, array.as_slice().to_vec()))
}

// The user vorticity wins over the curl of the starting velocity.
pub fn initial_vorticity(
    velocity: &StaggeredVelocity,
    user: Option<&InitialField>,
) -> Result<SpectralVorticity, FlowError> {
    let grid = velocity.grid();
    let vorticity = match user.and_then(|field| field.vorticity.as_ref()) {
        Some(w) => regrid(VORTICITY_KEY, w, grid)?,
        None => curl_2d(velocity),
    };
    Ok(SpectralVorticity::from_vorticity(&vorticity))
}
