use crate::spectral::{irfft2, truncate, vorticity_to_velocity, SpectralVorticity};
use crate::staggered::{curl_2d, restrict, StaggeredVelocity};
use crate::{Field2, FlowError, Grid};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutputKey {
    pub size: usize,
    pub stride: usize,
}

impl std::fmt::Display for OutputKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}/k{}", self.size, self.size, self.stride)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub size: usize,
    #[serde(alias = "stride")]
    pub k: usize,
}

impl OutputSpec {
    pub fn key(&self) -> OutputKey {
        OutputKey {
            size: self.size,
            stride: self.k,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutputRecord {
    pub vx: Field2,
    pub vy: Field2,
    pub vorticity: Option<Field2>,
}

/// Float32 arrays in `(x, y)` row-major order, `shape = [nx, ny]`.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputRecordF32 {
    pub shape: [usize; 2],
    pub vx: Vec<f32>,
    pub vy: Vec<f32>,
    pub vorticity: Option<Vec<f32>>,
}

impl OutputRecord {
    pub fn shape(&self) -> [usize; 2] {
        self.vx.shape()
    }

    pub fn is_finite(&self) -> bool {
        self.vx.is_finite()
            && self.vy.is_finite()
            && self.vorticity.as_ref().map_or(true, Field2::is_finite)
    }

    pub fn to_f32(&self) -> OutputRecordF32 {
        OutputRecordF32 {
            shape: self.shape(),
            vx: self.vx.to_f32(),
            vy: self.vy.to_f32(),
            vorticity: self.vorticity.as_ref().map(Field2::to_f32),
        }
    }
}

pub type MultiResolution = BTreeMap<OutputKey, OutputRecord>;

#[derive(Clone, Debug, PartialEq)]
pub struct DownsamplePlan {
    sim_grid: Grid,
    outputs: Vec<(OutputKey, Grid)>,
    out_vorticity: bool,
}

impl DownsamplePlan {
    pub fn new(sim_grid: Grid, specs: &[OutputSpec], out_vorticity: bool) -> Result<Self, FlowError> {
        if sim_grid.width() != sim_grid.height() {
            return Err(FlowError::InvalidGrid(format!(
                "output grids are square, simulation grid is {:?}",
                sim_grid.shape()
            )));
        }
        let mut outputs = Vec::with_capacity(specs.len());
        for spec in specs {
            if spec.k == 0 {
                return Err(FlowError::InvalidStepCount(spec.k));
            }
            let key = spec.key();
            if outputs.iter().any(|(existing, _)| *existing == key) {
                continue;
            }
            let grid = sim_grid.with_size(spec.size)?;
            outputs.push((key, grid));
        }
        Ok(Self {
            sim_grid,
            outputs,
            out_vorticity,
        })
    }

    pub fn sim_grid(&self) -> Grid {
        self.sim_grid
    }

    pub fn outputs(&self) -> &[(OutputKey, Grid)] {
        &self.outputs
    }

    pub fn keys(&self) -> impl Iterator<Item = OutputKey> + '_ {
        self.outputs.iter().map(|(key, _)| *key)
    }

    pub fn wants_vorticity(&self) -> bool {
        self.out_vorticity && self.sim_grid.ndim() == 2
    }

    pub fn is_native(&self, grid: Grid) -> bool {
        grid.width() == self.sim_grid.width()
    }

    pub fn check_integer_factors(&self) -> Result<(), FlowError> {
        let [nx, ny] = self.sim_grid.shape();
        for (key, grid) in &self.outputs {
            let [mx, my] = grid.shape();
            if nx % mx != 0 || ny % my != 0 {
                return Err(FlowError::IncompatibleResolution {
                    native: nx,
                    size: key.size,
                });
            }
        }
        Ok(())
    }
}

pub fn spectral_downsample(plan: &DownsamplePlan, state: &SpectralVorticity) -> MultiResolution {
    plan.outputs
        .iter()
        .map(|(key, grid)| {
            let hat = if plan.is_native(*grid) {
                state.hat().clone()
            } else {
                truncate(state.hat(), *grid)
            };
            let (vx_hat, vy_hat) = vorticity_to_velocity(&hat);
            let record = OutputRecord {
                vx: irfft2(&vx_hat),
                vy: irfft2(&vy_hat),
                vorticity: plan.wants_vorticity().then(|| irfft2(&hat)),
            };
            (*key, record)
        })
        .collect()
}

// Vorticity is the curl of the restricted velocity, not a restriction of the curl.
pub fn velocity_downsample(
    plan: &DownsamplePlan,
    state: &StaggeredVelocity,
) -> Result<MultiResolution, FlowError> {
    let mut out = MultiResolution::new();
    for (key, grid) in &plan.outputs {
        let velocity = if plan.is_native(*grid) {
            state.clone()
        } else {
            restrict(state, *grid)?
        };
        let vorticity = plan.wants_vorticity().then(|| curl_2d(&velocity));
        let [vx, vy] = velocity.components().clone();
        out.insert(
            *key,
            OutputRecord {
                vx: vx.into_field(),
                vy: vy.into_field(),
                vorticity,
            },
        );
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staggered::{divergence, project};
    use std::f64::consts::PI;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() <= tol, "expected {a} to be within {tol} of {b}");
    }

    fn grid(n: usize) -> Grid {
        Grid::square(n, (0.0, 2.0 * PI)).unwrap()
    }

    fn specs(pairs: &[(usize, usize)]) -> Vec<OutputSpec> {
        pairs.iter().map(|&(size, k)| OutputSpec { size, k }).collect()
    }

    fn vorticity_state(g: Grid) -> SpectralVorticity {
        SpectralVorticity::from_vorticity(&Field2::from_fn(g, |x, y| {
            let (px, py) = g.position(x, y, [0.0, 0.0]);
            px.sin() * (2.0 * py).cos() + 0.3 * (3.0 * px).cos()
        }))
    }

    fn staggered_state(g: Grid) -> StaggeredVelocity {
        let vx = Field2::from_fn(g, |x, y| ((x * 13 + y * 7) % 11) as f64 / 11.0 - 0.4);
        let vy = Field2::from_fn(g, |x, y| ((x * 5 + y * 17) % 9) as f64 / 9.0 - 0.6);
        project(&StaggeredVelocity::from_arrays(vx, vy))
    }

    #[test]
    fn spectral_native_output_is_the_state() {
        let g = grid(16);
        let state = vorticity_state(g);
        let plan = DownsamplePlan::new(g, &specs(&[(16, 1)]), true).unwrap();
        let records = spectral_downsample(&plan, &state);
        let record = &records[&OutputKey { size: 16, stride: 1 }];
        let (vx_hat, vy_hat) = vorticity_to_velocity(state.hat());
        assert_eq!(record.vx, irfft2(&vx_hat));
        assert_eq!(record.vy, irfft2(&vy_hat));
        assert_eq!(record.vorticity.as_ref().unwrap(), &state.vorticity());
    }

    #[test]
    fn spectral_coarse_output_samples_the_band_limited_field() {
        let fine = grid(32);
        let state = vorticity_state(fine);
        let plan = DownsamplePlan::new(fine, &specs(&[(8, 1), (32, 1)]), true).unwrap();
        let records = spectral_downsample(&plan, &state);
        assert_eq!(records.len(), 2);
        let coarse = &records[&OutputKey { size: 8, stride: 1 }];
        assert_eq!(coarse.shape(), [8, 8]);
        let expected = vorticity_state(grid(8)).vorticity();
        assert!(coarse.vorticity.as_ref().unwrap().max_abs_diff(&expected) < 1e-10);
    }

    #[test]
    fn staggered_native_output_is_the_state() {
        let g = grid(16);
        let state = staggered_state(g);
        let plan = DownsamplePlan::new(g, &specs(&[(16, 1)]), true).unwrap();
        let records = velocity_downsample(&plan, &state).unwrap();
        let record = &records[&OutputKey { size: 16, stride: 1 }];
        assert_eq!(&record.vx, state.vx().field());
        assert_eq!(&record.vy, state.vy().field());
        assert_eq!(record.vorticity.as_ref().unwrap(), &curl_2d(&state));
    }

    #[test]
    fn staggered_coarse_output_stays_divergence_free() {
        let g = grid(16);
        let state = staggered_state(g);
        let plan = DownsamplePlan::new(g, &specs(&[(4, 1), (8, 1)]), false).unwrap();
        let records = velocity_downsample(&plan, &state).unwrap();
        for (key, record) in &records {
            assert_eq!(record.shape(), [key.size, key.size]);
            assert!(record.vorticity.is_none());
            let velocity = StaggeredVelocity::from_arrays(record.vx.clone(), record.vy.clone());
            assert!(divergence(&velocity).max_abs() < 1e-10);
        }
    }

    #[test]
    fn keys_iterate_in_order() {
        let g = grid(16);
        let plan = DownsamplePlan::new(g, &specs(&[(16, 1), (4, 2), (8, 1), (4, 1)]), false).unwrap();
        let records = velocity_downsample(&plan, &staggered_state(g)).unwrap();
        let keys: Vec<(usize, usize)> = records.keys().map(|k| (k.size, k.stride)).collect();
        assert_eq!(keys, vec![(4, 1), (4, 2), (8, 1), (16, 1)]);
    }

    #[test]
    fn plan_rejects_zero_stride_and_size() {
        let g = grid(16);
        assert_eq!(
            DownsamplePlan::new(g, &specs(&[(8, 0)]), true).unwrap_err(),
            FlowError::InvalidStepCount(0)
        );
        assert!(DownsamplePlan::new(g, &specs(&[(0, 1)]), true).is_err());
    }

    #[test]
    fn integer_factor_check() {
        let g = grid(16);
        let plan = DownsamplePlan::new(g, &specs(&[(6, 1)]), true).unwrap();
        assert_eq!(
            plan.check_integer_factors().unwrap_err(),
            FlowError::IncompatibleResolution { native: 16, size: 6 }
        );
        let plan = DownsamplePlan::new(g, &specs(&[(8, 1), (2, 4)]), true).unwrap();
        assert!(plan.check_integer_factors().is_ok());
    }

    #[test]
    fn spectral_outputs_without_vorticity() {
        // ω = 5 sin x sin 2y → vx = 2 sin x cos 2y
        let fine = grid(32);
        let omega = Field2::from_fn(fine, |x, y| {
            let (px, py) = fine.position(x, y, [0.0, 0.0]);
            5.0 * px.sin() * (2.0 * py).sin()
        });
        let state = SpectralVorticity::from_vorticity(&omega);
        let plan = DownsamplePlan::new(fine, &specs(&[(8, 1), (32, 1)]), false).unwrap();
        let records = spectral_downsample(&plan, &state);
        for (key, record) in &records {
            assert!(record.vorticity.is_none());
            assert_eq!(record.vx.shape(), [key.size, key.size]);
            assert_eq!(record.vy.shape(), [key.size, key.size]);
        }
        let coarse = grid(8);
        let vx = &records[&OutputKey { size: 8, stride: 1 }].vx;
        for (x, y) in [(0, 0), (1, 3), (5, 2), (7, 7)] {
            let (px, py) = coarse.position(x, y, [0.0, 0.0]);
            assert_close(vx.get(x, y), 2.0 * px.sin() * (2.0 * py).cos(), 1e-10);
        }
    }

    #[test]
    fn plan_rejects_non_square_sim_grid() {
        let g = Grid::new(&[16, 8], &[(0.0, 2.0 * PI), (0.0, 2.0 * PI)]).unwrap();
        assert!(matches!(
            DownsamplePlan::new(g, &specs(&[(16, 1)]), true),
            Err(FlowError::InvalidGrid(_))
        ));
    }

    #[test]
    fn f32_record_is_x_major() {
        let g = grid(4);
        let vx = Field2::from_fn(g, |x, _| x as f64);
        let vy = Field2::from_fn(g, |_, y| y as f64);
        let state = StaggeredVelocity::from_arrays(vx, vy);
        let plan = DownsamplePlan::new(g, &specs(&[(4, 1)]), true).unwrap();
        let record = velocity_downsample(&plan, &state)
            .unwrap()
            .remove(&OutputKey { size: 4, stride: 1 })
            .unwrap();
        let narrowed = record.to_f32();
        let [_, ny] = narrowed.shape;
        assert_eq!(narrowed.shape, [4, 4]);
        assert_eq!(narrowed.vx.len(), 16);
        let at = |data: &[f32], x: usize, y: usize| data[x * ny + y];
        assert_eq!(at(&narrowed.vx[..], 1, 0), 1.0);
        assert_eq!(at(&narrowed.vx[..], 0, 1), 0.0);
        assert_eq!(at(&narrowed.vy[..], 0, 3), 3.0);
        assert_eq!(at(&narrowed.vy[..], 2, 0), 0.0);
        assert!(narrowed.vorticity.is_some());
    }
}
