use crate::{FlowError, Grid};
use rayon::prelude::*;
use std::sync::OnceLock;

const PAR_THRESHOLD_DEFAULT: usize = 65_536;
const PAR_MIN_WORK_PER_THREAD: usize = 4096;

fn parallel_threshold() -> usize {
    static THRESHOLD: OnceLock<usize> = OnceLock::new();
    *THRESHOLD.get_or_init(|| {
        std::env::var("KOLMO_PAR_THRESHOLD")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(PAR_THRESHOLD_DEFAULT)
    })
}

pub(crate) fn should_parallel(len: usize) -> bool {
    if len < parallel_threshold() {
        return false;
    }
    let threads = rayon::current_num_threads().max(1);
    len / threads >= PAR_MIN_WORK_PER_THREAD
}

/// A real scalar array on a periodic grid, stored x-fastest.
#[derive(Clone, Debug, PartialEq)]
pub struct Field2 {
    grid: Grid,
    data: Vec<f64>,
}

impl Field2 {
    pub fn new(grid: Grid, fill: f64) -> Self {
        let data = vec![fill; grid.len()];
        Self { grid, data }
    }

    pub fn from_vec(grid: Grid, data: Vec<f64>) -> Result<Self, FlowError> {
        if data.len() != grid.len() {
            return Err(FlowError::ShapeMismatch {
                name: "field".into(),
                expected: grid.shape(),
                found: [data.len(), 1],
            });
        }
        Ok(Self { grid, data })
    }

    pub(crate) fn from_raw(grid: Grid, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), grid.len(), "field data mismatch");
        Self { grid, data }
    }

    pub fn from_fn(grid: Grid, f: impl Fn(usize, usize) -> f64 + Sync) -> Self {
        let width = grid.width();
        let mut data = vec![0.0; grid.len()];
        if should_parallel(data.len()) {
            data.par_iter_mut().enumerate().for_each(|(i, value)| {
                *value = f(i % width, i / width);
            });
        } else {
            for (i, value) in data.iter_mut().enumerate() {
                *value = f(i % width, i / width);
            }
        }
        Self { grid, data }
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn shape(&self) -> [usize; 2] {
        self.grid.shape()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.data[self.grid.idx(x, y)]
    }

    pub fn get_periodic(&self, x: i64, y: i64) -> f64 {
        let (wx, wy) = self.grid.wrap(x, y);
        self.get(wx, wy)
    }

    pub fn map(&self, f: impl Fn(f64) -> f64 + Sync) -> Self {
        self.map_with_index(|_, _, value| f(value))
    }

    pub fn map_with_index(&self, f: impl Fn(usize, usize, f64) -> f64 + Sync) -> Self {
        let width = self.grid.width();
        let mut data = vec![0.0; self.data.len()];
        if should_parallel(data.len()) {
            data.par_iter_mut().enumerate().for_each(|(i, value)| {
                *value = f(i % width, i / width, self.data[i]);
            });
        } else {
            for (i, value) in data.iter_mut().enumerate() {
                *value = f(i % width, i / width, self.data[i]);
            }
        }
        Self {
            grid: self.grid,
            data,
        }
    }

    pub fn zip_with(&self, other: &Self, f: impl Fn(f64, f64) -> f64 + Sync) -> Self {
        self.assert_same_grid(other);
        let mut data = vec![0.0; self.data.len()];
        if should_parallel(data.len()) {
            data.par_iter_mut()
                .zip(self.data.par_iter())
                .zip(other.data.par_iter())
                .for_each(|((out, left), right)| *out = f(*left, *right));
        } else {
            for ((out, left), right) in data.iter_mut().zip(&self.data).zip(&other.data) {
                *out = f(*left, *right);
            }
        }
        Self {
            grid: self.grid,
            data,
        }
    }

    pub fn add_scaled(&self, other: &Self, scale: f64) -> Self {
        self.zip_with(other, |a, b| a + b * scale)
    }

    pub fn scale(&self, factor: f64) -> Self {
        self.map(|value| value * factor)
    }

    pub fn sum(&self) -> f64 {
        if should_parallel(self.data.len()) {
            self.data.par_iter().sum()
        } else {
            self.data.iter().sum()
        }
    }

    pub fn mean(&self) -> f64 {
        self.sum() / self.data.len() as f64
    }

    pub fn max_abs(&self) -> f64 {
        if should_parallel(self.data.len()) {
            self.data
                .par_iter()
                .map(|value| value.abs())
                .reduce(|| 0.0_f64, f64::max)
        } else {
            self.data.iter().map(|value| value.abs()).fold(0.0_f64, f64::max)
        }
    }

    pub fn max_abs_diff(&self, other: &Self) -> f64 {
        self.assert_same_grid(other);
        self.data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0_f64, f64::max)
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|value| value.is_finite())
    }

    /// Float32 copy in `(x, y)` row-major order: flat index `x * ny + y`.
    pub fn to_f32(&self) -> Vec<f32> {
        let [nx, ny] = self.grid.shape();
        let mut out = Vec::with_capacity(self.data.len());
        for x in 0..nx {
            for y in 0..ny {
                out.push(self.get(x, y) as f32);
            }
        }
        out
    }

    fn assert_same_grid(&self, other: &Self) {
        assert_eq!(self.grid.shape(), other.grid.shape(), "field grid mismatch");
    }
}
