// Half spectra: the x axis keeps `nx / 2 + 1` non-negative modes, the y axis
// keeps all `ny` modes in fftfreq order. Forward is unnormalised, inverse scales by `1 / N`.

use crate::field::should_parallel;
use crate::{Field2, Grid};
use log::debug;
use num_complex::Complex64;
use rayon::prelude::*;
use rustfft::{Fft, FftDirection, FftPlanner};
use std::f64::consts::PI;
use std::sync::{Arc, Mutex, OnceLock};

static PLANNER: OnceLock<Mutex<FftPlanner<f64>>> = OnceLock::new();

fn plan(len: usize, direction: FftDirection) -> Arc<dyn Fft<f64>> {
    let planner = PLANNER.get_or_init(|| Mutex::new(FftPlanner::new()));
    let mut planner = planner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    planner.plan_fft(len, direction)
}

pub fn reset_plan_cache() {
    if let Some(planner) = PLANNER.get() {
        let mut planner = planner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *planner = FftPlanner::new();
        debug!("fft plan cache reset");
    }
}

fn for_each_lane<T: Send>(buf: &mut [T], lane: usize, f: impl Fn(usize, &mut [T]) + Sync) {
    if should_parallel(buf.len()) {
        buf.par_chunks_mut(lane)
            .enumerate()
            .for_each(|(i, chunk)| f(i, chunk));
    } else {
        for (i, chunk) in buf.chunks_mut(lane).enumerate() {
            f(i, chunk);
        }
    }
}

fn transpose(src: &[Complex64], width: usize, height: usize) -> Vec<Complex64> {
    let mut dst = vec![Complex64::default(); src.len()];
    for r in 0..height {
        for c in 0..width {
            dst[c * height + r] = src[r * width + c];
        }
    }
    dst
}

pub fn signed_mode(m: usize, n: usize) -> i64 {
    if m < (n + 1) / 2 {
        m as i64
    } else {
        m as i64 - n as i64
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpectralField {
    grid: Grid,
    data: Vec<Complex64>,
}

impl SpectralField {
    pub fn zeros(grid: Grid) -> Self {
        let data = vec![Complex64::default(); Self::half_width(grid) * grid.height()];
        Self { grid, data }
    }

    pub fn half_width(grid: Grid) -> usize {
        grid.width() / 2 + 1
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn shape(&self) -> [usize; 2] {
        [Self::half_width(self.grid), self.grid.height()]
    }

    pub fn get(&self, kx: usize, ky: usize) -> Complex64 {
        self.data[ky * Self::half_width(self.grid) + kx]
    }

    pub fn as_slice(&self) -> &[Complex64] {
        &self.data
    }

    pub fn map_with_mode(&self, f: impl Fn(usize, usize, Complex64) -> Complex64 + Sync) -> Self {
        let hx = Self::half_width(self.grid);
        let mut data = vec![Complex64::default(); self.data.len()];
        if should_parallel(data.len()) {
            data.par_iter_mut().enumerate().for_each(|(i, value)| {
                *value = f(i % hx, i / hx, self.data[i]);
            });
        } else {
            for (i, value) in data.iter_mut().enumerate() {
                *value = f(i % hx, i / hx, self.data[i]);
            }
        }
        Self {
            grid: self.grid,
            data,
        }
    }

    pub fn zip_with(
        &self,
        other: &Self,
        f: impl Fn(Complex64, Complex64) -> Complex64 + Sync,
    ) -> Self {
        assert_eq!(self.grid.shape(), other.grid.shape(), "spectrum grid mismatch");
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| f(*a, *b))
            .collect();
        Self {
            grid: self.grid,
            data,
        }
    }

    pub fn scale(&self, factor: f64) -> Self {
        self.map_with_mode(|_, _, c| c * factor)
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|c| c.re.is_finite() && c.im.is_finite())
    }
}

pub fn rfft2(field: &Field2) -> SpectralField {
    let grid = field.grid();
    let [nx, ny] = grid.shape();
    let hx = SpectralField::half_width(grid);
    let fft_x = plan(nx, FftDirection::Forward);
    let fft_y = plan(ny, FftDirection::Forward);
    let mut rows = vec![Complex64::default(); hx * ny];
    for_each_lane(&mut rows, hx, |y, out| {
        let mut line: Vec<Complex64> = (0..nx)
            .map(|x| Complex64::new(field.get(x, y), 0.0))
            .collect();
        fft_x.process(&mut line);
        out.copy_from_slice(&line[..hx]);
    });
    let mut cols = transpose(&rows, hx, ny);
    for_each_lane(&mut cols, ny, |_, lane| fft_y.process(lane));
    SpectralField {
        grid,
        data: transpose(&cols, ny, hx),
    }
}

pub fn irfft2(spectrum: &SpectralField) -> Field2 {
    let grid = spectrum.grid();
    let [nx, ny] = grid.shape();
    let hx = SpectralField::half_width(grid);
    let ifft_x = plan(nx, FftDirection::Inverse);
    let ifft_y = plan(ny, FftDirection::Inverse);
    let mut cols = transpose(&spectrum.data, hx, ny);
    for_each_lane(&mut cols, ny, |_, lane| ifft_y.process(lane));
    let rows = transpose(&cols, ny, hx);
    let norm = 1.0 / (nx * ny) as f64;
    let mut out = vec![0.0; nx * ny];
    for_each_lane(&mut out, nx, |y, out_row| {
        let half = &rows[y * hx..(y + 1) * hx];
        let mut line = vec![Complex64::default(); nx];
        line[..hx].copy_from_slice(half);
        // Hermitian completion keeps the inverse real.
        for k in hx..nx {
            line[k] = half[nx - k].conj();
        }
        ifft_x.process(&mut line);
        for (value, c) in out_row.iter_mut().zip(&line) {
            *value = c.re * norm;
        }
    });
    Field2::from_raw(grid, out)
}

#[derive(Clone, Debug, PartialEq)]
pub struct Wavenumbers {
    pub kx: Vec<f64>,
    pub ky: Vec<f64>,
}

impl Wavenumbers {
    pub fn for_grid(grid: Grid) -> Self {
        let ny = grid.height();
        let lx = grid.length(0);
        let ly = grid.length(1);
        let kx = (0..SpectralField::half_width(grid))
            .map(|m| 2.0 * PI * m as f64 / lx)
            .collect();
        let ky = (0..ny)
            .map(|m| 2.0 * PI * signed_mode(m, ny) as f64 / ly)
            .collect();
        Self { kx, ky }
    }

    pub fn magnitude_squared(&self, kx: usize, ky: usize) -> f64 {
        self.kx[kx] * self.kx[kx] + self.ky[ky] * self.ky[ky]
    }
}

pub fn vorticity_to_velocity(vorticity_hat: &SpectralField) -> (SpectralField, SpectralField) {
    let k = Wavenumbers::for_grid(vorticity_hat.grid());
    let psi = vorticity_hat.map_with_mode(|kx, ky, w| {
        let k2 = k.magnitude_squared(kx, ky);
        if k2 == 0.0 {
            Complex64::default()
        } else {
            w / k2
        }
    });
    let i = Complex64::new(0.0, 1.0);
    let vx = psi.map_with_mode(|_, ky, p| i * k.ky[ky] * p);
    let vy = psi.map_with_mode(|kx, _, p| -i * k.kx[kx] * p);
    (vx, vy)
}

pub fn spectral_curl(fx_hat: &SpectralField, fy_hat: &SpectralField) -> SpectralField {
    let k = Wavenumbers::for_grid(fx_hat.grid());
    let i = Complex64::new(0.0, 1.0);
    let dfy_dx = fy_hat.map_with_mode(|kx, _, c| i * k.kx[kx] * c);
    let dfx_dy = fx_hat.map_with_mode(|_, ky, c| i * k.ky[ky] * c);
    dfy_dx.zip_with(&dfx_dy, |a, b| a - b)
}

/// Keeps modes strictly below both Nyquist frequencies, zeroes the target
/// Nyquist row and column, and rescales by `N_target / N_source` so point
/// values of a band-limited field survive the `1 / N` inverse.
pub fn truncate(spectrum: &SpectralField, target: Grid) -> SpectralField {
    let source = spectrum.grid();
    let [nx, ny] = source.shape();
    let [mx, my] = target.shape();
    let factor = (mx * my) as f64 / (nx * ny) as f64;
    let out = SpectralField::zeros(target);
    out.map_with_mode(|kx, ky, _| {
        let m_y = signed_mode(ky, my);
        let keep_x = 2 * kx < mx && 2 * kx < nx;
        let keep_y = 2 * m_y.unsigned_abs() < my as u64 && 2 * m_y.unsigned_abs() < ny as u64;
        if !(keep_x && keep_y) {
            return Complex64::default();
        }
        let source_ky = m_y.rem_euclid(ny as i64) as usize;
        spectrum.get(kx, source_ky) * factor
    })
}

pub fn brick_wall_filter(grid: Grid) -> Vec<f64> {
    let ny = grid.height();
    let hx = SpectralField::half_width(grid);
    let cut_x = (2 * hx) / 3;
    let band_y = (2 * ny) / 3;
    let (low_y, high_y) = (band_y / 2, (band_y + 1) / 2);
    let mut mask = vec![0.0; hx * ny];
    for ky in 0..ny {
        let keep_y = ky < low_y || ky >= ny - high_y;
        for kx in 0..hx {
            if keep_y && kx < cut_x {
                mask[ky * hx + kx] = 1.0;
            }
        }
    }
    mask
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpectralVorticity {
    hat: SpectralField,
}

impl SpectralVorticity {
    pub fn new(hat: SpectralField) -> Self {
        Self { hat }
    }

    pub fn from_vorticity(vorticity: &Field2) -> Self {
        Self {
            hat: rfft2(vorticity),
        }
    }

    pub fn hat(&self) -> &SpectralField {
        &self.hat
    }

    pub fn into_hat(self) -> SpectralField {
        self.hat
    }

    pub fn grid(&self) -> Grid {
        self.hat.grid()
    }

    pub fn vorticity(&self) -> Field2 {
        irfft2(&self.hat)
    }

    pub fn is_finite(&self) -> bool {
        self.hat.is_finite()
    }
}
