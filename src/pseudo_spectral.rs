// Crank–Nicolson for viscosity and drag, low-storage RK4 (Carpenter & Kennedy) for the rest.

use crate::spectral::{
    brick_wall_filter, irfft2, rfft2, spectral_curl, vorticity_to_velocity, SpectralField,
    SpectralVorticity, Wavenumbers,
};
use crate::step::Step;
use crate::{Field2, Grid, PhysicsParams};
use num_complex::Complex64;

const ALPHAS: [f64; 6] = [
    0.0,
    0.1496590219993,
    0.3704009573644,
    0.6222557631345,
    0.9582821306748,
    1.0,
];
const BETAS: [f64; 5] = [
    0.0,
    -0.4178904745,
    -1.192151694643,
    -1.697784692471,
    -1.514183444257,
];
const GAMMAS: [f64; 5] = [
    0.1496590219993,
    0.3792103129999,
    0.8229550293869,
    0.6994504559488,
    0.1530572479681,
];

pub struct PseudoSpectralStep {
    grid: Grid,
    dt: f64,
    wavenumbers: Wavenumbers,
    linear: Vec<f64>,
    filter: Vec<f64>,
    forcing_curl: SpectralField,
}

impl PseudoSpectralStep {
    pub fn new(grid: Grid, physics: PhysicsParams) -> Self {
        let wavenumbers = Wavenumbers::for_grid(grid);
        let hx = SpectralField::half_width(grid);
        let linear = (0..hx * grid.height())
            .map(|i| -physics.viscosity * wavenumbers.magnitude_squared(i % hx, i / hx) - physics.drag)
            .collect();
        let fx = physics.kolmogorov_forcing(grid, [0.0, 0.0]);
        let fy = Field2::new(grid, 0.0);
        let forcing_curl = spectral_curl(&rfft2(&fx), &rfft2(&fy));
        Self {
            grid,
            dt: physics.dt,
            wavenumbers,
            linear,
            filter: brick_wall_filter(grid),
            forcing_curl,
        }
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Advection `-(v · ∇)ω` evaluated on the grid, de-aliased, plus forcing.
    fn explicit_terms(&self, w_hat: &SpectralField) -> SpectralField {
        let k = &self.wavenumbers;
        let i = Complex64::new(0.0, 1.0);
        let (vx_hat, vy_hat) = vorticity_to_velocity(w_hat);
        let vx = irfft2(&vx_hat);
        let vy = irfft2(&vy_hat);
        let dw_dx = irfft2(&w_hat.map_with_mode(|kx, _, w| i * k.kx[kx] * w));
        let dw_dy = irfft2(&w_hat.map_with_mode(|_, ky, w| i * k.ky[ky] * w));
        let advection = Field2::from_fn(self.grid, |x, y| {
            -(vx.get(x, y) * dw_dx.get(x, y) + vy.get(x, y) * dw_dy.get(x, y))
        });
        let hx = SpectralField::half_width(self.grid);
        rfft2(&advection).map_with_mode(|kx, ky, a| {
            a * self.filter[ky * hx + kx] + self.forcing_curl.get(kx, ky)
        })
    }

    fn implicit_terms(&self, u: &SpectralField, mu: f64) -> SpectralField {
        let hx = SpectralField::half_width(self.grid);
        u.map_with_mode(|kx, ky, c| c * (1.0 + mu * self.linear[ky * hx + kx]))
    }

    fn implicit_solve(&self, rhs: &SpectralField, mu: f64) -> SpectralField {
        let hx = SpectralField::half_width(self.grid);
        rhs.map_with_mode(|kx, ky, c| c / (1.0 - mu * self.linear[ky * hx + kx]))
    }
}

impl Step<SpectralVorticity> for PseudoSpectralStep {
    fn step(&self, state: &SpectralVorticity) -> SpectralVorticity {
        assert_eq!(state.grid(), self.grid, "state grid does not match step grid");
        let mut u = state.hat().clone();
        let mut h = SpectralField::zeros(self.grid);
        for k in 0..BETAS.len() {
            let f = self.explicit_terms(&u);
            h = f.zip_with(&h, |f, h| f + BETAS[k] * h);
            let mu = 0.5 * self.dt * (ALPHAS[k + 1] - ALPHAS[k]);
            let rhs = self
                .implicit_terms(&u, mu)
                .zip_with(&h, |lu, h| lu + GAMMAS[k] * self.dt * h);
            u = self.implicit_solve(&rhs, mu);
        }
        SpectralVorticity::new(u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() <= tol, "expected {a} to be within {tol} of {b}");
    }

    fn grid(n: usize) -> Grid {
        Grid::square(n, (0.0, 2.0 * PI)).unwrap()
    }

    fn unforced(viscosity: f64, drag: f64, dt: f64) -> PhysicsParams {
        PhysicsParams {
            viscosity,
            drag,
            forcing_scale: 0.0,
            dt,
            ..PhysicsParams::default()
        }
    }

    #[test]
    fn rest_state_is_fixed_without_forcing() {
        let g = grid(16);
        let step = PseudoSpectralStep::new(g, unforced(1e-3, 0.1, 0.01));
        let state = SpectralVorticity::new(SpectralField::zeros(g));
        let next = step.step(&state);
        assert_eq!(next.vorticity().max_abs(), 0.0);
    }

    #[test]
    fn single_mode_decays_at_linear_rate() {
        // A single Fourier mode has no self-advection, so it decays at exp((-ν|k|² - drag) t).
        let g = grid(16);
        let (nu, drag, dt) = (0.05, 0.1, 0.01);
        let step = PseudoSpectralStep::new(g, unforced(nu, drag, dt));
        let omega = Field2::from_fn(g, |x, y| (2.0 * g.position(x, y, [0.0, 0.0]).1).cos());
        let mut state = SpectralVorticity::from_vorticity(&omega);
        for _ in 0..10 {
            state = step.step(&state);
        }
        let expected = (-(nu * 4.0 + drag) * 0.1_f64).exp();
        let w = state.vorticity();
        assert_close(w.get(0, 0), expected, 1e-6);
        assert_close(w.get(5, 4), expected * (2.0 * g.position(5, 4, [0.0, 0.0]).1).cos(), 1e-6);
    }

    #[test]
    fn forcing_spins_up_the_kolmogorov_mode() {
        let g = grid(16);
        let physics = PhysicsParams {
            dt: 0.01,
            ..PhysicsParams::default()
        };
        let step = PseudoSpectralStep::new(g, physics);
        let state = step.step(&SpectralVorticity::new(SpectralField::zeros(g)));
        let (vx_hat, _) = vorticity_to_velocity(state.hat());
        let vx = irfft2(&vx_hat);
        // Early on the body force sin(4y) accelerates vx almost uniformly in time.
        let py = g.position(0, 1, [0.0, 0.0]).1;
        assert_close(vx.get(0, 1), 0.01 * (4.0 * py).sin(), 1e-4);
        assert!(state.is_finite());
    }

    #[test]
    fn step_does_not_touch_input() {
        let g = grid(8);
        let step = PseudoSpectralStep::new(g, PhysicsParams::default());
        let omega = Field2::from_fn(g, |x, y| (x as f64 - 3.0) * (y as f64 - 4.0) * 0.1);
        let state = SpectralVorticity::from_vorticity(&omega);
        let before = state.clone();
        let _ = step.step(&state);
        assert_eq!(state, before);
    }
}
