use crate::{Field2, Grid};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicsParams {
    pub viscosity: f64,
    pub drag: f64,
    pub forcing_wavenumber: f64,
    pub forcing_scale: f64,
    pub dt: f64,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            viscosity: 1e-3,
            drag: 0.1,
            forcing_wavenumber: 4.0,
            forcing_scale: 1.0,
            dt: 0.007,
        }
    }
}

impl PhysicsParams {
    /// Kolmogorov body force `scale * sin(k y)` along x, sampled at `offset`.
    pub fn kolmogorov_forcing(&self, grid: Grid, offset: [f64; 2]) -> Field2 {
        Field2::from_fn(grid, |x, y| {
            let (_, py) = grid.position(x, y, offset);
            self.forcing_scale * (self.forcing_wavenumber * py).sin()
        })
    }
}

/// Minimum of the advective CFL bound and the explicit diffusion bound.
pub fn stable_time_step(max_velocity: f64, max_courant: f64, viscosity: f64, grid: Grid) -> f64 {
    let [dx, dy] = grid.step();
    let h = dx.min(dy);
    let advective = max_courant * h / max_velocity;
    let diffusive = h * h / (viscosity * 2f64.powi(grid.ndim() as i32));
    advective.min(diffusive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn stable_time_step_is_advective_for_low_viscosity() {
        let grid = Grid::square(64, (0.0, 2.0 * PI)).unwrap();
        let dt = stable_time_step(7.0, 0.5, 1e-3, grid);
        let dx = 2.0 * PI / 64.0;
        assert!((dt - 0.5 * dx / 7.0).abs() < 1e-12);
    }

    #[test]
    fn stable_time_step_is_diffusive_for_high_viscosity() {
        let grid = Grid::square(64, (0.0, 2.0 * PI)).unwrap();
        let dx = 2.0 * PI / 64.0;
        let dt = stable_time_step(1.0, 0.5, 10.0, grid);
        assert!((dt - dx * dx / 40.0).abs() < 1e-12);
    }

    #[test]
    fn forcing_depends_on_y_only() {
        let grid = Grid::square(16, (0.0, 2.0 * PI)).unwrap();
        let params = PhysicsParams::default();
        let force = params.kolmogorov_forcing(grid, [0.0, 0.0]);
        assert!((force.get(3, 2) - force.get(11, 2)).abs() < 1e-12);
        let py = grid.position(0, 1, [0.0, 0.0]).1;
        assert!((force.get(0, 1) - (4.0 * py).sin()).abs() < 1e-12);
    }
}
