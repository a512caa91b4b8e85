use crate::staggered::{project, StaggeredVelocity, VX_OFFSET};
use crate::step::Step;
use crate::{Field2, Grid, PhysicsParams};

pub struct FiniteVolumeStep {
    grid: Grid,
    dt: f64,
    viscosity: f64,
    drag: f64,
    forcing_x: Field2,
}

impl FiniteVolumeStep {
    pub fn new(grid: Grid, physics: PhysicsParams) -> Self {
        Self {
            grid,
            dt: physics.dt,
            viscosity: physics.viscosity,
            drag: physics.drag,
            forcing_x: physics.kolmogorov_forcing(grid, VX_OFFSET),
        }
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    fn tendency(&self, velocity: &StaggeredVelocity) -> StaggeredVelocity {
        let (conv_x, conv_y) = convection(velocity);
        let vx = velocity.vx().field();
        let vy = velocity.vy().field();
        let lap_x = laplacian(vx);
        let lap_y = laplacian(vy);
        let tx = Field2::from_fn(self.grid, |x, y| {
            -conv_x.get(x, y) + self.viscosity * lap_x.get(x, y) + self.forcing_x.get(x, y)
                - self.drag * vx.get(x, y)
        });
        let ty = Field2::from_fn(self.grid, |x, y| {
            -conv_y.get(x, y) + self.viscosity * lap_y.get(x, y) - self.drag * vy.get(x, y)
        });
        velocity.with_fields(tx, ty)
    }
}

impl Step<StaggeredVelocity> for FiniteVolumeStep {
    fn step(&self, state: &StaggeredVelocity) -> StaggeredVelocity {
        assert_eq!(state.grid(), self.grid, "state grid does not match step grid");
        let k1 = self.tendency(state);
        let half = project(&state.add_scaled(&k1, 0.5 * self.dt));
        let k2 = self.tendency(&half);
        project(&state.add_scaled(&k2, self.dt))
    }
}

pub fn convection(velocity: &StaggeredVelocity) -> (Field2, Field2) {
    let grid = velocity.grid();
    let [dx, dy] = grid.step();
    let u = velocity.vx();
    let v = velocity.vy();
    // u² at the cell centre right of x face (i, j).
    let uu = |i: i64, j: i64| {
        let m = 0.5 * (u.get_periodic(i, j) + u.get_periodic(i + 1, j));
        m * m
    };
    let vv = |i: i64, j: i64| {
        let m = 0.5 * (v.get_periodic(i, j) + v.get_periodic(i, j + 1));
        m * m
    };
    // u v at cell corners, shared by both components.
    let uv = |i: i64, j: i64| {
        let ua = 0.5 * (u.get_periodic(i, j) + u.get_periodic(i, j + 1));
        let va = 0.5 * (v.get_periodic(i, j) + v.get_periodic(i + 1, j));
        ua * va
    };
    let conv_x = Field2::from_fn(grid, |x, y| {
        let (i, j) = (x as i64, y as i64);
        (uu(i, j) - uu(i - 1, j)) / dx + (uv(i, j) - uv(i, j - 1)) / dy
    });
    let conv_y = Field2::from_fn(grid, |x, y| {
        let (i, j) = (x as i64, y as i64);
        (uv(i, j) - uv(i - 1, j)) / dx + (vv(i, j) - vv(i, j - 1)) / dy
    });
    (conv_x, conv_y)
}

pub fn laplacian(field: &Field2) -> Field2 {
    let [dx, dy] = field.grid().step();
    let inv_dx2 = 1.0 / (dx * dx);
    let inv_dy2 = 1.0 / (dy * dy);
    Field2::from_fn(field.grid(), |x, y| {
        let (i, j) = (x as i64, y as i64);
        let c = field.get(x, y);
        (field.get_periodic(i + 1, j) - 2.0 * c + field.get_periodic(i - 1, j)) * inv_dx2
            + (field.get_periodic(i, j + 1) - 2.0 * c + field.get_periodic(i, j - 1)) * inv_dy2
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staggered::divergence;
    use std::f64::consts::PI;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() <= tol, "expected {a} to be within {tol} of {b}");
    }

    fn grid(n: usize) -> Grid {
        Grid::square(n, (0.0, 2.0 * PI)).unwrap()
    }

    #[test]
    fn laplacian_of_sine() {
        let g = grid(64);
        let field = Field2::from_fn(g, |x, y| g.position(x, y, [0.0, 0.0]).0.sin());
        let lap = laplacian(&field);
        for x in [3, 17, 40] {
            assert_close(lap.get(x, 5), -field.get(x, 5), 2e-3);
        }
    }

    #[test]
    fn uniform_flow_has_no_convection() {
        let g = grid(8);
        let velocity = StaggeredVelocity::from_arrays(Field2::new(g, 2.0), Field2::new(g, -1.0));
        let (cx, cy) = convection(&velocity);
        assert_close(cx.max_abs(), 0.0, 1e-12);
        assert_close(cy.max_abs(), 0.0, 1e-12);
    }

    #[test]
    fn shear_flow_has_no_convection() {
        // vx = sin(y) is an exact steady solution of the inviscid advection operator.
        let g = grid(16);
        let vx = Field2::from_fn(g, |x, y| g.position(x, y, VX_OFFSET).1.sin());
        let velocity = StaggeredVelocity::from_arrays(vx, Field2::new(g, 0.0));
        let (cx, cy) = convection(&velocity);
        assert_close(cx.max_abs(), 0.0, 1e-12);
        assert_close(cy.max_abs(), 0.0, 1e-12);
    }

    #[test]
    fn step_stays_divergence_free() {
        let g = grid(16);
        let vx = Field2::from_fn(g, |x, y| ((x * 3 + y * 5) % 7) as f64 * 0.1);
        let vy = Field2::from_fn(g, |x, y| ((x * 11 + y) % 5) as f64 * 0.1);
        let state = project(&StaggeredVelocity::from_arrays(vx, vy));
        let step = FiniteVolumeStep::new(
            g,
            PhysicsParams {
                dt: 0.01,
                ..PhysicsParams::default()
            },
        );
        let next = step.step(&state);
        assert!(next.is_finite());
        assert!(divergence(&next).max_abs() < 1e-10);
    }

    #[test]
    fn forcing_accelerates_rest_state() {
        let g = grid(16);
        let dt = 0.01;
        let step = FiniteVolumeStep::new(
            g,
            PhysicsParams {
                dt,
                ..PhysicsParams::default()
            },
        );
        let next = step.step(&StaggeredVelocity::zeros(g));
        let py = g.position(0, 3, VX_OFFSET).1;
        assert_close(next.vx().get(0, 3), dt * (4.0 * py).sin(), 1e-4);
        assert_close(next.vy().field().max_abs(), 0.0, 1e-12);
    }
}
