use crate::spectral::{irfft2, rfft2, signed_mode, SpectralField};
use crate::{Field2, FlowError, Grid};
use num_complex::Complex64;
use std::f64::consts::PI;

// vx sits on the right face of each cell, vy on the top face.
pub const VX_OFFSET: [f64; 2] = [1.0, 0.5];
pub const VY_OFFSET: [f64; 2] = [0.5, 1.0];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryCondition {
    Periodic,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StaggeredField {
    field: Field2,
    offset: [f64; 2],
    bc: BoundaryCondition,
}

impl StaggeredField {
    pub fn periodic(field: Field2, offset: [f64; 2]) -> Self {
        Self {
            field,
            offset,
            bc: BoundaryCondition::Periodic,
        }
    }

    pub fn field(&self) -> &Field2 {
        &self.field
    }

    pub fn into_field(self) -> Field2 {
        self.field
    }

    pub fn grid(&self) -> Grid {
        self.field.grid()
    }

    pub fn offset(&self) -> [f64; 2] {
        self.offset
    }

    pub fn bc(&self) -> BoundaryCondition {
        self.bc
    }

    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.field.get(x, y)
    }

    pub fn get_periodic(&self, x: i64, y: i64) -> f64 {
        match self.bc {
            BoundaryCondition::Periodic => self.field.get_periodic(x, y),
        }
    }

    pub fn with_field(&self, field: Field2) -> Self {
        assert_eq!(field.shape(), self.field.shape(), "staggered grid mismatch");
        Self {
            field,
            offset: self.offset,
            bc: self.bc,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StaggeredVelocity {
    components: [StaggeredField; 2],
}

impl StaggeredVelocity {
    pub fn new(vx: StaggeredField, vy: StaggeredField) -> Self {
        assert_eq!(vx.grid(), vy.grid(), "velocity component grid mismatch");
        Self {
            components: [vx, vy],
        }
    }

    pub fn from_arrays(vx: Field2, vy: Field2) -> Self {
        Self::new(
            StaggeredField::periodic(vx, VX_OFFSET),
            StaggeredField::periodic(vy, VY_OFFSET),
        )
    }

    pub fn zeros(grid: Grid) -> Self {
        Self::from_arrays(Field2::new(grid, 0.0), Field2::new(grid, 0.0))
    }

    pub fn grid(&self) -> Grid {
        self.components[0].grid()
    }

    pub fn components(&self) -> &[StaggeredField; 2] {
        &self.components
    }

    pub fn vx(&self) -> &StaggeredField {
        &self.components[0]
    }

    pub fn vy(&self) -> &StaggeredField {
        &self.components[1]
    }

    pub fn with_fields(&self, vx: Field2, vy: Field2) -> Self {
        Self::new(self.vx().with_field(vx), self.vy().with_field(vy))
    }

    pub fn add_scaled(&self, other: &Self, scale: f64) -> Self {
        self.with_fields(
            self.vx().field().add_scaled(other.vx().field(), scale),
            self.vy().field().add_scaled(other.vy().field(), scale),
        )
    }

    pub fn max_speed(&self) -> f64 {
        self.vx()
            .field()
            .as_slice()
            .iter()
            .zip(self.vy().field().as_slice())
            .map(|(u, v)| (u * u + v * v).sqrt())
            .fold(0.0_f64, f64::max)
    }

    pub fn scale(&self, factor: f64) -> Self {
        self.with_fields(self.vx().field().scale(factor), self.vy().field().scale(factor))
    }

    pub fn is_finite(&self) -> bool {
        self.components.iter().all(|c| c.field().is_finite())
    }
}

pub fn curl_2d(velocity: &StaggeredVelocity) -> Field2 {
    let grid = velocity.grid();
    let [dx, dy] = grid.step();
    let vx = velocity.vx();
    let vy = velocity.vy();
    Field2::from_fn(grid, |x, y| {
        let (xi, yi) = (x as i64, y as i64);
        let dvy_dx = (vy.get_periodic(xi + 1, yi) - vy.get(x, y)) / dx;
        let dvx_dy = (vx.get_periodic(xi, yi + 1) - vx.get(x, y)) / dy;
        dvy_dx - dvx_dy
    })
}

pub fn divergence(velocity: &StaggeredVelocity) -> Field2 {
    let grid = velocity.grid();
    let [dx, dy] = grid.step();
    let vx = velocity.vx();
    let vy = velocity.vy();
    Field2::from_fn(grid, |x, y| {
        let (xi, yi) = (x as i64, y as i64);
        let u_r = vx.get(x, y);
        let u_l = vx.get_periodic(xi - 1, yi);
        let v_u = vy.get(x, y);
        let v_d = vy.get_periodic(xi, yi - 1);
        (u_r - u_l) / dx + (v_u - v_d) / dy
    })
}

fn difference_symbols(m: i64, n: usize, h: f64) -> (Complex64, Complex64) {
    let theta = 2.0 * PI * m as f64 / n as f64;
    let phase = Complex64::from_polar(1.0, theta);
    let forward = (phase - 1.0) / h;
    let backward = (1.0 - phase.conj()) / h;
    (forward, backward)
}

pub fn project(velocity: &StaggeredVelocity) -> StaggeredVelocity {
    let grid = velocity.grid();
    let [nx, ny] = grid.shape();
    let [dx, dy] = grid.step();
    let ux_hat = rfft2(velocity.vx().field());
    let uy_hat = rfft2(velocity.vy().field());
    let pressure_hat = ux_hat.map_with_mode(|kx, ky, ux| {
        let (fx, bx) = difference_symbols(kx as i64, nx, dx);
        let (fy, by) = difference_symbols(signed_mode(ky, ny), ny, dy);
        let laplacian = (bx * fx + by * fy).re;
        if laplacian.abs() < f64::EPSILON {
            return Complex64::default();
        }
        let div = bx * ux + by * uy_hat.get(kx, ky);
        div / laplacian
    });
    let correct = |hat: &SpectralField, axis: usize| {
        hat.map_with_mode(|kx, ky, c| {
            let symbol = if axis == 0 {
                difference_symbols(kx as i64, nx, dx).0
            } else {
                difference_symbols(signed_mode(ky, ny), ny, dy).0
            };
            c - symbol * pressure_hat.get(kx, ky)
        })
    };
    velocity.with_fields(irfft2(&correct(&ux_hat, 0)), irfft2(&correct(&uy_hat, 1)))
}

pub fn restrict(velocity: &StaggeredVelocity, target: Grid) -> Result<StaggeredVelocity, FlowError> {
    let source = velocity.grid();
    let [nx, ny] = source.shape();
    let [mx, my] = target.shape();
    if mx == 0 || my == 0 || nx % mx != 0 || ny % my != 0 {
        return Err(FlowError::IncompatibleResolution {
            native: nx,
            size: mx,
        });
    }
    let (fx, fy) = (nx / mx, ny / my);
    let vx = velocity.vx();
    let vy = velocity.vy();
    let coarse_vx = Field2::from_fn(target, |x, y| {
        let sx = fx * x + fx - 1;
        (0..fy).map(|b| vx.get(sx, fy * y + b)).sum::<f64>() / fy as f64
    });
    let coarse_vy = Field2::from_fn(target, |x, y| {
        let sy = fy * y + fy - 1;
        (0..fx).map(|a| vy.get(fx * x + a, sy)).sum::<f64>() / fx as f64
    });
    Ok(StaggeredVelocity::new(
        StaggeredField::periodic(coarse_vx, vx.offset()),
        StaggeredField::periodic(coarse_vy, vy.offset()),
    ))
}
