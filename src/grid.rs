use crate::FlowError;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Grid {
    shape: [usize; 2],
    domain: [(f64, f64); 2],
}

impl Grid {
    pub fn new(shape: &[usize], domain: &[(f64, f64)]) -> Result<Self, FlowError> {
        if shape.len() != domain.len() {
            return Err(FlowError::InvalidGrid(format!(
                "shape has {} axes but domain has {}",
                shape.len(),
                domain.len()
            )));
        }
        if shape.len() != 2 {
            return Err(FlowError::InvalidGrid(format!(
                "only 2D grids are supported, got ndim = {}",
                shape.len()
            )));
        }
        if shape.iter().any(|n| *n == 0) {
            return Err(FlowError::InvalidGrid("every axis needs at least one point".into()));
        }
        for (lo, hi) in domain {
            if !lo.is_finite() || !hi.is_finite() || hi <= lo {
                return Err(FlowError::InvalidGrid(format!(
                    "domain interval ({lo}, {hi}) is empty"
                )));
            }
        }
        Ok(Self {
            shape: [shape[0], shape[1]],
            domain: [domain[0], domain[1]],
        })
    }

    pub fn square(size: usize, interval: (f64, f64)) -> Result<Self, FlowError> {
        Self::new(&[size, size], &[interval, interval])
    }

    pub fn with_size(&self, size: usize) -> Result<Self, FlowError> {
        Self::new(&[size, size], &self.domain)
    }

    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    pub fn domain(&self) -> [(f64, f64); 2] {
        self.domain
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn width(&self) -> usize {
        self.shape[0]
    }

    pub fn height(&self) -> usize {
        self.shape[1]
    }

    pub fn length(&self, axis: usize) -> f64 {
        let (lo, hi) = self.domain[axis];
        hi - lo
    }

    pub fn step(&self) -> [f64; 2] {
        [
            self.length(0) / self.shape[0] as f64,
            self.length(1) / self.shape[1] as f64,
        ]
    }

    pub fn len(&self) -> usize {
        self.shape[0] * self.shape[1]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn idx(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.shape[0] && y < self.shape[1]);
        y * self.shape[0] + x
    }

    pub fn wrap(&self, x: i64, y: i64) -> (usize, usize) {
        let w = self.shape[0] as i64;
        let h = self.shape[1] as i64;
        (x.rem_euclid(w) as usize, y.rem_euclid(h) as usize)
    }

    /// Physical position of sample `(x, y)` located at `offset` cells from the
    /// lower cell corner. Cell centres sit at offset `(0.5, 0.5)`.
    pub fn position(&self, x: usize, y: usize, offset: [f64; 2]) -> (f64, f64) {
        let step = self.step();
        (
            self.domain[0].0 + (x as f64 + offset[0]) * step[0],
            self.domain[1].0 + (y as f64 + offset[1]) * step[1],
        )
    }
}
