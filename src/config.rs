use crate::downsample::OutputSpec;
use crate::initial::Capabilities;
use crate::physics::stable_time_step;
use crate::trajectory::{check_time_step, Method, TrajectoryRequest};
use crate::{FlowError, Grid, PhysicsParams};
use anyhow::Context;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::Path;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub grid: GridConfig,
    pub method: String,
    pub step: Option<String>,
    pub seed: u64,
    pub peak_wavenumber: f64,
    pub max_velocity: f64,
    pub inner_steps: usize,
    pub outer_steps: usize,
    pub warmup_steps: usize,
    pub out_vorticity: bool,
    pub outputs: Vec<OutputSpec>,
    pub physics: PhysicsConfig,
    pub supports_user_initial_velocity: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub size: usize,
    pub domain: (f64, f64),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub viscosity: f64,
    pub drag: f64,
    pub forcing_wavenumber: f64,
    pub forcing_scale: f64,
    /// Inner time step; derived from the stability bound when unset.
    pub dt: Option<f64>,
    pub max_courant: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            method: "pseudo_spectral".into(),
            step: None,
            seed: 0,
            peak_wavenumber: 4.0,
            max_velocity: 7.0,
            inner_steps: 25,
            outer_steps: 200,
            warmup_steps: 40,
            out_vorticity: true,
            outputs: Vec::new(),
            physics: PhysicsConfig::default(),
            supports_user_initial_velocity: true,
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            size: 64,
            domain: (0.0, 2.0 * PI),
        }
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        let physics = PhysicsParams::default();
        Self {
            viscosity: physics.viscosity,
            drag: physics.drag,
            forcing_wavenumber: physics.forcing_wavenumber,
            forcing_scale: physics.forcing_scale,
            dt: None,
            max_courant: 0.5,
        }
    }
}

impl GeneratorConfig {
    pub fn from_yaml_str(contents: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(contents).context("failed to parse generator config")
    }

    pub fn to_request(&self) -> Result<TrajectoryRequest, FlowError> {
        let method: Method = self.method.parse()?;
        let grid = Grid::square(self.grid.size, self.grid.domain)?;
        let dt = match self.physics.dt {
            Some(dt) => dt,
            None => stable_time_step(
                self.max_velocity,
                self.physics.max_courant,
                self.physics.viscosity,
                grid,
            ),
        };
        check_time_step(dt)?;
        let outputs = if self.outputs.is_empty() {
            vec![OutputSpec {
                size: self.grid.size,
                k: 1,
            }]
        } else {
            self.outputs.clone()
        };
        let mut request = TrajectoryRequest::new(grid, method);
        request.outputs = outputs;
        request.step = self.step.clone().unwrap_or_else(|| method.name().to_string());
        request.physics = PhysicsParams {
            viscosity: self.physics.viscosity,
            drag: self.physics.drag,
            forcing_wavenumber: self.physics.forcing_wavenumber,
            forcing_scale: self.physics.forcing_scale,
            dt,
        };
        request.seed = self.seed;
        request.peak_wavenumber = self.peak_wavenumber;
        request.max_velocity = self.max_velocity;
        request.inner_steps = self.inner_steps;
        request.outer_steps = self.outer_steps;
        request.warmup_steps = self.warmup_steps;
        request.out_vorticity = self.out_vorticity;
        request.capabilities = Capabilities {
            supports_user_initial_velocity: self.supports_user_initial_velocity,
        };
        Ok(request)
    }
}

pub fn load(path: &Path) -> anyhow::Result<GeneratorConfig> {
    if !path.exists() {
        warn!("config {} not found; using defaults", path.display());
        return Ok(GeneratorConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config = GeneratorConfig::from_yaml_str(&contents)
        .with_context(|| format!("in {}", path.display()))?;
    info!("loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let cfg = GeneratorConfig::default();
        assert_eq!(cfg.grid.size, 64);
        assert_eq!(cfg.method, "pseudo_spectral");
        assert_eq!(cfg.step, None);
        assert_eq!(cfg.peak_wavenumber, 4.0);
        assert_eq!(cfg.max_velocity, 7.0);
        assert_eq!(cfg.inner_steps, 25);
        assert_eq!(cfg.outer_steps, 200);
        assert_eq!(cfg.warmup_steps, 40);
        assert!(cfg.out_vorticity);
        assert_eq!(cfg.physics.viscosity, 1e-3);
        assert_eq!(cfg.physics.drag, 0.1);
        assert_eq!(cfg.physics.dt, None);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = "grid:\n  size: 32\nphysics:\n  viscosity: 0.01\nseed: 9\n";
        let cfg = GeneratorConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.grid.size, 32);
        assert_eq!(cfg.grid.domain, (0.0, 2.0 * PI)); // default
        assert_eq!(cfg.physics.viscosity, 0.01);
        assert_eq!(cfg.physics.drag, 0.1); // default
        assert_eq!(cfg.seed, 9);
    }

    #[test]
    fn test_outputs_yaml() {
        let yaml = r#"
method: finite_volume
outputs:
  - size: 64
    k: 1
  - size: 32
    stride: 2
"#;
        let cfg = GeneratorConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(
            cfg.outputs,
            vec![OutputSpec { size: 64, k: 1 }, OutputSpec { size: 32, k: 2 }]
        );
        let request = cfg.to_request().unwrap();
        assert_eq!(request.method, Method::FiniteVolume);
        assert_eq!(request.step, "finite_volume");
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(GeneratorConfig::from_yaml_str("grid: [1, 2").is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let cfg = load(Path::new("/nonexistent/kolmogorov.yaml")).unwrap();
        assert_eq!(cfg.grid.size, 64);
    }

    #[test]
    fn test_request_resolves_dt_and_outputs() {
        let cfg = GeneratorConfig::default();
        let request = cfg.to_request().unwrap();
        let expected = stable_time_step(7.0, 0.5, 1e-3, request.grid);
        assert!((request.physics.dt - expected).abs() < 1e-15);
        assert_eq!(request.outputs, vec![OutputSpec { size: 64, k: 1 }]);
        assert_eq!(request.step, "pseudo_spectral");

        let mut cfg = GeneratorConfig::default();
        cfg.physics.dt = Some(0.002);
        assert_eq!(cfg.to_request().unwrap().physics.dt, 0.002);
    }

    #[test]
    fn test_unusable_dt_is_rejected() {
        let mut cfg = GeneratorConfig::default();
        cfg.max_velocity = 0.0;
        cfg.physics.viscosity = 0.0;
        assert!(matches!(
            cfg.to_request().unwrap_err(),
            FlowError::InvalidTimeStep(dt) if dt.is_infinite()
        ));
        let mut cfg = GeneratorConfig::default();
        cfg.physics.dt = Some(-1.0);
        assert_eq!(cfg.to_request().unwrap_err(), FlowError::InvalidTimeStep(-1.0));
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        let cfg = GeneratorConfig {
            method: "spectral_element".into(),
            ..GeneratorConfig::default()
        };
        assert_eq!(
            cfg.to_request().unwrap_err(),
            FlowError::UnsupportedMethod("spectral_element".into())
        );
    }
}
