use crate::domain::{ArpesError, ArpesResult, Coordinate};
use crate::numerics::{is_strictly_monotonic, linear_grid, stepped_grid};
use std::collections::BTreeMap;

/// Caller-facing description of one output momentum axis.
#[derive(Debug, Clone, PartialEq)]
pub enum AxisGrid {
    /// `min, min + step, ...` up to `max`.
    Range { min: f64, max: f64, step: f64 },
    /// `count` evenly spaced samples from `start` to `stop` inclusive.
    Linspace { start: f64, stop: f64, count: usize },
    /// Explicit strictly monotonic samples.
    Samples(Vec<f64>),
}

/// Explicit grids keyed by momentum axis name (`kx`, `ky`, `kz`, `kp`).
pub type AxisGrids = BTreeMap<String, AxisGrid>;

impl AxisGrid {
    pub fn range(min: f64, max: f64, step: f64) -> Self {
        Self::Range { min, max, step }
    }

    pub fn linspace(start: f64, stop: f64, count: usize) -> Self {
        Self::Linspace { start, stop, count }
    }

    pub fn samples(values: Vec<f64>) -> Self {
        Self::Samples(values)
    }

    pub fn resolve(&self, name: &str) -> ArpesResult<Coordinate> {
        let values = match self {
            Self::Range { min, max, step } => {
                if !(min.is_finite() && max.is_finite() && step.is_finite()) {
                    return Err(grid_error(name, "range bounds and step must be finite"));
                }
                if *step <= 0.0 {
                    return Err(grid_error(name, format!("step must be positive, got {}", step)));
                }
                if min > max {
                    return Err(grid_error(name, format!("min {} exceeds max {}", min, max)));
                }
                stepped_grid(*min, *max, *step)
                    .ok_or_else(|| grid_error(name, "range produced no samples"))?
            }
            Self::Linspace { start, stop, count } => {
                if !(start.is_finite() && stop.is_finite()) {
                    return Err(grid_error(name, "linspace bounds must be finite"));
                }
                if *count == 0 {
                    return Err(grid_error(name, "grid has zero length"));
                }
                if *count > 1 && start == stop {
                    return Err(grid_error(
                        name,
                        format!("{} samples between identical bounds are not monotonic", count),
                    ));
                }
                linear_grid(*start, *stop, *count)
                    .ok_or_else(|| grid_error(name, "grid has zero length"))?
            }
            Self::Samples(values) => {
                if values.is_empty() {
                    return Err(grid_error(name, "grid has zero length"));
                }
                if values.iter().any(|value| !value.is_finite()) {
                    return Err(grid_error(name, "grid samples must be finite"));
                }
                if !is_strictly_monotonic(values) {
                    return Err(grid_error(name, "grid samples must be strictly monotonic"));
                }
                values.clone()
            }
        };

        Ok(Coordinate::new(name, values))
    }
}

/// Regular output grid over 1–3 momentum axes, built fresh per call.
#[derive(Debug, Clone, PartialEq)]
pub struct MomentumGrid {
    axes: Vec<Coordinate>,
}

impl MomentumGrid {
    pub fn new(axes: Vec<Coordinate>) -> ArpesResult<Self> {
        if axes.is_empty() || axes.len() > 3 {
            return Err(ArpesError::grid_spec(
                "INPUT.GRID_RANK",
                format!("momentum grids have 1 to 3 axes, got {}", axes.len()),
            ));
        }
        for axis in &axes {
            AxisGrid::Samples(axis.values.clone()).resolve(&axis.name)?;
        }
        Ok(Self { axes })
    }

    pub fn axes(&self) -> &[Coordinate] {
        &self.axes
    }

    pub fn axis(&self, index: usize) -> &[f64] {
        &self.axes[index].values
    }

    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(Coordinate::len).collect()
    }

    pub fn node_count(&self) -> usize {
        self.axes.iter().map(Coordinate::len).product()
    }

    /// Number of nodes in one row of the first axis.
    pub fn row_stride(&self) -> usize {
        self.axes[1..].iter().map(Coordinate::len).product()
    }
}

/// Grid for an axis the caller left unspecified: the finite extent of the
/// scattered cloud, sampled as densely as the source axis it derives from.
pub fn default_axis(
    name: &str,
    extent: Option<(f64, f64)>,
    source_length: usize,
    margin: f64,
) -> ArpesResult<Coordinate> {
    let (low, high) = extent.ok_or_else(|| {
        ArpesError::invalid_geometry(
            "RUN.EMPTY_CLOUD",
            format!("no sample maps to a finite '{}' momentum; the forward model is undefined everywhere", name),
        )
    })?;
    let (low, high) = (low - margin, high + margin);

    if high <= low {
        return Ok(Coordinate::new(name, vec![low]));
    }

    let count = source_length.max(2);
    let values = linear_grid(low, high, count)
        .ok_or_else(|| grid_error(name, "default grid has zero length"))?;
    Ok(Coordinate::new(name, values))
}

fn grid_error(name: &str, message: impl Into<String>) -> ArpesError {
    ArpesError::grid_spec(
        "INPUT.GRID_SPEC",
        format!("grid for '{}': {}", name, message.into()),
    )
}
