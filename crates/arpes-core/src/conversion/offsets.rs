//! Angle-offset root finding.
//!
//! The solver only sees a residual function of the offsets; it knows
//! nothing about grids or resampling.

use super::geometry::AngleOffsets;
use crate::common::OffsetSolverSettings;
use crate::common::constants::{ENERGY_AXIS, PHOTON_ENERGY_AXIS, is_angular_axis};
use crate::domain::{ArpesError, ArpesResult};
use crate::numerics::lu_solve;
use faer::Mat;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

const INITIAL_DAMPING: f64 = 1.0e-3;
const MIN_DAMPING: f64 = 1.0e-12;
const MAX_DAMPING: f64 = 1.0e12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OffsetParameter {
    Phi,
    Psi,
    Theta,
    Beta,
    Chi,
}

impl OffsetParameter {
    pub const fn axis_name(self) -> &'static str {
        match self {
            Self::Phi => "phi",
            Self::Psi => "psi",
            Self::Theta => "theta",
            Self::Beta => "beta",
            Self::Chi => "chi",
        }
    }

    fn read(self, offsets: &AngleOffsets) -> f64 {
        match self {
            Self::Phi => offsets.phi,
            Self::Psi => offsets.psi,
            Self::Theta => offsets.theta,
            Self::Beta => offsets.beta,
            Self::Chi => offsets.chi,
        }
    }

    fn write(self, offsets: &mut AngleOffsets, value: f64) {
        match self {
            Self::Phi => offsets.phi = value,
            Self::Psi => offsets.psi = value,
            Self::Theta => offsets.theta = value,
            Self::Beta => offsets.beta = value,
            Self::Chi => offsets.chi = value,
        }
    }
}

/// A location in angle space (plus optional `hv`/`eV`) with the in-plane
/// momentum it should map to.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalibrationPoint {
    coordinates: BTreeMap<String, f64>,
    target: [f64; 2],
}

impl CalibrationPoint {
    /// Builds a point that should map to the momentum origin.
    pub fn new<I, K>(coordinates: I) -> ArpesResult<Self>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let mut point = Self::default();
        for (name, value) in coordinates {
            let name = name.into();
            if !(is_angular_axis(&name) || name == PHOTON_ENERGY_AXIS || name == ENERGY_AXIS) {
                return Err(ArpesError::missing_coordinate(
                    "INPUT.CALIBRATION_AXIS",
                    format!(
                        "calibration coordinate '{}' is not an angle, '{}' or '{}'",
                        name, PHOTON_ENERGY_AXIS, ENERGY_AXIS
                    ),
                ));
            }
            if !value.is_finite() {
                return Err(ArpesError::invalid_input(
                    "INPUT.CALIBRATION_VALUE",
                    format!("calibration coordinate '{}' is not finite", name),
                ));
            }
            point.coordinates.insert(name, value);
        }
        Ok(point)
    }

    /// Target in-plane momentum `(kx, ky)`; for a cut only the first entry is used.
    pub fn with_target(mut self, target: [f64; 2]) -> Self {
        self.target = target;
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.coordinates.get(name).copied()
    }

    pub fn coordinates(&self) -> &BTreeMap<String, f64> {
        &self.coordinates
    }

    pub fn target(&self) -> [f64; 2] {
        self.target
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OffsetSolveError {
    #[error("offset solve takes 1 to 3 free offsets, got {count}")]
    ParameterCount { count: usize },
    #[error("{residuals} residuals cannot determine {parameters} free offsets")]
    Underdetermined { residuals: usize, parameters: usize },
    #[error("residuals are not finite after {iteration} iterations")]
    NonFiniteResidual { iteration: usize },
    #[error("no convergence within {iterations} iterations (max |residual| = {residual_norm:.3e} 1/Å)")]
    NotConverged { iterations: usize, residual_norm: f64 },
}

impl From<OffsetSolveError> for ArpesError {
    fn from(source: OffsetSolveError) -> Self {
        match source {
            OffsetSolveError::ParameterCount { .. } | OffsetSolveError::Underdetermined { .. } => {
                ArpesError::invalid_input("INPUT.OFFSET_PROBLEM", source.to_string())
            }
            OffsetSolveError::NonFiniteResidual { .. } | OffsetSolveError::NotConverged { .. } => {
                ArpesError::convergence("RUN.OFFSET_SOLVE", source.to_string())
            }
        }
    }
}

/// Free offsets, their starting values and the residual function to drive to zero.
pub struct OffsetProblem<F>
where
    F: Fn(&AngleOffsets) -> Vec<f64>,
{
    pub parameters: Vec<OffsetParameter>,
    pub initial: AngleOffsets,
    pub residuals: F,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetSolution {
    pub offsets: AngleOffsets,
    pub iterations: usize,
    pub residual_norm: f64,
}

/// Damped Gauss-Newton (Levenberg-Marquardt) over the free offsets.
pub fn solve_offsets<F>(
    problem: &OffsetProblem<F>,
    settings: &OffsetSolverSettings,
) -> Result<OffsetSolution, OffsetSolveError>
where
    F: Fn(&AngleOffsets) -> Vec<f64>,
{
    let parameters = &problem.parameters;
    if parameters.is_empty() || parameters.len() > 3 {
        return Err(OffsetSolveError::ParameterCount {
            count: parameters.len(),
        });
    }

    let mut offsets = problem.initial;
    let mut residuals = (problem.residuals)(&offsets);
    if residuals.len() < parameters.len() {
        return Err(OffsetSolveError::Underdetermined {
            residuals: residuals.len(),
            parameters: parameters.len(),
        });
    }
    if !all_finite(&residuals) {
        return Err(OffsetSolveError::NonFiniteResidual { iteration: 0 });
    }

    let mut damping = INITIAL_DAMPING;
    let mut iteration = 0;
    loop {
        let residual_norm = max_abs(&residuals);
        debug!(iteration, residual_norm, damping, "offset solve step");
        if residual_norm <= settings.tolerance {
            return Ok(OffsetSolution {
                offsets,
                iterations: iteration,
                residual_norm,
            });
        }
        if iteration == settings.max_iterations || damping > MAX_DAMPING {
            return Err(OffsetSolveError::NotConverged {
                iterations: iteration,
                residual_norm,
            });
        }
        iteration += 1;

        let jacobian = forward_difference_jacobian(problem, &offsets, &residuals, settings.finite_difference_step);
        if !jacobian.iter().all(|column| all_finite(column)) {
            return Err(OffsetSolveError::NonFiniteResidual { iteration });
        }

        let count = parameters.len();
        let normal = Mat::from_fn(count, count, |row, col| {
            let product: f64 = jacobian[row].iter().zip(&jacobian[col]).map(|(a, b)| a * b).sum();
            if row == col {
                product + damping * product.max(MIN_DAMPING)
            } else {
                product
            }
        });
        let gradient: Vec<f64> = jacobian
            .iter()
            .map(|column| -column.iter().zip(&residuals).map(|(a, r)| a * r).sum::<f64>())
            .collect();

        let Ok(step) = lu_solve(&normal, &gradient) else {
            damping *= 10.0;
            continue;
        };

        let mut candidate = offsets;
        for (parameter, delta) in parameters.iter().zip(&step) {
            let value = parameter.read(&candidate) + delta;
            parameter.write(&mut candidate, value);
        }
        let candidate_residuals = (problem.residuals)(&candidate);
        if all_finite(&candidate_residuals) && sum_squares(&candidate_residuals) < sum_squares(&residuals) {
            offsets = candidate;
            residuals = candidate_residuals;
            damping = (damping / 10.0).max(MIN_DAMPING);
        } else {
            damping *= 10.0;
        }
    }
}

/// One column per free offset.
fn forward_difference_jacobian<F>(
    problem: &OffsetProblem<F>,
    offsets: &AngleOffsets,
    residuals: &[f64],
    step: f64,
) -> Vec<Vec<f64>>
where
    F: Fn(&AngleOffsets) -> Vec<f64>,
{
    problem
        .parameters
        .iter()
        .map(|parameter| {
            let mut shifted = *offsets;
            parameter.write(&mut shifted, parameter.read(offsets) + step);
            (problem.residuals)(&shifted)
                .iter()
                .zip(residuals)
                .map(|(shifted, base)| (shifted - base) / step)
                .collect()
        })
        .collect()
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|value| value.is_finite())
}

fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0, |acc, value| acc.max(value.abs()))
}

fn sum_squares(values: &[f64]) -> f64 {
    values.iter().map(|value| value * value).sum()
}
