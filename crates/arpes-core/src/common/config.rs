//! Tunables for a conversion call.
//!
//! Every field has a default so a settings document only needs to name the
//! values it overrides. Loading from disk is left to the caller; the core
//! only accepts an already-parsed document.

use super::constants::{DEFAULT_INNER_POTENTIAL_EV, DEFAULT_WORK_FUNCTION_EV};
use crate::domain::{ArpesError, ArpesResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversionSettings {
    pub default_work_function: f64,
    pub default_inner_potential: f64,
    pub resample: ResampleSettings,
    pub solver: OffsetSolverSettings,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            default_work_function: DEFAULT_WORK_FUNCTION_EV,
            default_inner_potential: DEFAULT_INNER_POTENTIAL_EV,
            resample: ResampleSettings::default(),
            solver: OffsetSolverSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResampleSettings {
    /// Upper bound on output nodes rasterized per chunk.
    pub max_chunk_nodes: usize,
    pub barycentric_tolerance: f64,
    /// Widens auto-derived bounds on both sides, in Å⁻¹.
    pub bounds_margin: f64,
}

impl Default for ResampleSettings {
    fn default() -> Self {
        Self {
            max_chunk_nodes: 1 << 20,
            barycentric_tolerance: 1.0e-10,
            bounds_margin: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OffsetSolverSettings {
    /// Largest acceptable momentum residual, in Å⁻¹.
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Forward-difference step for the Jacobian, in radians.
    pub finite_difference_step: f64,
}

impl Default for OffsetSolverSettings {
    fn default() -> Self {
        Self {
            tolerance: 1.0e-10,
            max_iterations: 100,
            finite_difference_step: 1.0e-7,
        }
    }
}

impl ConversionSettings {
    pub fn from_json_str(source: &str) -> ArpesResult<Self> {
        let settings: Self = serde_json::from_str(source).map_err(|source| {
            ArpesError::invalid_input(
                "INPUT.SETTINGS_PARSE",
                format!("failed to parse conversion settings: {}", source),
            )
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> ArpesResult<()> {
        require_finite("defaultWorkFunction", self.default_work_function)?;
        require_finite("defaultInnerPotential", self.default_inner_potential)?;
        require_positive("resample.barycentricTolerance", self.resample.barycentric_tolerance)?;
        require_finite("resample.boundsMargin", self.resample.bounds_margin)?;
        if self.resample.bounds_margin < 0.0 {
            return Err(invalid_setting("resample.boundsMargin", self.resample.bounds_margin));
        }
        if self.resample.max_chunk_nodes == 0 {
            return Err(invalid_setting("resample.maxChunkNodes", 0.0));
        }
        require_positive("solver.tolerance", self.solver.tolerance)?;
        require_positive("solver.finiteDifferenceStep", self.solver.finite_difference_step)?;
        if self.solver.max_iterations == 0 {
            return Err(invalid_setting("solver.maxIterations", 0.0));
        }
        Ok(())
    }
}

fn require_finite(field: &'static str, value: f64) -> ArpesResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid_setting(field, value))
    }
}

fn require_positive(field: &'static str, value: f64) -> ArpesResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid_setting(field, value))
    }
}

fn invalid_setting(field: &'static str, value: f64) -> ArpesError {
    ArpesError::invalid_input(
        "INPUT.SETTINGS_VALUE",
        format!("setting '{}' has invalid value {}", field, value),
    )
}

#[cfg(test)]
mod tests {
    use super::ConversionSettings;
    use crate::domain::ArpesErrorKind;

    #[test]
    fn partial_document_keeps_defaults() {
        let settings = ConversionSettings::from_json_str(
            r#"{ "defaultInnerPotential": 12.5, "solver": { "maxIterations": 7 } }"#,
        )
        .expect("settings should parse");

        assert_eq!(settings.default_inner_potential, 12.5);
        assert_eq!(settings.default_work_function, 4.3);
        assert_eq!(settings.solver.max_iterations, 7);
        assert_eq!(settings.solver.tolerance, 1.0e-10);
        assert_eq!(settings.resample.max_chunk_nodes, 1 << 20);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let error = ConversionSettings::from_json_str(r#"{ "solver": { "tolerance": -1.0 } }"#)
            .expect_err("negative tolerance should fail");
        assert_eq!(error.kind(), ArpesErrorKind::InvalidInput);
        assert_eq!(error.placeholder(), "INPUT.SETTINGS_VALUE");

        let error = ConversionSettings::from_json_str("{ not json")
            .expect_err("malformed document should fail");
        assert_eq!(error.placeholder(), "INPUT.SETTINGS_PARSE");
    }
}
