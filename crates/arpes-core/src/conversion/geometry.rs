//! Typed geometry record read out of a spectrum's attributes.

use crate::common::ConversionSettings;
use crate::common::constants::DEGREES_TO_RADIANS;
use crate::domain::{ArpesError, ArpesResult, AttrMap};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AngleUnit {
    #[default]
    Radians,
    Degrees,
}

impl AngleUnit {
    pub fn to_radians(self, value: f64) -> f64 {
        match self {
            Self::Radians => value,
            Self::Degrees => value * DEGREES_TO_RADIANS,
        }
    }

    pub fn from_radians(self, value: f64) -> f64 {
        match self {
            Self::Radians => value,
            Self::Degrees => value / DEGREES_TO_RADIANS,
        }
    }
}

/// How the `eV` coordinate is referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnergyNotation {
    /// Relative to the Fermi level; kinetic energy is `hv - work_function + eV`.
    #[default]
    Binding,
    /// Already the photoelectron kinetic energy.
    Kinetic,
}

/// One set of raw manipulator and analyzer angles, in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AngleSample {
    pub phi: f64,
    pub psi: f64,
    pub alpha: f64,
    pub theta: f64,
    pub beta: f64,
    pub chi: f64,
}

impl AngleSample {
    pub fn get(&self, axis: &str) -> Option<f64> {
        match axis {
            "phi" => Some(self.phi),
            "psi" => Some(self.psi),
            "alpha" => Some(self.alpha),
            "theta" => Some(self.theta),
            "beta" => Some(self.beta),
            "chi" => Some(self.chi),
            _ => None,
        }
    }

    pub fn set(&mut self, axis: &str, value: f64) -> bool {
        let slot = match axis {
            "phi" => &mut self.phi,
            "psi" => &mut self.psi,
            "alpha" => &mut self.alpha,
            "theta" => &mut self.theta,
            "beta" => &mut self.beta,
            "chi" => &mut self.chi,
            _ => return false,
        };
        *slot = value;
        true
    }
}

/// Angle offsets, always subtracted from the raw angle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AngleOffsets {
    pub phi: f64,
    pub psi: f64,
    pub theta: f64,
    pub beta: f64,
    pub chi: f64,
}

impl AngleOffsets {
    pub const ATTRIBUTE_NAMES: [(&'static str, &'static str); 5] = [
        ("phi", "phi_offset"),
        ("psi", "psi_offset"),
        ("theta", "theta_offset"),
        ("beta", "beta_offset"),
        ("chi", "chi_offset"),
    ];

    pub fn effective(&self, raw: &AngleSample) -> AngleSample {
        AngleSample {
            phi: raw.phi - self.phi,
            psi: raw.psi - self.psi,
            alpha: raw.alpha,
            theta: raw.theta - self.theta,
            beta: raw.beta - self.beta,
            chi: raw.chi - self.chi,
        }
    }

    pub fn get(&self, axis: &str) -> Option<f64> {
        match axis {
            "phi" => Some(self.phi),
            "psi" => Some(self.psi),
            "theta" => Some(self.theta),
            "beta" => Some(self.beta),
            "chi" => Some(self.chi),
            _ => None,
        }
    }

    pub fn set(&mut self, axis: &str, value: f64) -> bool {
        let slot = match axis {
            "phi" => &mut self.phi,
            "psi" => &mut self.psi,
            "theta" => &mut self.theta,
            "beta" => &mut self.beta,
            "chi" => &mut self.chi,
            _ => return false,
        };
        *slot = value;
        true
    }
}

/// Scalar instrument constants for one conversion call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    /// Angles that are not axes of the data; axis values override them per sample.
    pub angles: AngleSample,
    pub offsets: AngleOffsets,
    pub hv: Option<f64>,
    pub work_function: f64,
    pub inner_potential: f64,
    /// `eV` used when energy is not an axis of the data.
    pub energy: f64,
    pub energy_notation: EnergyNotation,
    pub angle_unit: AngleUnit,
}

impl Geometry {
    pub fn from_attrs(attrs: &AttrMap, settings: &ConversionSettings) -> ArpesResult<Self> {
        let angle_unit = match attr_string(attrs, "angle_unit")?.as_deref() {
            None | Some("rad") | Some("radian") | Some("radians") => AngleUnit::Radians,
            Some("deg") | Some("degree") | Some("degrees") => AngleUnit::Degrees,
            Some(other) => {
                return Err(ArpesError::invalid_geometry(
                    "INPUT.ANGLE_UNIT",
                    format!("unsupported angle_unit '{}'", other),
                ));
            }
        };
        let energy_notation = match attr_string(attrs, "energy_notation")?.as_deref() {
            None | Some("binding") | Some("Binding") => EnergyNotation::Binding,
            Some("kinetic") | Some("Kinetic") => EnergyNotation::Kinetic,
            Some(other) => {
                return Err(ArpesError::invalid_geometry(
                    "INPUT.ENERGY_NOTATION",
                    format!("unsupported energy_notation '{}'", other),
                ));
            }
        };

        let mut angles = AngleSample::default();
        for axis in ["phi", "psi", "alpha", "theta", "beta", "chi"] {
            if let Some(value) = attr_number(attrs, axis)? {
                angles.set(axis, angle_unit.to_radians(value));
            }
        }

        let mut offsets = AngleOffsets::default();
        for (axis, attribute) in AngleOffsets::ATTRIBUTE_NAMES {
            if let Some(value) = attr_number(attrs, attribute)? {
                offsets.set(axis, angle_unit.to_radians(value));
            }
        }

        let geometry = Self {
            angles,
            offsets,
            hv: attr_number(attrs, "hv")?,
            work_function: attr_number(attrs, "work_function")?
                .unwrap_or(settings.default_work_function),
            inner_potential: attr_number(attrs, "inner_potential")?
                .unwrap_or(settings.default_inner_potential),
            energy: attr_number(attrs, "eV")?.unwrap_or(0.0),
            energy_notation,
            angle_unit,
        };

        if let Some(hv) = geometry.hv {
            if hv <= 0.0 {
                return Err(ArpesError::invalid_geometry(
                    "INPUT.PHOTON_ENERGY",
                    format!("photon energy must be positive, got {}", hv),
                ));
            }
        }

        Ok(geometry)
    }

    /// Photoelectron kinetic energy for photon energy `hv` and energy coordinate `energy`.
    pub fn kinetic_energy(&self, hv: f64, energy: f64) -> f64 {
        match self.energy_notation {
            EnergyNotation::Binding => hv - self.work_function + energy,
            EnergyNotation::Kinetic => energy,
        }
    }

    /// Stores the offsets back into an attribute map in the map's angle unit.
    pub fn write_offsets(&self, attrs: &mut AttrMap) {
        for (axis, attribute) in AngleOffsets::ATTRIBUTE_NAMES {
            if let Some(value) = self.offsets.get(axis) {
                attrs.insert(
                    attribute.to_string(),
                    Value::from(self.angle_unit.from_radians(value)),
                );
            }
        }
    }
}

fn attr_number(attrs: &AttrMap, name: &str) -> ArpesResult<Option<f64>> {
    let parsed = match attrs.get(name) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    match parsed {
        Some(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(ArpesError::invalid_geometry(
            "INPUT.GEOMETRY_ATTR",
            format!("attribute '{}' is not a finite number: {}", name, attrs[name]),
        )),
    }
}

fn attr_string(attrs: &AttrMap, name: &str) -> ArpesResult<Option<String>> {
    match attrs.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.trim().to_string())),
        Some(other) => Err(ArpesError::invalid_geometry(
            "INPUT.GEOMETRY_ATTR",
            format!("attribute '{}' must be a string, got {}", name, other),
        )),
    }
}
