//! Free-electron final-state kinematics: instrument angles and kinetic
//! energy to crystal momentum.
//!
//! The photoelectron leaves along the analyzer axis `ẑ` deflected by the
//! analyzer angles, and the manipulator rotations carry that direction into
//! the sample frame:
//!
//! `v = Rz(chi) · Rx(-beta) · Ry(theta) · Rz(alpha) · Rx(-psi) · Ry(phi) · ẑ`
//!
//! For `alpha = chi = psi = 0` this gives `kx = k sin(phi + theta)` and
//! `ky = k cos(phi + theta) sin(beta)`.

use super::geometry::{AngleSample, Geometry};
use crate::common::constants::K_INV_ANGSTROM;

pub type Vector3 = [f64; 3];

/// Momentum of one sample in Å⁻¹. Components are `NaN` where the final
/// state is kinematically inaccessible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Momentum {
    pub kx: f64,
    pub ky: f64,
    pub kz: f64,
}

impl Momentum {
    pub const MISSING: Self = Self {
        kx: f64::NAN,
        ky: f64::NAN,
        kz: f64::NAN,
    };

    /// Projection of the in-plane momentum onto a unit direction.
    pub fn along(&self, direction: [f64; 2]) -> f64 {
        self.kx * direction[0] + self.ky * direction[1]
    }

    pub fn magnitude(&self) -> f64 {
        (self.kx * self.kx + self.ky * self.ky + self.kz * self.kz).sqrt()
    }
}

/// Free-electron wavevector magnitude for a kinetic energy in eV.
pub fn free_electron_wavevector(kinetic_energy: f64) -> f64 {
    if kinetic_energy > 0.0 {
        K_INV_ANGSTROM * kinetic_energy.sqrt()
    } else {
        f64::NAN
    }
}

/// Unit emission direction in the sample frame for effective (offset
/// subtracted) angles.
pub fn emission_direction(angles: &AngleSample) -> Vector3 {
    let mut v = [0.0, 0.0, 1.0];
    v = rotate_y(v, angles.phi);
    v = rotate_x(v, -angles.psi);
    v = rotate_z(v, angles.alpha);
    v = rotate_y(v, angles.theta);
    v = rotate_x(v, -angles.beta);
    rotate_z(v, angles.chi)
}

/// Maps raw angles and a kinetic energy to momentum.
///
/// Offsets from `geometry` are subtracted before any rotation. `kz` is only
/// evaluated when `with_kz` is set; otherwise it is reported as `NaN`.
pub fn angle_and_energy_to_momentum(
    raw_angles: &AngleSample,
    kinetic_energy: f64,
    geometry: &Geometry,
    with_kz: bool,
) -> Momentum {
    let k = free_electron_wavevector(kinetic_energy);
    if !k.is_finite() {
        return Momentum::MISSING;
    }

    let effective = geometry.offsets.effective(raw_angles);
    let direction = emission_direction(&effective);
    let kx = k * direction[0];
    let ky = k * direction[1];
    let kz = if with_kz {
        perpendicular_momentum(k, kx, ky, geometry.inner_potential)
    } else {
        f64::NAN
    };

    Momentum { kx, ky, kz }
}

/// `kz = sqrt(k² − kx² − ky² + 2 m V0 / ħ²)`, `NaN` for a negative radicand.
pub fn perpendicular_momentum(k: f64, kx: f64, ky: f64, inner_potential: f64) -> f64 {
    let radicand =
        k * k - kx * kx - ky * ky + K_INV_ANGSTROM * K_INV_ANGSTROM * inner_potential;
    if radicand >= 0.0 {
        radicand.sqrt()
    } else {
        f64::NAN
    }
}

fn rotate_x(v: Vector3, angle: f64) -> Vector3 {
    let (sin, cos) = angle.sin_cos();
    [v[0], cos * v[1] - sin * v[2], sin * v[1] + cos * v[2]]
}

fn rotate_y(v: Vector3, angle: f64) -> Vector3 {
    let (sin, cos) = angle.sin_cos();
    [cos * v[0] + sin * v[2], v[1], -sin * v[0] + cos * v[2]]
}

fn rotate_z(v: Vector3, angle: f64) -> Vector3 {
    let (sin, cos) = angle.sin_cos();
    [cos * v[0] - sin * v[1], sin * v[0] + cos * v[1], v[2]]
}
