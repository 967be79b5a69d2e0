//! Photoemission kinematics constants and canonical axis vocabulary.

/// `sqrt(2 m_e) / hbar` in Å⁻¹ per √eV: a free electron with kinetic energy
/// `E` eV has wavevector `K_INV_ANGSTROM * sqrt(E)` Å⁻¹.
pub const K_INV_ANGSTROM: f64 = 0.512_316_721_953_432_8;

pub const DEFAULT_WORK_FUNCTION_EV: f64 = 4.3;
pub const DEFAULT_INNER_POTENTIAL_EV: f64 = 10.0;

pub const DEGREES_TO_RADIANS: f64 = std::f64::consts::PI / 180.0;

pub const ANGULAR_AXES: [&str; 6] = ["phi", "psi", "alpha", "theta", "beta", "chi"];
pub const PHOTON_ENERGY_AXIS: &str = "hv";
pub const ENERGY_AXIS: &str = "eV";

pub const MOMENTUM_AXES: [&str; 4] = ["kx", "ky", "kz", "kp"];

pub fn is_angular_axis(name: &str) -> bool {
    ANGULAR_AXES.contains(&name)
}

pub fn is_momentum_axis(name: &str) -> bool {
    MOMENTUM_AXES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::{
        ANGULAR_AXES, DEGREES_TO_RADIANS, K_INV_ANGSTROM, is_angular_axis, is_momentum_axis,
    };

    #[test]
    fn free_electron_constant_matches_textbook_value() {
        // hbar^2 / 2 m_e = 3.80998 eV Å^2
        let hbar_sq_over_two_me = 1.0 / (K_INV_ANGSTROM * K_INV_ANGSTROM);
        assert!((hbar_sq_over_two_me - 3.809_98).abs() < 1.0e-4);
        assert!((DEGREES_TO_RADIANS * 180.0 - std::f64::consts::PI).abs() < 1.0e-15);
    }

    #[test]
    fn axis_vocabulary_is_consistent() {
        for axis in ANGULAR_AXES {
            assert!(is_angular_axis(axis));
            assert!(!is_momentum_axis(axis));
        }
        assert!(!is_angular_axis("eV"));
        assert!(is_momentum_axis("kp"));
        assert!(!is_momentum_axis("phi"));
    }
}
