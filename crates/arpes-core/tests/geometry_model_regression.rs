use arpes_core::conversion::{
    AngleOffsets, AngleSample, AngleUnit, EnergyNotation, Geometry, angle_and_energy_to_momentum,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

fn fixture_path() -> PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/geometry-model-cases.json")
}

#[derive(Debug, Deserialize)]
struct GeometryModelFixtures {
    cases: Vec<GeometryModelCase>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeometryModelCase {
    id: String,
    angles: BTreeMap<String, f64>,
    offsets: BTreeMap<String, f64>,
    kinetic_energy: f64,
    inner_potential: f64,
    expected_kx: f64,
    expected_ky: f64,
    expected_kz: Option<f64>,
    abs_tol: f64,
}

impl GeometryModelCase {
    fn raw_angles(&self) -> AngleSample {
        let mut angles = AngleSample::default();
        for (axis, value) in &self.angles {
            assert!(angles.set(axis, *value), "{}: unknown angle '{}'", self.id, axis);
        }
        angles
    }

    fn geometry(&self) -> Geometry {
        let mut offsets = AngleOffsets::default();
        for (axis, value) in &self.offsets {
            assert!(offsets.set(axis, *value), "{}: unknown offset '{}'", self.id, axis);
        }
        Geometry {
            angles: AngleSample::default(),
            offsets,
            hv: None,
            work_function: 4.3,
            inner_potential: self.inner_potential,
            energy: 0.0,
            energy_notation: EnergyNotation::Kinetic,
            angle_unit: AngleUnit::Radians,
        }
    }
}

fn load_fixtures() -> GeometryModelFixtures {
    let source = fs::read_to_string(fixture_path()).expect("geometry model fixtures should be readable");
    serde_json::from_str(&source).expect("geometry model fixtures should parse")
}

#[test]
fn geometry_model_matches_reference_momenta() {
    let fixtures = load_fixtures();
    assert!(!fixtures.cases.is_empty(), "fixture file should contain cases");

    for case in &fixtures.cases {
        let momentum = angle_and_energy_to_momentum(&case.raw_angles(), case.kinetic_energy, &case.geometry(), true);

        assert!(
            (momentum.kx - case.expected_kx).abs() <= case.abs_tol,
            "{}: kx {} != {}",
            case.id,
            momentum.kx,
            case.expected_kx
        );
        assert!(
            (momentum.ky - case.expected_ky).abs() <= case.abs_tol,
            "{}: ky {} != {}",
            case.id,
            momentum.ky,
            case.expected_ky
        );
        match case.expected_kz {
            Some(expected) => assert!(
                (momentum.kz - expected).abs() <= case.abs_tol,
                "{}: kz {} != {}",
                case.id,
                momentum.kz,
                expected
            ),
            None => assert!(momentum.kz.is_nan(), "{}: kz should be missing, got {}", case.id, momentum.kz),
        }
    }
}

#[test]
fn fixture_ids_are_unique() {
    let fixtures = load_fixtures();
    let mut ids: Vec<&str> = fixtures.cases.iter().map(|case| case.id.as_str()).collect();
    ids.sort_unstable();
    let count = ids.len();
    ids.dedup();
    assert_eq!(ids.len(), count);
}
