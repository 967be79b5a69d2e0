//! Angle-space to momentum-space conversion.

pub mod forward;
pub mod geometry;
pub mod grid;
pub mod model;
pub mod offsets;
pub mod plan;
pub mod resample;

pub use forward::{ForwardConverter, ScatteredCloud, ScatteredSample, SliceIndex};
pub use geometry::{AngleOffsets, AngleSample, AngleUnit, EnergyNotation, Geometry};
pub use grid::{AxisGrid, AxisGrids, MomentumGrid, default_axis};
pub use model::{Momentum, angle_and_energy_to_momentum, free_electron_wavevector};
pub use offsets::{
    CalibrationPoint, OffsetParameter, OffsetProblem, OffsetSolution, OffsetSolveError, solve_offsets,
};
pub use plan::{ConversionKind, ConversionPlan};
pub use resample::resample_cloud;

use crate::common::ConversionSettings;
use crate::common::constants::{ENERGY_AXIS, PHOTON_ENERGY_AXIS, is_angular_axis};
use crate::domain::{ArpesError, ArpesResult, Coordinate, LabeledArray};
use ndarray::{ArrayD, IxDyn};
use tracing::{debug, info};

/// Conversion entry points bound to one set of [`ConversionSettings`].
#[derive(Debug, Clone, Copy, Default)]
pub struct KspaceConverter {
    settings: ConversionSettings,
}

impl KspaceConverter {
    pub fn new(settings: ConversionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ConversionSettings {
        &self.settings
    }

    /// Converts a cut, map or photon-energy scan to momentum space.
    ///
    /// Axes named in `grids` are resampled onto those grids; every other
    /// momentum axis of the conversion uses the default bounds policy.
    pub fn convert(&self, data: &LabeledArray, grids: &AxisGrids) -> ArpesResult<LabeledArray> {
        self.settings.validate()?;
        let plan = ConversionPlan::for_array(data, grids)?;
        let explicit = resolve_grids(grids)?;
        let geometry = Geometry::from_attrs(data.attrs(), &self.settings)?;
        let converter = ForwardConverter::new(data, &plan, geometry)?;

        let needs_defaults = plan
            .momentum_axes
            .iter()
            .any(|axis| !explicit.iter().any(|coordinate| coordinate.name == *axis));
        let extents = if needs_defaults { converter.extents() } else { Vec::new() };

        let mut axes = Vec::with_capacity(plan.momentum_axes.len());
        for (component, name) in plan.momentum_axes.iter().enumerate() {
            let axis = match explicit.iter().find(|coordinate| coordinate.name == *name) {
                Some(coordinate) => coordinate.clone(),
                None => default_axis(
                    name,
                    extents[component],
                    data.shape()[plan.source_axis_for(name)],
                    self.settings.resample.bounds_margin,
                )?,
            };
            axes.push(axis);
        }
        let grid = MomentumGrid::new(axes)?;

        debug!(
            kind = %plan.kind,
            axes = ?plan.momentum_axes,
            shape = ?grid.shape(),
            collapse = plan.collapse,
            "converting to momentum space"
        );
        self.resample_slices(data, &plan, &converter, &grid)
    }

    /// Solves the offsets that send `point` to its target momentum, then
    /// converts onto `through` and averages over the `transverse` axes.
    pub fn convert_through_angular_point(
        &self,
        data: &LabeledArray,
        point: &CalibrationPoint,
        through: &AxisGrids,
        transverse: &AxisGrids,
    ) -> ArpesResult<LabeledArray> {
        self.convert_through(data, point, None, through, transverse)
    }

    /// Like [`Self::convert_through_angular_point`], additionally rotating the
    /// azimuth so that `point_b` lies on the through axis.
    pub fn convert_through_angular_pair(
        &self,
        data: &LabeledArray,
        point_a: &CalibrationPoint,
        point_b: &CalibrationPoint,
        through: &AxisGrids,
        transverse: &AxisGrids,
    ) -> ArpesResult<LabeledArray> {
        self.convert_through(data, point_a, Some(point_b), through, transverse)
    }

    fn convert_through(
        &self,
        data: &LabeledArray,
        point: &CalibrationPoint,
        aligned: Option<&CalibrationPoint>,
        through: &AxisGrids,
        transverse: &AxisGrids,
    ) -> ArpesResult<LabeledArray> {
        self.settings.validate()?;
        let through_axis = match through.keys().next() {
            Some(name) if through.len() == 1 => name.clone(),
            _ => {
                return Err(ArpesError::grid_spec(
                    "INPUT.THROUGH_AXIS",
                    format!("exactly one through axis is required, got {}", through.len()),
                ));
            }
        };
        if transverse.is_empty() {
            return Err(ArpesError::grid_spec(
                "INPUT.TRANSVERSE_AXIS",
                "at least one transverse axis is required",
            ));
        }
        if transverse.contains_key(&through_axis) {
            return Err(ArpesError::grid_spec(
                "INPUT.TRANSVERSE_AXIS",
                format!("'{}' cannot be both the through and a transverse axis", through_axis),
            ));
        }

        let mut grids = through.clone();
        grids.extend(transverse.iter().map(|(name, grid)| (name.clone(), grid.clone())));
        let plan = ConversionPlan::for_array(data, &grids)?;
        if grids.len() != plan.momentum_axes.len() {
            return Err(ArpesError::grid_spec(
                "INPUT.OBLIQUE_AXES",
                format!(
                    "through and transverse axes must cover {:?} exactly, got {:?}",
                    plan.momentum_axes,
                    grids.keys().collect::<Vec<_>>()
                ),
            ));
        }
        resolve_grids(&grids)?;

        let geometry = Geometry::from_attrs(data.attrs(), &self.settings)?;
        let converter = ForwardConverter::new(data, &plan, geometry)?;
        let (angles, hv, energy) = calibration_inputs(point, data, &plan, &geometry);
        let target = point.target();

        let parameters = if aligned.is_some() {
            if !plan.kind.is_map_like() || !matches!(through_axis.as_str(), "kx" | "ky") {
                return Err(ArpesError::grid_spec(
                    "INPUT.THROUGH_PAIR",
                    format!(
                        "aligning two points needs a map and a 'kx' or 'ky' through axis, got a {} through '{}'",
                        plan.kind, through_axis
                    ),
                ));
            }
            vec![OffsetParameter::Theta, OffsetParameter::Beta, OffsetParameter::Chi]
        } else if plan.kind.is_map_like() {
            vec![OffsetParameter::Theta, OffsetParameter::Beta]
        } else {
            vec![cut_parameter(data.dims()[plan.primary_axis()])]
        };
        let aligned_inputs = aligned.map(|other| calibration_inputs(other, data, &plan, &geometry));
        let map_like = plan.kind.is_map_like();

        let problem = OffsetProblem {
            parameters,
            initial: geometry.offsets,
            residuals: |offsets: &AngleOffsets| {
                let trial = Geometry {
                    offsets: *offsets,
                    ..geometry
                };
                let momentum =
                    angle_and_energy_to_momentum(&angles, trial.kinetic_energy(hv, energy), &trial, false);
                let mut residuals = if map_like {
                    vec![momentum.kx - target[0], momentum.ky - target[1]]
                } else {
                    vec![momentum.along(converter.path_direction_with(offsets)) - target[0]]
                };
                if let Some((other_angles, other_hv, other_energy)) = &aligned_inputs {
                    let other = angle_and_energy_to_momentum(
                        other_angles,
                        trial.kinetic_energy(*other_hv, *other_energy),
                        &trial,
                        false,
                    );
                    residuals.push(if through_axis == "kx" { other.ky } else { other.kx });
                }
                residuals
            },
        };
        let solution = solve_offsets(&problem, &self.settings.solver)?;
        info!(
            theta_offset = solution.offsets.theta,
            beta_offset = solution.offsets.beta,
            chi_offset = solution.offsets.chi,
            iterations = solution.iterations,
            residual = solution.residual_norm,
            "solved angle offsets"
        );

        let calibrated_geometry = Geometry {
            offsets: solution.offsets,
            ..geometry
        };
        let mut attrs = data.attrs().clone();
        calibrated_geometry.write_offsets(&mut attrs);
        let calibrated = data.clone().with_attrs(attrs);

        let mut slice = self.convert(&calibrated, &grids)?;
        for name in transverse.keys() {
            slice = slice.mean_over(name)?;
        }
        Ok(slice)
    }

    fn resample_slices(
        &self,
        data: &LabeledArray,
        plan: &ConversionPlan,
        converter: &ForwardConverter<'_>,
        grid: &MomentumGrid,
    ) -> ArpesResult<LabeledArray> {
        let mut coords = Vec::new();
        if let Some(axis) = plan.energy_axis {
            coords.push(data.coords()[axis].clone());
        }
        coords.extend(grid.axes().iter().cloned());
        coords.extend(plan.passthrough_axes.iter().map(|axis| data.coords()[*axis].clone()));
        let shape: Vec<usize> = coords.iter().map(Coordinate::len).collect();
        let mut values = ArrayD::from_elem(IxDyn(&shape), f64::NAN);

        let grid_shape = grid.shape();
        let momentum_offset = usize::from(plan.energy_axis.is_some());
        let mut index = vec![0_usize; shape.len()];

        for slice in converter.slices() {
            let mut slice_positions = slice.positions.iter();
            if plan.energy_axis.is_some() {
                if let Some(position) = slice_positions.next() {
                    index[0] = *position;
                }
            }
            for (slot, position) in index[momentum_offset + grid_shape.len()..]
                .iter_mut()
                .zip(slice_positions)
            {
                *slot = *position;
            }

            let slice_values = self.combined_rows(converter, &slice, grid)?;
            for (node, value) in slice_values.into_iter().enumerate() {
                let mut remainder = node;
                for axis in (0..grid_shape.len()).rev() {
                    index[momentum_offset + axis] = remainder % grid_shape[axis];
                    remainder /= grid_shape[axis];
                }
                values[&index[..]] = value;
            }
        }

        LabeledArray::new(values, coords, data.attrs().clone())
    }

    /// Resampled values of one slice; collapsed rows are combined by a
    /// NaN-skipping mean.
    fn combined_rows(
        &self,
        converter: &ForwardConverter<'_>,
        slice: &SliceIndex,
        grid: &MomentumGrid,
    ) -> ArpesResult<Vec<f64>> {
        let rows = converter.rows();
        if let [row] = rows.as_slice() {
            return resample_cloud(&converter.slice_cloud(slice, *row), grid, &self.settings.resample);
        }

        let mut sums = vec![0.0; grid.node_count()];
        let mut counts = vec![0_usize; grid.node_count()];
        for row in rows {
            let values = resample_cloud(&converter.slice_cloud(slice, row), grid, &self.settings.resample)?;
            for ((sum, count), value) in sums.iter_mut().zip(counts.iter_mut()).zip(values) {
                if value.is_finite() {
                    *sum += value;
                    *count += 1;
                }
            }
        }
        Ok(sums
            .into_iter()
            .zip(counts)
            .map(|(sum, count)| if count == 0 { f64::NAN } else { sum / count as f64 })
            .collect())
    }
}

/// Converts with default settings. See [`KspaceConverter::convert`].
pub fn convert_to_kspace(data: &LabeledArray, grids: &AxisGrids) -> ArpesResult<LabeledArray> {
    KspaceConverter::default().convert(data, grids)
}

/// See [`KspaceConverter::convert_through_angular_point`].
pub fn convert_through_angular_point(
    data: &LabeledArray,
    point: &CalibrationPoint,
    through: &AxisGrids,
    transverse: &AxisGrids,
) -> ArpesResult<LabeledArray> {
    KspaceConverter::default().convert_through_angular_point(data, point, through, transverse)
}

/// See [`KspaceConverter::convert_through_angular_pair`].
pub fn convert_through_angular_pair(
    data: &LabeledArray,
    point_a: &CalibrationPoint,
    point_b: &CalibrationPoint,
    through: &AxisGrids,
    transverse: &AxisGrids,
) -> ArpesResult<LabeledArray> {
    KspaceConverter::default().convert_through_angular_pair(data, point_a, point_b, through, transverse)
}

fn resolve_grids(grids: &AxisGrids) -> ArpesResult<Vec<Coordinate>> {
    grids.iter().map(|(name, grid)| grid.resolve(name)).collect()
}

/// Raw angles, photon energy and `eV` of a calibration point. Anything the
/// point leaves out comes from the geometry, the middle of the `hv` axis, or
/// the Fermi level.
fn calibration_inputs(
    point: &CalibrationPoint,
    data: &LabeledArray,
    plan: &ConversionPlan,
    geometry: &Geometry,
) -> (AngleSample, f64, f64) {
    let mut angles = geometry.angles;
    for (name, value) in point.coordinates() {
        if is_angular_axis(name) {
            angles.set(name, geometry.angle_unit.to_radians(*value));
        }
    }
    let hv = point.get(PHOTON_ENERGY_AXIS).unwrap_or_else(|| match plan.hv_axis {
        Some(axis) => {
            let values = &data.coords()[axis].values;
            values[values.len() / 2]
        }
        None => geometry.hv.unwrap_or(f64::NAN),
    });
    let energy = point.get(ENERGY_AXIS).unwrap_or(0.0);
    (angles, hv, energy)
}

/// Offset that moves a cut along its own direction.
fn cut_parameter(primary_axis: &str) -> OffsetParameter {
    match primary_axis {
        "psi" | "beta" => OffsetParameter::Beta,
        _ => OffsetParameter::Theta,
    }
}
