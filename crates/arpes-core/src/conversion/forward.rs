//! Forward conversion: every source cell to a point in momentum space.

use super::geometry::{AngleOffsets, AngleSample, Geometry};
use super::model::{Momentum, angle_and_energy_to_momentum, emission_direction};
use super::plan::ConversionPlan;
use crate::domain::{ArpesError, ArpesResult, LabeledArray};
use crate::numerics::finite_extent;
use tracing::warn;

/// Momentum coordinates of one sample; only the first `dimension` entries
/// of the owning cloud are meaningful.
pub type MomentumPoint = [f64; 3];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScatteredSample {
    pub momentum: MomentumPoint,
    /// Row-major index of the source cell within the mesh.
    pub cell: usize,
    pub intensity: f64,
}

/// Unstructured momentum samples of one slice, in mesh order.
///
/// Samples are not deduplicated: distinct source cells may land arbitrarily
/// close together. The mesh shape is kept so the resampler can recover the
/// source connectivity.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatteredCloud {
    pub mesh_shape: Vec<usize>,
    pub dimension: usize,
    pub samples: Vec<ScatteredSample>,
}

impl ScatteredCloud {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Finite extent of one momentum component.
    pub fn extent(&self, component: usize) -> Option<(f64, f64)> {
        finite_extent(self.samples.iter().map(|sample| sample.momentum[component]))
    }
}

/// Position of one slice: an index along every slice axis of the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceIndex {
    pub positions: Vec<usize>,
}

/// Applies the geometry model over the source grid of one array.
#[derive(Debug)]
pub struct ForwardConverter<'a> {
    data: &'a LabeledArray,
    plan: &'a ConversionPlan,
    geometry: Geometry,
    angular: Vec<(&'static str, Vec<f64>)>,
    hv: Option<Vec<f64>>,
    energy: Option<Vec<f64>>,
    path_direction: [f64; 2],
}

impl<'a> ForwardConverter<'a> {
    pub fn new(data: &'a LabeledArray, plan: &'a ConversionPlan, geometry: Geometry) -> ArpesResult<Self> {
        let angular = plan
            .angular_axes
            .iter()
            .map(|axis| {
                let coordinate = &data.coords()[*axis];
                let name = canonical_angle_name(&coordinate.name);
                let radians = coordinate
                    .values
                    .iter()
                    .map(|value| geometry.angle_unit.to_radians(*value))
                    .collect();
                (name, radians)
            })
            .collect();
        let hv = plan.hv_axis.map(|axis| data.coords()[axis].values.clone());
        if hv.is_none() && geometry.hv.is_none() {
            return Err(ArpesError::missing_coordinate(
                "INPUT.GEOMETRY_ATTR",
                "photon energy 'hv' is neither an axis nor an attribute of the input",
            ));
        }
        if let Some(values) = &hv {
            if values.iter().any(|value| *value <= 0.0) {
                return Err(ArpesError::invalid_geometry(
                    "INPUT.PHOTON_ENERGY",
                    "photon energy axis 'hv' must be positive",
                ));
            }
        }
        let energy = plan.energy_axis.map(|axis| data.coords()[axis].values.clone());

        let mut converter = Self {
            data,
            plan,
            geometry,
            angular,
            hv,
            energy,
            path_direction: [1.0, 0.0],
        };
        converter.require_accessible_states()?;
        converter.path_direction = converter.path_direction_with(&geometry.offsets);
        Ok(converter)
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn path_direction(&self) -> [f64; 2] {
        self.path_direction
    }

    pub fn mesh_shape(&self) -> Vec<usize> {
        self.plan
            .mesh_axes()
            .iter()
            .map(|axis| self.data.shape()[*axis])
            .collect()
    }

    /// Every slice position, row-major over the plan's slice axes.
    pub fn slices(&self) -> Vec<SliceIndex> {
        let shape: Vec<usize> = self
            .plan
            .slice_axes()
            .iter()
            .map(|axis| self.data.shape()[*axis])
            .collect();
        multi_indices(&shape)
            .into_iter()
            .map(|positions| SliceIndex { positions })
            .collect()
    }

    /// Rows averaged when a map is collapsed onto `kp`; a single `None` row otherwise.
    pub fn rows(&self) -> Vec<Option<usize>> {
        match self.plan.row_axis() {
            Some(axis) => (0..self.data.shape()[axis]).map(Some).collect(),
            None => vec![None],
        }
    }

    /// Momentum of one set of raw angles at a given photon energy and `eV`.
    pub fn momentum_at(&self, angles: &AngleSample, hv: f64, energy: f64) -> Momentum {
        let kinetic_energy = self.geometry.kinetic_energy(hv, energy);
        angle_and_energy_to_momentum(angles, kinetic_energy, &self.geometry, self.plan.kind.has_kz())
    }

    /// Projects a momentum onto the plan's output axes.
    pub fn project(&self, momentum: &Momentum) -> MomentumPoint {
        let mut point = [f64::NAN; 3];
        for (slot, axis) in point.iter_mut().zip(&self.plan.momentum_axes) {
            *slot = match *axis {
                "kx" => momentum.kx,
                "ky" => momentum.ky,
                "kz" => momentum.kz,
                _ => momentum.along(self.path_direction),
            };
        }
        point
    }

    /// Converts every cell of one slice (and collapse row) of the source grid.
    pub fn slice_cloud(&self, slice: &SliceIndex, row: Option<usize>) -> ScatteredCloud {
        let mesh_axes = self.plan.mesh_axes();
        let mesh_shape = self.mesh_shape();
        let slice_axes = self.plan.slice_axes();

        let mut full_index = vec![0_usize; self.data.shape().len()];
        for (axis, position) in slice_axes.iter().zip(&slice.positions) {
            full_index[*axis] = *position;
        }
        if let (Some(axis), Some(row)) = (self.plan.row_axis(), row) {
            full_index[axis] = row;
        }

        let mut samples = Vec::with_capacity(mesh_shape.iter().product());
        for (cell, mesh_index) in multi_indices(&mesh_shape).into_iter().enumerate() {
            for (axis, position) in mesh_axes.iter().zip(&mesh_index) {
                full_index[*axis] = *position;
            }

            let (angles, hv, energy) = self.sample_inputs(&full_index);
            let momentum = self.momentum_at(&angles, hv, energy);
            samples.push(ScatteredSample {
                momentum: self.project(&momentum),
                cell,
                intensity: self.data.values()[&full_index[..]],
            });
        }

        ScatteredCloud {
            mesh_shape,
            dimension: self.plan.momentum_axes.len(),
            samples,
        }
    }

    /// The full scattered cloud: one entry per slice and row, together
    /// covering every source cell exactly once.
    pub fn forward(&self) -> Vec<ScatteredCloud> {
        let mut clouds = Vec::new();
        for slice in self.slices() {
            for row in self.rows() {
                clouds.push(self.slice_cloud(&slice, row));
            }
        }
        clouds
    }

    /// Finite extent of every output momentum component over all slices.
    pub fn extents(&self) -> Vec<Option<(f64, f64)>> {
        let mut extents = vec![None; self.plan.momentum_axes.len()];
        for slice in self.slices() {
            for row in self.rows() {
                let cloud = self.slice_cloud(&slice, row);
                for (component, extent) in extents.iter_mut().enumerate() {
                    *extent = merge_extent(*extent, cloud.extent(component));
                }
            }
        }
        extents
    }

    fn sample_inputs(&self, full_index: &[usize]) -> (AngleSample, f64, f64) {
        let mut angles = self.geometry.angles;
        for ((name, radians), axis) in self.angular.iter().zip(&self.plan.angular_axes) {
            angles.set(name, radians[full_index[*axis]]);
        }
        let hv = match (&self.hv, self.plan.hv_axis) {
            (Some(values), Some(axis)) => values[full_index[axis]],
            _ => self.geometry.hv.unwrap_or(f64::NAN),
        };
        let energy = match (&self.energy, self.plan.energy_axis) {
            (Some(values), Some(axis)) => values[full_index[axis]],
            _ => self.geometry.energy,
        };
        (angles, hv, energy)
    }

    fn require_accessible_states(&self) -> ArpesResult<()> {
        let hv_max = match &self.hv {
            Some(values) => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            None => self.geometry.hv.unwrap_or(f64::NAN),
        };
        let energy_max = match &self.energy {
            Some(values) => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            None => self.geometry.energy,
        };
        let kinetic_max = self.geometry.kinetic_energy(hv_max, energy_max);
        if kinetic_max > 0.0 {
            Ok(())
        } else {
            Err(ArpesError::invalid_geometry(
                "RUN.KINETIC_ENERGY",
                format!(
                    "kinetic energy is non-positive for every sample (max {:.4} eV)",
                    kinetic_max
                ),
            ))
        }
    }

    /// Unit in-plane direction of the chord between the emission directions
    /// at the smallest and largest primary-axis angles, other angular axes
    /// held at their middle sample. Storage order of the axis does not matter.
    pub fn path_direction_with(&self, offsets: &AngleOffsets) -> [f64; 2] {
        let mut first = self.geometry.angles;
        for (name, radians) in self.angular.iter().skip(1) {
            if let Some(middle) = radians.get(radians.len() / 2) {
                first.set(name, *middle);
            }
        }
        let mut last = first;
        let (primary, radians) = &self.angular[0];
        let (low, high) = radians
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), value| {
                (low.min(*value), high.max(*value))
            });
        if low.is_finite() && high.is_finite() {
            first.set(primary, low);
            last.set(primary, high);
        }

        let start = emission_direction(&offsets.effective(&first));
        let end = emission_direction(&offsets.effective(&last));
        let chord = [end[0] - start[0], end[1] - start[1]];
        let norm = chord[0].hypot(chord[1]);
        if norm > 1.0e-12 {
            [chord[0] / norm, chord[1] / norm]
        } else {
            warn!(
                axis = *primary,
                "primary angular axis spans no in-plane distance; projecting kp onto kx"
            );
            [1.0, 0.0]
        }
    }
}

fn canonical_angle_name(name: &str) -> &'static str {
    match name {
        "phi" => "phi",
        "psi" => "psi",
        "alpha" => "alpha",
        "theta" => "theta",
        "beta" => "beta",
        _ => "chi",
    }
}

fn merge_extent(lhs: Option<(f64, f64)>, rhs: Option<(f64, f64)>) -> Option<(f64, f64)> {
    match (lhs, rhs) {
        (Some((low, high)), Some((other_low, other_high))) => {
            Some((low.min(other_low), high.max(other_high)))
        }
        (extent, None) | (None, extent) => extent,
    }
}

/// Row-major multi-indices over `shape`; a single empty index for rank 0.
pub(crate) fn multi_indices(shape: &[usize]) -> Vec<Vec<usize>> {
    let total: usize = shape.iter().product();
    let mut indices = Vec::with_capacity(total);
    let mut current = vec![0_usize; shape.len()];
    for _ in 0..total {
        indices.push(current.clone());
        for axis in (0..shape.len()).rev() {
            current[axis] += 1;
            if current[axis] < shape[axis] {
                break;
            }
            current[axis] = 0;
        }
    }
    indices
}
