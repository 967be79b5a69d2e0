pub mod errors;

pub use errors::{ArpesError, ArpesErrorKind, ArpesResult};

use crate::numerics::{nan_max_index, nan_mean};
use ndarray::{ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form metadata carried alongside a spectrum. Geometry constants are
/// read out of it into a typed record at the conversion boundary; every
/// other entry is passed through untouched.
pub type AttrMap = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub name: String,
    pub values: Vec<f64>,
}

impl Coordinate {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn nearest_index(&self, value: f64) -> Option<usize> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, candidate)| candidate.is_finite())
            .min_by(|(_, lhs), (_, rhs)| (*lhs - value).abs().total_cmp(&(*rhs - value).abs()))
            .map(|(index, _)| index)
    }
}

/// An n-dimensional spectrum with one named coordinate sequence per axis.
///
/// Missing samples are stored as `NaN`. Instances are immutable once built;
/// every transformation returns a new array.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledArray {
    values: ArrayD<f64>,
    coords: Vec<Coordinate>,
    attrs: AttrMap,
}

impl LabeledArray {
    pub fn new(values: ArrayD<f64>, coords: Vec<Coordinate>, attrs: AttrMap) -> ArpesResult<Self> {
        if coords.len() != values.ndim() {
            return Err(ArpesError::invalid_input(
                "INPUT.ARRAY_SHAPE",
                format!(
                    "array has {} dimensions but {} coordinates were supplied",
                    values.ndim(),
                    coords.len()
                ),
            ));
        }

        for (axis, coordinate) in coords.iter().enumerate() {
            if coordinate.len() != values.shape()[axis] {
                return Err(ArpesError::invalid_input(
                    "INPUT.ARRAY_SHAPE",
                    format!(
                        "coordinate '{}' has {} values but axis {} has length {}",
                        coordinate.name,
                        coordinate.len(),
                        axis,
                        values.shape()[axis]
                    ),
                ));
            }
            if let Some(index) = coordinate.values.iter().position(|value| !value.is_finite()) {
                return Err(ArpesError::invalid_input(
                    "INPUT.COORDINATE_VALUE",
                    format!(
                        "coordinate '{}' has a non-finite value at index {}",
                        coordinate.name, index
                    ),
                ));
            }
            if coords[..axis].iter().any(|other| other.name == coordinate.name) {
                return Err(ArpesError::invalid_input(
                    "INPUT.DUPLICATE_AXIS",
                    format!("axis '{}' appears more than once", coordinate.name),
                ));
            }
        }

        Ok(Self {
            values,
            coords,
            attrs,
        })
    }

    /// Builds an array from row-major flattened values.
    pub fn from_shape_vec(coords: Vec<Coordinate>, values: Vec<f64>, attrs: AttrMap) -> ArpesResult<Self> {
        let shape: Vec<usize> = coords.iter().map(Coordinate::len).collect();
        let values = ArrayD::from_shape_vec(IxDyn(&shape), values).map_err(|source| {
            ArpesError::invalid_input(
                "INPUT.ARRAY_SHAPE",
                format!("values do not match coordinate shape {:?}: {}", shape, source),
            )
        })?;
        Self::new(values, coords, attrs)
    }

    pub fn values(&self) -> &ArrayD<f64> {
        &self.values
    }

    pub fn coords(&self) -> &[Coordinate] {
        &self.coords
    }

    pub fn attrs(&self) -> &AttrMap {
        &self.attrs
    }

    pub fn dims(&self) -> Vec<&str> {
        self.coords.iter().map(|coordinate| coordinate.name.as_str()).collect()
    }

    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn axis_index(&self, name: &str) -> Option<usize> {
        self.coords.iter().position(|coordinate| coordinate.name == name)
    }

    pub fn coordinate(&self, name: &str) -> Option<&Coordinate> {
        self.coords.iter().find(|coordinate| coordinate.name == name)
    }

    pub fn attr_f64(&self, name: &str) -> Option<f64> {
        self.attrs.get(name).and_then(serde_json::Value::as_f64)
    }

    pub fn with_attrs(mut self, attrs: AttrMap) -> Self {
        self.attrs = attrs;
        self
    }

    /// Mean over the finite samples only.
    pub fn nan_mean(&self) -> f64 {
        let flat: Vec<f64> = self.values.iter().copied().collect();
        nan_mean(&flat)
    }

    /// Collapses one axis with a NaN-skipping mean.
    pub fn mean_over(&self, name: &str) -> ArpesResult<Self> {
        let axis = self.require_axis(name)?;
        let values = self.values.map_axis(Axis(axis), |lane| {
            let lane: Vec<f64> = lane.iter().copied().collect();
            nan_mean(&lane)
        });
        Ok(self.reduced(values, axis))
    }

    /// Coordinate value of the maximum along one axis, ignoring missing samples.
    pub fn argmax_over(&self, name: &str) -> ArpesResult<Self> {
        let axis = self.require_axis(name)?;
        let coordinate = &self.coords[axis].values;
        let values = self.values.map_axis(Axis(axis), |lane| {
            let lane: Vec<f64> = lane.iter().copied().collect();
            nan_max_index(&lane).map_or(f64::NAN, |index| coordinate[index])
        });
        Ok(self.reduced(values, axis))
    }

    /// Drops one axis by taking the sample whose coordinate is nearest to `value`.
    pub fn select_nearest(&self, name: &str, value: f64) -> ArpesResult<Self> {
        let axis = self.require_axis(name)?;
        let index = self.coords[axis].nearest_index(value).ok_or_else(|| {
            ArpesError::missing_coordinate(
                "INPUT.AXIS_EMPTY",
                format!("axis '{}' has no samples to select from", name),
            )
        })?;
        let values = self.values.index_axis(Axis(axis), index).to_owned();
        Ok(self.reduced(values, axis))
    }

    pub fn to_document(&self) -> LabeledArrayDocument {
        LabeledArrayDocument {
            dims: self.coords.clone(),
            values: self
                .values
                .iter()
                .map(|value| value.is_finite().then_some(*value))
                .collect(),
            attrs: self.attrs.clone(),
        }
    }

    pub fn from_document(document: LabeledArrayDocument) -> ArpesResult<Self> {
        let values = document
            .values
            .into_iter()
            .map(|value| value.unwrap_or(f64::NAN))
            .collect();
        Self::from_shape_vec(document.dims, values, document.attrs)
    }

    fn require_axis(&self, name: &str) -> ArpesResult<usize> {
        self.axis_index(name).ok_or_else(|| {
            ArpesError::missing_coordinate(
                "INPUT.AXIS_MISSING",
                format!("array has no axis named '{}' (axes: {:?})", name, self.dims()),
            )
        })
    }

    fn reduced(&self, values: ArrayD<f64>, removed_axis: usize) -> Self {
        let coords = self
            .coords
            .iter()
            .enumerate()
            .filter(|(axis, _)| *axis != removed_axis)
            .map(|(_, coordinate)| coordinate.clone())
            .collect();
        Self {
            values,
            coords,
            attrs: self.attrs.clone(),
        }
    }
}

/// Serialisable form of a [`LabeledArray`]: row-major values with `null`
/// standing in for missing samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledArrayDocument {
    pub dims: Vec<Coordinate>,
    pub values: Vec<Option<f64>>,
    #[serde(default)]
    pub attrs: AttrMap,
}
