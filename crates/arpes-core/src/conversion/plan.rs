use super::grid::AxisGrids;
use crate::common::constants::{
    ANGULAR_AXES, ENERGY_AXIS, PHOTON_ENERGY_AXIS, is_angular_axis, is_momentum_axis,
};
use crate::domain::{ArpesError, ArpesResult, LabeledArray};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionKind {
    /// One angular axis: `kp`.
    Cut,
    /// Two angular axes: `kx, ky`.
    Map,
    /// One angular axis swept against photon energy: `kp, kz`.
    PhotonEnergyCut,
    /// Two angular axes swept against photon energy: `kx, ky, kz`.
    PhotonEnergyMap,
}

impl ConversionKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cut => "cut",
            Self::Map => "map",
            Self::PhotonEnergyCut => "photon-energy cut",
            Self::PhotonEnergyMap => "photon-energy map",
        }
    }

    pub const fn is_map_like(self) -> bool {
        matches!(self, Self::Map | Self::PhotonEnergyMap)
    }

    pub const fn has_kz(self) -> bool {
        matches!(self, Self::PhotonEnergyCut | Self::PhotonEnergyMap)
    }

    pub fn full_momentum_axes(self) -> &'static [&'static str] {
        match self {
            Self::Cut => &["kp"],
            Self::Map => &["kx", "ky"],
            Self::PhotonEnergyCut => &["kp", "kz"],
            Self::PhotonEnergyMap => &["kx", "ky", "kz"],
        }
    }
}

impl Display for ConversionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// How the axes of one input array take part in a conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionPlan {
    pub kind: ConversionKind,
    /// Input axis indices of the angular axes, primary first.
    pub angular_axes: Vec<usize>,
    pub hv_axis: Option<usize>,
    pub energy_axis: Option<usize>,
    /// Axes copied through unchanged, in input order.
    pub passthrough_axes: Vec<usize>,
    /// A map-like conversion resampled onto `kp` instead of `kx, ky`.
    pub collapse: bool,
    pub momentum_axes: Vec<&'static str>,
}

impl ConversionPlan {
    pub fn for_array(data: &LabeledArray, requested: &AxisGrids) -> ArpesResult<Self> {
        let dims = data.dims();
        let mut angular_axes: Vec<usize> = (0..dims.len()).filter(|axis| is_angular_axis(dims[*axis])).collect();
        angular_axes.sort_by_key(|axis| ANGULAR_AXES.iter().position(|name| *name == dims[*axis]));
        let hv_axis = data.axis_index(PHOTON_ENERGY_AXIS);
        let energy_axis = data.axis_index(ENERGY_AXIS);
        let passthrough_axes = (0..dims.len())
            .filter(|axis| {
                !angular_axes.contains(axis) && Some(*axis) != hv_axis && Some(*axis) != energy_axis
            })
            .collect();

        let kind = match (angular_axes.len(), hv_axis.is_some()) {
            (0, _) => {
                return Err(ArpesError::missing_coordinate(
                    "INPUT.ANGULAR_AXIS",
                    format!("no angular axis among {:?}; expected one of {:?}", dims, ANGULAR_AXES),
                ));
            }
            (1, false) => ConversionKind::Cut,
            (2, false) => ConversionKind::Map,
            (1, true) => ConversionKind::PhotonEnergyCut,
            (2, true) => ConversionKind::PhotonEnergyMap,
            (count, _) => {
                return Err(ArpesError::invalid_geometry(
                    "INPUT.ANGULAR_AXIS",
                    format!("at most two angular axes can be converted together, got {}", count),
                ));
            }
        };

        for axis in angular_axes.iter().chain(hv_axis.iter()) {
            if data.shape()[*axis] == 0 {
                return Err(ArpesError::missing_coordinate(
                    "INPUT.EMPTY_AXIS",
                    format!("axis '{}' has no samples", dims[*axis]),
                ));
            }
        }

        if let Some(name) = requested.keys().find(|name| !is_momentum_axis(name)) {
            return Err(ArpesError::grid_spec(
                "INPUT.GRID_AXIS",
                format!("'{}' is not a momentum axis; expected one of kx, ky, kz, kp", name),
            ));
        }

        let collapse = kind.is_map_like() && requested.contains_key("kp");
        if collapse && (requested.contains_key("kx") || requested.contains_key("ky")) {
            return Err(ArpesError::grid_spec(
                "INPUT.GRID_AXIS",
                "'kp' cannot be requested together with 'kx' or 'ky'",
            ));
        }

        let momentum_axes: Vec<&'static str> = if collapse {
            let mut axes = vec!["kp"];
            if kind.has_kz() {
                axes.push("kz");
            }
            axes
        } else {
            kind.full_momentum_axes().to_vec()
        };

        for name in requested.keys() {
            if !momentum_axes.contains(&name.as_str()) {
                return Err(ArpesError::grid_spec(
                    "INPUT.GRID_AXIS",
                    format!(
                        "axis '{}' is not produced by a {} conversion (produces {:?})",
                        name, kind, momentum_axes
                    ),
                ));
            }
        }

        Ok(Self {
            kind,
            angular_axes,
            hv_axis,
            energy_axis,
            passthrough_axes,
            collapse,
            momentum_axes,
        })
    }

    pub fn primary_axis(&self) -> usize {
        self.angular_axes[0]
    }

    pub fn secondary_axis(&self) -> Option<usize> {
        self.angular_axes.get(1).copied()
    }

    /// Axis whose rows are resampled separately and averaged when collapsing.
    pub fn row_axis(&self) -> Option<usize> {
        if self.collapse { self.secondary_axis() } else { None }
    }

    /// Input axes spanning the simplicial mesh; one per momentum axis.
    pub fn mesh_axes(&self) -> Vec<usize> {
        let mut axes = vec![self.primary_axis()];
        if !self.collapse {
            axes.extend(self.secondary_axis());
        }
        axes.extend(self.hv_axis);
        axes
    }

    /// Input axes that are converted independently slice by slice.
    pub fn slice_axes(&self) -> Vec<usize> {
        let mut axes: Vec<usize> = self.energy_axis.into_iter().collect();
        axes.extend(self.passthrough_axes.iter().copied());
        axes
    }

    /// Input axis whose length sets the default sample count of a momentum axis.
    pub fn source_axis_for(&self, momentum_axis: &str) -> usize {
        match momentum_axis {
            "ky" => self.secondary_axis().unwrap_or(self.primary_axis()),
            "kz" => self.hv_axis.unwrap_or(self.primary_axis()),
            _ => self.primary_axis(),
        }
    }
}
