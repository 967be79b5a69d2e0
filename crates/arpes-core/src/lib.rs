pub mod common;
pub mod conversion;
pub mod domain;
pub mod numerics;

pub use common::ConversionSettings;
pub use conversion::{
    AxisGrid, AxisGrids, CalibrationPoint, KspaceConverter, convert_through_angular_pair,
    convert_through_angular_point, convert_to_kspace,
};
pub use domain::{
    ArpesError, ArpesErrorKind, ArpesResult, AttrMap, Coordinate, LabeledArray, LabeledArrayDocument,
};
