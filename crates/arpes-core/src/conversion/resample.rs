//! Scattered momentum samples onto a regular grid.
//!
//! Each mesh cell of the source grid is split into simplices (Freudenthal
//! decomposition) and every output node inside a mapped simplex receives the
//! barycentric blend of the simplex's vertex intensities. Nodes no simplex
//! covers stay `NaN`.

use super::forward::ScatteredCloud;
use super::grid::MomentumGrid;
use crate::common::ResampleSettings;
use crate::domain::{ArpesError, ArpesResult};
use crate::numerics::monotonic_index_range;
use tracing::debug;

const DEGENERATE_VOLUME: f64 = 1.0e-12;

/// Resamples one slice onto `grid`, returning row-major values over `grid.shape()`.
pub fn resample_cloud(
    cloud: &ScatteredCloud,
    grid: &MomentumGrid,
    settings: &ResampleSettings,
) -> ArpesResult<Vec<f64>> {
    let dimension = grid.ndim();
    if cloud.dimension != dimension || cloud.mesh_shape.len() != dimension {
        return Err(ArpesError::invalid_input(
            "RUN.CLOUD_RANK",
            format!(
                "cloud of rank {} (mesh {:?}) cannot be resampled onto a {}-axis grid",
                cloud.dimension, cloud.mesh_shape, dimension
            ),
        ));
    }
    let expected: usize = cloud.mesh_shape.iter().product();
    if cloud.samples.len() != expected {
        return Err(ArpesError::invalid_input(
            "RUN.CLOUD_SIZE",
            format!(
                "cloud holds {} samples but mesh {:?} has {} cells",
                cloud.samples.len(),
                cloud.mesh_shape,
                expected
            ),
        ));
    }

    let node_count = grid.node_count();
    let mut output = vec![f64::NAN; node_count];
    let mut filled = vec![false; node_count];

    let first_axis = grid.axis(0);
    let rows_per_chunk = (settings.max_chunk_nodes / grid.row_stride().max(1)).max(1);
    let chunk_count = first_axis.len().div_ceil(rows_per_chunk);
    debug!(
        nodes = node_count,
        chunks = chunk_count,
        rows_per_chunk,
        "resampling slice"
    );

    let mesh_strides = row_major_strides(&cloud.mesh_shape);
    let grid_strides = padded_strides(&grid.shape());

    for chunk in 0..chunk_count {
        let rows = (
            chunk * rows_per_chunk,
            ((chunk + 1) * rows_per_chunk).min(first_axis.len()),
        );
        let row_values = &first_axis[rows.0..rows.1];
        let chunk_low = row_values.iter().copied().fold(f64::INFINITY, f64::min);
        let chunk_high = row_values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        for base in cell_bases(&cloud.mesh_shape, &mesh_strides) {
            for permutation in permutations(dimension) {
                let mut vertices = [base; 4];
                for step in 0..dimension {
                    vertices[step + 1] = vertices[step] + mesh_strides[permutation[step]];
                }
                let Some(simplex) = Simplex::build(
                    cloud,
                    &vertices[..=dimension],
                    settings.barycentric_tolerance,
                ) else {
                    continue;
                };
                if simplex.upper[0] < chunk_low || simplex.lower[0] > chunk_high {
                    continue;
                }
                simplex.rasterize(
                    grid,
                    rows,
                    &grid_strides,
                    settings.barycentric_tolerance,
                    &mut output,
                    &mut filled,
                );
            }
        }
    }

    Ok(output)
}

/// One non-degenerate simplex of the mapped mesh.
#[derive(Debug, Clone, Copy)]
struct Simplex {
    dimension: usize,
    origin: [f64; 3],
    inverse: [[f64; 3]; 3],
    intensities: [f64; 4],
    lower: [f64; 3],
    upper: [f64; 3],
}

impl Simplex {
    fn build(cloud: &ScatteredCloud, vertices: &[usize], tolerance: f64) -> Option<Self> {
        let dimension = cloud.dimension;
        let mut points = [[0.0; 3]; 4];
        let mut intensities = [0.0; 4];
        for (slot, vertex) in vertices.iter().enumerate() {
            let sample = &cloud.samples[*vertex];
            if sample.momentum[..dimension].iter().any(|value| !value.is_finite()) {
                return None;
            }
            points[slot] = sample.momentum;
            intensities[slot] = sample.intensity;
        }

        let origin = points[0];
        let mut edges = [[0.0; 3]; 3];
        for (row, edge_row) in edges.iter_mut().enumerate().take(dimension) {
            for (column, entry) in edge_row.iter_mut().enumerate().take(dimension) {
                *entry = points[column + 1][row] - origin[row];
            }
        }
        let inverse = invert(&edges, dimension)?;

        let mut lower = [0.0; 3];
        let mut upper = [0.0; 3];
        for axis in 0..dimension {
            let low = points[..=dimension].iter().map(|point| point[axis]).fold(f64::INFINITY, f64::min);
            let high = points[..=dimension]
                .iter()
                .map(|point| point[axis])
                .fold(f64::NEG_INFINITY, f64::max);
            let pad = tolerance * (high - low);
            lower[axis] = low - pad;
            upper[axis] = high + pad;
        }

        Some(Self {
            dimension,
            origin,
            inverse,
            intensities,
            lower,
            upper,
        })
    }

    fn barycentric(&self, point: &[f64; 3]) -> [f64; 4] {
        let mut weights = [0.0; 4];
        let mut rest = 0.0;
        for (row, inverse_row) in self.inverse.iter().enumerate().take(self.dimension) {
            let mut weight = 0.0;
            for (column, entry) in inverse_row.iter().enumerate().take(self.dimension) {
                weight += entry * (point[column] - self.origin[column]);
            }
            weights[row + 1] = weight;
            rest += weight;
        }
        weights[0] = 1.0 - rest;
        weights
    }

    fn interpolate(&self, weights: &[f64; 4]) -> f64 {
        weights[..=self.dimension]
            .iter()
            .zip(&self.intensities)
            .map(|(weight, intensity)| weight * intensity)
            .sum()
    }

    fn rasterize(
        &self,
        grid: &MomentumGrid,
        rows: (usize, usize),
        strides: &[usize; 3],
        tolerance: f64,
        output: &mut [f64],
        filled: &mut [bool],
    ) {
        let mut ranges = [(0_usize, 1_usize); 3];
        for (axis, range) in ranges.iter_mut().enumerate().take(self.dimension) {
            *range = monotonic_index_range(grid.axis(axis), self.lower[axis], self.upper[axis]);
        }
        ranges[0] = (ranges[0].0.max(rows.0), ranges[0].1.min(rows.1));
        if ranges.iter().any(|(start, end)| start >= end) {
            return;
        }

        let mut point = [0.0; 3];
        for i in ranges[0].0..ranges[0].1 {
            point[0] = grid.axis(0)[i];
            for j in ranges[1].0..ranges[1].1 {
                if self.dimension > 1 {
                    point[1] = grid.axis(1)[j];
                }
                for k in ranges[2].0..ranges[2].1 {
                    if self.dimension > 2 {
                        point[2] = grid.axis(2)[k];
                    }
                    let node = i * strides[0] + j * strides[1] + k * strides[2];
                    if filled[node] {
                        continue;
                    }
                    let weights = self.barycentric(&point);
                    if weights[..=self.dimension].iter().all(|weight| *weight >= -tolerance) {
                        output[node] = self.interpolate(&weights);
                        filled[node] = true;
                    }
                }
            }
        }
    }
}

/// Freudenthal orderings: each permutation walks one simplex from the
/// cell's base corner to its opposite corner.
fn permutations(dimension: usize) -> &'static [[usize; 3]] {
    match dimension {
        1 => &[[0, 1, 2]],
        2 => &[[0, 1, 2], [1, 0, 2]],
        _ => &[
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ],
    }
}

/// Linear indices of every cell's base corner, in mesh order.
fn cell_bases<'a>(shape: &'a [usize], strides: &'a [usize]) -> impl Iterator<Item = usize> + 'a {
    let total: usize = shape.iter().product();
    (0..total).filter(move |linear| {
        shape
            .iter()
            .zip(strides)
            .all(|(length, stride)| (linear / stride) % length + 1 < *length)
    })
}

fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1_usize; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    strides
}

fn padded_strides(shape: &[usize]) -> [usize; 3] {
    let mut padded = [0_usize; 3];
    for (slot, stride) in padded.iter_mut().zip(row_major_strides(shape)) {
        *slot = stride;
    }
    padded
}

/// Inverse of the leading `dimension × dimension` block, or `None` when the
/// block spans (numerically) no volume.
fn invert(matrix: &[[f64; 3]; 3], dimension: usize) -> Option<[[f64; 3]; 3]> {
    let scale = matrix
        .iter()
        .take(dimension)
        .flat_map(|row| row.iter().take(dimension))
        .fold(0.0_f64, |acc, value| acc.max(value.abs()));
    if !(scale > 0.0) {
        return None;
    }

    let mut inverse = [[0.0; 3]; 3];
    let det = match dimension {
        1 => {
            let det = matrix[0][0];
            inverse[0][0] = 1.0;
            det
        }
        2 => {
            let [[a, b, _], [c, d, _], _] = *matrix;
            inverse[0] = [d, -b, 0.0];
            inverse[1] = [-c, a, 0.0];
            a * d - b * c
        }
        _ => {
            let [[a, b, c], [d, e, f], [g, h, i]] = *matrix;
            inverse[0] = [e * i - f * h, -(b * i - c * h), b * f - c * e];
            inverse[1] = [-(d * i - f * g), a * i - c * g, -(a * f - c * d)];
            inverse[2] = [d * h - e * g, -(a * h - b * g), a * e - b * d];
            a * inverse[0][0] + b * inverse[1][0] + c * inverse[2][0]
        }
    };

    if !det.is_finite() || det.abs() <= DEGENERATE_VOLUME * scale.powi(dimension as i32) {
        return None;
    }
    for row in inverse.iter_mut().take(dimension) {
        for entry in row.iter_mut().take(dimension) {
            *entry /= det;
        }
    }
    Some(inverse)
}

#[cfg(test)]
mod tests {
    use super::{cell_bases, invert, resample_cloud, row_major_strides};
    use crate::common::ResampleSettings;
    use crate::conversion::forward::{ScatteredCloud, ScatteredSample};
    use crate::conversion::grid::MomentumGrid;
    use crate::domain::Coordinate;

    fn line_cloud(positions: &[f64], intensities: &[f64]) -> ScatteredCloud {
        ScatteredCloud {
            mesh_shape: vec![positions.len()],
            dimension: 1,
            samples: positions
                .iter()
                .zip(intensities)
                .enumerate()
                .map(|(cell, (position, intensity))| ScatteredSample {
                    momentum: [*position, f64::NAN, f64::NAN],
                    cell,
                    intensity: *intensity,
                })
                .collect(),
        }
    }

    /// 3x3 mesh under a shear, carrying an affine intensity `2 kx + 3 ky + 1`.
    fn sheared_cloud() -> ScatteredCloud {
        let mut samples = Vec::new();
        for i in 0..3 {
            for j in 0..3 {
                let kx = i as f64 + 0.1 * j as f64;
                let ky = j as f64 - 0.05 * i as f64;
                samples.push(ScatteredSample {
                    momentum: [kx, ky, f64::NAN],
                    cell: samples.len(),
                    intensity: 2.0 * kx + 3.0 * ky + 1.0,
                });
            }
        }
        ScatteredCloud {
            mesh_shape: vec![3, 3],
            dimension: 2,
            samples,
        }
    }

    fn grid(axes: Vec<(&str, Vec<f64>)>) -> MomentumGrid {
        MomentumGrid::new(
            axes.into_iter()
                .map(|(name, values)| Coordinate::new(name, values))
                .collect(),
        )
        .expect("grid")
    }

    #[test]
    fn segments_interpolate_linearly_and_leave_outside_missing() {
        let cloud = line_cloud(&[0.0, 1.0, 3.0], &[0.0, 10.0, 30.0]);
        let grid = grid(vec![("kp", vec![-1.0, 0.0, 0.5, 2.0, 3.0, 4.0])]);
        let values = resample_cloud(&cloud, &grid, &ResampleSettings::default()).expect("resample");

        assert!(values[0].is_nan());
        for (value, expected) in values[1..5].iter().zip([0.0, 5.0, 20.0, 30.0]) {
            assert!((value - expected).abs() < 1.0e-12, "{value} != {expected}");
        }
        assert!(values[5].is_nan());
    }

    #[test]
    fn descending_samples_cover_the_same_hull() {
        let cloud = line_cloud(&[3.0, 1.0, 0.0], &[30.0, 10.0, 0.0]);
        let grid = grid(vec![("kp", vec![0.5, 2.0])]);
        let values = resample_cloud(&cloud, &grid, &ResampleSettings::default()).expect("resample");
        assert!((values[0] - 5.0).abs() < 1.0e-12);
        assert!((values[1] - 20.0).abs() < 1.0e-12);
    }

    #[test]
    fn triangles_reproduce_affine_intensity() {
        let cloud = sheared_cloud();
        let grid = grid(vec![
            ("kx", vec![0.2, 0.6, 1.0, 1.4, 1.8]),
            ("ky", vec![0.2, 0.6, 1.0, 1.5]),
        ]);
        let values = resample_cloud(&cloud, &grid, &ResampleSettings::default()).expect("resample");

        for (node, value) in values.iter().enumerate() {
            let kx = grid.axis(0)[node / 4];
            let ky = grid.axis(1)[node % 4];
            let expected = 2.0 * kx + 3.0 * ky + 1.0;
            assert!((value - expected).abs() < 1.0e-9, "node {node}: {value} != {expected}");
        }

        let outside = grid_with_far_node();
        let values = resample_cloud(&cloud, &outside, &ResampleSettings::default()).expect("resample");
        assert!(values[0].is_finite());
        assert!(values[1].is_nan());
    }

    fn grid_with_far_node() -> MomentumGrid {
        grid(vec![("kx", vec![1.0, 5.0]), ("ky", vec![1.0])])
    }

    #[test]
    fn chunking_does_not_change_values() {
        let cloud = sheared_cloud();
        let grid = grid(vec![
            ("kx", vec![-0.5, 0.3, 0.9, 1.1, 2.5]),
            ("ky", vec![-0.2, 0.4, 1.3]),
        ]);
        let whole = resample_cloud(&cloud, &grid, &ResampleSettings::default()).expect("resample");
        let chunked = resample_cloud(
            &cloud,
            &grid,
            &ResampleSettings {
                max_chunk_nodes: 1,
                ..ResampleSettings::default()
            },
        )
        .expect("resample");

        assert_eq!(
            whole.iter().map(|value| value.to_bits()).collect::<Vec<_>>(),
            chunked.iter().map(|value| value.to_bits()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn missing_vertex_coordinates_drop_their_simplices() {
        let cloud = line_cloud(&[0.0, f64::NAN, 2.0, 3.0], &[1.0, 1.0, 1.0, 1.0]);
        let grid = grid(vec![("kp", vec![0.5, 1.5, 2.5])]);
        let values = resample_cloud(&cloud, &grid, &ResampleSettings::default()).expect("resample");
        assert!(values[0].is_nan());
        assert!(values[1].is_nan());
        assert!((values[2] - 1.0).abs() < 1.0e-12);
    }

    #[test]
    fn rank_mismatch_is_rejected() {
        let cloud = line_cloud(&[0.0, 1.0], &[0.0, 1.0]);
        let grid = grid(vec![("kx", vec![0.0, 1.0]), ("ky", vec![0.0, 1.0])]);
        assert!(resample_cloud(&cloud, &grid, &ResampleSettings::default()).is_err());
    }

    #[test]
    fn cell_bases_skip_the_last_index_of_every_axis() {
        let shape = [3, 2];
        let strides = row_major_strides(&shape);
        assert_eq!(strides, vec![2, 1]);
        assert_eq!(cell_bases(&shape, &strides).collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn invert_rejects_flat_simplices() {
        let flat = [[1.0, 2.0, 0.0], [2.0, 4.0, 0.0], [0.0, 0.0, 0.0]];
        assert!(invert(&flat, 2).is_none());

        let inverse = invert(&[[2.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 0.5]], 3).expect("invertible");
        assert!((inverse[0][0] - 0.5).abs() < 1.0e-15);
        assert!((inverse[1][1] - 0.25).abs() < 1.0e-15);
        assert!((inverse[2][2] - 2.0).abs() < 1.0e-15);
    }
}
