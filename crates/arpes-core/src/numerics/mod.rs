pub mod linalg;

pub use linalg::{LuDecomposition, LuError, lu_factorize, lu_solve};

fn kahan_add(sum: &mut f64, correction: &mut f64, value: f64) {
    let corrected = value - *correction;
    let next = *sum + corrected;
    *correction = (next - *sum) - corrected;
    *sum = next;
}

/// Mean of the finite entries; `NaN` when there are none.
pub fn nan_mean(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut correction = 0.0;
    let mut count = 0_usize;

    for &value in values {
        if value.is_finite() {
            kahan_add(&mut sum, &mut correction, value);
            count += 1;
        }
    }

    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Index of the largest finite entry, first occurrence on ties.
pub fn nan_max_index(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, &value) in values.iter().enumerate() {
        if !value.is_finite() {
            continue;
        }
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((index, value)),
        }
    }
    best.map(|(index, _)| index)
}

/// Minimum and maximum of the finite entries.
pub fn finite_extent(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .into_iter()
        .filter(|value| value.is_finite())
        .fold(None, |extent, value| match extent {
            None => Some((value, value)),
            Some((low, high)) => Some((low.min(value), high.max(value))),
        })
}

/// Inclusive evenly spaced samples, `numpy.linspace` style.
pub fn linear_grid(start: f64, end: f64, count: usize) -> Option<Vec<f64>> {
    match count {
        0 => None,
        1 => Some(vec![start]),
        _ => {
            let step = (end - start) / ((count - 1) as f64);
            let mut grid = Vec::with_capacity(count);
            for index in 0..count {
                grid.push(start + step * (index as f64));
            }

            if let Some(last) = grid.last_mut() {
                *last = end;
            }

            Some(grid)
        }
    }
}

/// Samples `min, min + step, ...` up to and including `max` (within a small
/// fraction of a step).
pub fn stepped_grid(min: f64, max: f64, step: f64) -> Option<Vec<f64>> {
    if !(step > 0.0) || !min.is_finite() || !max.is_finite() || max < min {
        return None;
    }

    let span = (max - min) / step;
    let count = (span + 1.0e-9).floor() as usize + 1;
    Some((0..count).map(|index| min + step * index as f64).collect())
}

pub fn is_strictly_monotonic(values: &[f64]) -> bool {
    if values.len() < 2 {
        return true;
    }
    let increasing = values.windows(2).all(|window| window[0] < window[1]);
    let decreasing = values.windows(2).all(|window| window[0] > window[1]);
    increasing || decreasing
}

/// Index range `[lower, upper)` of the entries of a strictly monotonic grid
/// that lie inside `[low, high]`.
pub fn monotonic_index_range(grid: &[f64], low: f64, high: f64) -> (usize, usize) {
    if grid.is_empty() || !(low <= high) {
        return (0, 0);
    }

    let increasing = grid.len() < 2 || grid[0] < grid[1];
    if increasing {
        let lower = grid.partition_point(|value| *value < low);
        let upper = grid.partition_point(|value| *value <= high);
        (lower, upper.max(lower))
    } else {
        let lower = grid.partition_point(|value| *value > high);
        let upper = grid.partition_point(|value| *value >= low);
        (lower, upper.max(lower))
    }
}

#[cfg(test)]
mod tests {
    use super::{
        finite_extent, is_strictly_monotonic, linear_grid, monotonic_index_range, nan_max_index,
        nan_mean, stepped_grid,
    };

    #[test]
    fn nan_reductions_skip_missing_entries() {
        assert!((nan_mean(&[1.0, f64::NAN, 3.0]) - 2.0).abs() < 1.0e-12);
        assert!(nan_mean(&[f64::NAN, f64::NAN]).is_nan());
        assert_eq!(nan_max_index(&[f64::NAN, 2.0, 5.0, 5.0, 1.0]), Some(2));
        assert_eq!(nan_max_index(&[f64::NAN]), None);
        assert_eq!(finite_extent([3.0, f64::NAN, -1.0, 2.0]), Some((-1.0, 3.0)));
        assert_eq!(finite_extent([f64::NAN]), None);
    }

    #[test]
    fn linear_grid_is_inclusive() {
        assert_eq!(linear_grid(0.0, 1.0, 0), None);
        assert_eq!(linear_grid(0.5, 1.0, 1), Some(vec![0.5]));
        let grid = linear_grid(0.0, 2.0, 5).expect("grid");
        assert_eq!(grid, vec![0.0, 0.5, 1.0, 1.5, 2.0]);
    }

    #[test]
    fn stepped_grid_includes_endpoint_within_rounding() {
        let grid = stepped_grid(-0.1, 0.1, 0.05).expect("grid");
        assert_eq!(grid.len(), 5);
        assert!((grid[4] - 0.1).abs() < 1.0e-12);
        assert_eq!(stepped_grid(0.0, 1.0, 0.0), None);
        assert_eq!(stepped_grid(1.0, 0.0, 0.1), None);
    }

    #[test]
    fn monotonic_helpers_handle_both_directions() {
        assert!(is_strictly_monotonic(&[0.0, 1.0, 2.0]));
        assert!(is_strictly_monotonic(&[2.0, 1.0, 0.0]));
        assert!(!is_strictly_monotonic(&[0.0, 1.0, 1.0]));

        let increasing = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert_eq!(monotonic_index_range(&increasing, 0.5, 3.0), (1, 4));
        let decreasing = [4.0, 3.0, 2.0, 1.0, 0.0];
        assert_eq!(monotonic_index_range(&decreasing, 0.5, 3.0), (1, 4));
        assert_eq!(monotonic_index_range(&increasing, 5.0, 6.0), (5, 5));
    }
}
