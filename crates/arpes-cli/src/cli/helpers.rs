use super::CliError;
use super::loaders::{LoaderRegistry, read_settings, write_document};
use arpes_core::{AxisGrid, AxisGrids, CalibrationPoint, ConversionSettings, KspaceConverter, LabeledArray};
use std::path::Path;

/// Parses `NAME=start:stop:count` (inclusive linspace) or `NAME=min..max@step`.
pub(super) fn parse_grid_assignment(text: &str) -> Result<(String, AxisGrid), CliError> {
    let (name, spec) = text
        .split_once('=')
        .ok_or_else(|| usage(format!("grid '{}' is not of the form NAME=SPEC", text)))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(usage(format!("grid '{}' has no axis name", text)));
    }
    Ok((name.to_string(), parse_grid_spec(spec.trim())?))
}

pub(super) fn parse_grid_spec(spec: &str) -> Result<AxisGrid, CliError> {
    if let Some((bounds, step)) = spec.split_once('@') {
        let (min, max) = bounds
            .split_once("..")
            .ok_or_else(|| usage(format!("range grid '{}' is not of the form min..max@step", spec)))?;
        return Ok(AxisGrid::range(
            parse_number(min, spec)?,
            parse_number(max, spec)?,
            parse_number(step, spec)?,
        ));
    }

    let parts: Vec<&str> = spec.split(':').collect();
    match parts.as_slice() {
        [start, stop, count] => {
            let count = count
                .trim()
                .parse::<usize>()
                .map_err(|_| usage(format!("grid '{}' has a non-integer sample count", spec)))?;
            Ok(AxisGrid::linspace(parse_number(start, spec)?, parse_number(stop, spec)?, count))
        }
        _ => Err(usage(format!(
            "grid '{}' is neither start:stop:count nor min..max@step",
            spec
        ))),
    }
}

pub(super) fn collect_grids(assignments: &[String]) -> Result<AxisGrids, CliError> {
    let mut grids = AxisGrids::new();
    for assignment in assignments {
        let (name, grid) = parse_grid_assignment(assignment)?;
        if grids.insert(name.clone(), grid).is_some() {
            return Err(usage(format!("grid for '{}' given more than once", name)));
        }
    }
    Ok(grids)
}

/// Parses `KEY=VAL[,KEY=VAL...]`, e.g. `phi=-0.13,theta=-0.1,eV=0`.
pub(super) fn parse_point(text: &str) -> Result<CalibrationPoint, CliError> {
    let mut coordinates = Vec::new();
    for entry in text.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| usage(format!("point entry '{}' is not of the form KEY=VAL", entry)))?;
        coordinates.push((key.trim().to_string(), parse_number(value, entry)?));
    }
    if coordinates.is_empty() {
        return Err(usage("calibration point has no coordinates"));
    }
    Ok(CalibrationPoint::new(coordinates)?)
}

pub(super) fn converter_for(settings_path: Option<&Path>) -> Result<KspaceConverter, CliError> {
    let settings = match settings_path {
        None => ConversionSettings::default(),
        Some(path) => read_settings(path)?,
    };
    Ok(KspaceConverter::new(settings))
}

pub(super) fn load_input(path: &Path) -> Result<LabeledArray, CliError> {
    Ok(LoaderRegistry::with_default_loaders()?.load(path)?)
}

pub(super) fn write_output(path: &Path, array: &LabeledArray) -> Result<(), CliError> {
    write_document(path, array)?;
    Ok(())
}

pub(super) fn describe(array: &LabeledArray) -> String {
    array
        .dims()
        .iter()
        .zip(array.shape())
        .map(|(name, length)| format!("{}[{}]", name, length))
        .collect::<Vec<_>>()
        .join(" x ")
}

fn parse_number(text: &str, context: &str) -> Result<f64, CliError> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| usage(format!("'{}' in '{}' is not a number", text.trim(), context)))
}

fn usage(message: impl Into<String>) -> CliError {
    CliError::Usage(message.into())
}
