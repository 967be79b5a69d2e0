use super::CliError;
use super::helpers::*;
use arpes_core::{AxisGrids, LabeledArray};
use std::path::PathBuf;

#[derive(clap::Args)]
pub(super) struct IoArgs {
    /// Input spectrum (JSON labeled-array document)
    #[arg(long)]
    input: PathBuf,

    /// Output path for the converted document
    #[arg(long)]
    output: PathBuf,

    /// Conversion settings JSON (work function, inner potential, resampling and solver limits)
    #[arg(long)]
    settings: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct ConvertArgs {
    #[command(flatten)]
    io: IoArgs,

    /// Explicit momentum grid, `kx=-1:1:201` or `kx=-1..1@0.01`; repeatable
    #[arg(long = "grid", value_name = "NAME=SPEC")]
    grids: Vec<String>,
}

#[derive(clap::Args)]
pub(super) struct ThroughPointArgs {
    #[command(flatten)]
    io: IoArgs,

    /// Calibration point, `phi=-0.13,theta=-0.1,eV=0`
    #[arg(long, value_name = "KEY=VAL,...")]
    point: String,

    /// Grid of the momentum axis kept in the output
    #[arg(long, value_name = "NAME=SPEC")]
    through: String,

    /// Grid of a momentum axis averaged away; repeatable
    #[arg(long, value_name = "NAME=SPEC", required = true)]
    transverse: Vec<String>,
}

#[derive(clap::Args)]
pub(super) struct ThroughPairArgs {
    #[command(flatten)]
    io: IoArgs,

    /// Calibration point placed at the momentum origin
    #[arg(long, value_name = "KEY=VAL,...")]
    point_a: String,

    /// Second calibration point rotated onto the through axis
    #[arg(long, value_name = "KEY=VAL,...")]
    point_b: String,

    /// Grid of the momentum axis kept in the output
    #[arg(long, value_name = "NAME=SPEC")]
    through: String,

    /// Grid of a momentum axis averaged away; repeatable
    #[arg(long, value_name = "NAME=SPEC", required = true)]
    transverse: Vec<String>,
}

pub(super) fn run_convert_command(args: ConvertArgs) -> Result<i32, CliError> {
    let converter = converter_for(args.io.settings.as_deref())?;
    let grids = collect_grids(&args.grids)?;
    let data = load_input(&args.io.input)?;

    let converted = converter.convert(&data, &grids)?;
    finish(&args.io, &data, &converted)
}

pub(super) fn run_through_point_command(args: ThroughPointArgs) -> Result<i32, CliError> {
    let converter = converter_for(args.io.settings.as_deref())?;
    let point = parse_point(&args.point)?;
    let (through, transverse) = oblique_grids(&args.through, &args.transverse)?;
    let data = load_input(&args.io.input)?;

    let converted = converter.convert_through_angular_point(&data, &point, &through, &transverse)?;
    finish(&args.io, &data, &converted)
}

pub(super) fn run_through_pair_command(args: ThroughPairArgs) -> Result<i32, CliError> {
    let converter = converter_for(args.io.settings.as_deref())?;
    let point_a = parse_point(&args.point_a)?;
    let point_b = parse_point(&args.point_b)?;
    let (through, transverse) = oblique_grids(&args.through, &args.transverse)?;
    let data = load_input(&args.io.input)?;

    let converted =
        converter.convert_through_angular_pair(&data, &point_a, &point_b, &through, &transverse)?;
    finish(&args.io, &data, &converted)
}

fn oblique_grids(through: &str, transverse: &[String]) -> Result<(AxisGrids, AxisGrids), CliError> {
    let (name, grid) = parse_grid_assignment(through)?;
    let mut through = AxisGrids::new();
    through.insert(name, grid);
    Ok((through, collect_grids(transverse)?))
}

fn finish(io: &IoArgs, input: &LabeledArray, converted: &LabeledArray) -> Result<i32, CliError> {
    write_output(&io.output, converted)?;
    println!(
        "Converted {} -> {} into '{}'",
        describe(input),
        describe(converted),
        io.output.display()
    );
    Ok(0)
}
