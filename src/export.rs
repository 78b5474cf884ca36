use std::fs::File;
use std::path::Path;

use polars::prelude::*;

use crate::frequency_axis::FrequencyAxis;
use crate::sweep_controller::{SweepError, SweepResult};

/// Frequencies and readings of a single sweep as columns `frequency_hz` and `vpp_v`.
pub fn sweep_frame(axis: &FrequencyAxis, result: &SweepResult) -> PolarsResult<DataFrame> {
    df!(
        "frequency_hz" => axis.as_slice(),
        "vpp_v" => result.as_slice(),
    )
}

pub fn write_sweep_csv(
    path: &Path,
    axis: &FrequencyAxis,
    result: &SweepResult,
) -> Result<(), SweepError> {
    let mut df = sweep_frame(axis, result)?;
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;

    log::debug!("Saved {} points to {}", df.height(), path.display());
    Ok(())
}
