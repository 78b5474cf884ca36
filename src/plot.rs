use std::path::Path;

use plotters::prelude::*;

use crate::calibration::CalibrationRecord;
use crate::sweep_controller::SweepError;

const SIZE: (u32, u32) = (1024, 640);

/// Draw gain in dB against log frequency, with the raw readings in mV on a
/// logarithmic secondary axis, and save it as a PNG.
pub fn render_calibration_plot(record: &CalibrationRecord, path: &Path) -> Result<(), SweepError> {
    log::debug!("Rendering calibration plot to {}", path.display());
    draw_calibration_plot(record, path).map_err(|e| SweepError::Plot(e.to_string()))
}

fn finite_points(frequencies: &[f64], values: impl IntoIterator<Item = f64>) -> Vec<(f64, f64)> {
    frequencies
        .iter()
        .copied()
        .zip(values)
        .filter(|(_, v)| v.is_finite())
        .collect()
}

/// Bounds of `values`, widened so that a flat series still spans a visible range.
fn bounds(values: impl Iterator<Item = f64>, log_scale: bool) -> Option<(f64, f64)> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !(lo.is_finite() && hi.is_finite()) {
        return None;
    }

    if log_scale {
        Some((lo / 1.5, hi * 1.5))
    } else {
        let pad = ((hi - lo) * 0.1).max(1.0);
        Some((lo - pad, hi + pad))
    }
}

fn draw_calibration_plot(
    record: &CalibrationRecord,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let frequencies = record.frequencies();
    let (Some(&fmin), Some(&fmax)) = (frequencies.first(), frequencies.last()) else {
        return Err("no frequencies to plot".into());
    };
    let fmax = if fmax > fmin { fmax } else { fmin * 10.0 };

    let gain_db = finite_points(frequencies, record.gain_db());
    let baseline_mv = finite_points(frequencies, record.baseline().iter().map(|v| v * 1e3))
        .into_iter()
        .filter(|(_, v)| *v > 0.0)
        .collect::<Vec<_>>();
    let sut_mv = finite_points(frequencies, record.sut().iter().map(|v| v * 1e3))
        .into_iter()
        .filter(|(_, v)| *v > 0.0)
        .collect::<Vec<_>>();

    let (db_min, db_max) = bounds(gain_db.iter().map(|(_, v)| *v), false).unwrap_or((-1.0, 1.0));
    let (mv_min, mv_max) = bounds(
        baseline_mv.iter().chain(&sut_mv).map(|(_, v)| *v),
        true,
    )
    .unwrap_or((1.0, 1e3));

    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("SUT Frequency Response", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .right_y_label_area_size(60)
        .build_cartesian_2d((fmin..fmax).log_scale(), db_min..db_max)?
        .set_secondary_coord((fmin..fmax).log_scale(), (mv_min..mv_max).log_scale());

    chart
        .configure_mesh()
        .x_desc("Frequency [Hz]")
        .y_desc("Gain [dB]")
        .draw()?;
    chart
        .configure_secondary_axes()
        .y_desc("Raw Voltage [mV]")
        .axis_desc_style(("sans-serif", 15).into_font().color(&RED))
        .draw()?;

    chart
        .draw_series(LineSeries::new(gain_db, &BLUE))?
        .label("Gain")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));
    chart
        .draw_secondary_series(LineSeries::new(baseline_mv, &RED))?
        .label("Baseline")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
    chart
        .draw_secondary_series(LineSeries::new(sut_mv, RED.mix(0.4)))?
        .label("SUT raw")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.mix(0.4)));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}
