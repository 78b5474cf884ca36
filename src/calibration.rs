//! Two-pass sweep: a baseline straight from the source, then the device under test.

use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use polars::prelude::*;

use crate::frequency_axis::FrequencyAxis;
use crate::instrument::{Delay, Oscilloscope, SignalSource};
use crate::plot;
use crate::sweep_controller::{SweepController, SweepError, SweepOutcome};
use crate::sweep_parameters::SweepParameters;

pub const DEFAULT_DATAFILE: &str = "sweep_data.csv";

const COLUMN_TITLES: [&str; 4] = ["Frequency [Hz]", "Baseline [V]", "SUT Raw [V]", "Gain"];
const FIELD_WIDTH: usize = 16;
const SIGNIFICANT_DIGITS: usize = 8;

/// The person at the bench moving cables between the two passes.
pub trait Operator {
    /// Show an instruction and block until the operator confirms it.
    fn acknowledge(&mut self, instruction: &str) -> io::Result<()>;

    /// Ask where to save the results; an empty answer keeps `default`.
    fn choose_output_path(&mut self, default: &Path) -> io::Result<PathBuf>;

    fn notify(&mut self, message: &str);
}

/// [`Operator`] on the terminal's stdin and stdout.
#[derive(Debug, Default)]
pub struct ConsoleOperator;

impl ConsoleOperator {
    fn prompt(message: &str) -> io::Result<String> {
        print!("{}", message);
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().lock().read_line(&mut input)?;
        Ok(input)
    }
}

impl Operator for ConsoleOperator {
    fn acknowledge(&mut self, instruction: &str) -> io::Result<()> {
        println!("{}", instruction);
        Self::prompt("Press enter to begin scan:")?;
        Ok(())
    }

    fn choose_output_path(&mut self, default: &Path) -> io::Result<PathBuf> {
        let input = Self::prompt(&format!(
            "Enter the filename to which to save scan data [{}]:",
            default.display()
        ))?;
        let input = input.trim();
        if input.is_empty() {
            Ok(default.to_path_buf())
        } else {
            Ok(PathBuf::from(input))
        }
    }

    fn notify(&mut self, message: &str) {
        println!("{}", message);
    }
}

#[derive(Debug, Clone)]
pub struct CalibrationOptions {
    /// Used when the operator leaves the filename prompt empty.
    pub default_datafile: PathBuf,
    /// Render a PNG next to the data file.
    pub render_plot: bool,
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        Self {
            default_datafile: PathBuf::from(DEFAULT_DATAFILE),
            render_plot: true,
        }
    }
}

/// Baseline and device readings on a shared frequency axis, with their ratio.
///
/// A zero baseline reading yields an infinite or NaN gain, which is kept as is.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationRecord {
    frequencies: Vec<f64>,
    baseline: Vec<f64>,
    sut: Vec<f64>,
    gain: Vec<f64>,
}

impl CalibrationRecord {
    pub fn new(frequencies: Vec<f64>, baseline: Vec<f64>, sut: Vec<f64>) -> Self {
        let gain: Vec<f64> = sut.iter().zip(&baseline).map(|(s, b)| s / b).collect();

        let hazards: Vec<f64> = frequencies
            .iter()
            .zip(&gain)
            .filter(|(_, g)| !g.is_finite())
            .map(|(f, _)| *f)
            .collect();
        if !hazards.is_empty() {
            log::warn!("Gain is not finite at {:?} Hz", hazards);
        }

        Self {
            frequencies,
            baseline,
            sut,
            gain,
        }
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn baseline(&self) -> &[f64] {
        &self.baseline
    }

    pub fn sut(&self) -> &[f64] {
        &self.sut
    }

    pub fn gain(&self) -> &[f64] {
        &self.gain
    }

    /// `10 * log10(gain)` per point.
    pub fn gain_db(&self) -> Vec<f64> {
        self.gain.iter().map(|g| 10.0 * g.log10()).collect()
    }

    /// Indices whose gain is infinite or NaN.
    pub fn division_hazards(&self) -> Vec<usize> {
        self.gain
            .iter()
            .enumerate()
            .filter(|(_, g)| !g.is_finite())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        df!(
            "frequency_hz" => &self.frequencies,
            "baseline_v" => &self.baseline,
            "sut_v" => &self.sut,
            "gain" => &self.gain,
            "gain_db" => self.gain_db(),
        )
    }

    /// Write the comma separated table: a `#` header naming the columns, then one
    /// row per frequency with every value right-aligned in `%16.8g` style.
    pub fn write_table<W: Write>(&self, mut writer: W) -> io::Result<()> {
        let header: String = COLUMN_TITLES
            .iter()
            .map(|title| format!("{:<17}", title))
            .collect();
        writeln!(writer, "# {}", header)?;

        for (((frequency, baseline), sut), gain) in self
            .frequencies
            .iter()
            .zip(&self.baseline)
            .zip(&self.sut)
            .zip(&self.gain)
        {
            let row: Vec<String> = [frequency, baseline, sut, gain]
                .iter()
                .map(|value| {
                    format!(
                        "{:>width$}",
                        format_general(**value, SIGNIFICANT_DIGITS),
                        width = FIELD_WIDTH
                    )
                })
                .collect();
            writeln!(writer, "{}", row.join(","))?;
        }

        writer.flush()
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let file = File::create(path)?;
        self.write_table(BufWriter::new(file))
    }
}

/// Format like C's `%.{precision}g`: shortest of fixed or exponent notation,
/// trailing zeros removed.
pub fn format_general(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let precision = precision.max(1);
    let scientific = format!("{:.*e}", precision - 1, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exponent.abs())
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CalibratedOutcome {
    Completed {
        record: CalibrationRecord,
        data_path: PathBuf,
        plot_path: Option<PathBuf>,
    },
    /// One of the passes was stopped; nothing was computed or written.
    Cancelled,
}

impl<S: SignalSource, O: Oscilloscope, D: Delay> SweepController<S, O, D> {
    /// Measure a baseline with the scope on the source, then the device under test,
    /// and save their ratio.
    ///
    /// Both passes use the same parameters and therefore the same frequency axis.
    #[tracing::instrument(level = "debug", skip_all, fields(fstart = params.fstart, fend = params.fend))]
    pub fn calibrated_sweep(
        &mut self,
        params: &SweepParameters,
        operator: &mut impl Operator,
        options: &CalibrationOptions,
    ) -> Result<CalibratedOutcome, SweepError> {
        operator.acknowledge(
            "Connect the oscilloscope directly to the function generator to establish baseline response.",
        )?;
        let SweepOutcome::Completed(baseline) = self.sweep(params)? else {
            log::info!("Baseline sweep cancelled");
            return Ok(CalibratedOutcome::Cancelled);
        };

        operator.acknowledge(
            "Baseline scan complete.\nConnect the oscilloscope to the system under test.",
        )?;
        let SweepOutcome::Completed(sut) = self.sweep(params)? else {
            log::info!("Device sweep cancelled");
            return Ok(CalibratedOutcome::Cancelled);
        };
        operator.notify("Scan finished.");

        let data_path = operator.choose_output_path(&options.default_datafile)?;
        let frequencies = FrequencyAxis::from_parameters(params)?;
        let record = CalibrationRecord::new(frequencies.into_vec(), baseline.into_vec(), sut.into_vec());

        operator.notify(&format!("Filename = {}", data_path.display()));
        record.save(&data_path)?;

        let plot_path = if options.render_plot {
            let plot_path = data_path.with_extension("png");
            plot::render_calibration_plot(&record, &plot_path)?;
            Some(plot_path)
        } else {
            None
        };

        operator.notify("Scan complete.");
        Ok(CalibratedOutcome::Completed {
            record,
            data_path,
            plot_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep_controller::StopHandle;
    use crate::testing::{bench, count, handles, temp_path, Event, ScriptedOperator};

    fn four_points() -> SweepParameters {
        SweepParameters::linear(1000.0, 4000.0)
            .with_step(1000.0)
            .with_averages(1)
            .with_dwell(0.0)
    }

    #[test]
    fn test_format_general() {
        assert_eq!(format_general(1000.0, 8), "1000");
        assert_eq!(format_general(60_000_000.0, 8), "60000000");
        assert_eq!(format_general(123_456_789.0, 8), "1.2345679e+08");
        assert_eq!(format_general(1.0 / 3.0, 8), "0.33333333");
        assert_eq!(format_general(0.0001, 8), "0.0001");
        assert_eq!(format_general(2.5e-7, 8), "2.5e-07");
        assert_eq!(format_general(-0.5, 8), "-0.5");
        assert_eq!(format_general(0.0, 8), "0");
        assert_eq!(format_general(f64::INFINITY, 8), "inf");
        assert_eq!(format_general(f64::NEG_INFINITY, 8), "-inf");
        assert_eq!(format_general(f64::NAN, 8), "nan");
    }

    #[test]
    fn test_gain_with_zero_baseline() {
        let record = CalibrationRecord::new(
            vec![1e3, 2e3, 3e3, 4e3],
            vec![1.0, 2.0, 0.0, 4.0],
            vec![2.0, 2.0, 2.0, 8.0],
        );
        assert_eq!(record.gain(), &[2.0, 1.0, f64::INFINITY, 2.0]);
        assert_eq!(record.division_hazards(), vec![2]);

        let mut table = Vec::new();
        record.write_table(&mut table).unwrap();
        let table = String::from_utf8(table).unwrap();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(
            lines[0],
            "# Frequency [Hz]   Baseline [V]     SUT Raw [V]      Gain             "
        );
        assert_eq!(
            lines[1],
            "            1000,               1,               2,               2"
        );
        assert_eq!(
            lines[3],
            "            3000,               0,               2,             inf"
        );
    }

    #[test]
    fn test_gain_db() {
        let record = CalibrationRecord::new(vec![1e3, 2e3], vec![1.0, 1.0], vec![10.0, 0.1]);
        let gain_db = record.gain_db();
        assert!((gain_db[0] - 10.0).abs() < 1e-12);
        assert!((gain_db[1] + 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_to_dataframe() {
        let record = CalibrationRecord::new(vec![1e3, 2e3, 3e3], vec![1.0; 3], vec![0.5; 3]);
        let df = record.to_dataframe().unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 5);
        let gain: Vec<f64> = df.column("gain").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(gain, vec![0.5; 3]);
    }

    #[test]
    fn test_calibrated_sweep_writes_table() {
        let (source, scope, delay, log) = bench();
        let scope = scope.with_readings(&[1.0, 2.0, 0.0, 4.0, 2.0, 2.0, 2.0, 8.0]);
        let mut controller = SweepController::with_delay(handles(source, scope), delay);

        let data_path = temp_path("calibrated.csv");
        let mut operator = ScriptedOperator {
            filename: data_path.display().to_string(),
            ..ScriptedOperator::default()
        };
        let options = CalibrationOptions {
            render_plot: false,
            ..CalibrationOptions::default()
        };

        let outcome = controller
            .calibrated_sweep(&four_points(), &mut operator, &options)
            .unwrap();
        let CalibratedOutcome::Completed {
            record,
            data_path: written,
            plot_path,
        } = outcome
        else {
            unreachable!("Calibrated sweep was cancelled");
        };

        assert_eq!(record.frequencies(), &[1000.0, 2000.0, 3000.0, 4000.0]);
        assert_eq!(record.baseline(), &[1.0, 2.0, 0.0, 4.0]);
        assert_eq!(record.sut(), &[2.0, 2.0, 2.0, 8.0]);
        assert_eq!(record.gain(), &[2.0, 1.0, f64::INFINITY, 2.0]);
        assert_eq!(written, data_path);
        assert_eq!(plot_path, None);
        assert_eq!(operator.acknowledged.len(), 2);
        assert_eq!(count(&log, |e| matches!(e, Event::Drive { .. })), 8);

        let table = std::fs::read_to_string(&data_path).unwrap();
        std::fs::remove_file(&data_path).unwrap();
        assert_eq!(table.lines().count(), 5);
        assert!(table.lines().nth(3).unwrap().ends_with("inf"));
    }

    #[test]
    fn test_empty_filename_uses_default() {
        let (source, scope, delay, _log) = bench();
        let mut controller = SweepController::with_delay(handles(source, scope), delay);

        let default_datafile = temp_path("default.csv");
        let mut operator = ScriptedOperator::default();
        let options = CalibrationOptions {
            default_datafile: default_datafile.clone(),
            render_plot: false,
        };

        let outcome = controller
            .calibrated_sweep(&four_points(), &mut operator, &options)
            .unwrap();
        assert!(matches!(
            outcome,
            CalibratedOutcome::Completed { ref data_path, .. } if *data_path == default_datafile
        ));
        assert!(default_datafile.exists());
        std::fs::remove_file(&default_datafile).unwrap();
    }

    #[test]
    fn test_cancelled_pass_skips_persistence() {
        let (source, scope, delay, log) = bench();
        let stop = StopHandle::default();
        let source = source.stop_after(3, stop.clone());
        let mut controller =
            SweepController::with_delay(handles(source, scope), delay).with_stop_handle(stop);

        let default_datafile = temp_path("cancelled.csv");
        let mut operator = ScriptedOperator::default();
        let options = CalibrationOptions {
            default_datafile: default_datafile.clone(),
            render_plot: false,
        };

        let outcome = controller
            .calibrated_sweep(&four_points(), &mut operator, &options)
            .unwrap();
        assert_eq!(outcome, CalibratedOutcome::Cancelled);
        assert_eq!(operator.acknowledged.len(), 1);
        assert!(!default_datafile.exists());
        assert_eq!(count(&log, |e| matches!(e, Event::Drive { .. })), 3);
    }
}
