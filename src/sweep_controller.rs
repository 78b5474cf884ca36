use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use polars::prelude::PolarsError;

use crate::frequency_axis::FrequencyAxis;
use crate::instrument::{
    AcquisitionMode, Channel, Delay, InstrumentError, InstrumentHandles, Oscilloscope,
    SignalSource, ThreadSleep,
};
use crate::sweep_parameters::{Averages, ParameterError, SweepParameters};

/// Peak-to-peak readings above this value mean the trace is clipped or lost.
pub const OVERFLOW_THRESHOLD: f64 = 1e37;

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(#[from] ParameterError),

    #[error("Instrument error: {0}")]
    Instrument(#[from] InstrumentError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to render plot: {0}")]
    Plot(String),

    #[error("Data frame error: {0}")]
    Frame(#[from] PolarsError),
}

/// Peak-to-peak voltages of a completed sweep, one per frequency of its axis.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepResult {
    samples: Vec<f64>,
}

impl SweepResult {
    pub fn as_slice(&self) -> &[f64] {
        &self.samples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.samples
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SweepOutcome {
    Completed(SweepResult),
    /// A stop was requested; no samples are reported.
    Cancelled,
}

impl SweepOutcome {
    pub fn completed(self) -> Option<SweepResult> {
        match self {
            SweepOutcome::Completed(result) => Some(result),
            SweepOutcome::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SweepOutcome::Cancelled)
    }
}

/// Requests a running sweep to stop. Cheap to clone and safe to use from other threads.
///
/// The request is only looked at before each new frequency, so an instrument command
/// or wait that is already in progress always finishes first.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Fixed waits of the per-frequency protocol. The dwell-scaled waits come from
/// [`SweepParameters::dwell`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepTiming {
    /// After retuning the source.
    pub source_settle: Duration,
    /// After rescaling the channel, before the recorded measurement.
    pub range_settle: Duration,
    /// After an auto-range triggered by a lost signal.
    pub overflow_recovery: Duration,
}

impl Default for SweepTiming {
    fn default() -> Self {
        Self {
            source_settle: Duration::from_millis(50),
            range_settle: Duration::from_millis(50),
            overflow_recovery: Duration::from_secs(10),
        }
    }
}

/// Readings that are not a usable voltage: the scope's invalid sentinel of either
/// sign, NaN or infinity.
fn is_overflow(peak_to_peak: f64) -> bool {
    !peak_to_peak.is_finite() || peak_to_peak.abs() > OVERFLOW_THRESHOLD
}

/// Runs sweeps on a signal source and an oscilloscope it owns.
///
/// The oscilloscope is closed when the controller is dropped.
///
/// Auto-ranging always happens in [`AcquisitionMode::Normal`] so that the scale
/// follows the live signal; only the recorded sample of each frequency is taken
/// with hardware averaging.
pub struct SweepController<S: SignalSource, O: Oscilloscope, D: Delay = ThreadSleep> {
    handles: InstrumentHandles<S, O>,
    delay: D,
    timing: SweepTiming,
    channel: Channel,
    stop: StopHandle,
}

impl<S: SignalSource, O: Oscilloscope> SweepController<S, O> {
    pub fn new(handles: InstrumentHandles<S, O>) -> Self {
        Self::with_delay(handles, ThreadSleep)
    }
}

impl<S: SignalSource, O: Oscilloscope, D: Delay> SweepController<S, O, D> {
    pub fn with_delay(handles: InstrumentHandles<S, O>, delay: D) -> Self {
        Self {
            handles,
            delay,
            timing: SweepTiming::default(),
            channel: Channel::default(),
            stop: StopHandle::default(),
        }
    }

    pub fn with_timing(mut self, timing: SweepTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Oscilloscope channel the response is measured on.
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }

    /// Share an existing stop handle, e.g. one already given to a signal handler.
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Sweep the source across the frequencies described by `params`.
    ///
    /// Parameters are validated before any instrument command is sent. A stop
    /// requested before the call is discarded.
    #[tracing::instrument(level = "debug", skip_all, fields(fstart = params.fstart, fend = params.fend))]
    pub fn sweep(&mut self, params: &SweepParameters) -> Result<SweepOutcome, SweepError> {
        let averages = params.validated_averages()?;
        let dwell = Duration::from_secs_f64(0.5 * params.validated_dwell()?);

        self.stop.clear();
        let axis = FrequencyAxis::from_parameters(params)?;

        self.configure(params, averages)?;

        let mut samples = Vec::with_capacity(axis.len());
        for (idx, &frequency) in axis.iter().enumerate() {
            if self.stop.is_stop_requested() {
                log::info!("Sweep stopped after {} of {} points", idx, axis.len());
                return Ok(SweepOutcome::Cancelled);
            }

            let sample = self.measure_point(params, frequency, averages, dwell)?;
            log::info!("{:>14.3} Hz: {:.6} Vpp", frequency, sample);
            samples.push(sample);

            self.delay.wait(dwell);
        }

        Ok(SweepOutcome::Completed(SweepResult { samples }))
    }

    fn configure(&mut self, params: &SweepParameters, averages: Averages) -> Result<(), SweepError> {
        let scope = &mut self.handles.scope;
        scope.set_acquisition_mode(AcquisitionMode::Normal)?;
        if !averages.is_single_shot() {
            scope.set_averaging_count(averages.get())?;
        }

        // Initial estimate for the vertical scale
        scope.set_channel_vertical_gain(self.channel, params.amp / 3.0)?;
        scope.set_channel_vertical_offset(self.channel, params.ofs)?;
        Ok(())
    }

    fn measure_point(
        &mut self,
        params: &SweepParameters,
        frequency: f64,
        averages: Averages,
        dwell: Duration,
    ) -> Result<f64, SweepError> {
        let channel = self.channel;

        self.handles
            .source
            .drive_sinusoid(params.amp, frequency, params.ofs)?;
        self.delay.wait(self.timing.source_settle);

        // Keep between 3 and 6 periods on screen
        self.handles.scope.set_timebase(1.0 / (2.5 * frequency))?;
        self.delay.wait(dwell);

        let v_range = self.handles.scope.measure_peak_to_peak(channel)?;
        let v_avg = self.handles.scope.measure_average(channel)?;

        let overflow = is_overflow(v_range);
        if overflow {
            log::warn!(
                "Signal lost at {} Hz (Vpp reading {:e}), running auto range",
                frequency,
                v_range
            );
            self.handles.scope.auto_range()?;
            self.delay.wait(self.timing.overflow_recovery);
        } else {
            // A quarter of Vpp per division fills about two thirds of the screen
            self.handles
                .scope
                .set_channel_vertical_gain(channel, v_range / 4.0)?;
            self.handles
                .scope
                .set_channel_vertical_offset(channel, -v_avg)?;
        }
        self.delay.wait(self.timing.range_settle);

        let sample = if averages.is_single_shot() && !overflow {
            v_range
        } else {
            self.record_sample(averages)?
        };

        if is_overflow(sample) {
            log::warn!("No valid reading at {} Hz after auto range", frequency);
            return Ok(f64::NAN);
        }
        Ok(sample)
    }

    /// Fresh peak-to-peak reading, averaged in hardware when requested.
    fn record_sample(&mut self, averages: Averages) -> Result<f64, SweepError> {
        let scope = &mut self.handles.scope;
        if averages.is_single_shot() {
            return Ok(scope.measure_peak_to_peak(self.channel)?);
        }

        scope.set_acquisition_mode(AcquisitionMode::Average)?;
        scope.set_averaging_count(averages.get())?;
        let sample = scope.measure_peak_to_peak(self.channel)?;
        scope.set_acquisition_mode(AcquisitionMode::Normal)?;
        Ok(sample)
    }
}

impl<S: SignalSource, O: Oscilloscope, D: Delay> Drop for SweepController<S, O, D> {
    fn drop(&mut self) {
        log::debug!("Closing oscilloscope");
        if let Err(e) = self.handles.scope.close() {
            log::warn!("Failed to close oscilloscope: {}", e);
        }
    }
}
