//! # Sweep RS
//!
//! Frequency-response measurements with a signal generator and an oscilloscope.
//!
//! A sweep drives a sinusoid at each frequency of an axis, lets the instruments
//! settle, rescales the oscilloscope channel to the measured signal and records its
//! peak-to-peak voltage. A calibrated sweep repeats this on a baseline connection
//! and on the device under test and saves their ratio as the device's gain.
//!
//! ## Features
//!
//! - **Frequency axes**: logarithmic or linear, by point count or by step
//! - **Auto-ranging**: per-point vertical rescaling with recovery from lost signals
//! - **Hardware averaging**: only for the recorded sample, never while ranging
//! - **Cooperative stop**: a [`StopHandle`] usable from any thread
//! - **Calibrated sweeps**: baseline and device passes, gain table and plot
//! - **Reference drivers**: SCPI over serial for a Rigol scope and an `APPLy`-style generator
//!
//! ## Examples
//!
//! ### Frequency axis
//!
//! ```rust
//! use sweep_rs::{generate, Spacing};
//!
//! let axis = generate(1000.0, 10000.0, None, Some(1000.0), Some(Spacing::Linear))?;
//! assert_eq!(axis.len(), 10);
//! # Ok::<(), sweep_rs::ParameterError>(())
//! ```
//!
//! ### Sweep on the bench
//!
//! ```rust,no_run
//! use sweep_rs::{
//!     InstrumentConnector, InstrumentHandles, RigolScope, ScpiGenerator, SweepController,
//!     SweepParameters,
//! };
//!
//! let scope = RigolScope::new(InstrumentConnector::serial_adapter("oscilloscope").connect(Some("/dev/ttyUSB0"))?);
//! let generator = ScpiGenerator::new(InstrumentConnector::serial_adapter("generator").connect(Some("/dev/ttyUSB1"))?);
//! let mut controller = SweepController::new(InstrumentHandles::new(generator, scope));
//!
//! let params = SweepParameters::log(1e3, 1e6).with_ratio(10f64.powf(0.1)).with_averages(16);
//! if let Some(result) = controller.sweep(&params)?.completed() {
//!     println!("Measured {} points", result.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Calibrated sweep
//!
//! ```rust,no_run
//! use sweep_rs::{CalibrationOptions, ConsoleOperator, SweepParameters};
//! # fn run(mut controller: sweep_rs::SweepController<sweep_rs::ScpiGenerator, sweep_rs::RigolScope>) -> Result<(), sweep_rs::SweepError> {
//! let outcome = controller.calibrated_sweep(
//!     &SweepParameters::default(),
//!     &mut ConsoleOperator,
//!     &CalibrationOptions::default(),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod calibration;
pub mod connector;
pub mod export;
pub mod frequency_axis;
pub mod instrument;
pub mod plot;
pub mod rigol_scope;
pub mod scpi_generator;
pub mod serial_terminal;
pub mod sweep_controller;
pub mod sweep_parameters;

#[cfg(test)]
mod testing;

// Re-export the main types for convenience
pub use calibration::{
    format_general, CalibratedOutcome, CalibrationOptions, CalibrationRecord, ConsoleOperator,
    Operator, DEFAULT_DATAFILE,
};

pub use connector::{ConnectorError, InstrumentConnector, InstrumentDevice, UsbId};

pub use export::{sweep_frame, write_sweep_csv};

pub use frequency_axis::{generate, FrequencyAxis, MAX_POINTS};

pub use instrument::{
    AcquisitionMode, Channel, Delay, InstrumentError, InstrumentHandles, Oscilloscope,
    SignalSource, ThreadSleep,
};

pub use plot::render_calibration_plot;

pub use rigol_scope::RigolScope;

pub use scpi_generator::ScpiGenerator;

pub use serial_terminal::{ScpiTerminal, ScpiTerminalError};

pub use sweep_controller::{
    StopHandle, SweepController, SweepError, SweepOutcome, SweepResult, SweepTiming,
    OVERFLOW_THRESHOLD,
};

pub use sweep_parameters::{Averages, ParameterError, Spacing, SweepParameters};
