//! Test doubles shared by the unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use crate::calibration::Operator;
use crate::instrument::{
    AcquisitionMode, Channel, Delay, InstrumentError, InstrumentHandles, Oscilloscope,
    SignalSource,
};
use crate::sweep_controller::StopHandle;

/// In-memory serial port: records writes, serves canned replies.
#[derive(Debug, Default)]
pub struct MockPort {
    written: Vec<u8>,
    replies: VecDeque<u8>,
}

impl MockPort {
    pub fn with_replies(replies: &[&str]) -> Self {
        let replies = replies
            .iter()
            .flat_map(|reply| format!("{reply}\n").into_bytes())
            .collect();
        Self {
            written: Vec::new(),
            replies,
        }
    }

    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.written).to_string()
    }

    pub fn written_lines(&self) -> Vec<String> {
        self.written().lines().map(str::to_string).collect()
    }
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut count = 0;
        while count < buf.len() {
            match self.replies.pop_front() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Everything the spies and the recording delay observed, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Drive {
        amplitude: f64,
        frequency: f64,
        offset: f64,
    },
    Mode(AcquisitionMode),
    AveragingCount(u32),
    Gain(Channel, f64),
    Offset(Channel, f64),
    Timebase(f64),
    MeasurePeakToPeak(Channel),
    MeasureAverage(Channel),
    AutoRange,
    Close,
    Wait(Duration),
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;

pub struct SpySource {
    log: EventLog,
    drives: usize,
    stop_after_drives: Option<(usize, StopHandle)>,
}

impl SpySource {
    /// Request a stop while driving the `drives`-th frequency.
    pub fn stop_after(mut self, drives: usize, handle: StopHandle) -> Self {
        self.stop_after_drives = Some((drives, handle));
        self
    }
}

impl SignalSource for SpySource {
    fn drive_sinusoid(
        &mut self,
        amplitude: f64,
        frequency: f64,
        offset: f64,
    ) -> Result<(), InstrumentError> {
        self.log.borrow_mut().push(Event::Drive {
            amplitude,
            frequency,
            offset,
        });
        self.drives += 1;
        if let Some((drives, handle)) = &self.stop_after_drives {
            if self.drives == *drives {
                handle.stop();
            }
        }
        Ok(())
    }
}

pub struct SpyScope {
    log: EventLog,
    peak_to_peak: VecDeque<f64>,
    default_peak_to_peak: f64,
    average: f64,
    stop_on_setup: Option<StopHandle>,
    fail_measurements: bool,
}

impl SpyScope {
    /// Peak-to-peak readings to return, in order, before falling back to the default.
    pub fn with_readings(mut self, readings: &[f64]) -> Self {
        self.peak_to_peak = readings.iter().copied().collect();
        self
    }

    pub fn with_default_reading(mut self, peak_to_peak: f64, average: f64) -> Self {
        self.default_peak_to_peak = peak_to_peak;
        self.average = average;
        self
    }

    /// Request a stop when the initial vertical offset is applied.
    pub fn stop_on_setup(mut self, handle: StopHandle) -> Self {
        self.stop_on_setup = Some(handle);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_measurements = true;
        self
    }

    fn record(&self, event: Event) {
        self.log.borrow_mut().push(event);
    }
}

impl Oscilloscope for SpyScope {
    fn set_acquisition_mode(&mut self, mode: AcquisitionMode) -> Result<(), InstrumentError> {
        self.record(Event::Mode(mode));
        Ok(())
    }

    fn set_averaging_count(&mut self, count: u32) -> Result<(), InstrumentError> {
        self.record(Event::AveragingCount(count));
        Ok(())
    }

    fn set_channel_vertical_gain(
        &mut self,
        channel: Channel,
        volts: f64,
    ) -> Result<(), InstrumentError> {
        self.record(Event::Gain(channel, volts));
        Ok(())
    }

    fn set_channel_vertical_offset(
        &mut self,
        channel: Channel,
        volts: f64,
    ) -> Result<(), InstrumentError> {
        self.record(Event::Offset(channel, volts));
        if let Some(handle) = self.stop_on_setup.take() {
            handle.stop();
        }
        Ok(())
    }

    fn set_timebase(&mut self, seconds: f64) -> Result<(), InstrumentError> {
        self.record(Event::Timebase(seconds));
        Ok(())
    }

    fn measure_peak_to_peak(&mut self, channel: Channel) -> Result<f64, InstrumentError> {
        self.record(Event::MeasurePeakToPeak(channel));
        if self.fail_measurements {
            return Err(InstrumentError::InvalidResponse {
                command: "VPP?".to_string(),
                response: String::new(),
            });
        }
        Ok(self
            .peak_to_peak
            .pop_front()
            .unwrap_or(self.default_peak_to_peak))
    }

    fn measure_average(&mut self, channel: Channel) -> Result<f64, InstrumentError> {
        self.record(Event::MeasureAverage(channel));
        Ok(self.average)
    }

    fn auto_range(&mut self) -> Result<(), InstrumentError> {
        self.record(Event::AutoRange);
        Ok(())
    }

    fn close(&mut self) -> Result<(), InstrumentError> {
        self.record(Event::Close);
        Ok(())
    }
}

pub struct RecordingDelay {
    log: EventLog,
}

impl Delay for RecordingDelay {
    fn wait(&mut self, duration: Duration) {
        self.log.borrow_mut().push(Event::Wait(duration));
    }
}

/// Spy instruments and a recording delay writing to one shared log.
pub fn bench() -> (SpySource, SpyScope, RecordingDelay, EventLog) {
    let log = EventLog::default();
    let source = SpySource {
        log: Rc::clone(&log),
        drives: 0,
        stop_after_drives: None,
    };
    let scope = SpyScope {
        log: Rc::clone(&log),
        peak_to_peak: VecDeque::new(),
        default_peak_to_peak: 1.0,
        average: 0.0,
        stop_on_setup: None,
        fail_measurements: false,
    };
    let delay = RecordingDelay {
        log: Rc::clone(&log),
    };
    (source, scope, delay, log)
}

pub fn handles(source: SpySource, scope: SpyScope) -> InstrumentHandles<SpySource, SpyScope> {
    InstrumentHandles::new(source, scope)
}

pub fn count(log: &EventLog, predicate: impl Fn(&Event) -> bool) -> usize {
    log.borrow().iter().filter(|event| predicate(event)).count()
}

/// Operator that confirms every instruction and answers the filename prompt with `filename`.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    pub filename: String,
    pub acknowledged: Vec<String>,
    pub notes: Vec<String>,
}

impl Operator for ScriptedOperator {
    fn acknowledge(&mut self, instruction: &str) -> io::Result<()> {
        self.acknowledged.push(instruction.to_string());
        Ok(())
    }

    fn choose_output_path(&mut self, default: &Path) -> io::Result<PathBuf> {
        if self.filename.trim().is_empty() {
            Ok(default.to_path_buf())
        } else {
            Ok(PathBuf::from(self.filename.trim()))
        }
    }

    fn notify(&mut self, message: &str) {
        self.notes.push(message.to_string());
    }
}

/// Unique path in the system temp directory.
pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("sweep_rs_{}_{}", std::process::id(), name))
}
