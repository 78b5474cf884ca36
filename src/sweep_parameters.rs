use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterError {
    #[error("Number of samples to average must be a power of 2 between 1 and 256, got {averages}")]
    InvalidAveraging { averages: u32 },

    #[error("Unknown spacing type '{name}', expected 'log' or 'linear'")]
    UnknownSpacing { name: String },

    #[error("Start frequency must be positive, got {fstart} Hz")]
    NonPositiveStart { fstart: f64 },

    #[error("End frequency {fend} Hz must be above start frequency {fstart} Hz")]
    EmptySpan { fstart: f64, fend: f64 },

    #[error("Either a point count or an increment is required")]
    MissingPointCount,

    #[error("Increment {inc} is not valid for {spacing} spacing")]
    InvalidIncrement { inc: f64, spacing: Spacing },

    #[error("Sweep would have {points} points, at most {max} are supported")]
    TooManyPoints { points: f64, max: usize },

    #[error("Dwell must be a finite, non-negative number of seconds, got {dwell}")]
    InvalidDwell { dwell: f64 },
}

/// Frequency spacing of a sweep axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Spacing {
    Log,
    #[default]
    Linear,
}

impl Spacing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Spacing::Log => "log",
            Spacing::Linear => "linear",
        }
    }
}

impl fmt::Display for Spacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Spacing {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(Spacing::Log),
            "linear" => Ok(Spacing::Linear),
            _ => Err(ParameterError::UnknownSpacing {
                name: s.to_string(),
            }),
        }
    }
}

/// Hardware averaging count accepted by the oscilloscope: 1 or a power of two up to 256.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Averages(u32);

impl Averages {
    pub const MAX: u32 = 256;

    pub fn get(&self) -> u32 {
        self.0
    }

    pub fn is_single_shot(&self) -> bool {
        self.0 == 1
    }
}

impl TryFrom<u32> for Averages {
    type Error = ParameterError;

    fn try_from(averages: u32) -> Result<Self, Self::Error> {
        if averages.is_power_of_two() && averages <= Self::MAX {
            Ok(Self(averages))
        } else {
            Err(ParameterError::InvalidAveraging { averages })
        }
    }
}

/// One sweep request.
///
/// `inc` overrides `nsteps` when both are present. For [`Spacing::Log`] it is the
/// ratio between neighbouring frequencies, for [`Spacing::Linear`] the step in Hz.
/// A missing `ltype` means linear spacing.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepParameters {
    pub fstart: f64,
    pub fend: f64,
    pub nsteps: Option<usize>,
    pub inc: Option<f64>,
    pub ltype: Option<Spacing>,
    /// Drive amplitude in volts.
    pub amp: f64,
    /// Drive DC offset in volts.
    pub ofs: f64,
    pub averages: u32,
    /// Settle time scale in seconds.
    pub dwell: f64,
}

impl Default for SweepParameters {
    fn default() -> Self {
        Self {
            fstart: 1e3,
            fend: 6e7,
            nsteps: None,
            inc: Some(10f64.powf(0.1)),
            ltype: Some(Spacing::Log),
            amp: 2.5,
            ofs: 0.0,
            averages: 64,
            dwell: 1.0,
        }
    }
}

impl SweepParameters {
    /// Logarithmic sweep from `fstart` to `fend` with the default ratio of 10^0.1.
    pub fn log(fstart: f64, fend: f64) -> Self {
        Self {
            fstart,
            fend,
            ..Self::default()
        }
    }

    /// Linear sweep from `fstart` to `fend`; set the step or point count next.
    pub fn linear(fstart: f64, fend: f64) -> Self {
        Self {
            fstart,
            fend,
            inc: None,
            ltype: Some(Spacing::Linear),
            ..Self::default()
        }
    }

    pub fn with_ratio(mut self, ratio: f64) -> Self {
        self.ltype = Some(Spacing::Log);
        self.inc = Some(ratio);
        self
    }

    pub fn with_step(mut self, step_hz: f64) -> Self {
        self.ltype = Some(Spacing::Linear);
        self.inc = Some(step_hz);
        self
    }

    /// Fixed number of points, endpoints included. Clears any increment.
    pub fn with_points(mut self, nsteps: usize) -> Self {
        self.nsteps = Some(nsteps);
        self.inc = None;
        self
    }

    pub fn with_amplitude(mut self, amp: f64) -> Self {
        self.amp = amp;
        self
    }

    pub fn with_offset(mut self, ofs: f64) -> Self {
        self.ofs = ofs;
        self
    }

    pub fn with_averages(mut self, averages: u32) -> Self {
        self.averages = averages;
        self
    }

    pub fn with_dwell(mut self, dwell: f64) -> Self {
        self.dwell = dwell;
        self
    }

    pub fn spacing(&self) -> Spacing {
        self.ltype.unwrap_or_default()
    }

    pub(crate) fn validated_averages(&self) -> Result<Averages, ParameterError> {
        Averages::try_from(self.averages)
    }

    pub(crate) fn validated_dwell(&self) -> Result<f64, ParameterError> {
        if self.dwell.is_finite() && self.dwell >= 0.0 {
            Ok(self.dwell)
        } else {
            Err(ParameterError::InvalidDwell { dwell: self.dwell })
        }
    }
}
