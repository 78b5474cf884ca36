use crate::sweep_parameters::{ParameterError, Spacing, SweepParameters};

/// Largest axis `generate` will build.
pub const MAX_POINTS: usize = 1_000_000;

/// Strictly increasing sequence of sweep frequencies in Hz.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyAxis {
    frequencies: Vec<f64>,
}

impl FrequencyAxis {
    /// Build the axis described by a sweep request.
    pub fn from_parameters(params: &SweepParameters) -> Result<Self, ParameterError> {
        generate(params.fstart, params.fend, params.nsteps, params.inc, params.ltype)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.frequencies.iter()
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.frequencies
    }
}

impl<'a> IntoIterator for &'a FrequencyAxis {
    type Item = &'a f64;
    type IntoIter = std::slice::Iter<'a, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Generate the frequency axis of a sweep.
///
/// Without `inc`, `nsteps` points are spread evenly (in log10 for [`Spacing::Log`])
/// between `fstart` and `fend`, both included.
///
/// With `inc`, the point count is `1 + floor(span / inc)` (span and step measured in
/// logarithms for log spacing) and the points are spread over `[fstart, fend + inc)`
/// with the upper end excluded. Unless the span is a whole number of steps, the
/// spacing between points differs from `inc` and `fend` itself is not on the axis.
pub fn generate(
    fstart: f64,
    fend: f64,
    nsteps: Option<usize>,
    inc: Option<f64>,
    ltype: Option<Spacing>,
) -> Result<FrequencyAxis, ParameterError> {
    if !(fstart.is_finite() && fstart > 0.0) {
        return Err(ParameterError::NonPositiveStart { fstart });
    }
    if !(fend.is_finite() && fend > fstart) {
        return Err(ParameterError::EmptySpan { fstart, fend });
    }

    let spacing = ltype.unwrap_or_default();
    let frequencies = match (spacing, inc) {
        (Spacing::Log, None) => {
            let nsteps = required_points(nsteps)?;
            logspace(fstart.log10(), fend.log10(), nsteps, true)
        }
        (Spacing::Log, Some(ratio)) => {
            if !(ratio.is_finite() && ratio > 1.0) {
                return Err(ParameterError::InvalidIncrement { inc: ratio, spacing });
            }
            let nsteps = stepped_points((fend / fstart).ln() / ratio.ln())?;
            logspace(fstart.log10(), (fend * ratio).log10(), nsteps, false)
        }
        (Spacing::Linear, None) => {
            let nsteps = required_points(nsteps)?;
            linspace(fstart, fend, nsteps, true)
        }
        (Spacing::Linear, Some(step)) => {
            if !(step.is_finite() && step > 0.0) {
                return Err(ParameterError::InvalidIncrement { inc: step, spacing });
            }
            let nsteps = stepped_points((fend - fstart) / step)?;
            linspace(fstart, fend + step, nsteps, false)
        }
    };

    log::debug!(
        "Generated {} {} spaced frequencies from {} Hz to {:?} Hz",
        frequencies.len(),
        spacing,
        fstart,
        frequencies.last()
    );

    Ok(FrequencyAxis { frequencies })
}

fn required_points(nsteps: Option<usize>) -> Result<usize, ParameterError> {
    match nsteps {
        Some(n) if n > MAX_POINTS => Err(ParameterError::TooManyPoints {
            points: n as f64,
            max: MAX_POINTS,
        }),
        Some(n) if n > 0 => Ok(n),
        _ => Err(ParameterError::MissingPointCount),
    }
}

/// `1 + floor(steps)`, bounded by [`MAX_POINTS`].
fn stepped_points(steps: f64) -> Result<usize, ParameterError> {
    let points = steps.floor() + 1.0;
    if !points.is_finite() || points > MAX_POINTS as f64 {
        return Err(ParameterError::TooManyPoints {
            points,
            max: MAX_POINTS,
        });
    }

    (steps.floor() as usize)
        .checked_add(1)
        .ok_or(ParameterError::TooManyPoints {
            points,
            max: MAX_POINTS,
        })
}

fn linspace(start: f64, stop: f64, num: usize, endpoint: bool) -> Vec<f64> {
    let div = if endpoint { num.saturating_sub(1) } else { num };
    if div == 0 {
        return vec![start; num.min(1)];
    }

    let step = (stop - start) / div as f64;
    let mut values: Vec<f64> = (0..num).map(|i| (i as f64).mul_add(step, start)).collect();
    if endpoint {
        if let Some(last) = values.last_mut() {
            *last = stop;
        }
    }
    values
}

fn logspace(start: f64, stop: f64, num: usize, endpoint: bool) -> Vec<f64> {
    linspace(start, stop, num, endpoint)
        .into_iter()
        .map(|exponent| 10f64.powf(exponent))
        .collect()
}
