//! Errors raised by the simulation kernels.

/// Kernel and simulation errors.
///
/// Every kernel validates its inputs before touching them, so an error means
/// no output was produced. [`SimError::Step`] wraps a kernel error with the
/// step at which a simulation run aborted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    #[error("shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: String,
        actual: String,
    },
    #[error("invalid {what}: {reason}")]
    InvalidParameter { what: String, reason: String },
    #[error("numeric overflow in {what}: {value} is outside the representable count range")]
    NumericOverflow { what: String, value: f64 },
    #[error("step {step}: {source}")]
    Step {
        step: usize,
        #[source]
        source: Box<SimError>,
    },
}

impl SimError {
    pub(crate) fn shape(
        what: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub(crate) fn invalid(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Attach the step index at which this error occurred.
    pub fn at_step(self, step: usize) -> Self {
        match self {
            already @ Self::Step { .. } => already,
            other => Self::Step {
                step,
                source: Box::new(other),
            },
        }
    }

    /// Step index, if the error came out of a simulation step.
    pub fn step(&self) -> Option<usize> {
        match self {
            Self::Step { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Reject non-finite or negative entries.
pub(crate) fn check_non_negative(what: &str, values: &[f64]) -> Result<(), SimError> {
    for (i, &v) in values.iter().enumerate() {
        if !v.is_finite() {
            return Err(SimError::invalid(what, format!("entry {i} is not finite ({v})")));
        }
        if v < 0.0 {
            return Err(SimError::invalid(what, format!("entry {i} is negative ({v})")));
        }
    }
    Ok(())
}

/// Reject non-finite entries.
pub(crate) fn check_finite(what: &str, values: &[f64]) -> Result<(), SimError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(i) => Err(SimError::invalid(
            what,
            format!("entry {i} is not finite ({})", values[i]),
        )),
        None => Ok(()),
    }
}
