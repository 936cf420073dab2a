//! Assertion failures and comparison helpers used by predicates

use serde::{Deserialize, Serialize};

/// Failure produced when a predicate does not hold.
///
/// `tick` is stamped by the runner when the predicate is evaluated;
/// predicates build failures with [`AssertionFailure::new`] and leave it at 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionFailure {
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub tick: u64,
}

impl AssertionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            expected: None,
            actual: None,
            tick: 0,
        }
    }

    /// Failure with expected/actual detail
    pub fn mismatch(
        message: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            expected: Some(expected.into()),
            actual: Some(actual.into()),
            tick: 0,
        }
    }

    pub fn at_tick(mut self, tick: u64) -> Self {
        self.tick = tick;
        self
    }

    /// One-line reason including expected/actual when present
    pub fn reason(&self) -> String {
        match (&self.expected, &self.actual) {
            (Some(expected), Some(actual)) => {
                format!("{} (expected {}, actual {})", self.message, expected, actual)
            }
            _ => self.message.clone(),
        }
    }
}

impl std::fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(expected) = &self.expected {
            write!(f, "\n    Expected: {}", expected)?;
        }
        if let Some(actual) = &self.actual {
            write!(f, "\n    Actual: {}", actual)?;
        }
        Ok(())
    }
}

impl std::error::Error for AssertionFailure {}

/// Comparison operator in a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

/// Tolerance for float equality checks
pub const FLOAT_TOLERANCE: f32 = 0.1;

impl Comparison {
    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "!=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
        }
    }

    /// Parse an operator token (`==` is accepted as `=`)
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "=" | "==" => Some(Comparison::Eq),
            "!=" => Some(Comparison::Ne),
            ">" => Some(Comparison::Gt),
            ">=" => Some(Comparison::Ge),
            "<" => Some(Comparison::Lt),
            "<=" => Some(Comparison::Le),
            _ => None,
        }
    }

    pub fn holds_f32(self, actual: f32, expected: f32) -> bool {
        match self {
            Comparison::Eq => (actual - expected).abs() < FLOAT_TOLERANCE,
            Comparison::Ne => (actual - expected).abs() >= FLOAT_TOLERANCE,
            Comparison::Gt => actual > expected,
            Comparison::Ge => actual >= expected,
            Comparison::Lt => actual < expected,
            Comparison::Le => actual <= expected,
        }
    }

    pub fn holds_u64(self, actual: u64, expected: u64) -> bool {
        match self {
            Comparison::Eq => actual == expected,
            Comparison::Ne => actual != expected,
            Comparison::Gt => actual > expected,
            Comparison::Ge => actual >= expected,
            Comparison::Lt => actual < expected,
            Comparison::Le => actual <= expected,
        }
    }
}

impl std::fmt::Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Compare a float reading against an expected value
pub fn check_f32(
    path: &str,
    actual: f32,
    op: Comparison,
    expected: f32,
) -> Result<(), AssertionFailure> {
    if op.holds_f32(actual, expected) {
        return Ok(());
    }
    Err(AssertionFailure::mismatch(
        format!("Check failed: {} {} {}", path, op, expected),
        format!("{} {} {}", path, op, expected),
        format!("{:.1}", actual),
    ))
}

/// Compare a count reading against an expected value
pub fn check_u64(
    path: &str,
    actual: u64,
    op: Comparison,
    expected: u64,
) -> Result<(), AssertionFailure> {
    if op.holds_u64(actual, expected) {
        return Ok(());
    }
    Err(AssertionFailure::mismatch(
        format!("Check failed: {} {} {}", path, op, expected),
        format!("{} {} {}", path, op, expected),
        actual.to_string(),
    ))
}

/// Compare a flag; only `=` and `!=` are meaningful
pub fn check_bool(
    path: &str,
    actual: bool,
    op: Comparison,
    expected: bool,
) -> Result<(), AssertionFailure> {
    let pass = match op {
        Comparison::Ne => actual != expected,
        _ => actual == expected,
    };
    if pass {
        return Ok(());
    }
    Err(AssertionFailure::mismatch(
        format!("Check failed: {} {} {}", path, op, expected),
        expected.to_string(),
        actual.to_string(),
    ))
}
