// src/generation/error.rs

use std::{fmt, sync::LazyLock};

use regex::Regex;

static SCHEMA_REJECTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)too many states for serving").expect("static regex"));
static OVERLOADED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b503\b|overloaded|service unavailable").expect("static regex")
});
static QUOTA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b429\b|quota|too many requests").expect("static regex"));

/// A single broken rule in an AI payload, e.g.
/// `subjects[2].questions[4].en.options: expected 4 options, found 3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Why a question generation request failed.
#[derive(Debug, Clone)]
pub enum GenerationError {
    /// Missing credential or unusable client settings. Never retried.
    Configuration(String),
    /// The backend was overloaded on every attempt.
    Overloaded(String),
    /// 429 / quota exhaustion. Never retried.
    QuotaExceeded(String),
    /// Any other backend failure. Never retried.
    Backend(String),
    /// The completion was empty or not JSON.
    Parse(String),
    /// Well-formed JSON that breaks the payload contract.
    Validation(Vec<Violation>),
}

impl GenerationError {
    pub fn is_quota(&self) -> bool {
        matches!(self, GenerationError::QuotaExceeded(_))
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::Configuration(msg) => write!(f, "configuration error: {}", msg),
            GenerationError::Overloaded(msg) => write!(f, "backend overloaded: {}", msg),
            GenerationError::QuotaExceeded(msg) => write!(f, "backend quota exceeded: {}", msg),
            GenerationError::Backend(msg) => write!(f, "backend error: {}", msg),
            GenerationError::Parse(msg) => write!(f, "Failed to parse JSON response: {}", msg),
            GenerationError::Validation(violations) => write!(
                f,
                "Invalid response structure: {} violation(s)",
                violations.len()
            ),
        }
    }
}

impl std::error::Error for GenerationError {}

/// Coarse class of a backend failure, derived from status and message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The backend refused the response schema as too complex.
    SchemaRejected,
    Overloaded,
    QuotaExceeded,
    Other,
}

/// A failed call to the generative backend.
#[derive(Debug, Clone)]
pub struct BackendFailure {
    /// HTTP status, when the failure came with one.
    pub status: Option<u16>,
    pub message: String,
}

impl BackendFailure {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        if SCHEMA_REJECTED.is_match(&self.message) {
            return FailureKind::SchemaRejected;
        }
        match self.status {
            Some(503) => return FailureKind::Overloaded,
            Some(429) => return FailureKind::QuotaExceeded,
            _ => {}
        }
        if OVERLOADED.is_match(&self.message) {
            FailureKind::Overloaded
        } else if QUOTA.is_match(&self.message) {
            FailureKind::QuotaExceeded
        } else {
            FailureKind::Other
        }
    }
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<BackendFailure> for GenerationError {
    fn from(failure: BackendFailure) -> Self {
        match failure.kind() {
            FailureKind::Overloaded => GenerationError::Overloaded(failure.message),
            FailureKind::QuotaExceeded => GenerationError::QuotaExceeded(failure.message),
            FailureKind::SchemaRejected | FailureKind::Other => {
                GenerationError::Backend(failure.message)
            }
        }
    }
}
