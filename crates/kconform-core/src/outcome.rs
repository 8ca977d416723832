//! Probe outcomes and lifecycle states

use std::fmt;

/// Why a probe did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipKind {
    /// Setup could not acquire a resource (mapping, handler slot)
    NoResource,
    /// The kernel facility under test is absent or disabled
    NotImplemented,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skip {
    pub kind: SkipKind,
    pub reason: String,
}

impl Skip {
    pub fn no_resource(reason: impl Into<String>) -> Self {
        Self { kind: SkipKind::NoResource, reason: reason.into() }
    }

    pub fn not_implemented(reason: impl Into<String>) -> Self {
        Self { kind: SkipKind::NotImplemented, reason: reason.into() }
    }
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SkipKind::NoResource => write!(f, "no resource: {}", self.reason),
            SkipKind::NotImplemented => write!(f, "not implemented: {}", self.reason),
        }
    }
}

/// Terminal result of one probe run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Skip(Skip),
    Failure(String),
}

impl Outcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    #[inline]
    pub fn is_skip(&self) -> bool {
        matches!(self, Outcome::Skip(_))
    }

    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    /// Conventional process exit status for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::Failure(_) => 1,
            Outcome::Skip(Skip { kind: SkipKind::NoResource, .. }) => 3,
            Outcome::Skip(Skip { kind: SkipKind::NotImplemented, .. }) => 4,
        }
    }
}

impl From<Skip> for Outcome {
    fn from(skip: Skip) -> Self {
        Outcome::Skip(skip)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "passed"),
            Outcome::Skip(s) => write!(f, "skipped ({})", s),
            Outcome::Failure(detail) => write!(f, "failed: {}", detail),
        }
    }
}

/// Lifecycle markers a probe reports to its harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Init,
    Run,
    Deinit,
}

impl ProbeState {
    pub fn name(&self) -> &'static str {
        match self {
            ProbeState::Init => "init",
            ProbeState::Run => "run",
            ProbeState::Deinit => "deinit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(Outcome::Success.exit_code(), 0);
        assert_eq!(Outcome::Failure("x".into()).exit_code(), 1);
        assert_eq!(Outcome::from(Skip::no_resource("mmap")).exit_code(), 3);
        assert_eq!(Outcome::from(Skip::not_implemented("prctl")).exit_code(), 4);
    }

    #[test]
    fn display() {
        assert_eq!(Outcome::Success.to_string(), "passed");
        assert_eq!(
            Outcome::from(Skip::not_implemented("no remap_file_pages")).to_string(),
            "skipped (not implemented: no remap_file_pages)"
        );
        assert_eq!(Outcome::Failure("bad order".into()).to_string(), "failed: bad order");
    }
}
