//! Probe contract and the bounded harness that drives it.
//!
//! A [`Probe`] exercises one kernel facility. The [`Harness`] it runs
//! under owns everything outside the probe's core: the iteration bound,
//! the bogo-op counter, the metrics sink and the failure sink.
//!
//! ```text
//!   run_probe(probe, cfg)
//!     |-- probe.supported()      Err(Skip) -> Report { Skip }
//!     |-- probe.run(&mut harness)
//!     |     loop { ...; h.inc_counter() } while h.keep_running()
//!     '-- Success + reported failures -> Failure
//! ```

use crate::config::RunConfig;
use crate::outcome::{Outcome, ProbeState, Skip};
use crate::{kdebug, kerror, kinfo};
use std::fmt;
use std::time::{Duration, Instant};

/// Sink and bound supplied to a running probe.
pub trait Harness {
    /// Name of the probe being driven (prefix for diagnostics).
    fn name(&self) -> &str;

    /// Whether another iteration may start. Consulted between iterations.
    fn keep_running(&self) -> bool;

    /// Count one completed bogo-op.
    fn inc_counter(&mut self);

    fn counter(&self) -> u64;

    /// Record a named metric; a later value replaces an earlier one.
    fn set_metric(&mut self, name: &'static str, value: f64);

    fn set_state(&mut self, state: ProbeState);

    /// Informational message.
    fn info(&mut self, msg: fmt::Arguments<'_>);

    /// Verification failure. The probe keeps running; the run is failed.
    fn fail(&mut self, msg: fmt::Arguments<'_>);
}

/// One kernel facility probe.
pub trait Probe {
    fn name(&self) -> &'static str;

    /// Capability check; `Err` skips the probe without running it.
    fn supported(&mut self) -> Result<(), Skip>;

    /// Setup, bounded run loop and teardown.
    fn run(&mut self, h: &mut dyn Harness) -> Outcome;
}

/// Report a verification failure through a harness.
#[macro_export]
macro_rules! probe_fail {
    ($h:expr, $($arg:tt)*) => {{
        $crate::harness::Harness::fail($h, format_args!($($arg)*));
    }};
}

/// Report an informational message through a harness.
#[macro_export]
macro_rules! probe_info {
    ($h:expr, $($arg:tt)*) => {{
        $crate::harness::Harness::info($h, format_args!($($arg)*));
    }};
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: &'static str,
    pub value: f64,
}

/// Harness bounded by an op count and/or a deadline.
#[derive(Debug)]
pub struct BoundedHarness {
    name: &'static str,
    max_ops: u64,
    deadline: Option<Instant>,
    counter: u64,
    failures: u64,
    metrics: Vec<Metric>,
    state: ProbeState,
}

impl BoundedHarness {
    /// `max_ops == 0` means no op bound; `timeout == None` means no deadline.
    pub fn new(name: &'static str, max_ops: u64, timeout: Option<Duration>) -> Self {
        Self {
            name,
            max_ops,
            deadline: timeout.map(|t| Instant::now() + t),
            counter: 0,
            failures: 0,
            metrics: Vec::new(),
            state: ProbeState::Init,
        }
    }

    #[inline]
    pub fn failures(&self) -> u64 {
        self.failures
    }

    #[inline]
    pub fn state(&self) -> ProbeState {
        self.state
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.iter().find(|m| m.name == name).map(|m| m.value)
    }
}

impl Harness for BoundedHarness {
    fn name(&self) -> &str {
        self.name
    }

    fn keep_running(&self) -> bool {
        if self.max_ops != 0 && self.counter >= self.max_ops {
            return false;
        }
        self.deadline.map_or(true, |d| Instant::now() < d)
    }

    #[inline]
    fn inc_counter(&mut self) {
        self.counter += 1;
    }

    #[inline]
    fn counter(&self) -> u64 {
        self.counter
    }

    fn set_metric(&mut self, name: &'static str, value: f64) {
        match self.metrics.iter_mut().find(|m| m.name == name) {
            Some(m) => m.value = value,
            None => self.metrics.push(Metric { name, value }),
        }
    }

    fn set_state(&mut self, state: ProbeState) {
        kdebug!("{}: state {} -> {}", self.name, self.state.name(), state.name());
        self.state = state;
    }

    fn info(&mut self, msg: fmt::Arguments<'_>) {
        kinfo!("{}: {}", self.name, msg);
    }

    fn fail(&mut self, msg: fmt::Arguments<'_>) {
        self.failures += 1;
        kerror!("{}: {}", self.name, msg);
    }
}

/// Result of driving one probe.
#[derive(Debug, Clone)]
pub struct Report {
    pub name: &'static str,
    pub outcome: Outcome,
    pub ops: u64,
    pub failures: u64,
    pub metrics: Vec<Metric>,
    pub elapsed: Duration,
}

/// Run `probe` to completion under a harness built from `cfg`.
pub fn run_probe(probe: &mut dyn Probe, cfg: &RunConfig) -> Report {
    let name = probe.name();
    let start = Instant::now();

    if let Err(skip) = probe.supported() {
        kinfo!("{}: {}, skipping", name, skip);
        return Report {
            name,
            outcome: Outcome::Skip(skip),
            ops: 0,
            failures: 0,
            metrics: Vec::new(),
            elapsed: start.elapsed(),
        };
    }

    let mut h = BoundedHarness::new(name, cfg.max_ops, cfg.timeout);
    let mut outcome = probe.run(&mut h);
    if outcome.is_success() && h.failures() > 0 {
        outcome = Outcome::Failure(format!("{} verification failure(s)", h.failures()));
    }
    if let Outcome::Skip(skip) = &outcome {
        kinfo!("{}: {}, skipping", name, skip);
    }

    Report {
        name,
        outcome,
        ops: h.counter(),
        failures: h.failures(),
        metrics: h.metrics().to_vec(),
        elapsed: start.elapsed(),
    }
}

/// Aggregate exit status: any failure wins, then success, then skip kinds.
pub fn exit_code(reports: &[Report]) -> i32 {
    if reports.iter().any(|r| r.outcome.is_failure()) {
        return 1;
    }
    if reports.is_empty() || reports.iter().any(|r| r.outcome.is_success()) {
        return 0;
    }
    reports.iter().map(|r| r.outcome.exit_code()).max().unwrap_or(0)
}
