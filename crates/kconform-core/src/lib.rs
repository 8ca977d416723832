//! # kconform-core
//!
//! Core types for kconform, a pair of kernel-facility conformance probes.
//!
//! This crate is platform-agnostic and performs no raw system calls.
//! All kernel plumbing lives in `kconform-sys`; the probes themselves in
//! `kconform-probes`.
//!
//! ## Modules
//!
//! - `harness` - Probe contract, bounded harness, runner and reports
//! - `outcome` - Tagged probe outcomes and lifecycle states
//! - `order` - Page orderings and permutation verification
//! - `rate` - Per-operation latency accumulation
//! - `maps` - Memory-region table parsing, trusted-range discovery
//! - `config` - Run configuration
//! - `error` - Error types
//! - `kprint` - Kernel-style leveled print macros
//! - `env` - Environment variable utilities

pub mod kprint;
pub mod env;
pub mod error;
pub mod config;
pub mod outcome;
pub mod harness;
pub mod order;
pub mod rate;
pub mod maps;

// Re-exports for convenience
pub use config::RunConfig;
pub use error::{ConfigError, MapsError};
pub use harness::{run_probe, BoundedHarness, Harness, Metric, Probe, Report};
pub use maps::TrustedRange;
pub use order::{verify, Mismatch, OrderKind, OrderMapping, PageTag};
pub use outcome::{Outcome, ProbeState, Skip, SkipKind};
pub use rate::RateAccumulator;
