//! kconform - kernel facility conformance runner
//!
//! Runs the selected probes one after another and prints a summary.
//!
//! Configuration is read from the environment:
//!   KCONFORM_PROBES=remap,usersyscall   probes to run (default: all)
//!   KCONFORM_OPS=N                      bogo-op bound per probe (0 = none)
//!   KCONFORM_TIMEOUT_SECS=N             wall-clock bound per probe (0 = none)
//!   KCONFORM_REMAP_PAGES=N              remap page-set size
//!   KCONFORM_SEED=N                     seed for the random remap order
//!   KCONFORM_LOG_LEVEL=info             off|error|warn|info|debug|trace
//!
//! Exit status: 0 success, 1 failure, 3 no resource, 4 not implemented.

use kconform_core::harness::{exit_code, run_probe, Report};
use kconform_core::{kerror, kinfo, kprint, Outcome, RunConfig};

const LINE: &str = "────────────────────────────────────────────────────────────";

fn print_report(r: &Report) {
    let status = match &r.outcome {
        Outcome::Success => "PASS".to_string(),
        Outcome::Skip(s) => format!("SKIP ({})", s),
        Outcome::Failure(f) => format!("FAIL: {}", f),
    };
    println!("  {:<14} {}", r.name, status);
    println!(
        "  {:<14} ops={} failures={} elapsed={:.3}s",
        "",
        r.ops,
        r.failures,
        r.elapsed.as_secs_f64()
    );
    for m in &r.metrics {
        println!("  {:<14} {:>14.2} {}", "", m.value, m.name);
    }
}

fn main() {
    kprint::init();

    let cfg = RunConfig::from_env();
    if let Err(e) = cfg.validate() {
        kerror!("kconform: {}", e);
        std::process::exit(1);
    }
    let mut probes = match kconform_probes::all_probes(&cfg) {
        Ok(p) => p,
        Err(e) => {
            kerror!("kconform: {} (known: {})", e, kconform_probes::PROBE_NAMES.join(", "));
            std::process::exit(1);
        }
    };

    kinfo!(
        "kconform: {} probe(s), ops={} timeout={:?} remap_pages={}",
        probes.len(),
        cfg.max_ops,
        cfg.timeout,
        cfg.remap_pages
    );

    let reports: Vec<Report> = probes
        .iter_mut()
        .map(|p| run_probe(p.as_mut(), &cfg))
        .collect();

    println!("{}", LINE);
    println!("  kconform results");
    println!("{}", LINE);
    for r in &reports {
        print_report(r);
    }
    let passed = reports.iter().filter(|r| r.outcome.is_success()).count();
    let skipped = reports.iter().filter(|r| r.outcome.is_skip()).count();
    let failed = reports.iter().filter(|r| r.outcome.is_failure()).count();
    println!("{}", LINE);
    println!("  Total: {}  Passed: {}  Skipped: {}  Failed: {}", reports.len(), passed, skipped, failed);
    println!("{}", LINE);

    std::process::exit(exit_code(&reports));
}
