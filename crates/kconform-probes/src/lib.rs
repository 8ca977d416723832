//! # kconform-probes
//!
//! The kernel facility probes and a by-name registry.
//!
//! - [`PageRemapProbe`] (`"remap"`) - page remap ordering
//! - [`SyscallDispatchProbe`] (`"usersyscall"`) - syscall user dispatch
//!
//! Both are Linux-only; elsewhere the registry is empty.

use kconform_core::{ConfigError, Probe, RunConfig};

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        pub mod remap;
        pub mod usersyscall;

        pub use remap::PageRemapProbe;
        pub use usersyscall::SyscallDispatchProbe;

        /// Every probe this build knows, in run order.
        pub const PROBE_NAMES: &[&str] = &[PageRemapProbe::NAME, SyscallDispatchProbe::NAME];

        /// Build the probe called `name`.
        pub fn find_probe(name: &str, cfg: &RunConfig) -> Option<Box<dyn Probe>> {
            match name {
                PageRemapProbe::NAME => Some(Box::new(PageRemapProbe::from_config(cfg))),
                SyscallDispatchProbe::NAME => Some(Box::new(SyscallDispatchProbe::new())),
                _ => None,
            }
        }
    } else {
        pub const PROBE_NAMES: &[&str] = &[];

        pub fn find_probe(_name: &str, _cfg: &RunConfig) -> Option<Box<dyn Probe>> {
            None
        }
    }
}

/// The probes `cfg` selects, in run order.
///
/// An empty selection means all; an unknown name is an error.
pub fn all_probes(cfg: &RunConfig) -> Result<Vec<Box<dyn Probe>>, ConfigError> {
    if let Some(unknown) = cfg.probes.iter().find(|n| !PROBE_NAMES.contains(&n.as_str())) {
        return Err(ConfigError::UnknownProbe(unknown.clone()));
    }
    Ok(PROBE_NAMES
        .iter()
        .filter(|name| cfg.selects(name))
        .filter_map(|name| find_probe(name, cfg))
        .collect())
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn registry_names() {
        let cfg = RunConfig::new();
        assert_eq!(find_probe("remap", &cfg).map(|p| p.name()), Some("remap"));
        assert_eq!(find_probe("usersyscall", &cfg).map(|p| p.name()), Some("usersyscall"));
        assert!(find_probe("atomic", &cfg).is_none());
    }

    #[test]
    fn empty_selection_runs_all() {
        let names: Vec<_> = all_probes(&RunConfig::new()).unwrap().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["remap", "usersyscall"]);
    }

    #[test]
    fn selection_filters_and_validates() {
        let cfg = RunConfig::new().probes(["usersyscall"]);
        let names: Vec<_> = all_probes(&cfg).unwrap().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["usersyscall"]);

        let cfg = RunConfig::new().probes(["remap", "bogus"]);
        assert!(matches!(all_probes(&cfg), Err(ConfigError::UnknownProbe(n)) if n == "bogus"));
    }
}
