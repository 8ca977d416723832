//! Run configuration

use crate::env::{env_get, env_get_list, env_get_opt};
use crate::error::ConfigError;
use crate::order::{DEFAULT_PAGES, MAX_PAGES};
use std::time::Duration;

/// Configuration shared by every probe in one run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Bogo-op bound per probe (0 = unbounded)
    pub max_ops: u64,

    /// Wall-clock bound per probe (None = unbounded)
    pub timeout: Option<Duration>,

    /// Probes to run, by name (empty = all)
    pub probes: Vec<String>,

    /// Page-set size for the remap probe
    pub remap_pages: usize,

    /// Seed for the random ordering phase (None = from entropy)
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_ops: 0,
            timeout: Some(Duration::from_secs(5)),
            probes: Vec::new(),
            remap_pages: DEFAULT_PAGES,
            seed: None,
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `KCONFORM_*` environment variables over the defaults.
    ///
    /// `KCONFORM_TIMEOUT_SECS=0` removes the wall-clock bound.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let timeout_secs: u64 = env_get(
            "KCONFORM_TIMEOUT_SECS",
            defaults.timeout.map(|d| d.as_secs()).unwrap_or(0),
        );
        Self {
            max_ops: env_get("KCONFORM_OPS", defaults.max_ops),
            timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            probes: env_get_list("KCONFORM_PROBES"),
            remap_pages: env_get("KCONFORM_REMAP_PAGES", defaults.remap_pages),
            seed: env_get_opt("KCONFORM_SEED"),
        }
    }

    pub fn max_ops(mut self, n: u64) -> Self {
        self.max_ops = n;
        self
    }

    pub fn timeout(mut self, d: Option<Duration>) -> Self {
        self.timeout = d;
        self
    }

    pub fn probes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.probes = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn remap_pages(mut self, n: usize) -> Self {
        self.remap_pages = n;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// True when `name` was selected (an empty selection selects everything).
    pub fn selects(&self, name: &str) -> bool {
        self.probes.is_empty() || self.probes.iter().any(|p| p == name)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_ops == 0 && self.timeout.is_none() {
            return Err(ConfigError::Unbounded);
        }
        if self.remap_pages == 0 || self.remap_pages > MAX_PAGES {
            return Err(ConfigError::PageCount(self.remap_pages));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.remap_pages, 512);
        assert!(cfg.validate().is_ok());
        assert!(cfg.selects("remap"));
        assert!(cfg.selects("usersyscall"));
    }

    #[test]
    fn test_unbounded_rejected() {
        let cfg = RunConfig::new().timeout(None).max_ops(0);
        assert_eq!(cfg.validate(), Err(ConfigError::Unbounded));
        assert!(cfg.max_ops(10).validate().is_ok());
    }

    #[test]
    fn test_page_count_bounds() {
        assert_eq!(
            RunConfig::new().remap_pages(0).validate(),
            Err(ConfigError::PageCount(0))
        );
        assert_eq!(
            RunConfig::new().remap_pages(MAX_PAGES + 1).validate(),
            Err(ConfigError::PageCount(MAX_PAGES + 1))
        );
        assert!(RunConfig::new().remap_pages(MAX_PAGES).validate().is_ok());
    }

    #[test]
    fn test_probe_selection() {
        let cfg = RunConfig::new().probes(["remap"]);
        assert!(cfg.selects("remap"));
        assert!(!cfg.selects("usersyscall"));
    }
}
