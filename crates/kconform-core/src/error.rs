//! Error types for kconform-core

use core::fmt;

/// Invalid run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Neither an op bound nor a timeout was given
    Unbounded,

    /// Page-set size outside 1..=65536
    PageCount(usize),

    /// A requested probe name is not registered
    UnknownProbe(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Unbounded => write!(f, "run needs an op bound or a timeout"),
            ConfigError::PageCount(n) => {
                write!(f, "remap page count {} out of range (1..={})", n, crate::order::MAX_PAGES)
            }
            ConfigError::UnknownProbe(name) => write!(f, "unknown probe '{}'", name),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Failure to read or parse a memory-region table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapsError {
    /// The table could not be read (OS errno)
    Read(i32),

    /// No region matched the library image
    NotFound,
}

impl fmt::Display for MapsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapsError::Read(errno) => write!(
                f,
                "cannot read memory map: errno={} ({})",
                errno,
                std::io::Error::from_raw_os_error(*errno)
            ),
            MapsError::NotFound => write!(f, "no executable C library mapping found"),
        }
    }
}

impl std::error::Error for MapsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(ConfigError::Unbounded.to_string(), "run needs an op bound or a timeout");
        assert_eq!(
            ConfigError::PageCount(0).to_string(),
            "remap page count 0 out of range (1..=65536)"
        );
        assert_eq!(
            ConfigError::UnknownProbe("mmap".into()).to_string(),
            "unknown probe 'mmap'"
        );
        assert!(MapsError::Read(2).to_string().starts_with("cannot read memory map: errno=2 ("));
    }
}
