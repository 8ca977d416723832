//! Environment variable utilities
//!
//! Generic `env_get<T>` for parsing `KCONFORM_*` variables with defaults.
//!
//! ```ignore
//! use kconform_core::env::{env_get, env_get_bool};
//!
//! let ops: u64 = env_get("KCONFORM_OPS", 0);
//! let flush = env_get_bool("KCONFORM_FLUSH_EPRINT", false);
//! ```

use std::str::FromStr;

/// Get environment variable parsed as `T`, or `default` when unset or unparsable.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as boolean.
///
/// "1", "true", "yes", "on" (case-insensitive) are true; any other set
/// value is false; unset returns `default`.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// `Some(T)` if the variable is set and parses, `None` otherwise.
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Comma-separated list; empty items are dropped. Unset yields an empty vec.
pub fn env_get_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_get_default() {
        let val: u64 = env_get("__KCONFORM_TEST_UNSET__", 42);
        assert_eq!(val, 42);
    }

    #[test]
    fn test_env_get_opt_none() {
        let val: Option<usize> = env_get_opt("__KCONFORM_TEST_UNSET__");
        assert!(val.is_none());
    }

    #[test]
    fn test_env_get_with_set_var() {
        std::env::set_var("__KCONFORM_TEST_NUM__", " 123 ");
        let val: usize = env_get("__KCONFORM_TEST_NUM__", 0);
        assert_eq!(val, 123);
        std::env::remove_var("__KCONFORM_TEST_NUM__");
    }

    #[test]
    fn test_env_get_invalid_parse() {
        std::env::set_var("__KCONFORM_TEST_INVALID__", "lots");
        let val: usize = env_get("__KCONFORM_TEST_INVALID__", 99);
        assert_eq!(val, 99);
        std::env::remove_var("__KCONFORM_TEST_INVALID__");
    }

    #[test]
    fn test_env_get_bool_variants() {
        let key = "__KCONFORM_TEST_BOOL__";
        for v in ["1", "true", "TRUE", "yes", "on"] {
            std::env::set_var(key, v);
            assert!(env_get_bool(key, false), "{v} should be true");
        }
        for v in ["0", "false", "garbage"] {
            std::env::set_var(key, v);
            assert!(!env_get_bool(key, true), "{v} should be false");
        }
        std::env::remove_var(key);
        assert!(env_get_bool(key, true));
    }

    #[test]
    fn test_env_get_list() {
        let key = "__KCONFORM_TEST_LIST__";
        std::env::set_var(key, "remap, usersyscall,,");
        assert_eq!(env_get_list(key), vec!["remap".to_string(), "usersyscall".to_string()]);
        std::env::remove_var(key);
        assert!(env_get_list(key).is_empty());
    }
}
