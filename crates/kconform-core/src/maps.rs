//! Memory-region table parsing and trusted-range discovery.
//!
//! The table is the textual `/proc/<pid>/maps` format, one region per line:
//!
//! ```text
//! 7f3c1a200000-7f3c1a3b5000 r-xp 00028000 08:01 1835043    /usr/lib/x86_64-linux-gnu/libc.so.6
//! ```
//!
//! The trusted range is the union of the executable C library regions.
//! Syscalls issued from inside it are exempt from range-restricted dispatch.

use crate::error::MapsError;
use std::fmt;

const SELF_MAPS: &str = "/proc/self/maps";

/// One parsed line of the region table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapsEntry<'a> {
    pub begin: usize,
    pub end: usize,
    pub perms: &'a str,
    pub offset: u64,
    pub inode: u64,
    pub path: Option<&'a str>,
}

impl<'a> MapsEntry<'a> {
    /// Parse a single line; malformed lines yield `None`.
    pub fn parse(line: &'a str) -> Option<Self> {
        let line = line.trim_end();
        let mut rest = line;
        let mut field = || -> Option<&'a str> {
            let s = rest.trim_start();
            let end = s.find(char::is_whitespace).unwrap_or(s.len());
            if end == 0 {
                return None;
            }
            let (tok, tail) = s.split_at(end);
            rest = tail;
            Some(tok)
        };

        let range = field()?;
        let perms = field()?;
        let offset = field()?;
        let _dev = field()?;
        let inode = field()?;

        let (begin, end) = range.split_once('-')?;
        let begin = usize::from_str_radix(begin, 16).ok()?;
        let end = usize::from_str_radix(end, 16).ok()?;
        if perms.len() != 4 || end < begin {
            return None;
        }

        let path = rest.trim();
        Some(Self {
            begin,
            end,
            perms,
            offset: u64::from_str_radix(offset, 16).ok()?,
            inode: inode.parse().ok()?,
            path: (!path.is_empty()).then_some(path),
        })
    }

    /// Readable, executable, private: a loaded text segment.
    #[inline]
    pub fn is_text(&self) -> bool {
        self.perms == "r-xp"
    }
}

/// True for paths naming the C runtime library image (`libc.so*`, `libc-*.so`).
pub fn is_libc_image(path: &str) -> bool {
    path.contains(".so") && (path.contains("/libc-") || path.contains("/libc.so"))
}

/// Half-open address interval `[begin, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustedRange {
    pub begin: usize,
    pub end: usize,
}

impl TrustedRange {
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end <= self.begin
    }

    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.begin && addr < self.end
    }

    /// Union of all libc text regions in `table`.
    pub fn from_maps(table: &str) -> Result<Self, MapsError> {
        let mut begin = usize::MAX;
        let mut end = 0usize;

        for entry in table.lines().filter_map(MapsEntry::parse) {
            let libc_text = entry.is_text() && entry.path.is_some_and(is_libc_image);
            if libc_text {
                begin = begin.min(entry.begin);
                end = end.max(entry.end);
            }
        }

        if begin == usize::MAX || end == 0 || end <= begin {
            return Err(MapsError::NotFound);
        }
        Ok(Self { begin, end })
    }

    /// Discover the trusted range of the calling process.
    pub fn discover() -> Result<Self, MapsError> {
        let table = std::fs::read_to_string(SELF_MAPS)
            .map_err(|e| MapsError::Read(e.raw_os_error().unwrap_or(0)))?;
        Self::from_maps(&table)
    }
}

impl fmt::Display for TrustedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}-{:#x}", self.begin, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
55d4a8a00000-55d4a8a28000 r--p 00000000 08:01 393232                     /usr/bin/kconform
55d4a8a28000-55d4a8b9d000 r-xp 00028000 08:01 393232                     /usr/bin/kconform
7f3c1a000000-7f3c1a028000 r--p 00000000 08:01 1835043                    /usr/lib/x86_64-linux-gnu/libc.so.6
7f3c1a028000-7f3c1a1bd000 r-xp 00028000 08:01 1835043                    /usr/lib/x86_64-linux-gnu/libc.so.6
7f3c1a1bd000-7f3c1a215000 r--p 001bd000 08:01 1835043                    /usr/lib/x86_64-linux-gnu/libc.so.6
7f3c1a215000-7f3c1a219000 rw-p 00214000 08:01 1835043                    /usr/lib/x86_64-linux-gnu/libc.so.6
7f3c1a300000-7f3c1a320000 r-xp 00002000 08:01 1835100                    /usr/lib/x86_64-linux-gnu/libcrypt.so.1
7f3c1a400000-7f3c1a402000 rw-p 00000000 00:00 0
7ffd6b9e1000-7ffd6ba02000 rw-p 00000000 00:00 0                          [stack]
7ffd6bbd2000-7ffd6bbd4000 r-xp 00000000 00:00 0                          [vdso]
";

    #[test]
    fn parse_line_with_path() {
        let e = MapsEntry::parse(
            "7f3c1a028000-7f3c1a1bd000 r-xp 00028000 08:01 1835043    /usr/lib/x86_64-linux-gnu/libc.so.6",
        )
        .unwrap();
        assert_eq!(e.begin, 0x7f3c1a028000);
        assert_eq!(e.end, 0x7f3c1a1bd000);
        assert_eq!(e.offset, 0x28000);
        assert_eq!(e.inode, 1835043);
        assert!(e.is_text());
        assert_eq!(e.path, Some("/usr/lib/x86_64-linux-gnu/libc.so.6"));
    }

    #[test]
    fn parse_anonymous_and_spaced_paths() {
        let anon = MapsEntry::parse("7f3c1a400000-7f3c1a402000 rw-p 00000000 00:00 0").unwrap();
        assert_eq!(anon.path, None);

        let deleted =
            MapsEntry::parse("7f00-7f10 r-xp 00000000 08:01 12 /tmp/lib c.so (deleted)").unwrap();
        assert_eq!(deleted.path, Some("/tmp/lib c.so (deleted)"));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(MapsEntry::parse("").is_none());
        assert!(MapsEntry::parse("not a maps line").is_none());
        assert!(MapsEntry::parse("2000-1000 r-xp 0 00:00 0").is_none());
    }

    #[test]
    fn libc_image_names() {
        assert!(is_libc_image("/usr/lib/x86_64-linux-gnu/libc.so.6"));
        assert!(is_libc_image("/lib/libc-2.31.so"));
        assert!(!is_libc_image("/usr/lib/x86_64-linux-gnu/libcrypt.so.1"));
        assert!(!is_libc_image("/usr/lib/libc.a"));
    }

    #[test]
    fn trusted_range_covers_libc_text_only() {
        let r = TrustedRange::from_maps(TABLE).unwrap();
        assert_eq!(r, TrustedRange { begin: 0x7f3c1a028000, end: 0x7f3c1a1bd000 });
        assert!(r.contains(0x7f3c1a028000));
        assert!(!r.contains(0x7f3c1a1bd000));
        assert!(!r.contains(0x55d4a8a28000));
        assert_eq!(r.len(), 0x1bd000 - 0x28000);
    }

    #[test]
    fn trusted_range_unions_split_text() {
        let table = "\
1000-2000 r-xp 00000000 08:01 7 /lib/libc-2.31.so
5000-6000 r-xp 00004000 08:01 7 /lib/libc-2.31.so
";
        assert_eq!(
            TrustedRange::from_maps(table).unwrap(),
            TrustedRange { begin: 0x1000, end: 0x6000 }
        );
    }

    #[test]
    fn trusted_range_absent_for_static_binary() {
        let table = "\
55d4a8a28000-55d4a8b9d000 r-xp 00028000 08:01 393232 /usr/bin/kconform
7ffd6bbd2000-7ffd6bbd4000 r-xp 00000000 00:00 0 [vdso]
";
        assert_eq!(TrustedRange::from_maps(table), Err(MapsError::NotFound));
    }

    #[test]
    fn discover_self() {
        // Static builds have no libc image; either outcome must be well formed.
        match TrustedRange::discover() {
            Ok(r) => assert!(!r.is_empty()),
            Err(e) => assert_eq!(e, MapsError::NotFound),
        }
    }
}
