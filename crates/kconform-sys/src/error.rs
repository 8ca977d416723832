//! Kernel call errors

use nix::errno::Errno;
use std::fmt;

pub type SysResult<T> = Result<T, SysError>;

/// A failed kernel call, with the errno it reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SysError {
    /// mmap failed
    Mmap(Errno),
    /// munmap failed
    Munmap(Errno),
    /// remap_file_pages failed
    Remap(Errno),
    /// prctl(PR_SET_SYSCALL_USER_DISPATCH) failed
    Prctl(Errno),
    /// sigaction(SIGSYS) failed
    Sigaction(Errno),
    /// Another HandlerState is already registered for SIGSYS
    HandlerBusy,
}

impl SysError {
    pub fn errno(&self) -> Option<Errno> {
        match *self {
            SysError::Mmap(e)
            | SysError::Munmap(e)
            | SysError::Remap(e)
            | SysError::Prctl(e)
            | SysError::Sigaction(e) => Some(e),
            SysError::HandlerBusy => None,
        }
    }

    fn op(&self) -> &'static str {
        match self {
            SysError::Mmap(_) => "mmap",
            SysError::Munmap(_) => "munmap",
            SysError::Remap(_) => "remap_file_pages",
            SysError::Prctl(_) => "prctl user dispatch",
            SysError::Sigaction(_) => "sigaction SIGSYS",
            SysError::HandlerBusy => "SIGSYS handler",
        }
    }
}

impl fmt::Display for SysError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errno() {
            Some(e) => write!(f, "{} failed: errno={} ({})", self.op(), e as i32, e.desc()),
            None => write!(f, "{} already registered", self.op()),
        }
    }
}

impl std::error::Error for SysError {}
