//! Architecture-specific raw syscall invocation
//!
//! `raw_syscall0` issues the trap instruction from this crate's own text,
//! never through the C library, so it is subject to range-restricted
//! dispatch even when libc is exempt.
//!
//! Each architecture module provides:
//! - `RAW_SYSCALL_AVAILABLE` - whether `raw_syscall0` really traps
//! - `raw_syscall0(nr)` - returns the raw kernel result (negative errno on error)
//! - `echo_syscall(uc, nr)` - make an intercepted syscall return `nr`

use nix::errno::Errno;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        mod x86_64;
        pub use self::x86_64::*;
    } else if #[cfg(target_arch = "aarch64")] {
        mod aarch64;
        pub use self::aarch64::*;
    } else {
        mod fallback;
        pub use self::fallback::*;
    }
}

/// `raw_syscall0` with the kernel's `-errno` convention decoded.
///
/// # Safety
/// Same as `raw_syscall0`: `nr` must be a syscall that is sound to issue
/// with no arguments.
#[inline(always)]
pub unsafe fn raw_syscall0_checked(nr: libc::c_long) -> Result<libc::c_long, Errno> {
    let ret = raw_syscall0(nr);
    if (-4095..0).contains(&ret) {
        Err(Errno::from_raw(-ret as i32))
    } else {
        Ok(ret)
    }
}
