//! Architectures without a raw syscall primitive

pub const RAW_SYSCALL_AVAILABLE: bool = false;

/// Always `-ENOSYS`.
///
/// # Safety
/// Performs no call.
#[inline(always)]
pub unsafe fn raw_syscall0(_nr: libc::c_long) -> libc::c_long {
    -(libc::ENOSYS as libc::c_long)
}

/// # Safety
/// No-op.
#[inline(always)]
pub unsafe fn echo_syscall(_ucontext: *mut libc::c_void, _nr: libc::c_long) {}
