//! x86_64 raw syscall

use std::arch::asm;

pub const RAW_SYSCALL_AVAILABLE: bool = true;

/// Issue `syscall` with `rax = nr` and no arguments.
///
/// # Safety
/// `nr` must be sound to issue with garbage-free, zero arguments.
#[inline(never)]
pub unsafe fn raw_syscall0(nr: libc::c_long) -> libc::c_long {
    let ret: libc::c_long;
    asm!(
        "syscall",
        inlateout("rax") nr => ret,
        lateout("rcx") _,
        lateout("r11") _,
        options(nostack),
    );
    ret
}

/// The kernel rolls `rax` back to the syscall number before delivering
/// SIGSYS, so an intercepted call already returns `nr`.
///
/// # Safety
/// Signal-handler context only.
#[inline(always)]
pub unsafe fn echo_syscall(_ucontext: *mut libc::c_void, _nr: libc::c_long) {}
