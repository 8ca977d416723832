//! aarch64 raw syscall

use std::arch::asm;

pub const RAW_SYSCALL_AVAILABLE: bool = true;

/// Issue `svc #0` with `x8 = nr` and no arguments.
///
/// # Safety
/// `nr` must be sound to issue with zero arguments.
#[inline(never)]
pub unsafe fn raw_syscall0(nr: libc::c_long) -> libc::c_long {
    let ret: libc::c_long;
    asm!(
        "svc 0",
        in("x8") nr,
        lateout("x0") ret,
        options(nostack),
    );
    ret
}

/// Rollback restores `x0` to the first argument, not the number; write the
/// number into the interrupted context so sigreturn hands it back.
///
/// # Safety
/// `ucontext` must be the third argument of an `SA_SIGINFO` handler.
#[inline(always)]
pub unsafe fn echo_syscall(ucontext: *mut libc::c_void, nr: libc::c_long) {
    if let Some(uc) = (ucontext as *mut libc::ucontext_t).as_mut() {
        uc.uc_mcontext.regs[0] = nr as u64;
    }
}
