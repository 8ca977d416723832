//! Syscall user dispatch
//!
//! Once armed with `prctl(PR_SET_SYSCALL_USER_DISPATCH, ON, off, len, &sel)`
//! the kernel reads the one-byte selector at every syscall entry made from
//! outside `[off, off + len)`. While it reads BLOCK, the syscall is not
//! executed; SIGSYS is delivered instead with `si_code == SYS_USER_DISPATCH`.
//!
//! ```text
//!   main flow                          SIGSYS handler
//!   ---------                          --------------
//!   captured.reset()
//!   selector.block()
//!   syscall(nr)  ---- intercepted ---> selector.allow()     (1) first
//!                                      captured.record(..)  (2)
//!                                      echo nr (aarch64)    (3)
//!   <--------------- sigreturn ------
//!   selector.allow()
//!   captured.take()                    consumed exactly once
//! ```
//!
//! The handler's signal mask blocks everything except SIGSYS, and the
//! selector is already ALLOW before it could issue any syscall of its own.

use crate::arch;
use crate::error::{SysError, SysResult};
use nix::errno::Errno;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicPtr, AtomicU8, AtomicUsize, Ordering};

// ── uapi constants (linux/prctl.h, asm-generic/siginfo.h) ──
// Defined here so older libc/kernel headers still build.

pub const PR_SET_SYSCALL_USER_DISPATCH: libc::c_int = 59;
pub const PR_SYS_DISPATCH_OFF: libc::c_ulong = 0;
pub const PR_SYS_DISPATCH_ON: libc::c_ulong = 1;
pub const SYSCALL_DISPATCH_FILTER_ALLOW: u8 = 0;
pub const SYSCALL_DISPATCH_FILTER_BLOCK: u8 = 1;
/// `si_code` of a dispatch-triggered SIGSYS.
pub const SYS_USER_DISPATCH: i32 = 2;

/// A syscall number past every architecture's table.
pub const USR_SYSCALL: libc::c_long = 0xe000;

/// The byte the kernel consults on each syscall entry.
#[repr(transparent)]
#[derive(Debug)]
pub struct Selector(AtomicU8);

impl Selector {
    pub const fn new() -> Self {
        Self(AtomicU8::new(SYSCALL_DISPATCH_FILTER_ALLOW))
    }

    #[inline(always)]
    pub fn allow(&self) {
        self.0.store(SYSCALL_DISPATCH_FILTER_ALLOW, Ordering::SeqCst);
    }

    #[inline(always)]
    pub fn block(&self) {
        self.0.store(SYSCALL_DISPATCH_FILTER_BLOCK, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_blocking(&self) -> bool {
        self.0.load(Ordering::SeqCst) == SYSCALL_DISPATCH_FILTER_BLOCK
    }

    fn as_ptr(&self) -> *mut u8 {
        self.0.as_ptr()
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of one dispatch-triggered SIGSYS delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultContext {
    /// `si_code`
    pub code: i32,
    /// `si_errno`
    pub errno: i32,
    /// Intercepted syscall number
    pub syscall: i32,
    /// Address of the instruction after the syscall
    pub call_addr: usize,
}

impl FaultContext {
    #[inline]
    pub fn is_user_dispatch(&self) -> bool {
        self.code == SYS_USER_DISPATCH
    }
}

/// Captured context shared between the handler (writer) and main flow.
#[derive(Debug, Default)]
pub struct CapturedFault {
    present: AtomicBool,
    code: AtomicI32,
    errno: AtomicI32,
    syscall: AtomicI32,
    call_addr: AtomicUsize,
}

impl CapturedFault {
    pub const fn new() -> Self {
        Self {
            present: AtomicBool::new(false),
            code: AtomicI32::new(0),
            errno: AtomicI32::new(0),
            syscall: AtomicI32::new(0),
            call_addr: AtomicUsize::new(0),
        }
    }

    /// Forget any previous capture. Called before each test case.
    pub fn reset(&self) {
        self.present.store(false, Ordering::SeqCst);
        self.code.store(0, Ordering::Relaxed);
        self.errno.store(0, Ordering::Relaxed);
        self.syscall.store(0, Ordering::Relaxed);
        self.call_addr.store(0, Ordering::Relaxed);
    }

    /// Async-signal-safe: plain atomic stores only.
    #[inline(always)]
    pub fn record(&self, ctx: FaultContext) {
        self.code.store(ctx.code, Ordering::Relaxed);
        self.errno.store(ctx.errno, Ordering::Relaxed);
        self.syscall.store(ctx.syscall, Ordering::Relaxed);
        self.call_addr.store(ctx.call_addr, Ordering::Relaxed);
        self.present.store(true, Ordering::Release);
    }

    /// Consume the capture; a second call returns `None`.
    pub fn take(&self) -> Option<FaultContext> {
        if !self.present.swap(false, Ordering::Acquire) {
            return None;
        }
        Some(FaultContext {
            code: self.code.load(Ordering::Relaxed),
            errno: self.errno.load(Ordering::Relaxed),
            syscall: self.syscall.load(Ordering::Relaxed),
            call_addr: self.call_addr.load(Ordering::Relaxed),
        })
    }
}

/// Everything the SIGSYS handler touches.
#[derive(Debug, Default)]
pub struct HandlerState {
    pub selector: Selector,
    pub captured: CapturedFault,
}

impl HandlerState {
    pub const fn new() -> Self {
        Self { selector: Selector::new(), captured: CapturedFault::new() }
    }

    /// Test-case boundary: selector ALLOW, no captured context.
    pub fn reset(&self) {
        self.selector.allow();
        self.captured.reset();
    }
}

/// Kernel-owned dispatch arming, disarmed on drop.
///
/// Borrows the selector: the kernel dereferences it until disarm.
#[derive(Debug)]
pub struct Dispatch<'a> {
    armed: bool,
    _selector: PhantomData<&'a Selector>,
}

impl<'a> Dispatch<'a> {
    /// Arm for the whole address space.
    ///
    /// # Safety
    /// Same contract as [`Dispatch::arm`].
    pub unsafe fn arm_all(selector: &'a Selector) -> SysResult<Self> {
        Self::arm(selector, 0, 0)
    }

    /// Arm for every caller outside `[exempt_begin, exempt_begin + exempt_len)`.
    ///
    /// # Safety
    /// The kernel keeps reading `selector` until dispatch is disarmed. The
    /// returned guard must be dropped or disarmed, never leaked, before the
    /// selector goes away.
    pub unsafe fn arm(selector: &'a Selector, exempt_begin: usize, exempt_len: usize) -> SysResult<Self> {
        let ret = unsafe {
            libc::prctl(
                PR_SET_SYSCALL_USER_DISPATCH,
                PR_SYS_DISPATCH_ON,
                exempt_begin as libc::c_ulong,
                exempt_len as libc::c_ulong,
                selector.as_ptr(),
            )
        };
        Errno::result(ret).map_err(SysError::Prctl)?;
        Ok(Self { armed: true, _selector: PhantomData })
    }

    /// Disarm now, reporting failure. Drop retries on error.
    pub fn disarm(mut self) -> SysResult<()> {
        disarm()?;
        self.armed = false;
        Ok(())
    }
}

impl Drop for Dispatch<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = disarm();
        }
    }
}

/// Turn dispatch off for the calling thread.
pub fn disarm() -> SysResult<()> {
    let ret = unsafe {
        libc::prctl(
            PR_SET_SYSCALL_USER_DISPATCH,
            PR_SYS_DISPATCH_OFF,
            0 as libc::c_ulong,
            0 as libc::c_ulong,
            0 as libc::c_ulong,
        )
    };
    Errno::result(ret).map(drop).map_err(SysError::Prctl)
}

// ── SIGSYS handler ──

/// The state the handler writes to; null when no registration is live.
static ACTIVE: AtomicPtr<HandlerState> = AtomicPtr::new(ptr::null_mut());

/// The SIGSYS member of the `siginfo_t` union (`_sigsys`).
#[repr(C)]
#[allow(dead_code)]
struct SigsysInfo {
    signo: libc::c_int,
    errno: libc::c_int,
    code: libc::c_int,
    #[cfg(target_pointer_width = "64")]
    _pad: libc::c_int,
    call_addr: *mut libc::c_void,
    syscall: libc::c_int,
    arch: libc::c_uint,
}

extern "C" fn sigsys_handler(_signo: libc::c_int, info: *mut libc::siginfo_t, ucontext: *mut libc::c_void) {
    let state = ACTIVE.load(Ordering::Acquire);
    if state.is_null() {
        return;
    }
    // Safety: ACTIVE is only non-null while a HandlerRegistration borrows the state.
    let state = unsafe { &*state };

    state.selector.allow();

    if info.is_null() {
        return;
    }
    let info = unsafe { &*(info as *const SigsysInfo) };
    state.captured.record(FaultContext {
        code: info.code,
        errno: info.errno,
        syscall: info.syscall,
        call_addr: info.call_addr as usize,
    });

    unsafe { arch::echo_syscall(ucontext, info.syscall as libc::c_long) };
}

/// Live SIGSYS registration pointing the handler at one `HandlerState`.
///
/// Dropping it restores the previous disposition.
pub struct HandlerRegistration<'a> {
    previous: SigAction,
    _state: PhantomData<&'a HandlerState>,
}

impl<'a> HandlerRegistration<'a> {
    /// Point the process-wide SIGSYS handler at `state`.
    ///
    /// # Safety
    /// The handler dereferences `state` until the registration is dropped.
    /// The registration must not be leaked (`mem::forget`) while `state`
    /// can still be freed.
    pub unsafe fn install(state: &'a HandlerState) -> SysResult<Self> {
        let raw = state as *const HandlerState as *mut HandlerState;
        ACTIVE
            .compare_exchange(ptr::null_mut(), raw, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SysError::HandlerBusy)?;

        let mut mask = SigSet::all();
        mask.remove(Signal::SIGSYS);
        let action = SigAction::new(SigHandler::SigAction(sigsys_handler), SaFlags::SA_SIGINFO, mask);

        match unsafe { sigaction(Signal::SIGSYS, &action) } {
            Ok(previous) => Ok(Self { previous, _state: PhantomData }),
            Err(e) => {
                ACTIVE.store(ptr::null_mut(), Ordering::Release);
                Err(SysError::Sigaction(e))
            }
        }
    }
}

impl Drop for HandlerRegistration<'_> {
    fn drop(&mut self) {
        let _ = unsafe { sigaction(Signal::SIGSYS, &self.previous) };
        ACTIVE.store(ptr::null_mut(), Ordering::Release);
    }
}

/// `syscall(nr)` through the C library wrapper.
///
/// The call site lives inside libc, so it is exempt whenever the libc text
/// range is exempt from dispatch.
#[inline(always)]
pub fn libc_syscall0(nr: libc::c_long) -> Result<libc::c_long, Errno> {
    Errno::clear();
    let ret = unsafe { libc::syscall(nr) };
    if ret == -1 {
        Err(Errno::last())
    } else {
        Ok(ret)
    }
}
