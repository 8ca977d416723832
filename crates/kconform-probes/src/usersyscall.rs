//! Syscall user dispatch probe
//!
//! Three cases per iteration, each stricter than the last:
//!
//! 1. dispatch armed, selector ALLOW: an out-of-range syscall reaches the
//!    kernel and fails with ENOSYS.
//! 2. dispatch armed, selector BLOCK: the same call is intercepted, the
//!    handler sees `SYS_USER_DISPATCH` and the call returns its own number.
//! 3. dispatch armed outside the libc text range: `getpid` through libc
//!    runs normally, `getpid` through a raw trap in our own text is
//!    intercepted and returns the syscall number instead of the pid.
//!
//! Case 3 needs both a discoverable libc range and a raw syscall primitive
//! for the target architecture; without either it is left out.

use kconform_core::{kdebug, kinfo, kwarn, probe_fail, probe_info};
use kconform_core::{Harness, Outcome, Probe, ProbeState, Skip, TrustedRange};
use kconform_sys::arch::{raw_syscall0_checked, RAW_SYSCALL_AVAILABLE};
use kconform_sys::dispatch::{
    self, libc_syscall0, Dispatch, HandlerRegistration, HandlerState, Selector, USR_SYSCALL,
};
use kconform_sys::Errno;

pub const METRIC_INTERCEPTED: &str = "intercepted syscalls";

/// How an iteration ended.
enum Step {
    /// Keep looping (mismatches were already reported).
    Next,
    /// Leave the loop with this outcome.
    Stop(Outcome),
}

/// Exercises `PR_SET_SYSCALL_USER_DISPATCH` and its SIGSYS handler.
#[derive(Debug, Default)]
pub struct SyscallDispatchProbe {
    state: HandlerState,
}

impl SyscallDispatchProbe {
    pub const NAME: &'static str = "usersyscall";

    pub fn new() -> Self {
        Self::default()
    }

    /// Selector ALLOW: the kernel must run the call and reject it.
    fn case_unblocked(&self, h: &mut dyn Harness) {
        self.state.reset();
        match libc_syscall0(USR_SYSCALL) {
            Err(Errno::ENOSYS) => {}
            Err(e) => probe_fail!(
                h,
                "didn't get ENOSYS on user syscall, errno={} ({})",
                e as i32,
                e.desc()
            ),
            Ok(ret) => probe_fail!(h, "didn't get ENOSYS on user syscall, got {:#x}", ret),
        }
        if let Some(ctx) = self.state.captured.take() {
            probe_fail!(h, "unblocked user syscall was intercepted (si_code={})", ctx.code);
        }
    }

    /// Selector BLOCK: the handler intercepts and the call echoes its number.
    fn case_blocked(&self, h: &mut dyn Harness, intercepted: &mut u64) -> Step {
        self.state.reset();
        self.state.selector.block();
        let ret = libc_syscall0(USR_SYSCALL);
        self.state.selector.allow();

        match ret {
            Ok(USR_SYSCALL) => {}
            Err(Errno::ENOSYS) => {
                return Step::Stop(Skip::not_implemented("got ENOSYS for usersyscall").into());
            }
            Ok(other) => {
                probe_fail!(h, "didn't get {:#x} on user syscall, got {:#x} instead", USR_SYSCALL, other);
                return Step::Next;
            }
            Err(e) => {
                probe_fail!(
                    h,
                    "didn't get {:#x} on user syscall, errno={} ({})",
                    USR_SYSCALL,
                    e as i32,
                    e.desc()
                );
                return Step::Next;
            }
        }

        let Some(ctx) = self.state.captured.take() else {
            probe_fail!(h, "user syscall returned {:#x} but the handler captured nothing", USR_SYSCALL);
            return Step::Next;
        };
        if !ctx.is_user_dispatch() {
            probe_fail!(h, "didn't get SYS_USER_DISPATCH in si_code, got {:#x} instead", ctx.code);
            return Step::Next;
        }
        if ctx.errno != 0 {
            probe_fail!(h, "didn't get 0x0 in si_errno, got {:#x} instead", ctx.errno);
            return Step::Next;
        }
        kdebug!("{}: intercepted nr={:#x} at {:#x}", Self::NAME, ctx.syscall, ctx.call_addr);
        *intercepted += 1;
        Step::Next
    }

    /// Dispatch armed for everything outside `trusted`.
    fn case_trusted(
        &self,
        h: &mut dyn Harness,
        trusted: TrustedRange,
        pid: libc::c_long,
        intercepted: &mut u64,
    ) {
        // Safety: the guard is disarmed below; the selector outlives it.
        let armed = unsafe { Dispatch::arm(&self.state.selector, trusted.begin, trusted.len()) };
        let armed = match armed {
            Ok(d) => d,
            Err(e) => {
                probe_info!(h, "range-restricted user dispatch failed, {}", e);
                return;
            }
        };

        self.state.reset();
        self.state.selector.block();
        let ret_libc = libc_syscall0(libc::SYS_getpid);
        self.state.selector.allow();
        let libc_ctx = self.state.captured.take();

        self.state.reset();
        self.state.selector.block();
        // Safety: getpid takes no arguments and touches no memory.
        let ret_raw = unsafe { raw_syscall0_checked(libc::SYS_getpid) };
        self.state.selector.allow();
        let raw_ctx = self.state.captured.take();

        if let Err(e) = armed.disarm() {
            kwarn!("{}: cannot disarm user dispatch, {}", Self::NAME, e);
        }

        match ret_libc {
            Ok(ret) if ret == pid => {}
            Ok(ret) => probe_fail!(h, "didn't get pid on libc getpid syscall, got {} instead", ret),
            Err(e) => probe_fail!(
                h,
                "didn't get pid on libc getpid syscall, errno={} ({})",
                e as i32,
                e.desc()
            ),
        }
        if libc_ctx.is_some() {
            probe_fail!(h, "getpid from inside {} was intercepted", trusted);
        }

        match ret_raw {
            Ok(ret) if ret == libc::SYS_getpid => {}
            Ok(ret) => probe_fail!(
                h,
                "didn't get __NR_getpid {:#x} on user syscall, got {:#x} instead",
                libc::SYS_getpid,
                ret
            ),
            Err(e) => probe_fail!(
                h,
                "didn't get __NR_getpid {:#x} on user syscall, errno={} ({})",
                libc::SYS_getpid,
                e as i32,
                e.desc()
            ),
        }
        match raw_ctx {
            Some(ctx) if trusted.contains(ctx.call_addr) => {
                probe_fail!(h, "raw getpid trapped from {:#x}, inside {}", ctx.call_addr, trusted)
            }
            Some(ctx) if ctx.is_user_dispatch() => *intercepted += 1,
            Some(ctx) => probe_fail!(h, "raw getpid raised SIGSYS with si_code {:#x}", ctx.code),
            None => probe_fail!(h, "raw getpid was not intercepted"),
        }
    }

    fn iteration(
        &self,
        h: &mut dyn Harness,
        trusted: Option<TrustedRange>,
        pid: libc::c_long,
        intercepted: &mut u64,
    ) -> Step {
        // Safety: the guard is disarmed before returning.
        let armed = match unsafe { Dispatch::arm_all(&self.state.selector) } {
            Ok(d) => d,
            Err(e) => {
                probe_info!(h, "user dispatch failed, {}", e);
                return Step::Stop(Outcome::Success);
            }
        };

        self.case_unblocked(h);
        let step = self.case_blocked(h, intercepted);
        if let Err(e) = armed.disarm() {
            kwarn!("{}: cannot disarm user dispatch, {}", Self::NAME, e);
        }
        if let Step::Stop(_) = step {
            return step;
        }

        if let Some(range) = trusted {
            self.case_trusted(h, range, pid, intercepted);
        }
        Step::Next
    }
}

impl Probe for SyscallDispatchProbe {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Arm once over a scratch selector and disarm again.
    fn supported(&mut self) -> Result<(), Skip> {
        let selector = Selector::new();
        // Safety: disarmed before `selector` goes out of scope.
        let armed = unsafe { Dispatch::arm_all(&selector) }.map_err(|e| {
            Skip::not_implemented(format!("prctl user dispatch is not working, {}", e))
        })?;
        armed
            .disarm()
            .map_err(|e| Skip::not_implemented(format!("prctl user dispatch cannot be disabled, {}", e)))
    }

    fn run(&mut self, h: &mut dyn Harness) -> Outcome {
        let trusted = if RAW_SYSCALL_AVAILABLE {
            match TrustedRange::discover() {
                Ok(r) => {
                    kdebug!("{}: libc text {}", Self::NAME, r);
                    Some(r)
                }
                Err(e) => {
                    kinfo!("{}: {}, range-restricted case disabled", Self::NAME, e);
                    None
                }
            }
        } else {
            None
        };
        let pid = libc::c_long::from(unsafe { libc::getpid() });

        self.state.reset();
        // Safety: dropped explicitly below, while `self.state` is still borrowed.
        let registration = match unsafe { HandlerRegistration::install(&self.state) } {
            Ok(r) => r,
            Err(e) => return Skip::no_resource(format!("sigaction SIGSYS: {}", e)).into(),
        };

        let mut intercepted = 0u64;
        h.set_state(ProbeState::Run);

        let outcome = loop {
            if let Step::Stop(outcome) = self.iteration(h, trusted, pid, &mut intercepted) {
                break outcome;
            }
            h.inc_counter();
            if !h.keep_running() {
                break Outcome::Success;
            }
        };

        if let Err(e) = dispatch::disarm() {
            kwarn!("{}: cannot disarm user dispatch, {}", Self::NAME, e);
        }
        drop(registration);
        self.state.reset();

        h.set_state(ProbeState::Deinit);
        h.set_metric(METRIC_INTERCEPTED, intercepted as f64);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kconform_core::kprint::{set_log_level, LogLevel};
    use kconform_core::{run_probe, BoundedHarness, RunConfig, SkipKind};
    use std::sync::Mutex;

    /// One SIGSYS registration per process.
    static SIGSYS_LOCK: Mutex<()> = Mutex::new(());

    fn range_restricted_available() -> bool {
        RAW_SYSCALL_AVAILABLE && TrustedRange::discover().is_ok()
    }

    #[test]
    fn libc_getpid_exempt_raw_getpid_intercepted() {
        let _g = SIGSYS_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        set_log_level(LogLevel::Off);
        if SyscallDispatchProbe::new().supported().is_err() {
            return;
        }
        let Ok(range) = TrustedRange::discover() else { return };
        if !RAW_SYSCALL_AVAILABLE {
            return;
        }
        let pid = libc::c_long::from(unsafe { libc::getpid() });
        let state = HandlerState::new();
        let reg = unsafe { HandlerRegistration::install(&state) }.unwrap();
        let armed = unsafe { Dispatch::arm(&state.selector, range.begin, range.len()) }.unwrap();

        state.reset();
        state.selector.block();
        let ret_libc = libc_syscall0(libc::SYS_getpid);
        state.selector.allow();
        let libc_ctx = state.captured.take();

        state.reset();
        state.selector.block();
        let ret_raw = unsafe { raw_syscall0_checked(libc::SYS_getpid) };
        state.selector.allow();
        let raw_ctx = state.captured.take();

        armed.disarm().unwrap();
        drop(reg);

        assert_eq!(ret_libc, Ok(pid));
        assert_eq!(libc_ctx, None);
        assert_eq!(ret_raw, Ok(libc::SYS_getpid));
        let ctx = raw_ctx.expect("raw getpid was not intercepted");
        assert_eq!(ctx.code, kconform_sys::dispatch::SYS_USER_DISPATCH);
        assert_eq!(ctx.syscall as libc::c_long, libc::SYS_getpid);
        assert!(!range.contains(ctx.call_addr));
    }

    #[test]
    fn trusted_case_counts_one_interception() {
        let _g = SIGSYS_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        set_log_level(LogLevel::Off);
        let mut p = SyscallDispatchProbe::new();
        if p.supported().is_err() || !range_restricted_available() {
            return;
        }
        let range = TrustedRange::discover().unwrap();
        let pid = libc::c_long::from(unsafe { libc::getpid() });
        let mut h = BoundedHarness::new(SyscallDispatchProbe::NAME, 1, None);
        let mut n = 0;
        {
            let _reg = unsafe { HandlerRegistration::install(&p.state) }.unwrap();
            p.case_trusted(&mut h, range, pid, &mut n);
        }
        assert_eq!(h.failures(), 0);
        assert_eq!(n, 1);
    }

    #[test]
    fn bounded_run_counts_interceptions() {
        let _g = SIGSYS_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        set_log_level(LogLevel::Off);
        let cfg = RunConfig::new().max_ops(4).timeout(None);
        let mut p = SyscallDispatchProbe::new();
        let r = run_probe(&mut p, &cfg);
        match &r.outcome {
            Outcome::Success => {
                assert_eq!(r.failures, 0);
                assert_eq!(r.ops, 4);
                let n = r.metrics.iter().find(|m| m.name == METRIC_INTERCEPTED).map(|m| m.value);
                // Case 2 every iteration, case 3 on top when it can run.
                let per_iter = if range_restricted_available() { 2.0 } else { 1.0 };
                assert_eq!(n, Some(per_iter * 4.0));
            }
            Outcome::Skip(s) => assert_eq!(s.kind, SkipKind::NotImplemented),
            Outcome::Failure(f) => panic!("usersyscall run failed: {f}"),
        }
    }

    #[test]
    fn busy_handler_slot_is_no_resource() {
        let _g = SIGSYS_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        set_log_level(LogLevel::Off);
        let other = HandlerState::new();
        let _held = unsafe { HandlerRegistration::install(&other) }.unwrap();

        let mut p = SyscallDispatchProbe::new();
        let mut h = BoundedHarness::new(SyscallDispatchProbe::NAME, 1, None);
        let out = p.run(&mut h);
        assert!(matches!(out, Outcome::Skip(Skip { kind: SkipKind::NoResource, .. })));
        assert_eq!(h.counter(), 0);
    }

    #[test]
    fn dispatch_left_disarmed() {
        let _g = SIGSYS_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        set_log_level(LogLevel::Off);
        let mut p = SyscallDispatchProbe::new();
        if p.supported().is_err() {
            return;
        }
        let mut h = BoundedHarness::new(SyscallDispatchProbe::NAME, 1, None);
        let _ = p.run(&mut h);
        // No handler is installed any more; an armed thread would die of SIGSYS.
        assert_eq!(libc_syscall0(USR_SYSCALL), Err(Errno::ENOSYS));
        assert!(!p.state.selector.is_blocking());
    }
}
