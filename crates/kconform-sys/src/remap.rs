//! Page remap and advisory page pinning
//!
//! `remap_file_pages(addr, size, prot, pgoff, flags)` rebinds the slot at
//! `addr` to page `pgoff` of the file backing a shared mapping, without
//! copying. Deprecated since 3.16; since 4.0 the kernel emulates it by
//! splitting the vma and mapping the requested file offset in place.

use crate::error::{SysError, SysResult};
use nix::errno::Errno;

cfg_if::cfg_if! {
    if #[cfg(any(target_arch = "sparc", target_arch = "sparc64"))] {
        /// SPARC Linux does not implement remap_file_pages usefully.
        pub const REMAP_SUPPORTED: bool = false;

        /// # Safety
        /// Never touches memory on this architecture.
        pub unsafe fn remap_file_pages(
            _addr: *mut u8,
            _size: usize,
            _prot: libc::c_int,
            _pgoff: usize,
            _flags: libc::c_int,
        ) -> SysResult<()> {
            Err(SysError::Remap(Errno::ENOSYS))
        }
    } else {
        pub const REMAP_SUPPORTED: bool = true;

        /// Rebind `[addr, addr + size)` to page `pgoff` of its backing file.
        ///
        /// # Safety
        /// A successful call replaces the contents visible at `addr`; any
        /// reference into that range is invalidated. The emulation ignores
        /// unknown flag bits, so a call with bogus flags can still remap.
        pub unsafe fn remap_file_pages(
            addr: *mut u8,
            size: usize,
            prot: libc::c_int,
            pgoff: usize,
            flags: libc::c_int,
        ) -> SysResult<()> {
            let ret = libc::syscall(
                libc::SYS_remap_file_pages,
                addr as *mut libc::c_void,
                size,
                prot as libc::c_long,
                pgoff,
                flags as libc::c_long,
            );
            Errno::result(ret).map(drop).map_err(SysError::Remap)
        }
    }
}

/// An mlock'd range, unlocked on drop.
#[derive(Debug)]
pub struct Pinned {
    addr: *mut u8,
    len: usize,
}

impl Pinned {
    /// Best-effort pin; `None` when the kernel refuses (RLIMIT_MEMLOCK, EPERM, ...).
    pub fn try_pin(addr: *mut u8, len: usize) -> Option<Self> {
        let ret = unsafe { libc::mlock(addr as *const libc::c_void, len) };
        (ret == 0).then_some(Self { addr, len })
    }

    /// Unpin now.
    pub fn unpin(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.len > 0 {
            unsafe {
                libc::munlock(self.addr as *const libc::c_void, self.len);
            }
            self.len = 0;
        }
    }
}

impl Drop for Pinned {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{page_size, SharedMapping};

    #[test]
    fn pin_then_unpin() {
        let ps = page_size();
        let m = SharedMapping::new(ps).unwrap();
        // Pinning may be refused under a tight memlock limit; both are fine.
        if let Some(p) = Pinned::try_pin(m.as_ptr(), ps) {
            p.unpin();
            // A released range can be pinned again.
            if let Some(again) = Pinned::try_pin(m.as_ptr(), ps) {
                again.unpin();
            }
        }
    }

    #[test]
    fn remap_swaps_visible_page() {
        if !REMAP_SUPPORTED {
            return;
        }
        let ps = page_size();
        let mut m = SharedMapping::new(2 * ps).unwrap();
        unsafe {
            m.write::<u16>(0, 0);
            m.write::<u16>(ps, 1);
        }
        let r = unsafe { remap_file_pages(m.as_ptr(), ps, 0, 1, 0) };
        match r {
            Ok(()) => assert_eq!(unsafe { m.read::<u16>(0) }, 1),
            // Kernels built without the emulation
            Err(e) => assert_eq!(e, SysError::Remap(Errno::ENOSYS)),
        }
    }

    #[test]
    fn remap_past_truncated_mapping_survives() {
        let ps = page_size();
        let mut m = SharedMapping::new(2 * ps).unwrap();
        unsafe { m.write::<u16>(0, 0xbeef) };
        m.truncate(ps).unwrap();
        let tail = unsafe { m.as_ptr().add(ps) };
        // Results are deliberately ignored; only the head must be intact.
        for (prot, pgoff, flags) in [(0, 0, 0), (0, 0, !0), (!0, 0, 0)] {
            let _ = unsafe { remap_file_pages(tail, ps, prot, pgoff, flags) };
        }
        assert_eq!(unsafe { m.read::<u16>(0) }, 0xbeef);
    }
}
