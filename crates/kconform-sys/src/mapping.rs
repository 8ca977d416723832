//! Anonymous shared mappings
//!
//! `MAP_SHARED | MAP_ANONYMOUS` memory is backed by an internal shmem file,
//! which is what gives the page-remap facility a page offset to work with.

use crate::error::{SysError, SysResult};
use nix::errno::Errno;
use std::ptr::NonNull;

/// Platform page size.
pub fn page_size() -> usize {
    let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if sz <= 0 {
        4096
    } else {
        sz as usize
    }
}

/// A read/write anonymous shared mapping, unmapped on drop.
#[derive(Debug)]
pub struct SharedMapping {
    ptr: NonNull<u8>,
    len: usize,
}

// Safety: the mapping is exclusively owned; raw access goes through &self/&mut self.
unsafe impl Send for SharedMapping {}

impl SharedMapping {
    pub fn new(len: usize) -> SysResult<Self> {
        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(SysError::Mmap(Errno::last()));
        }
        let ptr = NonNull::new(addr as *mut u8).ok_or(SysError::Mmap(Errno::EFAULT))?;
        Ok(Self { ptr, len })
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Unmap everything past the first `keep` bytes.
    ///
    /// Afterwards `addr() + keep` is a mapped/unmapped boundary.
    pub fn truncate(&mut self, keep: usize) -> SysResult<()> {
        if keep >= self.len {
            return Ok(());
        }
        let tail = unsafe { self.as_ptr().add(keep) };
        let ret = unsafe { libc::munmap(tail as *mut libc::c_void, self.len - keep) };
        if ret != 0 {
            return Err(SysError::Munmap(Errno::last()));
        }
        self.len = keep;
        Ok(())
    }

    /// Volatile read of a `T` at byte `offset`.
    ///
    /// # Safety
    /// `offset + size_of::<T>()` must lie inside the mapping and be aligned for `T`.
    #[inline(always)]
    pub unsafe fn read<T: Copy>(&self, offset: usize) -> T {
        debug_assert!(offset + std::mem::size_of::<T>() <= self.len);
        std::ptr::read_volatile(self.as_ptr().add(offset) as *const T)
    }

    /// Volatile write of a `T` at byte `offset`.
    ///
    /// # Safety
    /// Same as [`SharedMapping::read`].
    #[inline(always)]
    pub unsafe fn write<T: Copy>(&mut self, offset: usize, value: T) {
        debug_assert!(offset + std::mem::size_of::<T>() <= self.len);
        std::ptr::write_volatile(self.as_ptr().add(offset) as *mut T, value)
    }
}

impl Drop for SharedMapping {
    fn drop(&mut self) {
        if self.len > 0 {
            unsafe {
                libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.len);
            }
        }
    }
}

/// An address that was mapped a moment ago and is now unmapped.
///
/// Nothing stops a later mapping from landing there; callers may only
/// pass it to calls whose outcome they do not rely on.
pub fn unmapped_address(len: usize) -> Option<usize> {
    SharedMapping::new(len).ok().map(|m| m.addr())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_power_of_two() {
        let ps = page_size();
        assert!(ps >= 4096);
        assert!(ps.is_power_of_two());
    }

    #[test]
    fn mapping_read_write() {
        let ps = page_size();
        let mut m = SharedMapping::new(4 * ps).unwrap();
        assert_eq!(m.len(), 4 * ps);
        for i in 0..4 {
            unsafe { m.write::<u16>(i * ps, i as u16 + 7) };
        }
        for i in 0..4 {
            assert_eq!(unsafe { m.read::<u16>(i * ps) }, i as u16 + 7);
        }
    }

    #[test]
    fn truncate_keeps_head() {
        let ps = page_size();
        let mut m = SharedMapping::new(2 * ps).unwrap();
        unsafe { m.write::<u32>(0, 0xfeed) };
        m.truncate(ps).unwrap();
        assert_eq!(m.len(), ps);
        assert_eq!(unsafe { m.read::<u32>(0) }, 0xfeed);
        // No-op when nothing is past `keep`.
        m.truncate(ps).unwrap();
        assert_eq!(m.len(), ps);
    }

    #[test]
    fn unmapped_address_is_page_aligned() {
        let ps = page_size();
        let addr = unmapped_address(ps).unwrap();
        assert_ne!(addr, 0);
        assert_eq!(addr % ps, 0);
    }

    #[test]
    fn zero_length_mapping_fails() {
        assert_eq!(SharedMapping::new(0).unwrap_err(), SysError::Mmap(Errno::EINVAL));
    }
}
