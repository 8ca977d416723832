//! # kconform-sys
//!
//! Raw Linux plumbing for the kconform probes.
//!
//! - `mapping` - RAII anonymous shared mappings, unmapped-address tricks
//! - `remap` - Page remap and advisory pin/unpin
//! - `dispatch` - Syscall user dispatch: selector, captured fault context,
//!   SIGSYS handler registration, prctl arm/disarm
//! - `arch` - Per-architecture raw syscall primitive
//! - `error` - `SysError` carrying the kernel errno
//!
//! Everything here is Linux-only; on other targets the crate is empty.

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        pub mod error;
        pub mod mapping;
        pub mod remap;
        pub mod dispatch;
        pub mod arch;

        pub use error::{SysError, SysResult};
        pub use mapping::{page_size, unmapped_address, SharedMapping};
        pub use nix::errno::Errno;
    }
}
