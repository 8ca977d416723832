//! Page remap ordering probe
//!
//! A shared mapping of `pages` pages is tagged so that page `i` holds `i`
//! in its first word. Every iteration drives four phases through
//! `remap_file_pages` (reverse, random, all-to-1, forward), checks after
//! each that slot `i` now shows tag `order[i]`, then fires a handful of
//! deliberately invalid calls at unmapped addresses.

use kconform_core::order::{verify, OrderKind, OrderMapping, PageTag, MAX_PAGES};
use kconform_core::{kdebug, ktrace, probe_fail};
use kconform_core::{Harness, Outcome, Probe, ProbeState, RateAccumulator, RunConfig, Skip};
use kconform_sys::remap::{remap_file_pages, Pinned, REMAP_SUPPORTED};
use kconform_sys::{page_size, unmapped_address, Errno, SharedMapping, SysError, SysResult};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Instant;

pub const METRIC_NANOS_PER_REMAP: &str = "nanosecs per page remap";

/// The tagged page set under test.
struct PageSet {
    map: SharedMapping,
    pages: usize,
    page_size: usize,
}

impl PageSet {
    fn new(pages: usize, page_size: usize) -> SysResult<Self> {
        let mut map = SharedMapping::new(pages * page_size)?;
        for i in 0..pages {
            // Safety: every page start is inside the mapping and 2-aligned.
            unsafe { map.write::<PageTag>(i * page_size, i as PageTag) };
        }
        Ok(Self { map, pages, page_size })
    }

    #[inline]
    fn slot(&self, i: usize) -> *mut u8 {
        // Safety: callers pass i < pages.
        unsafe { self.map.as_ptr().add(i * self.page_size) }
    }

    #[inline]
    fn tag(&self, i: usize) -> PageTag {
        unsafe { self.map.read::<PageTag>(i * self.page_size) }
    }

    /// Remap slot `i` onto page `order[i]` for every slot.
    fn apply(&self, order: &OrderMapping, rate: &mut RateAccumulator) -> SysResult<()> {
        for i in 0..self.pages {
            remap_page(self.slot(i), self.page_size, order.target(i), rate)?;
        }
        Ok(())
    }
}

/// One slot remap: pin if the kernel lets us, time it, and if a pinned
/// attempt failed, try once more unpinned.
fn remap_page(
    slot: *mut u8,
    page_size: usize,
    pgoff: usize,
    rate: &mut RateAccumulator,
) -> SysResult<()> {
    let pin = Pinned::try_pin(slot, page_size);
    let pinned = pin.is_some();
    let ret = timed_remap(slot, page_size, pgoff, rate);
    if let Some(pin) = pin {
        pin.unpin();
    }
    match ret {
        Err(_) if pinned => timed_remap(slot, page_size, pgoff, rate),
        ret => ret,
    }
}

fn timed_remap(
    slot: *mut u8,
    page_size: usize,
    pgoff: usize,
    rate: &mut RateAccumulator,
) -> SysResult<()> {
    let start = Instant::now();
    // Safety: nothing holds a reference into the page set; tags are read
    // through volatile raw accesses after the call.
    unsafe { remap_file_pages(slot, page_size, 0, pgoff, 0)? };
    rate.record(start.elapsed());
    Ok(())
}

/// Invalid remaps that must simply fail: valid args, illegal flags and
/// illegal prot, all against an address with nothing mapped.
fn remap_illegal(addr: usize, page_size: usize, pgoff: usize) {
    let addr = addr as *mut u8;
    let calls: [(libc::c_int, usize, libc::c_int); 3] = [(0, 0, 0), (0, 0, !0), (!0, pgoff, 0)];
    for (prot, pgoff, flags) in calls {
        // Safety: the target is not mapped by us; the results are unused.
        let ret = unsafe { remap_file_pages(addr, page_size, prot, pgoff, flags) };
        if ret.is_ok() {
            ktrace!("remap at {:#x} prot={:#x} flags={:#x} unexpectedly succeeded", addr as usize, prot, flags);
        }
    }
}

/// Exercises page remapping with four orderings per iteration.
pub struct PageRemapProbe {
    pages: usize,
    rng: StdRng,
}

impl PageRemapProbe {
    pub const NAME: &'static str = "remap";

    pub fn new(pages: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self { pages, rng }
    }

    pub fn from_config(cfg: &RunConfig) -> Self {
        Self::new(cfg.remap_pages, cfg.seed)
    }

    /// Drive one phase and check it; `Err` only when the remap call itself failed.
    fn phase(
        &mut self,
        h: &mut dyn Harness,
        set: &PageSet,
        kind: OrderKind,
        rate: &mut RateAccumulator,
    ) -> SysResult<OrderMapping> {
        let order = OrderMapping::build(kind, set.pages, &mut self.rng);
        set.apply(&order, rate)?;
        if let Err(m) = verify(&order, |i| set.tag(i)) {
            probe_fail!(h, "remap {} order pages failed: {}", order.kind(), m);
        }
        Ok(order)
    }
}

impl Probe for PageRemapProbe {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn supported(&mut self) -> Result<(), Skip> {
        if !REMAP_SUPPORTED {
            return Err(Skip::not_implemented("remap_file_pages is not available on this architecture"));
        }
        let ps = page_size();
        let map = SharedMapping::new(ps)
            .map_err(|e| Skip::no_resource(format!("mmap of {} bytes: {}", ps, e)))?;
        // Identity remap of a single page.
        match unsafe { remap_file_pages(map.as_ptr(), ps, 0, 0, 0) } {
            Err(SysError::Remap(Errno::ENOSYS)) => {
                Err(Skip::not_implemented("remap_file_pages: ENOSYS"))
            }
            _ => Ok(()),
        }
    }

    fn run(&mut self, h: &mut dyn Harness) -> Outcome {
        let ps = page_size();
        if self.pages == 0 || self.pages > MAX_PAGES {
            return Skip::no_resource(format!("page-set size {} out of range", self.pages)).into();
        }
        let set = match PageSet::new(self.pages, ps) {
            Ok(s) => s,
            Err(e) => {
                return Skip::no_resource(format!(
                    "mmap failed to allocate {} bytes: {}",
                    self.pages * ps,
                    e
                ))
                .into()
            }
        };

        let unmapped = unmapped_address(ps);
        // A mapped page immediately followed by an unmapped one.
        let truncated = SharedMapping::new(2 * ps).ok().and_then(|mut m| match m.truncate(ps) {
            Ok(()) => Some(m),
            Err(e) => {
                kdebug!("{}: cannot truncate guard mapping: {}", Self::NAME, e);
                None
            }
        });

        let mut rate = RateAccumulator::new();
        h.set_state(ProbeState::Run);

        'iter: loop {
            let mut last = None;
            for kind in OrderKind::PHASES {
                match self.phase(h, &set, kind, &mut rate) {
                    Ok(order) => last = Some(order),
                    Err(e) => {
                        probe_fail!(h, "remap_file_pages failed, {}", e);
                        break 'iter;
                    }
                }
            }

            let pgoff = last.map_or(0, |o| o.target(0));
            if let Some(addr) = unmapped {
                remap_illegal(addr, ps, pgoff);
            }
            if let Some(m) = &truncated {
                remap_illegal(m.addr() + ps, ps, pgoff);
            }

            h.inc_counter();
            if !h.keep_running() {
                break;
            }
        }

        h.set_state(ProbeState::Deinit);
        if let Some(mean) = rate.mean() {
            kdebug!("{}: {} remaps in {:?}, {:?} each", Self::NAME, rate.count(), rate.total(), mean);
        }
        h.set_metric(METRIC_NANOS_PER_REMAP, rate.nanos_per_op());
        Outcome::Success
    }
}
