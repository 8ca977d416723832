//! Page orderings and their verification.
//!
//! An [`OrderMapping`] maps each slot of a page set to the page that should
//! back it after a remap phase: slot `i` is remapped onto page `order[i]`.
//! Every page carries a tag equal to its own index, so once a phase has been
//! committed the tag read back from slot `i` must equal `order[i]`.
//! [`verify`] checks exactly that.

use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;

/// Page-set size used when none is configured.
pub const DEFAULT_PAGES: usize = 512;

/// Largest page set whose indices fit a 16-bit tag.
pub const MAX_PAGES: usize = 1 << 16;

/// Tag stored in the first word of every page.
pub type PageTag = u16;

/// The four phases, in the order they are driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    /// `order[i] = n - 1 - i`
    Reverse,
    /// Uniformly shuffled bijection
    Random,
    /// Every slot aliases page 0
    Collapse,
    /// `order[i] = i`
    Identity,
}

impl OrderKind {
    pub const PHASES: [OrderKind; 4] = [
        OrderKind::Reverse,
        OrderKind::Random,
        OrderKind::Collapse,
        OrderKind::Identity,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OrderKind::Reverse => "reverse",
            OrderKind::Random => "random",
            OrderKind::Collapse => "all-to-1",
            OrderKind::Identity => "forward",
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Slot index -> target page index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderMapping {
    kind: OrderKind,
    order: Vec<usize>,
}

impl OrderMapping {
    /// Build the mapping for `kind` over `n` pages.
    ///
    /// `rng` is only consulted for [`OrderKind::Random`].
    pub fn build<R: Rng + ?Sized>(kind: OrderKind, n: usize, rng: &mut R) -> Self {
        let order = match kind {
            OrderKind::Reverse => (0..n).rev().collect(),
            OrderKind::Random => {
                let mut order: Vec<usize> = (0..n).collect();
                order.shuffle(rng);
                order
            }
            OrderKind::Collapse => vec![0; n],
            OrderKind::Identity => (0..n).collect(),
        };
        Self { kind, order }
    }

    #[inline]
    pub fn kind(&self) -> OrderKind {
        self.kind
    }

    /// Target page for `slot`.
    #[inline]
    pub fn target(&self, slot: usize) -> usize {
        self.order[slot]
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.order
    }

    /// True when every index in `0..len` appears exactly once.
    pub fn is_bijection(&self) -> bool {
        let mut seen = vec![false; self.order.len()];
        for &t in &self.order {
            match seen.get_mut(t) {
                Some(s) if !*s => *s = true,
                _ => return false,
            }
        }
        true
    }
}

/// First slot whose observed tag disagrees with the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    pub slot: usize,
    pub expected: usize,
    pub observed: PageTag,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "slot {} holds tag {}, expected {}",
            self.slot, self.observed, self.expected
        )
    }
}

/// Check that `observed(i) == order[i]` for every slot.
///
/// `observed` reads the tag currently visible at a slot.
pub fn verify<F>(order: &OrderMapping, mut observed: F) -> Result<(), Mismatch>
where
    F: FnMut(usize) -> PageTag,
{
    for (slot, &expected) in order.as_slice().iter().enumerate() {
        let tag = observed(slot);
        if usize::from(tag) != expected {
            return Err(Mismatch { slot, expected, observed: tag });
        }
    }
    Ok(())
}
