//! Per-molecule cache of derived values.
//!
//! Every cached quantity has a bit in [`CacheFlags`]. Mutations set the bit,
//! only an explicit recompute clears it. Reads go through [`ReadMode`]: a
//! strict read of a stale value is an [`Error::StaleState`], a permissive read
//! returns whatever was last computed.

use bitflags::bitflags;
use petgraph::graph::NodeIndex;
use tracing::warn;

use crate::atom::Hybridization;
use crate::error::{Error, Result};
use crate::rings::RingInfo;

bitflags! {
    /// Derived values tracked for staleness.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CacheFlags: u8 {
        /// Explicit valence and implicit hydrogen counts.
        const VALENCE = 1;
        const RINGS = 1 << 1;
        const CONJUGATION = 1 << 2;
        const HYBRIDIZATION = 1 << 3;
    }
}

impl CacheFlags {
    /// What an in-place edit of one atom's or bond's fields can invalidate.
    pub const ELEMENT_EDIT: Self = Self::VALENCE
        .union(Self::CONJUGATION)
        .union(Self::HYBRIDIZATION);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReadMode {
    /// Fail with [`Error::StaleState`] when the value is stale.
    #[default]
    Strict,
    /// Return the last computed value, which may be out of date.
    Permissive,
}

#[derive(Debug, Clone)]
pub struct PropertyCache {
    stale: CacheFlags,
    pub(crate) explicit_valence: Vec<u8>,
    pub(crate) implicit_h: Vec<u8>,
    pub(crate) hybridization: Vec<Hybridization>,
    pub(crate) ring_info: RingInfo,
}

impl Default for PropertyCache {
    fn default() -> Self {
        Self {
            stale: CacheFlags::all(),
            explicit_valence: Vec::new(),
            implicit_h: Vec::new(),
            hybridization: Vec::new(),
            ring_info: RingInfo::default(),
        }
    }
}

impl PropertyCache {
    pub fn is_stale(&self, what: CacheFlags) -> bool {
        self.stale.intersects(what)
    }

    pub fn stale_flags(&self) -> CacheFlags {
        self.stale
    }

    pub(crate) fn mark_stale(&mut self, what: CacheFlags) {
        self.stale |= what;
    }

    pub(crate) fn mark_fresh(&mut self, what: CacheFlags) {
        self.stale &= !what;
    }

    fn check(&self, flag: CacheFlags, mode: ReadMode, what: &'static str) -> Result<()> {
        if !self.is_stale(flag) {
            return Ok(());
        }
        match mode {
            ReadMode::Strict => Err(Error::StaleState(what)),
            ReadMode::Permissive => {
                warn!(value = what, "returning stale cached value");
                Ok(())
            }
        }
    }

    fn read<T: Copy + Default>(
        &self,
        values: &[T],
        idx: usize,
        flag: CacheFlags,
        mode: ReadMode,
        what: &'static str,
    ) -> Result<T> {
        self.check(flag, mode, what)?;
        Ok(values.get(idx).copied().unwrap_or_default())
    }

    pub fn explicit_valence(&self, atom: NodeIndex, mode: ReadMode) -> Result<u8> {
        self.read(
            &self.explicit_valence,
            atom.index(),
            CacheFlags::VALENCE,
            mode,
            "explicit valence",
        )
    }

    pub fn implicit_h(&self, atom: NodeIndex, mode: ReadMode) -> Result<u8> {
        self.read(
            &self.implicit_h,
            atom.index(),
            CacheFlags::VALENCE,
            mode,
            "implicit hydrogen count",
        )
    }

    pub fn hybridization(&self, atom: NodeIndex, mode: ReadMode) -> Result<Hybridization> {
        self.read(
            &self.hybridization,
            atom.index(),
            CacheFlags::HYBRIDIZATION,
            mode,
            "hybridization",
        )
    }

    pub fn ring_info(&self, mode: ReadMode) -> Result<&RingInfo> {
        self.check(CacheFlags::RINGS, mode, "ring info")?;
        Ok(&self.ring_info)
    }

    pub(crate) fn check_conjugation(&self, mode: ReadMode) -> Result<()> {
        self.check(CacheFlags::CONJUGATION, mode, "conjugation")
    }

    pub(crate) fn set_valences(&mut self, explicit: Vec<u8>, implicit: Vec<u8>) {
        self.explicit_valence = explicit;
        self.implicit_h = implicit;
        self.mark_fresh(CacheFlags::VALENCE);
    }

    pub(crate) fn set_hybridization(&mut self, hyb: Vec<Hybridization>) {
        self.hybridization = hyb;
        self.mark_fresh(CacheFlags::HYBRIDIZATION);
    }

    pub(crate) fn set_ring_info(&mut self, info: RingInfo) {
        self.ring_info = info;
        self.mark_fresh(CacheFlags::RINGS);
    }

    /// Drops every computed value and marks everything stale.
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    #[test]
    fn fresh_cache_is_stale() {
        let cache = PropertyCache::default();
        assert!(cache.is_stale(CacheFlags::VALENCE));
        assert_eq!(
            cache.explicit_valence(n(0), ReadMode::Strict),
            Err(Error::StaleState("explicit valence"))
        );
    }

    #[test]
    fn permissive_read_returns_last_value() {
        let mut cache = PropertyCache::default();
        cache.set_valences(vec![4, 3], vec![0, 1]);
        assert_eq!(cache.implicit_h(n(1), ReadMode::Strict), Ok(1));
        cache.mark_stale(CacheFlags::ELEMENT_EDIT);
        assert!(cache.implicit_h(n(1), ReadMode::Strict).is_err());
        assert_eq!(cache.implicit_h(n(1), ReadMode::Permissive), Ok(1));
        assert_eq!(cache.implicit_h(n(7), ReadMode::Permissive), Ok(0));
    }

    #[test]
    fn ring_flag_is_independent() {
        let mut cache = PropertyCache::default();
        cache.set_ring_info(RingInfo::default());
        cache.mark_stale(CacheFlags::ELEMENT_EDIT);
        assert!(cache.ring_info(ReadMode::Strict).is_ok());
        assert!(cache.hybridization(n(0), ReadMode::Strict).is_err());
    }
}
