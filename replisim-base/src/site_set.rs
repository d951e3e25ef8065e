use crate::SiteId;
use serde::{Deserialize, Serialize};

/// A set of sites as a 256-bit bitmap, one bit per possible `SiteId`, counted
/// from least-to-most significant bit in ascending words. Iteration is always
/// in ascending site order, which is the order reads probe replicas in.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SiteSet {
    bits: [u64; 4],
}

impl SiteSet {
    pub fn new() -> Self {
        SiteSet { bits: [0; 4] }
    }
    pub fn single(site: SiteId) -> Self {
        let mut s = Self::new();
        s.insert(site);
        s
    }
    /// Sites `1..=count`.
    pub fn first_n(count: u8) -> Self {
        let mut s = Self::new();
        for i in 1..=count {
            s.insert(SiteId(i));
        }
        s
    }
    pub fn insert(&mut self, site: SiteId) {
        let i = site.0 as usize;
        self.bits[i / 64] |= 1 << (i % 64);
    }
    pub fn contains(&self, site: SiteId) -> bool {
        let i = site.0 as usize;
        (self.bits[i / 64] & (1 << (i % 64))) != 0
    }
    pub fn len(&self) -> u32 {
        self.bits.iter().map(|x| x.count_ones()).sum()
    }
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|x| *x == 0)
    }
    pub fn iter(&self) -> impl Iterator<Item = SiteId> + '_ {
        (0..=u8::MAX).map(SiteId).filter(move |s| self.contains(*s))
    }
}

impl FromIterator<SiteId> for SiteSet {
    fn from_iter<I: IntoIterator<Item = SiteId>>(iter: I) -> Self {
        let mut s = SiteSet::new();
        for site in iter {
            s.insert(site);
        }
        s
    }
}
