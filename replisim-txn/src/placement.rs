use crate::Config;
use replisim_base::{err, Result, SiteId, SiteSet, VarId};

/// Which sites host which variables. Fixed for the life of a configuration.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Placement {
    // Indexed by variable number - 1.
    hosts: Vec<SiteSet>,
}

impl Placement {
    pub fn new(config: &Config) -> Self {
        let all = SiteSet::first_n(config.sites);
        let hosts = (1..=config.variables)
            .map(VarId)
            .map(|v| {
                if v.is_replicated() {
                    all
                } else {
                    let home = 1 + v.0 % u32::from(config.sites);
                    // home <= sites <= u8::MAX
                    SiteSet::single(SiteId(home as u8))
                }
            })
            .collect();
        Placement { hosts }
    }

    pub fn sites_for(&self, var: VarId) -> Result<SiteSet> {
        (var.0 as usize)
            .checked_sub(1)
            .and_then(|i| self.hosts.get(i))
            .copied()
            .ok_or_else(|| err(format!("no such variable {var}")))
    }

    pub fn vars_at(&self, site: SiteId) -> impl Iterator<Item = VarId> + '_ {
        self.hosts
            .iter()
            .enumerate()
            .filter(move |(_, hosts)| hosts.contains(site))
            .map(|(i, _)| VarId(i as u32 + 1))
    }

    pub fn variables(&self) -> impl Iterator<Item = VarId> {
        (1..=self.hosts.len() as u32).map(VarId)
    }
}
