// A site is one independently-failing storage unit. It keeps a multiversion
// history per hosted variable and the lock state for transactions currently
// touching it:
//
//  - A pending write is an exclusive hold: at most one live transaction can
//    have an uncommitted value for a variable at a site.
//
//  - A read mark is a shared hold, taken by read-write transactions when they
//    read a committed value, and honored until the transaction ends.
//
// Read-only transactions take no holds. They read the newest version
// committed at or before their start time, which is why the history is kept
// for as long as any of them is running.
//
// Failure loses everything uncommitted. Recovery brings the site back, but
// its copies of replicated variables may have missed writes committed
// elsewhere in the meantime, so those are not readable here until something
// commits a fresh value for them at this site. Unreplicated variables live
// nowhere else and are readable immediately.
//
// A read-only transaction can still use an old version of a replicated
// variable here, but only if the site stayed up from that version's commit
// through the reader's start. Otherwise a newer version may have committed
// elsewhere inside that window.

use std::collections::{BTreeMap, BTreeSet};

use replisim_base::{err, Result, SiteId, Timestamp, TxnId, Value, VarId};
use replisim_lang::TxnKind;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[cfg(test)]
mod test;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Version {
    pub value: Value,
    pub commit_time: Timestamp,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ReadOutcome {
    Found(Version),
    /// Another live transaction holds an uncommitted write.
    Conflict(TxnId),
    /// Nothing readable here for this transaction; try another copy.
    Unavailable,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Status {
    Up,
    Down,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SiteStore {
    index: SiteId,
    status: Status,
    // Ordered by non-decreasing commit time; never empty for a hosted var.
    versions: BTreeMap<VarId, Vec<Version>>,
    pending: BTreeMap<VarId, (TxnId, Value)>,
    read_marks: BTreeMap<VarId, BTreeSet<TxnId>>,
    accessed: BTreeSet<TxnId>,
    last_recover: Option<Timestamp>,
    // Every time this site went down, ascending.
    failures: Vec<Timestamp>,
    unreadable: BTreeSet<VarId>,
}

impl SiteStore {
    /// A fresh, Up site holding the initial value of every variable in `vars`.
    pub fn new(index: SiteId, vars: impl IntoIterator<Item = VarId>) -> Self {
        let versions = vars
            .into_iter()
            .map(|v| {
                let genesis = Version {
                    value: v.initial_value(),
                    commit_time: Timestamp::GENESIS,
                };
                (v, vec![genesis])
            })
            .collect();
        SiteStore {
            index,
            status: Status::Up,
            versions,
            pending: BTreeMap::new(),
            read_marks: BTreeMap::new(),
            accessed: BTreeSet::new(),
            last_recover: None,
            failures: Vec::new(),
            unreadable: BTreeSet::new(),
        }
    }

    pub fn index(&self) -> SiteId {
        self.index
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_up(&self) -> bool {
        self.status == Status::Up
    }

    pub fn hosts(&self, var: VarId) -> bool {
        self.versions.contains_key(&var)
    }

    pub fn last_recover_time(&self) -> Option<Timestamp> {
        self.last_recover
    }

    pub fn is_readable(&self, var: VarId) -> bool {
        self.hosts(var) && !self.unreadable.contains(&var)
    }

    /// True if the site went down at some point in `(from, to]`.
    pub fn failed_between(&self, from: Timestamp, to: Timestamp) -> bool {
        self.failures.iter().any(|f| from < *f && *f <= to)
    }

    pub fn pending_writer(&self, var: VarId) -> Option<TxnId> {
        self.pending.get(&var).map(|(txn, _)| *txn)
    }

    /// True if `txn` holds any pending write or read mark here.
    pub fn involves(&self, txn: TxnId) -> bool {
        self.pending.values().any(|(t, _)| *t == txn)
            || self.read_marks.values().any(|marks| marks.contains(&txn))
    }

    pub fn is_writable(&self, txn: TxnId, var: VarId) -> bool {
        let writer_ok = match self.pending.get(&var) {
            None => true,
            Some((holder, _)) => *holder == txn,
        };
        let readers_ok = match self.read_marks.get(&var) {
            None => true,
            Some(marks) => marks.iter().all(|t| *t == txn),
        };
        writer_ok && readers_ok
    }

    /// Every other transaction holding `var` here, by write or read.
    pub fn conflicting_transactions(&self, txn: TxnId, var: VarId) -> BTreeSet<TxnId> {
        let mut out = BTreeSet::new();
        if let Some((holder, _)) = self.pending.get(&var) {
            out.insert(*holder);
        }
        if let Some(marks) = self.read_marks.get(&var) {
            out.extend(marks.iter().copied());
        }
        out.remove(&txn);
        out
    }

    pub fn write(&mut self, txn: TxnId, var: VarId, value: Value) -> Result<()> {
        self.check_access(var)?;
        if !self.is_writable(txn, var) {
            return Err(err(format!(
                "site {}: {txn} wrote {var} while it was held by another transaction",
                self.index
            )));
        }
        debug!(target: "replisim", site = %self.index, %txn, %var, value, "pending write");
        self.pending.insert(var, (txn, value));
        self.accessed.insert(txn);
        Ok(())
    }

    pub fn read(&mut self, txn: TxnId, kind: TxnKind, start: Timestamp, var: VarId) -> Result<ReadOutcome> {
        self.check_access(var)?;
        if kind == TxnKind::ReadWrite {
            if let Some((holder, _)) = self.pending.get(&var) {
                if *holder != txn {
                    return Ok(ReadOutcome::Conflict(*holder));
                }
            }
        }
        let history = self.versions.get(&var).map(Vec::as_slice).unwrap_or(&[]);
        let found = match kind {
            TxnKind::ReadOnly => history.iter().rev().find(|v| v.commit_time <= start).copied(),
            TxnKind::ReadWrite if self.unreadable.contains(&var) => None,
            TxnKind::ReadWrite => history.last().copied(),
        };
        let Some(version) = found else {
            return Ok(ReadOutcome::Unavailable);
        };
        if kind == TxnKind::ReadOnly && var.is_replicated() && self.failed_between(version.commit_time, start) {
            debug!(target: "replisim", site = %self.index, %txn, %var, version = %version.commit_time, %start,
                   "snapshot not continuously held here");
            return Ok(ReadOutcome::Unavailable);
        }
        if kind == TxnKind::ReadWrite {
            self.read_marks.entry(var).or_default().insert(txn);
            self.accessed.insert(txn);
        }
        Ok(ReadOutcome::Found(version))
    }

    /// Installs `txn`'s pending writes as versions at `time` and drops its
    /// read marks.
    pub fn commit(&mut self, txn: TxnId, time: Timestamp) {
        let owned: Vec<VarId> = self
            .pending
            .iter()
            .filter(|(_, (t, _))| *t == txn)
            .map(|(v, _)| *v)
            .collect();
        for var in owned {
            if let Some((_, value)) = self.pending.remove(&var) {
                debug!(target: "replisim", site = %self.index, %txn, %var, value, "commit");
                self.versions.entry(var).or_default().push(Version {
                    value,
                    commit_time: time,
                });
                self.unreadable.remove(&var);
            }
        }
        self.release_read_marks(txn);
    }

    pub fn abort(&mut self, txn: TxnId) {
        self.pending.retain(|_, (t, _)| *t != txn);
        self.release_read_marks(txn);
    }

    pub fn fail(&mut self, time: Timestamp) {
        info!(target: "replisim", site = %self.index, %time, "site failed");
        if self.is_up() {
            self.failures.push(time);
        }
        self.status = Status::Down;
        self.pending.clear();
        self.read_marks.clear();
        self.accessed.clear();
    }

    pub fn recover(&mut self, time: Timestamp) {
        if self.is_up() {
            debug!(target: "replisim", site = %self.index, "recover of a running site ignored");
            return;
        }
        info!(target: "replisim", site = %self.index, %time, "site recovered");
        self.status = Status::Up;
        self.last_recover = Some(time);
        self.unreadable = self.versions.keys().copied().filter(|v| v.is_replicated()).collect();
    }

    pub fn accessed_transactions(&self) -> &BTreeSet<TxnId> {
        &self.accessed
    }

    /// Latest committed value of every hosted variable; empty while Down.
    pub fn data_map(&self) -> BTreeMap<VarId, Value> {
        if !self.is_up() {
            return BTreeMap::new();
        }
        self.versions
            .iter()
            .filter_map(|(var, history)| history.last().map(|v| (*var, v.value)))
            .collect()
    }

    pub fn dump(&self, var: VarId) -> Option<Value> {
        if !self.is_up() {
            return None;
        }
        self.versions.get(&var)?.last().map(|v| v.value)
    }

    pub fn version_count(&self, var: VarId) -> usize {
        self.versions.get(&var).map_or(0, Vec::len)
    }

    pub fn clear_old_versions(&mut self) {
        for history in self.versions.values_mut() {
            let keep = history.len().saturating_sub(1);
            history.drain(..keep);
        }
    }

    fn release_read_marks(&mut self, txn: TxnId) {
        for marks in self.read_marks.values_mut() {
            marks.remove(&txn);
        }
        self.read_marks.retain(|_, marks| !marks.is_empty());
    }

    fn check_access(&self, var: VarId) -> Result<()> {
        if !self.is_up() {
            return Err(err(format!("site {} accessed while down", self.index)));
        }
        if !self.hosts(var) {
            return Err(err(format!("site {} does not host {var}", self.index)));
        }
        Ok(())
    }
}
