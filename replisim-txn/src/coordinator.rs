use std::collections::{BTreeMap, BTreeSet};

use crate::{Config, OpKind, Operation, Placement, RetryQueue, Transaction, TxnState};
use replisim_base::{err, Result, SiteId, Timestamp, TxnId, Value, VarId};
use replisim_lang::{Command, Event, Instruction, Sink, SiteRows, TxnKind};
use replisim_site::{ReadOutcome, SiteStore};
use tracing::{debug, info, warn};

/// Owns every transaction, every site, the retry queue and the clock.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Coordinator {
    config: Config,
    clock: Timestamp,
    placement: Placement,
    // Indexed by site number - 1.
    sites: Vec<SiteStore>,
    txns: BTreeMap<TxnId, Transaction>,
    queue: RetryQueue,
    // Set by every commit and abort; consumed by the retry fixed point.
    churned: bool,
    // Set by restart; the line that restarted does not tick.
    restarted: bool,
}

impl Coordinator {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let placement = Placement::new(&config);
        let sites = Self::baseline_sites(&config, &placement);
        Ok(Coordinator {
            config,
            clock: Timestamp::GENESIS.next(),
            placement,
            sites,
            txns: BTreeMap::new(),
            queue: RetryQueue::new(),
            churned: false,
            restarted: false,
        })
    }

    fn baseline_sites(config: &Config, placement: &Placement) -> Vec<SiteStore> {
        (1..=config.sites)
            .map(SiteId)
            .map(|s| SiteStore::new(s, placement.vars_at(s)))
            .collect()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn clock(&self) -> Timestamp {
        self.clock
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    pub fn sites(&self) -> impl Iterator<Item = &SiteStore> {
        self.sites.iter()
    }

    pub fn site(&self, site: SiteId) -> Result<&SiteStore> {
        (site.0 as usize)
            .checked_sub(1)
            .and_then(|i| self.sites.get(i))
            .ok_or_else(|| err(format!("no such site {site}")))
    }

    fn site_mut(&mut self, site: SiteId) -> Result<&mut SiteStore> {
        (site.0 as usize)
            .checked_sub(1)
            .and_then(|i| self.sites.get_mut(i))
            .ok_or_else(|| err(format!("no such site {site}")))
    }

    pub fn transaction(&self, txn: TxnId) -> Option<&Transaction> {
        self.txns.get(&txn)
    }

    pub fn queue(&self) -> &RetryQueue {
        &self.queue
    }

    /// Runs one script line: every instruction in order, then the retry
    /// fixed point, then one clock tick. A line that restarts is the first
    /// line of the new run and is not followed by a tick.
    pub fn run_line(&mut self, batch: Vec<Instruction>, sink: &mut dyn Sink) -> Result<()> {
        self.churned = false;
        self.restarted = false;
        for insn in batch {
            match insn {
                Instruction::Run(cmd) => self.dispatch(cmd, sink)?,
                Instruction::Unexpected(msg) => sink.emit(Event::Diagnostic(msg))?,
            }
        }
        self.settle(sink)?;
        if !std::mem::take(&mut self.restarted) {
            self.tick();
        }
        Ok(())
    }

    pub fn tick(&mut self) {
        self.clock = self.clock.next();
    }

    pub fn dispatch(&mut self, cmd: Command, sink: &mut dyn Sink) -> Result<()> {
        match cmd {
            Command::Begin { txn, kind } => self.begin(txn, kind),
            Command::End(txn) => self.end(txn),
            Command::Fail(site) => self.fail(site)?,
            Command::Recover(site) => self.recover(site)?,
            Command::Read { txn, var } => self.execute(
                Operation {
                    txn,
                    var,
                    time: self.clock,
                    kind: OpKind::Read,
                },
                sink,
            )?,
            Command::Write { txn, var, value } => self.execute(
                Operation {
                    txn,
                    var,
                    time: self.clock,
                    kind: OpKind::Write(value),
                },
                sink,
            )?,
            Command::Dump => self.dump(sink)?,
            Command::DumpSite(site) => self.dump_site(site, sink)?,
            Command::DumpVar(var) => self.dump_var(var, sink)?,
            Command::QueryState => self.query_state(sink)?,
            Command::Restart => self.restart(),
        }
        Ok(())
    }

    /// Re-runs the retry queue until a whole pass causes no commit or abort.
    pub fn settle(&mut self, sink: &mut dyn Sink) -> Result<()> {
        while std::mem::take(&mut self.churned) {
            let pass = self.queue.take_pass();
            debug!(target: "replisim", ops = pass.len(), "retry pass");
            for op in pass {
                self.execute(op, sink)?;
            }
        }
        Ok(())
    }

    pub fn execute(&mut self, op: Operation, sink: &mut dyn Sink) -> Result<()> {
        match op.kind {
            OpKind::Read => self.read(op, sink),
            OpKind::Write(value) => self.write(op, value),
        }
    }

    pub fn begin(&mut self, txn: TxnId, kind: TxnKind) {
        if self.txns.contains_key(&txn) {
            debug!(target: "replisim", %txn, "already known, begin ignored");
            return;
        }
        info!(target: "replisim", %txn, ?kind, start = %self.clock, "begin");
        self.txns.insert(
            txn,
            Transaction {
                id: txn,
                kind,
                start: self.clock,
                state: TxnState::Active,
            },
        );
    }

    pub fn end(&mut self, txn: TxnId) {
        let Some(t) = self.txns.get(&txn).copied() else {
            warn!(target: "replisim", %txn, "end of unknown transaction");
            return;
        };
        if !t.is_active() {
            debug!(target: "replisim", %txn, state = ?t.state, "end of finished transaction");
            return;
        }
        let now = self.clock;
        for site in self.sites.iter_mut().filter(|s| s.is_up() && s.involves(txn)) {
            site.commit(txn, now);
        }
        self.set_state(txn, TxnState::Committed);
        info!(target: "replisim", %txn, at = %now, "commit");
        if t.kind == TxnKind::ReadOnly && !self.has_running_read_only() {
            debug!(target: "replisim", "no read-only transactions left, dropping old versions");
            for site in self.sites.iter_mut() {
                site.clear_old_versions();
            }
        }
    }

    pub fn abort(&mut self, txn: TxnId) {
        match self.txns.get(&txn) {
            Some(t) if t.is_active() => (),
            _ => return,
        }
        for site in self.sites.iter_mut().filter(|s| s.is_up()) {
            site.abort(txn);
        }
        self.set_state(txn, TxnState::Aborted);
        info!(target: "replisim", %txn, "abort");
    }

    fn set_state(&mut self, txn: TxnId, state: TxnState) {
        if let Some(t) = self.txns.get_mut(&txn) {
            t.state = state;
            self.churned = true;
        }
    }

    pub fn has_running_read_only(&self) -> bool {
        self.txns
            .values()
            .any(|t| t.kind == TxnKind::ReadOnly && t.is_active())
    }

    // Unknown and finished transactions issue nothing.
    fn live(&self, txn: TxnId) -> Option<Transaction> {
        match self.txns.get(&txn) {
            Some(t) if t.is_active() => Some(*t),
            Some(_) => None,
            None => {
                warn!(target: "replisim", %txn, "operation from unknown transaction dropped");
                None
            }
        }
    }

    fn start_of(&self, txn: TxnId) -> Result<Timestamp> {
        self.txns
            .get(&txn)
            .map(|t| t.start)
            .ok_or_else(|| err(format!("lock held by unknown transaction {txn}")))
    }

    fn read(&mut self, op: Operation, sink: &mut dyn Sink) -> Result<()> {
        let Some(t) = self.live(op.txn) else {
            return Ok(());
        };
        let hosts = self.placement.sites_for(op.var)?;
        for site in hosts.iter() {
            let store = self.site_mut(site)?;
            if !store.is_up() {
                continue;
            }
            match store.read(t.id, t.kind, t.start, op.var)? {
                ReadOutcome::Found(version) => {
                    debug!(target: "replisim", txn = %t.id, var = %op.var, %site, at = %version.commit_time, "read");
                    return sink.emit(Event::Read {
                        txn: t.id,
                        var: op.var,
                        value: version.value,
                        site,
                    });
                }
                ReadOutcome::Conflict(holder) => {
                    let held_since = self.start_of(holder)?;
                    self.wait_or_die(t, op, held_since);
                    return Ok(());
                }
                ReadOutcome::Unavailable => (),
            }
        }
        debug!(target: "replisim", txn = %t.id, var = %op.var, issued = %op.time, "no readable copy, queued");
        self.queue.push(op);
        Ok(())
    }

    fn write(&mut self, op: Operation, value: Value) -> Result<()> {
        let Some(t) = self.live(op.txn) else {
            return Ok(());
        };
        if t.kind == TxnKind::ReadOnly {
            warn!(target: "replisim", txn = %t.id, var = %op.var, "write from read-only transaction dropped");
            return Ok(());
        }
        let hosts = self.placement.sites_for(op.var)?;
        let mut up = Vec::new();
        let mut blockers = BTreeSet::new();
        for site in hosts.iter() {
            let store = self.site(site)?;
            if !store.is_up() {
                continue;
            }
            up.push(site);
            if !store.is_writable(t.id, op.var) {
                blockers.extend(store.conflicting_transactions(t.id, op.var));
            }
        }
        if up.is_empty() {
            debug!(target: "replisim", txn = %t.id, var = %op.var, issued = %op.time, "every host is down, queued");
            self.queue.push(op);
            return Ok(());
        }
        if blockers.is_empty() {
            for site in up {
                self.site_mut(site)?.write(t.id, op.var, value)?;
            }
            return Ok(());
        }
        // Compare against the oldest holder at any site.
        let starts = blockers
            .iter()
            .map(|b| self.start_of(*b))
            .collect::<Result<Vec<_>>>()?;
        let oldest = starts.into_iter().min().ok_or_else(|| err("empty blocker set"))?;
        self.wait_or_die(t, op, oldest);
        Ok(())
    }

    // Older (strictly smaller start) waits; anything else dies.
    fn wait_or_die(&mut self, t: Transaction, op: Operation, held_since: Timestamp) {
        if t.start < held_since {
            debug!(target: "replisim", txn = %t.id, var = %op.var, issued = %op.time, %held_since, "wait");
            self.queue.push(op);
        } else {
            info!(target: "replisim", txn = %t.id, var = %op.var, issued = %op.time, %held_since, "die");
            self.abort(t.id);
        }
    }

    pub fn fail(&mut self, site: SiteId) -> Result<()> {
        let victims: Vec<TxnId> = self.site(site)?.accessed_transactions().iter().copied().collect();
        for txn in victims {
            self.abort(txn);
        }
        let now = self.clock;
        self.site_mut(site)?.fail(now);
        Ok(())
    }

    pub fn recover(&mut self, site: SiteId) -> Result<()> {
        let now = self.clock;
        self.site_mut(site)?.recover(now);
        Ok(())
    }

    pub fn restart(&mut self) {
        info!(target: "replisim", "restart");
        self.sites = Self::baseline_sites(&self.config, &self.placement);
        self.txns.clear();
        self.queue.clear();
        self.churned = false;
        self.restarted = true;
        self.clock = Timestamp::GENESIS.next();
    }

    fn site_rows(store: &SiteStore) -> SiteRows {
        SiteRows {
            site: store.index(),
            rows: store.data_map().into_iter().collect(),
        }
    }

    pub fn dump(&self, sink: &mut dyn Sink) -> Result<()> {
        sink.emit(Event::Dump(self.sites.iter().map(Self::site_rows).collect()))
    }

    pub fn dump_site(&self, site: SiteId, sink: &mut dyn Sink) -> Result<()> {
        sink.emit(Event::DumpSite(Self::site_rows(self.site(site)?)))
    }

    pub fn dump_var(&self, var: VarId, sink: &mut dyn Sink) -> Result<()> {
        let mut rows = Vec::new();
        for site in self.placement.sites_for(var)?.iter() {
            if let Some(value) = self.site(site)?.dump(var) {
                rows.push((site, value));
            }
        }
        sink.emit(Event::DumpVar { var, rows })
    }

    pub fn query_state(&self, sink: &mut dyn Sink) -> Result<()> {
        let of = |state: TxnState| -> Vec<TxnId> {
            self.txns
                .values()
                .filter(|t| t.state == state)
                .map(|t| t.id)
                .collect()
        };
        sink.emit(Event::State {
            committed: of(TxnState::Committed),
            aborted: of(TxnState::Aborted),
            running: of(TxnState::Active),
        })
    }
}
