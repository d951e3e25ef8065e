// The script language is a flat sequence of lines, each a `;`-separated batch
// of instructions such as `begin(T1); W(T1,x2,30); R(T2,x3)`. This crate owns
// the boundary on both sides of the engine: the decoded `Command`s going in,
// and the `Event`s coming out to whatever renders them.

use replisim_base::{Result, SiteId, TxnId, Value, VarId};
use serde::{Deserialize, Serialize};

mod parse;


pub use parse::{Instruction, Line, Parser};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum TxnKind {
    ReadOnly,
    ReadWrite,
}

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Command {
    Begin { txn: TxnId, kind: TxnKind },
    End(TxnId),
    Fail(SiteId),
    Recover(SiteId),
    Read { txn: TxnId, var: VarId },
    Write { txn: TxnId, var: VarId, value: Value },
    Dump,
    DumpSite(SiteId),
    DumpVar(VarId),
    QueryState,
    Restart,
}

/// The committed contents of one site, ascending by variable.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SiteRows {
    pub site: SiteId,
    pub rows: Vec<(VarId, Value)>,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Event {
    Read {
        txn: TxnId,
        var: VarId,
        value: Value,
        site: SiteId,
    },
    Dump(Vec<SiteRows>),
    DumpSite(SiteRows),
    DumpVar {
        var: VarId,
        rows: Vec<(SiteId, Value)>,
    },
    State {
        committed: Vec<TxnId>,
        aborted: Vec<TxnId>,
        running: Vec<TxnId>,
    },
    Diagnostic(String),
}

/// Receives everything the engine reports. Implementations decide on
/// rendering; the engine only guarantees ordering.
pub trait Sink {
    fn emit(&mut self, event: Event) -> Result<()>;
}

impl Sink for Vec<Event> {
    fn emit(&mut self, event: Event) -> Result<()> {
        self.push(event);
        Ok(())
    }
}
