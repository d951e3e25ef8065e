// The transaction system is a single coordinator in front of a fixed set of
// independently-failing sites, using the "available copies" approach to
// replication:
//
//  - Unreplicated (odd) variables live at exactly one site. Replicated (even)
//    variables live at every site.
//
//  - A read-write transaction reads from the first Up site that can give it a
//    committed value, and writes to every Up site hosting the variable. Down
//    sites are simply skipped; they catch up by being written again after
//    they recover.
//
//  - A read-only transaction takes no locks and reads the snapshot as of its
//    start time from whatever site still has it.
//
// Conflicts are resolved by wait-die: a transaction asking for something
// held by an older transaction dies, one asking for something held only by
// younger transactions waits. Nobody is ever pre-empted; the holder always
// keeps what it has. Since waits only ever point from older to younger,
// there are no wait cycles and no deadlock detection is needed.
//
// "Waiting" is not a blocked thread. The operation goes into a retry queue,
// and whenever a commit or abort changes the lock picture, the whole queue is
// re-run, repeatedly, until a pass changes nothing more. Everything happens
// on one thread, one script line at a time.
//
// A site failure aborts every still-running transaction that touched the
// site since its last failure: any of them may have read or written state
// that is now gone.

use replisim_base::{err, Result, Timestamp, TxnId, Value, VarId};
use replisim_lang::TxnKind;
use serde::{Deserialize, Serialize};

mod coordinator;
mod placement;
mod queue;


pub use coordinator::Coordinator;
pub use placement::Placement;
pub use queue::RetryQueue;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Config {
    // Number of sites, numbered 1..=sites.
    pub sites: u8,
    // Number of variables, numbered 1..=variables; xN starts out as 10*N.
    pub variables: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sites: 10,
            variables: 20,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.sites == 0 {
            return Err(err("at least one site is required"));
        }
        if self.variables == 0 {
            return Err(err("at least one variable is required"));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum TxnState {
    Active,
    Committed,
    Aborted,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxnId,
    pub kind: TxnKind,
    // Snapshot horizon for read-only transactions, priority for wait-die.
    // Smaller is older is stronger.
    pub start: Timestamp,
    pub state: TxnState,
}

impl Transaction {
    pub fn is_active(&self) -> bool {
        self.state == TxnState::Active
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum OpKind {
    Read,
    Write(Value),
}

/// A read or write as issued, kept verbatim if it has to be retried.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Operation {
    pub txn: TxnId,
    pub var: VarId,
    // Clock at issue; retries keep it.
    pub time: Timestamp,
    pub kind: OpKind,
}
