use serde::{Deserialize, Serialize};
use std::fmt;

/// Values stored in variables. The simulator only deals in integers.
pub type Value = i64;

// Transaction ids come from the script (`T3` is `TxnId(3)`) and are never
// reused within a run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct TxnId(pub u32);

// Sites are numbered from 1.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct SiteId(pub u8);

// Variables are numbered from 1; `x4` is `VarId(4)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct VarId(pub u32);

// A Timestamp is a tick of the logical clock, which advances once per script
// line. Tick 0 is reserved for the initial database contents.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const GENESIS: Timestamp = Timestamp(0);

    pub fn next(self) -> Timestamp {
        Timestamp(self.0 + 1)
    }
}

impl VarId {
    /// Even-numbered variables are copied to every site.
    pub fn is_replicated(self) -> bool {
        self.0 % 2 == 0
    }

    pub fn initial_value(self) -> Value {
        10 * Value::from(self.0)
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}
