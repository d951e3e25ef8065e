// Errors here are deliberately coarse. Most of what goes "wrong" in a
// simulation run is not an error at all: operations on dead transactions are
// dropped, conflicts turn into waits or aborts, failed sites are just state.
// What remains is:
//
// 1. Script errors that leave a command with undefined meaning (fatal).
// 2. Broken invariants inside a component (a bug, also fatal).
// 3. Failures of the outside world, mostly I/O on input and report streams.
//
// Every error is logged through tracing at construction so there is a single
// place to hang a breakpoint or a log filter.

use std::borrow::Cow;
use backtrace_error::DynBacktraceError;
use tracing::error;

#[cfg(test)]
use test_log::test;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Script,
    Invariant,
    External,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    msg: String,
    #[allow(dead_code)]
    inner: DynBacktraceError,
}
pub type Result<T> = std::result::Result<T, Error>;

struct SimpleErr(Cow<'static, str>);
impl std::fmt::Debug for SimpleErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::fmt::Display for SimpleErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for SimpleErr {}

impl<E: std::error::Error + Send + Sync + 'static> From<E> for Error {
    fn from(err: E) -> Error {
        Error::new(ErrorKind::External, err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.msg)
    }
}

impl Error {
    pub fn new<E: std::error::Error + Send + Sync + 'static>(kind: ErrorKind, err: E) -> Error {
        error!(target: "replisim", ?kind, "{:?}", err);
        let msg = err.to_string();
        Error {
            kind,
            msg,
            inner: DynBacktraceError::from(err),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// An internal invariant did not hold.
pub fn err(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::new(ErrorKind::Invariant, SimpleErr(msg.into()))
}

/// The input script contained something that cannot be given a meaning.
pub fn script_err(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::new(ErrorKind::Script, SimpleErr(msg.into()))
}

#[test]
fn test_error_kinds() {
    let e = err("lock table corrupt");
    assert_eq!(e.kind(), ErrorKind::Invariant);
    assert_eq!(e.to_string(), "lock table corrupt");

    let e = script_err("Unexpected Read T1");
    assert_eq!(e.kind(), ErrorKind::Script);

    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
    let e: Error = io.into();
    assert_eq!(e.kind(), ErrorKind::External);
}
