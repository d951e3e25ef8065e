use crate::{Command, TxnKind};
use replisim_base::{script_err, Result, SiteId, TxnId, Value, VarId};
use tracing::debug;

/// One instruction of a batch: either something to run, or a diagnostic to
/// report in its place.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Instruction {
    Run(Command),
    Unexpected(String),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Line {
    /// `//`-prefixed; does not consume a clock tick.
    Comment,
    /// Stop reading input.
    Exit,
    Batch(Vec<Instruction>),
}

/// Decodes script lines into commands, checking site and variable numbers
/// against the configured universe.
#[derive(Clone, Copy, Debug)]
pub struct Parser {
    sites: u8,
    variables: u32,
}

impl Parser {
    pub fn new(sites: u8, variables: u32) -> Self {
        Parser { sites, variables }
    }

    /// Errors only on instructions whose arity leaves them meaningless;
    /// everything else malformed comes back as `Instruction::Unexpected`.
    pub fn parse_line(&self, line: &str) -> Result<Line> {
        if line.starts_with("//") {
            return Ok(Line::Comment);
        }
        if line.contains("exit") {
            return Ok(Line::Exit);
        }
        let squeezed: String = line.chars().filter(|c| !c.is_whitespace()).collect();
        let mut batch = Vec::new();
        for insn in squeezed.split(';').filter(|s| !s.is_empty()) {
            let (open, close) = match (insn.find('('), insn.find(')')) {
                (Some(open), Some(close)) if open < close => (open, close),
                _ => {
                    // The rest of the line can't be trusted to be aligned.
                    batch.push(Instruction::Unexpected(format!("Unexpected: {insn}")));
                    break;
                }
            };
            let token = &insn[..open];
            let arg = &insn[open + 1..close];
            match self.parse_insn(token, arg)? {
                Some(cmd) => batch.push(Instruction::Run(cmd)),
                None => {
                    debug!(target: "replisim", insn, "unparseable instruction");
                    batch.push(Instruction::Unexpected(format!("Unexpected input: {insn}")))
                }
            }
        }
        Ok(Line::Batch(batch))
    }

    fn parse_insn(&self, token: &str, arg: &str) -> Result<Option<Command>> {
        let cmd = match token {
            "begin" => self.txn(arg).map(|txn| Command::Begin {
                txn,
                kind: TxnKind::ReadWrite,
            }),
            "beginRO" => self.txn(arg).map(|txn| Command::Begin {
                txn,
                kind: TxnKind::ReadOnly,
            }),
            "end" => self.txn(arg).map(Command::End),
            "fail" => self.site(arg).map(Command::Fail),
            "recover" => self.site(arg).map(Command::Recover),
            "R" => {
                let args: Vec<&str> = arg.split(',').collect();
                if args.len() != 2 {
                    return Err(script_err(format!("Unexpected Read {arg}")));
                }
                match (self.txn(args[0]), self.var(args[1])) {
                    (Some(txn), Some(var)) => Some(Command::Read { txn, var }),
                    _ => None,
                }
            }
            "W" => {
                let args: Vec<&str> = arg.split(',').collect();
                if args.len() != 3 {
                    return Err(script_err(format!("Unexpected Write {arg}")));
                }
                match (self.txn(args[0]), self.var(args[1]), args[2].parse::<Value>().ok()) {
                    (Some(txn), Some(var), Some(value)) => Some(Command::Write { txn, var, value }),
                    _ => None,
                }
            }
            "dump" if arg.is_empty() => Some(Command::Dump),
            "dump" if arg.starts_with('x') => self.var(arg).map(Command::DumpVar),
            "dump" => self.site(arg).map(Command::DumpSite),
            "querystate" => arg.is_empty().then_some(Command::QueryState),
            "clear" | "restart" => arg.is_empty().then_some(Command::Restart),
            _ => None,
        };
        Ok(cmd)
    }

    fn txn(&self, s: &str) -> Option<TxnId> {
        s.strip_prefix('T')?.parse().ok().map(TxnId)
    }

    fn var(&self, s: &str) -> Option<VarId> {
        let n: u32 = s.strip_prefix('x')?.parse().ok()?;
        (1..=self.variables).contains(&n).then_some(VarId(n))
    }

    fn site(&self, s: &str) -> Option<SiteId> {
        let n: u8 = s.parse().ok()?;
        (1..=self.sites).contains(&n).then_some(SiteId(n))
    }
}
