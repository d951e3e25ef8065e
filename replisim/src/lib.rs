// A driver feeds a script to a coordinator one line at a time and hands
// everything the coordinator reports to a sink.
//
// Input is not assumed to be a file: the same driver serves a script on disk,
// a terminal session, or a string in a test. Several independent scripts can
// run through one driver by separating them with `clear()`.

use std::io::BufRead;

use replisim_base::Result;
use replisim_lang::{Line, Parser, Sink};
use replisim_txn::Coordinator;
use tracing::debug;


pub use replisim_txn::Config;

pub struct Driver {
    coord: Coordinator,
    parser: Parser,
}

impl Driver {
    pub fn new(config: Config) -> Result<Self> {
        Ok(Driver {
            coord: Coordinator::new(config)?,
            parser: Parser::new(config.sites, config.variables),
        })
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coord
    }

    /// Processes one line. Returns false when the script asked to stop.
    pub fn feed_line(&mut self, line: &str, sink: &mut dyn Sink) -> Result<bool> {
        match self.parser.parse_line(line)? {
            Line::Exit => Ok(false),
            Line::Comment => Ok(true),
            Line::Batch(batch) => {
                debug!(target: "replisim", clock = %self.coord.clock(), line, "line");
                self.coord.run_line(batch, sink)?;
                Ok(true)
            }
        }
    }

    pub fn run<R: BufRead>(&mut self, input: R, sink: &mut dyn Sink) -> Result<()> {
        for line in input.lines() {
            if !self.feed_line(&line?, sink)? {
                break;
            }
        }
        Ok(())
    }
}
