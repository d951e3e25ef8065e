// Plain-text rendering of engine events, one report per line, flushed as it
// goes so interactive sessions see output as soon as a line is processed.

use std::io::Write;

use replisim_base::Result;
use replisim_lang::{Event, Sink, SiteRows};


pub struct TextSink<W: Write> {
    out: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W) -> Self {
        TextSink { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn site_rows(&mut self, rows: &SiteRows) -> Result<()> {
        for (var, value) in &rows.rows {
            writeln!(self.out, "{var}: {value}")?;
        }
        Ok(())
    }
}

impl<W: Write> Sink for TextSink<W> {
    fn emit(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Read { txn, var, value, site } => {
                writeln!(self.out, "{txn} reads {var} {value} at site {site}")?;
            }
            Event::Dump(sites) => {
                for rows in &sites {
                    writeln!(self.out, "Site: {}", rows.site)?;
                    self.site_rows(rows)?;
                }
            }
            Event::DumpSite(rows) => self.site_rows(&rows)?,
            Event::DumpVar { var, rows } => {
                for (site, value) in rows {
                    writeln!(self.out, "{var}: {value} at site {site}")?;
                }
            }
            Event::State {
                committed,
                aborted,
                running,
            } => {
                for (title, ids) in [
                    ("Transactions committed:", committed),
                    ("Transactions aborted:", aborted),
                    ("Transactions still running:", running),
                ] {
                    writeln!(self.out, "{title}")?;
                    for id in ids {
                        write!(self.out, "{id} ")?;
                    }
                    writeln!(self.out)?;
                }
            }
            Event::Diagnostic(msg) => writeln!(self.out, "{msg}")?,
        }
        self.out.flush()?;
        Ok(())
    }
}
