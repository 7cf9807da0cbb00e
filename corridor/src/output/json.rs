use super::history::History;
use crate::railway::breakpoints::BreakpointTable;
use failure::Error;
use std::io;

/// The snapshot stream, one record per sampled instant.
pub fn json_snapshots<W: io::Write>(history: &History, f: &mut W) -> Result<(), Error> {
    serde_json::to_writer_pretty(&mut *f, &history.snapshots)?;
    writeln!(f)?;
    Ok(())
}

/// Per-train element events, outcomes and failures.
pub fn json_history<W: io::Write>(history: &History, f: &mut W) -> Result<(), Error> {
    serde_json::to_writer_pretty(&mut *f, history)?;
    writeln!(f)?;
    Ok(())
}

pub fn json_breakpoints<W: io::Write>(table: &BreakpointTable, f: &mut W) -> Result<(), Error> {
    serde_json::to_writer_pretty(&mut *f, table)?;
    writeln!(f)?;
    Ok(())
}
