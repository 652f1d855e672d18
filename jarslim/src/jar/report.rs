use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use anyhow::Context;
use tracing::warn;

/// What happened to one input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Mapped(String),
    Include,
    Skipped,
}

/// Plain text log of a run: one line per input file, then the class graph
/// tree walked by the assembler.
///
/// Buffered. Whatever was written is flushed when the report is dropped, so
/// a failed run still leaves the lines leading up to the failure behind.
pub struct AnalysisReport<W: Write> {
    out: W,
}

impl AnalysisReport<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create analysis report {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> AnalysisReport<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn entry(&mut self, entry_path: &str, verdict: &Verdict) -> io::Result<()> {
        match verdict {
            Verdict::Mapped(output_name) => {
                writeln!(self.out, "{entry_path}: mapped class name: {output_name}")
            }
            Verdict::Include => writeln!(self.out, "{entry_path}: include"),
            Verdict::Skipped => writeln!(self.out, "{entry_path}: skipped"),
        }
    }

    pub fn begin_class_graph(&mut self) -> io::Result<()> {
        write!(self.out, "\nCLASS GRAPH\n\n")
    }

    pub fn tree_line(&mut self, depth: usize, name: &str, included: bool) -> io::Result<()> {
        for _ in 0..depth {
            self.out.write_all(b"  ")?;
        }
        if included {
            writeln!(self.out, "- {name}")
        } else {
            writeln!(self.out, "- {name} (not included)")
        }
    }

    pub fn finish(mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl<W: Write> Drop for AnalysisReport<W> {
    fn drop(&mut self) {
        if let Err(err) = self.out.flush() {
            warn!("Failed to flush analysis report: {}", err);
        }
    }
}
