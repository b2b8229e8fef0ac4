use std::io::{self, Write};

use serde::Serialize;

use crate::app::RunSummary;
use crate::domain::IngestOutcome;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        Self::write_summary(&mut stdout, summary)
    }

    pub fn write_summary<W: Write>(out: &mut W, summary: &RunSummary) -> io::Result<()> {
        writeln!(
            out,
            "cms-ingest summary ({}): {} ingested, {} skipped, {} failed of {} matching datasets",
            summary.theme,
            summary.ingested,
            summary.skipped,
            summary.failed,
            summary.items.len()
        )?;
        for item in &summary.items {
            let name = item
                .file_name
                .as_deref()
                .or(item.title.as_deref())
                .or(item.identifier.as_deref())
                .unwrap_or("<unknown>");
            match &item.outcome {
                IngestOutcome::Skipped => writeln!(out, "  skipped   {name}")?,
                IngestOutcome::Ingested { table, rows } => {
                    writeln!(out, "  ingested  {name} -> {table} ({rows} rows)")?
                }
                IngestOutcome::Failed { reason } => writeln!(out, "  failed    {name}: {reason}")?,
            }
        }
        Ok(())
    }
}
