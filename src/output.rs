use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink, RunReport};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(result: &RunReport) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn print_summary(result: &RunReport) -> io::Result<()> {
        let mut stderr = io::stderr();
        let total: u128 = result.actions.iter().map(|action| action.elapsed_ms).sum();
        let verb = if result.dry_run { "planned" } else { "completed" };
        writeln!(
            stderr,
            "task {} {verb}: {} action(s) in {:.1}s",
            result.task,
            result.actions.len(),
            total as f64 / 1000.0
        )?;
        if result.dry_run {
            for action in &result.actions {
                writeln!(stderr, "  {}", action.action)?;
                for item in &action.items {
                    writeln!(stderr, "    {item}")?;
                }
            }
        }
        Ok(())
    }
}

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        let line = match event.elapsed {
            Some(elapsed) => format!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => event.message,
        };
        let _ = writeln!(io::stderr(), "{line}");
    }
}
