//! Runtime inspection commands: memory, thread, jobs.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use jetty_types::error::{ConsoleError, Result};

use crate::command::Command;
use crate::discovery::CommandCatalog;
use crate::jobs::JobTable;
use crate::process::Process;
use crate::runtime::{self, MemorySnapshot, ThreadInfo};
use crate::wildcard;

pub(crate) fn register_system_commands(catalog: &mut CommandCatalog) {
    catalog
        .contribute("memory", |deps| {
            Ok(Arc::new(MemoryCmd {
                jobs: deps.get()?,
            }))
        })
        .contribute("thread", |_| Ok(Arc::new(ThreadCmd)))
        .contribute("jobs", |deps| {
            Ok(Arc::new(JobsCmd {
                jobs: deps.get()?,
            }))
        });
}

fn usage(cmd: &dyn Command) -> ConsoleError {
    ConsoleError::argument(format!("Usage: {}", cmd.format()))
}

fn or_na(value: Option<u64>) -> String {
    value.map_or_else(|| "n/a".to_string(), runtime::format_bytes)
}

// ---------------------------------------------------------------------------
// memory
// ---------------------------------------------------------------------------

struct MemoryCmd {
    jobs: Arc<JobTable>,
}

impl MemoryCmd {
    fn print_stats(out: &mut impl Write, snap: &MemorySnapshot) -> std::io::Result<()> {
        writeln!(out, "Free Memory:    {}", or_na(snap.free))?;
        writeln!(out, "Used Memory:    {}", or_na(snap.used))?;
        writeln!(out, "Total Memory:   {}", or_na(snap.total))?;
        writeln!(out, "Maximum Memory: {}", or_na(snap.maximum))?;
        match snap.threads {
            Some(n) => writeln!(out, "Threads:        {n}"),
            None => writeln!(out, "Threads:        n/a"),
        }
    }
}

impl Command for MemoryCmd {
    fn names(&self) -> &[&'static str] {
        &["memory", "mem"]
    }
    fn format(&self) -> &str {
        "memory [gc]"
    }
    fn description(&self) -> &str {
        "Show memory usage"
    }
    fn help(&self) -> &[&'static str] {
        &[
            "With gc, first releases the resources of finished background jobs",
            "and reports how long that took and how much memory it saved.",
        ]
    }
    fn ordinal(&self) -> i32 {
        100
    }
    fn execute(&self, process: &mut Process) -> Result<i32> {
        let gc = process.args().consume_flag("gc");
        if !process.args().is_empty() {
            return Err(usage(self));
        }

        let out = process.out();
        if gc {
            let before = runtime::memory();
            write!(out, "Performing GC...")?;
            out.flush()?;
            let started = Instant::now();
            let reaped = self.jobs.reap();
            let elapsed = started.elapsed();
            let after = runtime::memory();
            writeln!(out, " [{:.3} s]", elapsed.as_secs_f64())?;
            log::debug!("GC reclaimed {reaped} finished jobs");

            let saved = match (before.used, after.used) {
                (Some(b), Some(a)) => runtime::format_delta(b as i64 - a as i64),
                _ => "n/a".to_string(),
            };
            writeln!(out, "Saved Memory: {saved}")?;
            Self::print_stats(out, &after)?;
        } else {
            Self::print_stats(out, &runtime::memory())?;
        }
        Ok(0)
    }
}

// ---------------------------------------------------------------------------
// thread
// ---------------------------------------------------------------------------

struct ThreadCmd;

impl ThreadCmd {
    fn print_table(out: &mut impl Write, threads: &[ThreadInfo]) -> std::io::Result<()> {
        let id_w = threads
            .iter()
            .map(|t| t.id.to_string().len())
            .max()
            .unwrap_or(0)
            .max(2);
        let name_w = threads
            .iter()
            .map(|t| t.name.len())
            .max()
            .unwrap_or(0)
            .max(4);
        writeln!(out, "{:>id_w$}  {:name_w$}  STATE", "ID", "NAME")?;
        for t in threads {
            writeln!(out, "{:>id_w$}  {:name_w$}  {}", t.id, t.name, t.state)?;
        }
        Ok(())
    }
}

impl Command for ThreadCmd {
    fn names(&self) -> &[&'static str] {
        &["thread", "threads"]
    }
    fn format(&self) -> &str {
        "thread {id...}"
    }
    fn description(&self) -> &str {
        "List threads, or show details of some"
    }
    fn help(&self) -> &[&'static str] {
        &[
            "Without arguments, lists every live thread by id.",
            "Each id may be a pattern with * and ? wildcards.",
        ]
    }
    fn ordinal(&self) -> i32 {
        110
    }
    fn execute(&self, process: &mut Process) -> Result<i32> {
        let patterns = process.args().consume_strings();
        let threads = runtime::threads();

        if patterns.is_empty() {
            Self::print_table(process.out(), &threads)?;
            return Ok(0);
        }

        let mut selected: Vec<u64> = Vec::new();
        for pattern in &patterns {
            let hits: Vec<u64> = threads
                .iter()
                .filter(|t| wildcard::matches(pattern, &t.id.to_string()))
                .map(|t| t.id)
                .collect();
            if hits.is_empty() {
                return Err(ConsoleError::argument(format!(
                    "Invalid thread ID: {pattern}"
                )));
            }
            selected.extend(hits);
        }
        selected.sort_unstable();
        selected.dedup();

        let out = process.out();
        for id in selected {
            // The thread may have ended since the listing.
            if let Some(detail) = runtime::thread_detail(id) {
                writeln!(out, "{detail}")?;
            }
        }
        Ok(0)
    }
}

// ---------------------------------------------------------------------------
// jobs
// ---------------------------------------------------------------------------

struct JobsCmd {
    jobs: Arc<JobTable>,
}

impl Command for JobsCmd {
    fn names(&self) -> &[&'static str] {
        &["jobs"]
    }
    fn format(&self) -> &str {
        "jobs"
    }
    fn description(&self) -> &str {
        "List background jobs"
    }
    fn ordinal(&self) -> i32 {
        120
    }
    fn execute(&self, process: &mut Process) -> Result<i32> {
        if !process.args().is_empty() {
            return Err(usage(self));
        }
        let jobs = self.jobs.list();
        let out = process.out();
        if jobs.is_empty() {
            writeln!(out, "No background jobs")?;
        }
        for job in jobs {
            let state = if job.finished { "Done" } else { "Running" };
            writeln!(out, "[{}] {state:<8} {}", job.id, job.description)?;
        }
        Ok(0)
    }
}
