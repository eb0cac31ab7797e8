//! Process memory and thread probes.
//!
//! On Linux these read `/proc`; elsewhere the numbers are unavailable and
//! only the calling thread is visible.

use std::backtrace::Backtrace;
use std::fmt::Write as _;

/// Memory figures in bytes. `None` when the platform does not expose them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemorySnapshot {
    /// Memory still available to the system.
    pub free: Option<u64>,
    /// Resident set size of this process.
    pub used: Option<u64>,
    /// Virtual size of this process.
    pub total: Option<u64>,
    /// Peak virtual size of this process.
    pub maximum: Option<u64>,
    /// Live threads in this process.
    pub threads: Option<u64>,
}

/// One live thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    pub id: u64,
    pub name: String,
    pub state: String,
}

/// Current memory figures.
#[cfg(target_os = "linux")]
pub fn memory() -> MemorySnapshot {
    let mut snap = MemorySnapshot::default();
    if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
        snap.used = status_kb(&status, "VmRSS:");
        snap.total = status_kb(&status, "VmSize:");
        snap.maximum = status_kb(&status, "VmPeak:");
        snap.threads = status_value(&status, "Threads:").and_then(|v| v.parse().ok());
    }
    if let Ok(meminfo) = std::fs::read_to_string("/proc/meminfo") {
        snap.free = status_kb(&meminfo, "MemAvailable:");
    }
    snap
}

/// Current memory figures.
#[cfg(not(target_os = "linux"))]
pub fn memory() -> MemorySnapshot {
    MemorySnapshot::default()
}

/// Every live thread, sorted by id.
pub fn threads() -> Vec<ThreadInfo> {
    #[cfg(target_os = "linux")]
    {
        let mut list: Vec<ThreadInfo> = std::fs::read_dir("/proc/self/task")
            .map(|entries| {
                entries
                    .flatten()
                    .filter_map(|e| e.file_name().to_str()?.parse::<u64>().ok())
                    .filter_map(linux_thread)
                    .collect()
            })
            .unwrap_or_default();
        if !list.is_empty() {
            list.sort_by_key(|t| t.id);
            return list;
        }
    }
    vec![current_thread_info()]
}

/// Id of the calling thread, as listed by [`threads`].
pub fn current_thread_id() -> u64 {
    #[cfg(target_os = "linux")]
    {
        // "/proc/thread-self" links to "<pid>/task/<tid>".
        if let Ok(link) = std::fs::read_link("/proc/thread-self")
            && let Some(tid) = link
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.parse().ok())
        {
            return tid;
        }
    }
    u64::from(std::process::id())
}

/// Detail report for one thread, or `None` if no such thread is alive.
///
/// The calling thread's report includes a captured backtrace.
pub fn thread_detail(id: u64) -> Option<String> {
    let info = threads().into_iter().find(|t| t.id == id)?;
    let mut out = format!("\"{}\" id={} state={}\n", info.name, info.id, info.state);
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string(format!("/proc/self/task/{id}/status")) {
            for key in [
                "State:",
                "VmStk:",
                "Cpus_allowed_list:",
                "voluntary_ctxt_switches:",
                "nonvoluntary_ctxt_switches:",
            ] {
                if let Some(v) = status_value(&status, key) {
                    let _ = writeln!(out, "    {key} {v}");
                }
            }
        }
        if let Ok(wchan) = std::fs::read_to_string(format!("/proc/self/task/{id}/wchan"))
            && !wchan.trim().is_empty()
            && wchan.trim() != "0"
        {
            let _ = writeln!(out, "    waiting in {}", wchan.trim());
        }
    }
    if id == current_thread_id() {
        let _ = writeln!(out, "{}", Backtrace::force_capture());
    }
    Some(out)
}

fn current_thread_info() -> ThreadInfo {
    let current = std::thread::current();
    ThreadInfo {
        id: current_thread_id(),
        name: current.name().unwrap_or("<unnamed>").to_string(),
        state: "running".to_string(),
    }
}

#[cfg(target_os = "linux")]
fn linux_thread(tid: u64) -> Option<ThreadInfo> {
    let comm = std::fs::read_to_string(format!("/proc/self/task/{tid}/comm")).ok()?;
    let stat = std::fs::read_to_string(format!("/proc/self/task/{tid}/stat")).ok()?;
    // The state letter follows the parenthesized command name.
    let state = stat
        .rsplit_once(')')
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .map(state_name)
        .unwrap_or("unknown");
    Some(ThreadInfo {
        id: tid,
        name: comm.trim().to_string(),
        state: state.to_string(),
    })
}

#[cfg(target_os = "linux")]
fn state_name(code: &str) -> &'static str {
    match code {
        "R" => "running",
        "S" => "sleeping",
        "D" => "waiting",
        "T" | "t" => "stopped",
        "Z" => "zombie",
        "X" => "dead",
        "I" => "idle",
        _ => "unknown",
    }
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn status_value<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    text.lines()
        .find_map(|line| line.strip_prefix(key))
        .map(str::trim)
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn status_kb(text: &str, key: &str) -> Option<u64> {
    let value = status_value(text, key)?;
    let kb: u64 = value.split_whitespace().next()?.parse().ok()?;
    Some(kb * 1024)
}

/// Human-readable byte count, e.g. `12.5 MB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Signed variant of [`format_bytes`].
pub fn format_delta(delta: i64) -> String {
    let sign = if delta < 0 { "-" } else { "" };
    format!("{sign}{}", format_bytes(delta.unsigned_abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing() {
        let text = "Name:\tx\nVmRSS:\t   2048 kB\nThreads:\t7\n";
        assert_eq!(status_kb(text, "VmRSS:"), Some(2048 * 1024));
        assert_eq!(status_value(text, "Threads:"), Some("7"));
        assert_eq!(status_kb(text, "VmSize:"), None);
    }

    #[test]
    fn bytes_formatting() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(10 * 1024 * 1024), "10.0 MB");
        assert_eq!(format_delta(-2048), "-2.0 KB");
        assert_eq!(format_delta(0), "0 B");
    }

    #[test]
    fn threads_include_caller() {
        let me = current_thread_id();
        let list = threads();
        assert!(list.iter().any(|t| t.id == me));
        assert!(list.windows(2).all(|w| w[0].id <= w[1].id));
    }

    #[test]
    fn detail_of_caller_names_it() {
        let me = current_thread_id();
        let detail = thread_detail(me).unwrap();
        assert!(detail.contains(&format!("id={me}")));
    }

    #[test]
    fn detail_of_missing_thread_is_none() {
        assert!(thread_detail(u64::MAX).is_none());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn linux_memory_is_reported() {
        let snap = memory();
        assert!(snap.used.is_some());
        assert!(snap.threads.unwrap_or(0) >= 1);
    }
}
