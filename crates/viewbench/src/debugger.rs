//! Debugger detection.

use std::fs;

/// Answers whether an interactive debugger is attached to this process.
pub trait DebuggerProbe: Send + Sync {
    /// Whether a debugger is attached right now.
    fn is_attached(&self) -> bool;
}

/// Probe backed by the operating system.
///
/// On Linux a non-zero `TracerPid` in `/proc/self/status` means a tracer
/// (gdb, lldb, an IDE) is attached. Other platforms report `false`, so
/// unattended runs never take the suspension branch.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessDebugger;

impl DebuggerProbe for ProcessDebugger {
    fn is_attached(&self) -> bool {
        if !cfg!(target_os = "linux") {
            return false;
        }
        fs::read_to_string("/proc/self/status")
            .map(|status| tracer_pid(&status).is_some_and(|pid| pid != 0))
            .unwrap_or(false)
    }
}

/// Probe with a fixed answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDebugger(pub bool);

impl DebuggerProbe for FixedDebugger {
    fn is_attached(&self) -> bool {
        self.0
    }
}

fn tracer_pid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("TracerPid:"))
        .and_then(|value| value.trim().parse().ok())
}
