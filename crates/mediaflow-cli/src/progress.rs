//! Progress printer for the terminal.

use mediaflow_core::ports::ProgressObserver;

/// Writes one line per poll to stderr: `[  3] retry 1/2: in-progress`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrProgress;

impl ProgressObserver for StderrProgress {
    fn on_progress(&self, label: &str, attempt: u32) {
        eprintln!("[{attempt:>3}] {label}");
    }
}
