// crates/server/src/process.rs
//! Detection of the external transfer process.

use std::ffi::OsStr;

use sysinfo::{ProcessesToUpdate, System};

/// Whether a process with exactly this name is running.
///
/// Does synchronous system calls; call from `tokio::task::spawn_blocking`.
pub fn is_process_running(name: &str) -> bool {
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, true);

    let wanted = OsStr::new(name);
    sys.processes().values().any(|process| process.name() == wanted)
}
