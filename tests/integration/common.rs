//! Common utilities for integration tests.
//!
//! Helpers to drive the `vmagent` binary and to check what is left in the process table.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{kill, killpg};
use nix::unistd::Pid;
use regex::Regex;
use vmagent_runner::wait::poll_until;

pub fn get_agent_bin() -> &'static str {
    env!("CARGO_BIN_EXE_vmagent")
}

/// Runs the agent binary with `args` and a config file in `dir`, logging turned down.
pub fn run_agent(dir: &Path, config_toml: &str, args: &[&str]) -> Output {
    let config = dir.join("vmagent.toml");
    fs::write(&config, config_toml).expect("failed to write config");

    Command::new(get_agent_bin())
        .arg("--config")
        .arg(&config)
        .args(args)
        .env("VMAGENT_INTEGRATION_TEST", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run vmagent")
}

/// Finds `<key>=<pid>` in the output of a test script.
pub fn extract_pid(output: &str, key: &str) -> i32 {
    let re = Regex::new(&format!(r"{key}=(\d+)")).unwrap();
    let caps = re
        .captures(output)
        .unwrap_or_else(|| panic!("Failed to find {key} in '{output}'"));
    caps[1].parse().unwrap()
}

/// A pid counts as gone once it is not in the process table or only a zombie awaiting
/// its (re-)parent.
fn is_gone(pid: i32) -> bool {
    match kill(Pid::from_raw(pid), None) {
        Err(Errno::ESRCH) => true,
        _ => fs::read_to_string(format!("/proc/{pid}/stat"))
            .ok()
            .and_then(|stat| {
                stat.rfind(')')
                    .and_then(|end| stat[end + 1..].split_whitespace().next().map(str::to_owned))
            })
            .is_some_and(|state| state == "Z"),
    }
}

/// Waits a little for `pid` to disappear; orphans are reaped by init asynchronously.
pub async fn assert_process_gone(pid: i32) {
    let gone = poll_until(Duration::from_secs(2), Duration::from_millis(20), || async move {
        is_gone(pid).then_some(())
    })
    .await;
    assert!(gone.is_ok(), "process {pid} is still running");
}

/// Checks, without waiting, that no process is left in group `pgid`.
pub fn assert_group_gone(pgid: u32) {
    let raw = i32::try_from(pgid).unwrap();
    assert_eq!(
        killpg(Pid::from_raw(raw), None),
        Err(Errno::ESRCH),
        "process group {pgid} still has members"
    );
}
