//! Integration tests for the `vmagent` binary.

use std::path::Path;
use std::process::Command;

use nix::sys::signal::Signal;

use crate::common::{get_agent_bin, run_agent};

fn root_config(root: &Path) -> String {
    format!(
        r#"
        [paths]
        root = "{}"
        "#,
        root.display()
    )
}

#[test]
fn test_agent_binary_runs() {
    let status = Command::new(get_agent_bin())
        .arg("--help")
        .status()
        .expect("failed to run vmagent");
    assert!(status.success());
}

#[test]
fn test_run_relays_output_and_status() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_agent(dir.path(), "", &["run", "--", "echo", "Hello World!"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Hello World!\n");

    let output = run_agent(
        dir.path(),
        "",
        &["run", "--", "bash", "-c", "echo oops >&2; exit 7"],
    );
    assert_eq!(output.status.code(), Some(7));
    assert!(String::from_utf8_lossy(&output.stderr).contains("oops"));
}

#[test]
fn test_run_with_env_cwd_and_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let cwd = dir.path().to_str().unwrap();
    let output = run_agent(
        dir.path(),
        "",
        &[
            "run",
            "--env",
            "FOO=BAR",
            "--cwd",
            cwd,
            "--stdin",
            "piped",
            "--",
            "bash",
            "-c",
            "echo $FOO; pwd; cat",
        ],
    );
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let canonical = dir.path().canonicalize().unwrap();
    assert_eq!(stdout, format!("BAR\n{}\npiped", canonical.display()));
}

#[test]
fn test_run_unknown_command_exits_255() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_agent(dir.path(), "", &["run", "--", "definitely-not-a-real-command-xyz"]);
    assert_eq!(output.status.code(), Some(255));
}

#[test]
fn test_run_terminate_after() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_agent(
        dir.path(),
        "",
        &["run", "--terminate-after", "1", "--grace", "5", "--", "sleep", "30"],
    );
    assert_eq!(output.status.code(), Some(128 + 15));
}

#[test]
fn test_run_uses_configured_signals() {
    let dir = tempfile::tempdir().unwrap();
    let config = r#"
        [termination]
        polite_signal = "SIGUSR1"
        forceful_signal = "SIGKILL"
    "#;
    let output = run_agent(
        dir.path(),
        config,
        &["run", "--terminate-after", "1", "--grace", "5", "--", "sleep", "30"],
    );
    assert_eq!(
        output.status.code(),
        Some(128 + Signal::SIGUSR1 as i32)
    );
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_agent(
        dir.path(),
        "[termination]\npolite_signal = \"SIGNOPE\"\n",
        &["command-exists", "env"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Loading config"));
}

#[test]
fn test_command_exists() {
    let dir = tempfile::tempdir().unwrap();
    assert!(run_agent(dir.path(), "", &["command-exists", "env"]).status.success());
    assert!(
        !run_agent(
            dir.path(),
            "",
            &["command-exists", "absolutely-does-not-exist-ever-please-unicorns"]
        )
        .status
        .success()
    );
}

#[test]
fn test_platform_monit_user_and_ntp_info() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");
    let config = root_config(&root);

    let output = run_agent(dir.path(), &config, &["platform", "setup-monit-user"]);
    assert!(output.status.success(), "{output:?}");
    let output = run_agent(dir.path(), &config, &["platform", "monit-credentials"]);
    assert!(output.status.success(), "{output:?}");
    assert_eq!(String::from_utf8_lossy(&output.stdout), "vcap\n");
    assert!(root.join("var/vcap/monit/monit.user").is_file());

    let output = run_agent(dir.path(), &config, &["platform", "ntp-info"]);
    assert!(output.status.success(), "{output:?}");
    assert_eq!(String::from_utf8_lossy(&output.stdout), "file missing\n");
}
