//! Integration tests for running commands to completion.

use vmagent_runner::{CmdError, CmdRunner, Command, ExecCmdRunner};

#[tokio::test]
async fn test_run_command() {
    let result = ExecCmdRunner::default()
        .run_command("echo", &["Hello World!"])
        .await;
    assert!(result.error.is_none(), "{:?}", result.error);
    assert_eq!(result.stdout, "Hello World!\n");
    assert_eq!(result.stderr, "");
    assert_eq!(result.exit_status, 0);
}

#[tokio::test]
async fn test_stdout_and_stderr_are_kept_apart() {
    let cmd = Command::new("bash").args(["-c", "echo stdout >&1; echo stderr >&2"]);
    let mut process = ExecCmdRunner::default()
        .run_complex_command_async(&cmd)
        .expect("launch");
    let result = process.wait().await.expect("result delivered");
    assert!(result.error.is_none(), "{:?}", result.error);
    assert_eq!(result.stdout, "stdout\n");
    assert_eq!(result.stderr, "stderr\n");
}

#[tokio::test]
async fn test_stderr_alone_is_not_a_failure() {
    let result = ExecCmdRunner::default()
        .run_command("bash", &["-c", "echo error-output >&2"])
        .await;
    assert!(result.error.is_none(), "{:?}", result.error);
    assert_eq!(result.stdout, "");
    assert!(result.stderr.contains("error-output"));
    assert_eq!(result.exit_status, 0);
}

#[tokio::test]
async fn test_exit_status_is_passed_through() {
    for code in [1, 10, 14, 255] {
        let script = format!("exit {code}");
        let result = ExecCmdRunner::default()
            .run_command("bash", &["-c", script.as_str()])
            .await;
        assert_eq!(result.exit_status, code);
        assert!(
            matches!(result.error, Some(CmdError::NonZeroExit { status, .. }) if status == code),
            "{:?}",
            result.error
        );
    }
}

#[tokio::test]
async fn test_error_message_names_command() {
    let result = ExecCmdRunner::default().run_command("false", &[]).await;
    assert_eq!(
        result.error.expect("false fails").to_string(),
        "Running command: 'false', stdout: '', stderr: '': exit status 1"
    );
}

#[tokio::test]
async fn test_command_not_found() {
    let result = ExecCmdRunner::default()
        .run_command("something that does not exist", &[])
        .await;
    assert_eq!(result.exit_status, -1);
    assert_eq!(result.stdout, "");
    assert_eq!(result.stderr, "");
    let err = result.error.expect("not found");
    assert!(err.to_string().contains("not found"), "{err}");
}

#[tokio::test]
async fn test_env_is_overlaid_on_inherited_env() {
    let cmd = Command::new("env").env("FOO", "BAR");
    let result = ExecCmdRunner::default().run_complex_command(&cmd).await;
    assert!(result.error.is_none(), "{:?}", result.error);
    assert!(result.stdout.contains("FOO=BAR"));
    assert!(result.stdout.contains("PATH="), "inherited variables stay");
}

#[tokio::test]
async fn test_working_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("marker.txt"), "").unwrap();
    let cmd = Command::new("ls").arg("-l").working_dir(dir.path());
    let result = ExecCmdRunner::default().run_complex_command(&cmd).await;
    assert!(result.error.is_none(), "{:?}", result.error);
    assert!(result.stdout.contains("marker.txt"));
    assert!(result.stdout.contains("total"));
}

#[tokio::test]
async fn test_run_command_with_input() {
    let result = ExecCmdRunner::default()
        .run_command_with_input("foo\nbar\nbaz", "grep", &["ba"])
        .await;
    assert!(result.error.is_none(), "{:?}", result.error);
    assert_eq!(result.stdout, "bar\nbaz\n");
    assert_eq!(result.stderr, "");
}

#[tokio::test]
async fn test_concurrent_invocations_do_not_interfere() {
    let runner = ExecCmdRunner::default();
    let (a, b, c) = tokio::join!(
        runner.run_command("bash", &["-c", "sleep 0.2; echo a"]),
        runner.run_command("bash", &["-c", "echo b; exit 3"]),
        runner.run_command("echo", &["c"]),
    );
    assert_eq!((a.stdout.as_str(), a.exit_status), ("a\n", 0));
    assert_eq!((b.stdout.as_str(), b.exit_status), ("b\n", 3));
    assert_eq!((c.stdout.as_str(), c.exit_status), ("c\n", 0));
}

#[test]
fn test_command_exists() {
    let runner = ExecCmdRunner::default();
    assert!(runner.command_exists("env"));
    assert!(!runner.command_exists("absolutely-does-not-exist-ever-please-unicorns"));
}
