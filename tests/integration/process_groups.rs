//! Integration tests for terminating whole process groups.

use std::time::{Duration, Instant};

use vmagent_runner::{CmdError, CmdRunner, Command, ExecCmdRunner, ProcessState};

use crate::common::{assert_group_gone, assert_process_gone, extract_pid};

/// Gives a test script time to print its pids and install its traps.
const SCRIPT_STARTUP: Duration = Duration::from_secs(2);

const TRAPPING_SCRIPT: &str = r#"
exec 3>&1
function clean_up_parent {
	echo "Parent received SIGTERM"
	exit 13
}
function clean_up_child {
	echo "Child received SIGTERM" >&3
	exit 14
}
echo "parent_pid=$$"
trap clean_up_parent SIGTERM # Parent
echo $(
	echo "child_pid=$BASHPID" >&3
	trap clean_up_child SIGTERM # Child
	while true; do sleep 0.1; done
)
"#;

/// The leader dies on SIGTERM, a background child ignores it and outlives the leader.
const SURVIVOR_SCRIPT: &str = r#"
(trap "" TERM; echo "child_pid=$BASHPID"; exec sleep 20) &
echo "parent_pid=$$"
sleep 20
"#;

const IGNORING_SCRIPT: &str = r#"
exec 3>&1
function clean_up_noop { :; }
echo "parent_pid=$$"
trap clean_up_noop SIGTERM
echo $(
	echo "child_pid=$BASHPID" >&3
	trap clean_up_noop SIGTERM
	while true; do sleep 0.1; done
)
"#;

#[tokio::test]
async fn test_polite_signal_reaches_the_whole_group() {
    let cmd = Command::new("bash").args(["-c", TRAPPING_SCRIPT]);
    let mut process = ExecCmdRunner::default()
        .run_complex_command_async(&cmd)
        .expect("launch");
    tokio::time::sleep(SCRIPT_STARTUP).await;

    let pgid = process.pgid().expect("has a group");

    let waiter = process.wait();
    process
        .terminate_nicely(Duration::from_secs(60))
        .await
        .expect("terminated");
    assert_group_gone(pgid);
    let result = waiter.await.expect("result delivered");

    // The parent's own exit code, not a signal encoding.
    assert_eq!(result.exit_status, 13);
    assert!(result.error.is_some());
    assert!(result.stdout.contains("Parent received SIGTERM"), "{}", result.stdout);
    assert!(result.stdout.contains("Child received SIGTERM"), "{}", result.stdout);
    assert_process_gone(extract_pid(&result.stdout, "parent_pid")).await;
    assert_process_gone(extract_pid(&result.stdout, "child_pid")).await;
}

#[tokio::test]
async fn test_forceful_signal_after_timeout() {
    let cmd = Command::new("bash").args(["-c", IGNORING_SCRIPT]);
    let mut process = ExecCmdRunner::default()
        .run_complex_command_async(&cmd)
        .expect("launch");
    tokio::time::sleep(SCRIPT_STARTUP).await;

    let pgid = process.pgid().expect("has a group");

    let waiter = process.wait();
    process
        .terminate_nicely(Duration::from_secs(2))
        .await
        .expect("terminated");
    assert_group_gone(pgid);
    let result = waiter.await.expect("result delivered");

    assert_eq!(result.exit_status, 128 + 9);
    assert!(
        matches!(result.error, Some(CmdError::Signaled { .. })),
        "{:?}",
        result.error
    );
    // Output captured before the kill is still delivered.
    assert_process_gone(extract_pid(&result.stdout, "parent_pid")).await;
    assert_process_gone(extract_pid(&result.stdout, "child_pid")).await;
}

#[tokio::test]
async fn test_child_outliving_the_leader_is_killed() {
    let cmd = Command::new("bash").args(["-c", SURVIVOR_SCRIPT]);
    let mut process = ExecCmdRunner::default()
        .run_complex_command_async(&cmd)
        .expect("launch");
    tokio::time::sleep(SCRIPT_STARTUP).await;
    let pgid = process.pgid().expect("has a group");

    let waiter = process.wait();
    let grace = Duration::from_secs(1);
    let started = Instant::now();
    process.terminate_nicely(grace).await.expect("terminated");
    assert!(
        started.elapsed() >= grace,
        "returned after {:?}, before the grace period was over",
        started.elapsed()
    );
    assert_group_gone(pgid);

    let result = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("result delivered once the survivor is killed")
        .expect("result delivered");
    // The leader died on the polite signal, but the group needed the forceful one.
    assert_eq!(result.exit_status, 128 + 9);
    assert!(
        matches!(result.error, Some(CmdError::Signaled { .. })),
        "{:?}",
        result.error
    );
    assert_process_gone(extract_pid(&result.stdout, "child_pid")).await;
}

#[tokio::test]
async fn test_already_exited_group() {
    let cmd = Command::new("bash").args(["-c", "exit 0"]);
    let mut process = ExecCmdRunner::default()
        .run_complex_command_async(&cmd)
        .expect("launch");
    tokio::time::sleep(SCRIPT_STARTUP).await;
    assert_eq!(process.state(), ProcessState::Exited);

    let waiter = process.wait();
    process
        .terminate_nicely(Duration::from_secs(2))
        .await
        .expect("nothing left to terminate");
    let result = waiter.await.expect("result delivered");
    assert!(result.error.is_none(), "{:?}", result.error);
    assert_eq!(result.stdout, "");
    assert_eq!(result.stderr, "");
    assert_eq!(result.exit_status, 0);
}

#[tokio::test]
async fn test_terminate_while_another_task_waits() {
    let cmd = Command::new("sleep").arg("30");
    let mut process = ExecCmdRunner::default()
        .run_complex_command_async(&cmd)
        .expect("launch");
    let waiter = tokio::spawn(process.wait());

    process
        .terminate_nicely(Duration::from_secs(10))
        .await
        .expect("terminated");
    assert_group_gone(process.pgid().expect("has a group"));
    assert_eq!(process.state(), ProcessState::Exited);
    // A second request finds the group gone.
    process
        .terminate_nicely(Duration::from_secs(10))
        .await
        .expect("idempotent");

    let result = waiter.await.unwrap().expect("result delivered");
    assert_eq!(result.exit_status, 128 + 15);
}

#[tokio::test]
async fn test_launch_failure_still_has_a_handle() {
    let runner = ExecCmdRunner::default();
    let err = runner
        .run_complex_command_async(&Command::new("definitely-not-a-real-command-xyz"))
        .expect_err("missing executable");
    let mut process = err.into_process();
    assert_eq!(process.pgid(), None);
    process
        .terminate_nicely(Duration::from_secs(1))
        .await
        .expect("nothing to terminate");
    let result = process.wait().await.expect("result delivered");
    assert_eq!(result.exit_status, -1);
    assert!(result.error.is_some_and(|e| e.is_launch_failure()));
}
