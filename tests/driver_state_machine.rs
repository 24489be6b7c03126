// tests/driver_state_machine.rs

use scatter_test_utils::builders::NodeBuilder;
use scatter_test_utils::fake_transport::{FakeCommand, ScriptedTransport};
use scatter_test_utils::{drain_events, init_tracing, outputs_of, statuses_of, with_timeout};

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use scatter::config::NodeDescriptor;
use scatter::engine::{ChannelSink, Fleet, FleetEvent, FleetOptions, RunResult};
use scatter::types::NodeStatus;

type TestResult = Result<(), Box<dyn Error>>;

fn no_logs() -> FleetOptions {
    FleetOptions {
        log_root: std::env::temp_dir(),
        source_path: None,
        enable_logging: false,
    }
}

async fn run_nodes(
    nodes: Vec<NodeDescriptor>,
    transport: ScriptedTransport,
) -> Result<(RunResult, Vec<FleetEvent>), Box<dyn Error>> {
    let (sink, mut rx) = ChannelSink::new();
    let fleet = Fleet::new(nodes, transport, Arc::new(sink), no_logs());
    let result = fleet.run(CancellationToken::new()).await?;
    drop(fleet);
    Ok((result, drain_events(&mut rx)))
}

#[tokio::test]
async fn stop_on_error_halts_at_first_failing_command() -> TestResult {
    with_timeout(async {
        init_tracing();

        let node = NodeBuilder::new("a")
            .commands(&["false-ish", "echo never"])
            .build();
        let transport = ScriptedTransport::new().on("a.test", "false-ish", FakeCommand::exit(2));
        let handle = transport.clone();

        let (result, events) = run_nodes(vec![node], transport).await?;

        let state = result.get("a").expect("node a in result");
        assert_eq!(state.status, NodeStatus::Failed);
        assert_eq!(state.error_message.as_deref(), Some("Command failed: false-ish"));
        assert_eq!(handle.launched_on("a.test"), vec!["false-ish".to_string()]);

        let lines = outputs_of(&events, "a");
        assert!(lines.contains(&"Command exited with status 2".to_string()));
        assert!(!lines.iter().any(|l| l.contains("echo never")));
        assert!(!lines.contains(&"All commands completed".to_string()));

        assert_eq!(
            statuses_of(&events, "a"),
            vec![NodeStatus::Connecting, NodeStatus::Running, NodeStatus::Failed]
        );
        Ok(())
    })
    .await
}

#[tokio::test]
async fn tolerated_failure_runs_every_command_and_succeeds() -> TestResult {
    with_timeout(async {
        init_tracing();

        let node = NodeBuilder::new("a")
            .commands(&["flaky", "echo after"])
            .stop_on_error(false)
            .build();
        let transport = ScriptedTransport::new().on("a.test", "flaky", FakeCommand::exit(1));
        let handle = transport.clone();

        let (result, events) = run_nodes(vec![node], transport).await?;

        let state = result.get("a").expect("node a in result");
        assert_eq!(state.status, NodeStatus::Success);
        assert_eq!(state.error_message, None);
        assert_eq!(handle.launched_on("a.test").len(), 2);

        let lines = outputs_of(&events, "a");
        let exit_line = lines
            .iter()
            .position(|l| l == "Command exited with status 1")
            .expect("exit status line");
        let second = lines.iter().position(|l| l == "$ echo after").expect("second command");
        assert!(exit_line < second);
        assert_eq!(lines.last().map(String::as_str), Some("All commands completed"));
        Ok(())
    })
    .await
}

#[tokio::test]
async fn unreachable_host_fails_without_running() -> TestResult {
    with_timeout(async {
        init_tracing();

        let node = NodeBuilder::new("down").command("uptime").build();
        let transport =
            ScriptedTransport::new().unreachable("down.test", "No route to host");
        let handle = transport.clone();

        let (result, events) = run_nodes(vec![node], transport).await?;

        let state = result.get("down").expect("node in result");
        assert_eq!(state.status, NodeStatus::Failed);
        assert_eq!(
            state.error_message.as_deref(),
            Some("Connection error: No route to host")
        );
        assert_eq!(
            statuses_of(&events, "down"),
            vec![NodeStatus::Connecting, NodeStatus::Failed]
        );

        let lines = outputs_of(&events, "down");
        assert_eq!(
            lines,
            vec![
                "Connecting to root@down.test:22...".to_string(),
                "ERROR: No route to host".to_string(),
            ]
        );
        assert!(handle.launched().is_empty());
        Ok(())
    })
    .await
}

#[tokio::test]
async fn slow_connect_is_bounded_by_node_timeout() -> TestResult {
    with_timeout(async {
        init_tracing();

        let node = NodeBuilder::new("slow")
            .command("uptime")
            .timeout(Duration::from_millis(50))
            .build();
        // Never notified: the connect attempt hangs.
        let transport = ScriptedTransport::new().connect_gate("slow.test", Arc::new(Notify::new()));

        let (result, events) = run_nodes(vec![node], transport).await?;

        let state = result.get("slow").expect("node in result");
        assert_eq!(state.status, NodeStatus::Failed);
        let message = state.error_message.as_deref().unwrap_or_default();
        assert!(message.starts_with("Connection error:"), "{message}");
        assert!(message.contains("timed out"), "{message}");
        assert!(!outputs_of(&events, "slow").contains(&"Connected successfully".to_string()));
        Ok(())
    })
    .await
}

#[tokio::test]
async fn working_directory_is_applied_to_every_command() -> TestResult {
    with_timeout(async {
        init_tracing();

        let node = NodeBuilder::new("a")
            .commands(&["make", "echo done"])
            .work_dir("/srv/app")
            .build();
        let transport = ScriptedTransport::new();
        let handle = transport.clone();

        let (result, events) = run_nodes(vec![node], transport).await?;

        assert_eq!(result.get("a").map(|s| s.status), Some(NodeStatus::Success));
        assert_eq!(
            handle.launched_on("a.test"),
            vec![
                "cd /srv/app && make".to_string(),
                "cd /srv/app && echo done".to_string(),
            ]
        );

        let lines = outputs_of(&events, "a");
        assert_eq!(lines[1], "Connected successfully");
        assert_eq!(lines[2], "Working directory: /srv/app");
        // The unwrapped command is what observers see.
        assert!(lines.contains(&"$ make".to_string()));
        assert!(lines.contains(&"done".to_string()));
        Ok(())
    })
    .await
}

#[tokio::test]
async fn stderr_lines_are_marked_and_streams_keep_their_order() -> TestResult {
    with_timeout(async {
        init_tracing();

        let node = NodeBuilder::new("a").command("build").build();
        let transport = ScriptedTransport::new().on(
            "a.test",
            "build",
            FakeCommand::ok()
                .stdout(&["step 1", "step 2", "step 3"])
                .stderr(&["warn 1", "warn 2"]),
        );

        let (result, _events) = run_nodes(vec![node], transport).await?;
        let lines = &result.get("a").expect("node in result").output_lines;

        let stdout: Vec<&str> = lines
            .iter()
            .filter(|l| l.starts_with("step"))
            .map(String::as_str)
            .collect();
        let stderr: Vec<&str> = lines
            .iter()
            .filter(|l| l.starts_with("STDERR: "))
            .map(String::as_str)
            .collect();

        assert_eq!(stdout, vec!["step 1", "step 2", "step 3"]);
        assert_eq!(stderr, vec!["STDERR: warn 1", "STDERR: warn 2"]);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn transport_faults_are_reported_as_command_errors() -> TestResult {
    with_timeout(async {
        init_tracing();

        let launch = NodeBuilder::new("launch").commands(&["deploy", "echo x"]).build();
        let stream = NodeBuilder::new("stream")
            .commands(&["tail", "echo y"])
            .stop_on_error(false)
            .build();
        let transport = ScriptedTransport::new()
            .on("launch.test", "deploy", FakeCommand::launch_error("channel open failed"))
            .on("stream.test", "tail", FakeCommand::stream_error("connection reset"));
        let handle = transport.clone();

        let (result, events) = run_nodes(vec![launch, stream], transport).await?;

        let launch_state = result.get("launch").expect("launch node");
        assert_eq!(launch_state.status, NodeStatus::Failed);
        assert_eq!(launch_state.error_message.as_deref(), Some("Command failed: deploy"));
        assert!(
            outputs_of(&events, "launch").contains(&"Command error: channel open failed".to_string())
        );

        // Tolerated like any other command failure.
        let stream_state = result.get("stream").expect("stream node");
        assert_eq!(stream_state.status, NodeStatus::Success);
        assert!(
            outputs_of(&events, "stream")
                .iter()
                .any(|l| l.starts_with("Command error:") && l.contains("connection reset"))
        );
        assert_eq!(handle.launched_on("stream.test").len(), 2);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn current_command_index_is_reported_live() -> TestResult {
    with_timeout(async {
        init_tracing();

        let node = NodeBuilder::new("a").commands(&["one", "two", "three"]).build();
        let (result, events) = run_nodes(vec![node], ScriptedTransport::new()).await?;

        let started: Vec<(usize, String)> = events
            .iter()
            .filter_map(|e| match e {
                FleetEvent::CommandStarted { index, command, .. } => {
                    Some((*index, command.clone()))
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            started,
            vec![
                (0, "one".to_string()),
                (1, "two".to_string()),
                (2, "three".to_string()),
            ]
        );

        let state = result.get("a").expect("node in result");
        assert_eq!(state.current_command_index, 2);
        assert_eq!(state.current_command.as_deref(), Some("three"));
        Ok(())
    })
    .await
}
