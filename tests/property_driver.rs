// tests/property_driver.rs

use std::sync::Arc;

use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

use scatter::engine::{ChannelSink, Fleet, FleetOptions};
use scatter::types::NodeStatus;
use scatter_test_utils::builders::NodeBuilder;
use scatter_test_utils::fake_transport::{FakeCommand, ScriptedTransport};
use scatter_test_utils::{drain_events, outputs_of, statuses_of};

/// Walks `statuses` from `Pending` and checks every step is an allowed edge.
fn is_valid_path(statuses: &[NodeStatus]) -> bool {
    let mut current = NodeStatus::Pending;
    for &next in statuses {
        if !current.can_transition_to(next) {
            return false;
        }
        current = next;
    }
    current.is_finished()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn attempts_and_status_path_follow_stop_on_error(
        exit_codes in proptest::collection::vec(prop_oneof![3 => Just(0i32), 1 => 1..=255i32], 1..8),
        stop_on_error in any::<bool>(),
        reachable in prop_oneof![4 => Just(true), 1 => Just(false)],
    ) {
        let commands: Vec<String> = (0..exit_codes.len()).map(|i| format!("cmd{i}")).collect();

        let mut transport = ScriptedTransport::new();
        for (cmd, code) in commands.iter().zip(&exit_codes) {
            transport = transport.on("p.test", cmd, FakeCommand::exit(*code));
        }
        if !reachable {
            transport = transport.unreachable("p.test", "connection refused");
        }
        let handle = transport.clone();

        let mut builder = NodeBuilder::new("p").stop_on_error(stop_on_error);
        for cmd in &commands {
            builder = builder.command(cmd);
        }

        let (sink, mut rx) = ChannelSink::new();
        let fleet = Fleet::new(
            vec![builder.build()],
            transport,
            Arc::new(sink),
            FleetOptions {
                log_root: std::env::temp_dir(),
                source_path: None,
                enable_logging: false,
            },
        );

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let result = rt.block_on(fleet.run(CancellationToken::new())).unwrap();
        drop(fleet);
        let events = drain_events(&mut rx);

        let statuses = statuses_of(&events, "p");
        prop_assert!(is_valid_path(&statuses), "invalid path {:?}", statuses);

        let state = result.get("p").unwrap();
        prop_assert_eq!(Some(&state.status), statuses.last());
        prop_assert_eq!(&state.output_lines, &outputs_of(&events, "p"));

        let attempted = handle.launched_on("p.test").len();
        let first_failure = exit_codes.iter().position(|c| *c != 0);

        if !reachable {
            prop_assert_eq!(attempted, 0);
            prop_assert_eq!(state.status, NodeStatus::Failed);
            prop_assert!(!statuses.contains(&NodeStatus::Running));
            prop_assert!(!state.output_lines.iter().any(|l| l == "Connected successfully"));
        } else if stop_on_error {
            match first_failure {
                Some(idx) => {
                    prop_assert_eq!(attempted, idx + 1);
                    prop_assert_eq!(state.status, NodeStatus::Failed);
                    let expected = format!("Command failed: cmd{idx}");
                    prop_assert_eq!(state.error_message.as_deref(), Some(expected.as_str()));
                }
                None => {
                    prop_assert_eq!(attempted, commands.len());
                    prop_assert_eq!(state.status, NodeStatus::Success);
                }
            }
        } else {
            prop_assert_eq!(attempted, commands.len());
            prop_assert_eq!(state.status, NodeStatus::Success);
        }
    }
}

#[test]
fn terminal_states_have_no_outgoing_edges() {
    use NodeStatus::*;
    let all = [Pending, Connecting, Running, Success, Failed, Cancelled];
    for from in [Success, Failed, Cancelled] {
        for to in all {
            assert!(!from.can_transition_to(to), "{from} -> {to}");
        }
    }
    assert!(!Pending.can_transition_to(Running));
    assert!(!Connecting.can_transition_to(Success));
    assert!(Success.is_terminal() && Failed.is_terminal());
    assert!(!Cancelled.is_terminal() && Cancelled.is_finished());
}
