use crate::bring_up::core::{Outcome, Shutdown};
use crate::bring_up::tests::fixture::Fixture;
use crate::device_shell::impl_fake::FakeAttempt as Attempt;
use crate::device_shell::interface::CTRL_C;

const FIRST_KILL: &str = "killall 'sample_vi_fd'";

#[test]
fn test_ready_on_first_attempt_captures_every_tick() {
    let f = Fixture::new(vec![Attempt::ready()]);

    let outcome = f.bring_up().run();

    assert_eq!(
        outcome,
        Outcome::Captured {
            succeeded: 4,
            total: 4,
            shutdown: Shutdown::Confirmed
        }
    );
    assert_eq!(f.board().get().launches, 1);
    assert_eq!(f.board().get().count_commands(FIRST_KILL), 1);
    assert!(f.logger.contains("Stream is up (rtsp:// seen)"));
    assert!(f.logger.contains("Capture finished: 4/4 frames saved"));
}

#[test]
fn test_ready_on_nth_attempt_takes_n_cleanups() {
    let cases = vec![
        vec![Attempt::ready()],
        vec![Attempt::failed(), Attempt::ready()],
        vec![Attempt::failed(), Attempt::crashed(), Attempt::ready()],
        vec![
            Attempt::crashed(),
            Attempt::failed(),
            Attempt::crashed(),
            Attempt::ready(),
        ],
    ];

    for attempts in cases {
        let n = attempts.len();
        let f = Fixture::new(attempts);

        let outcome = f.bring_up().run();

        assert!(outcome.is_success(), "{} attempts: {:?}", n, outcome);
        let board = f.board();
        let board = board.get();
        assert_eq!(board.launches as usize, n);
        assert_eq!(board.count_commands(FIRST_KILL), n);
    }
}

#[test]
fn test_exit_without_marker_counts_as_failed_attempt() {
    let f = Fixture::new(vec![Attempt::crashed(), Attempt::ready()]);

    let outcome = f.bring_up().run();

    assert!(outcome.is_success());
    assert_eq!(f.board().get().launches, 2);
    assert!(f
        .logger
        .contains("Vendor program exited before the stream came up"));
}

#[test]
fn test_exhausted_attempts_never_capture() {
    let f = Fixture::new(vec![
        Attempt::failed(),
        Attempt::crashed(),
        Attempt::failed(),
        Attempt::failed(),
        Attempt::crashed(),
    ]);

    let outcome = f.bring_up().run();

    assert_eq!(outcome, Outcome::BringUpFailed { attempts: 5 });
    assert!(f.frame_grabber.calls().is_empty());
    assert!(f
        .device_display
        .history()
        .iter()
        .all(|[first, _]| !first.starts_with("Capturing")));
    assert!(f
        .logger
        .contains("recommend a full reboot of the board"));

    let board = f.board();
    let board = board.get();
    assert_eq!(board.launches, 5);
    assert!(!board.is_running("sample_vi_fd"));
    assert_eq!(board.sessions_closed, 1);
}

#[test]
fn test_frame_failures_do_not_shorten_the_window() {
    let f = Fixture::new(vec![Attempt::ready()]).with_frame_outcomes(vec![false, true, false, false]);

    let outcome = f.bring_up().run();

    assert_eq!(
        outcome,
        Outcome::Captured {
            succeeded: 1,
            total: 4,
            shutdown: Shutdown::Confirmed
        }
    );
    assert_eq!(f.frame_grabber.calls().len(), 4);
    assert!(f.logger.contains("Frame 1/4 failed"));
}

#[test]
fn test_frames_land_in_output_dir_with_sequence_suffix() {
    let f = Fixture::new(vec![Attempt::ready()]);

    f.bring_up().run();

    let calls = f.frame_grabber.calls();
    assert!(calls.iter().all(|p| p.starts_with(f.output_dir.path())));
    assert!(calls[0].to_string_lossy().ends_with("_001.jpg"));
    assert!(calls[3].to_string_lossy().ends_with("_004.jpg"));
}

#[test]
fn test_honored_interrupt_leaves_no_process() {
    let f = Fixture::new(vec![Attempt::ready()]);

    let outcome = f.bring_up().run();

    assert!(outcome.is_success());
    let board = f.board();
    let board = board.get();
    assert_eq!(board.signals, vec![CTRL_C]);
    assert!(!board.is_running("sample_vi_fd"));
    assert_eq!(board.count_commands("kill -9"), 0);
}

#[test]
fn test_ignored_interrupt_is_force_killed() {
    let f = Fixture::with_shell(vec![Attempt::ready()], |shell| shell.ignoring_interrupt());

    let outcome = f.bring_up().run();

    assert!(outcome.is_success());
    let board = f.board();
    let board = board.get();
    assert_eq!(board.signals, vec![CTRL_C]);
    assert!(!board.is_running("sample_vi_fd"));
    assert_eq!(board.count_commands("kill -9 400"), 1);
    assert!(f.logger.contains("Force killing sample_vi_fd (400)"));
}

#[test]
fn test_nothing_to_kill_is_not_an_abort() {
    let f = Fixture::new(vec![Attempt::ready()]);

    let outcome = f.bring_up().run();

    assert!(outcome.is_success());
    // Every escalation step on the clean board exits 1
    assert_eq!(f.board().get().count_commands("pkill -9 -f '[s]ample_vi_fd'"), 1);
}

#[test]
fn test_failing_cleanup_commands_are_not_an_abort() {
    let f = Fixture::with_shell(vec![Attempt::failed(), Attempt::ready()], |shell| {
        shell.failing_commands("pkill")
    });

    let outcome = f.bring_up().run();

    assert!(outcome.is_success());
    assert!(f.logger.contains("injected failure"));
}

#[test]
fn test_stale_process_is_cleaned_before_first_launch() {
    let f = Fixture::with_shell(vec![Attempt::ready()], |shell| {
        shell.with_stale_process("./sample_vi_fd -c rtsp2web.json")
    });

    let outcome = f.bring_up().run();

    assert!(outcome.is_success());
    let board = f.board();
    let board = board.get();
    assert!(!board.is_running("rtsp2web.json"));
    assert!(!board.is_running("sample_vi_fd"));
}

#[test]
fn test_unreachable_board_aborts_before_launch() {
    let f = Fixture::with_shell(vec![Attempt::ready()], |shell| shell.unreachable());

    let outcome = f.bring_up().run();

    assert!(matches!(outcome, Outcome::ConnectionFailed { .. }));
    let board = f.board();
    let board = board.get();
    assert_eq!(board.launches, 0);
    assert!(board.commands.is_empty());
    assert!(f.logger.contains("Cannot reach the board"));
}

#[test]
fn test_missing_script_aborts_before_launch() {
    let f = Fixture::with_shell(vec![Attempt::ready()], |shell| shell.without_script());

    let outcome = f.bring_up().run();

    assert_eq!(
        outcome,
        Outcome::ScriptMissing {
            path: "/mnt/system/usr/bin/camera-test.sh".to_string()
        }
    );
    let board = f.board();
    let board = board.get();
    assert_eq!(board.launches, 0);
    assert_eq!(board.sessions_closed, 1);
}

#[test]
fn test_session_is_closed_after_capture() {
    let f = Fixture::new(vec![Attempt::failed(), Attempt::ready()]);

    f.bring_up().run();

    let board = f.board();
    let board = board.get();
    assert_eq!(board.sessions_opened, 1);
    assert_eq!(board.sessions_closed, 1);
}

#[test]
fn test_display_ends_on_outcome() {
    let f = Fixture::new(vec![Attempt::ready()]);

    f.bring_up().run();

    let history = f.device_display.history();
    assert_eq!(
        history.first(),
        Some(&["Connecting...".to_string(), "192.168.42.1".to_string()])
    );
    assert_eq!(
        history.last(),
        Some(&["Done".to_string(), "Saved 4/4".to_string()])
    );
}

#[test]
fn test_unkillable_stale_process_blocks_every_launch() {
    let f = Fixture::with_shell(vec![Attempt::ready()], |shell| {
        shell
            .with_stale_process("sample_vi_fd")
            .failing_commands("kill")
    });

    let outcome = f.bring_up().run();

    assert_eq!(outcome, Outcome::BringUpFailed { attempts: 5 });
    let board = f.board();
    let board = board.get();
    assert_eq!(board.launches, 0);
    assert!(board.is_running("sample_vi_fd"));
    assert_eq!(board.sessions_closed, 1);
    assert!(f.logger.contains("Processes survived cleanup, not launching: [400]"));
}

#[test]
fn test_unreadable_process_list_blocks_launch() {
    let f = Fixture::with_shell(vec![Attempt::ready()], |shell| {
        shell
            .with_stale_process("sample_vi_fd")
            .failing_commands("ps ")
    });

    let outcome = f.bring_up().run();

    assert_eq!(outcome, Outcome::BringUpFailed { attempts: 5 });
    assert_eq!(f.board().get().launches, 0);
    assert!(!f.logger.contains("No stale camera processes left"));
    assert!(f.logger.contains("Cannot confirm sample_vi_fd is gone"));
}

#[test]
fn test_stale_process_killed_by_name_then_launches() {
    let f = Fixture::with_shell(vec![Attempt::ready()], |shell| {
        shell
            .with_stale_process("sample_vi_fd")
            .failing_commands("kill -9")
            .failing_commands("pkill")
    });

    let outcome = f.bring_up().run();

    // killall takes the stale process down before the list is read
    assert!(outcome.is_success());
    assert_eq!(f.board().get().launches, 1);
}

#[test]
fn test_process_surviving_shutdown_is_reported() {
    let f = Fixture::with_shell(vec![Attempt::ready()], |shell| {
        shell.ignoring_interrupt().failing_commands("kill")
    });

    let outcome = f.bring_up().run();

    assert_eq!(
        outcome,
        Outcome::Captured {
            succeeded: 4,
            total: 4,
            shutdown: Shutdown::Leftover(vec![400])
        }
    );
    assert!(!outcome.is_success());
    let board = f.board();
    let board = board.get();
    assert_eq!(board.count_commands("kill -9 400"), 3);
    assert_eq!(board.sessions_closed, 1);
    assert!(f.logger.contains("sample_vi_fd is still running as [400]"));
    assert_eq!(
        f.device_display.history().last(),
        Some(&["Stop unconfirmed".to_string(), "Saved 4/4".to_string()])
    );
}
