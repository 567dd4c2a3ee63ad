// tests/supervisor_lifecycle.rs
#![cfg(unix)]

mod common;
use crate::common::builders::sh_unit;
use crate::common::{init_tracing, with_timeout, MemorySink};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use fleetrun::discovery::UnitDescriptor;
use fleetrun::exec::ExitOutcome;
use fleetrun::policy::RestartPolicy;
use fleetrun::supervisor::{RunReport, ShutdownHandle, Supervisor, UnitEvent, OUTPUT_DRAIN_GRACE};
use fleetrun::types::RestartMode;

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

struct Harness {
    handle: ShutdownHandle,
    events: mpsc::UnboundedReceiver<UnitEvent>,
    sink: MemorySink,
    run: tokio::task::JoinHandle<RunReport>,
}

fn start(units: Vec<UnitDescriptor>, policy: RestartPolicy, stop_timeout: Duration) -> Harness {
    let sink = MemorySink::new();
    let (tx, events) = mpsc::unbounded_channel();
    let supervisor = Supervisor::new(units, policy, stop_timeout)
        .with_sink(Arc::new(sink.clone()))
        .with_events(tx);
    let handle = supervisor.shutdown_handle();
    let run = tokio::spawn(supervisor.run());
    Harness {
        handle,
        events,
        sink,
        run,
    }
}

/// Receive events until `pred` matches, returning everything seen.
async fn events_until(
    rx: &mut mpsc::UnboundedReceiver<UnitEvent>,
    mut pred: impl FnMut(&UnitEvent) -> bool,
) -> Vec<UnitEvent> {
    let mut seen = Vec::new();
    while let Some(event) = rx.recv().await {
        let done = pred(&event);
        seen.push(event);
        if done {
            break;
        }
    }
    seen
}

fn count_launches(events: &[UnitEvent], unit: &str) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, UnitEvent::Launched { unit: u, .. } if u == unit))
        .count()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn zero_units_finishes_immediately() {
    init_tracing();

    let supervisor = Supervisor::new(Vec::new(), RestartPolicy::disabled(), STOP_TIMEOUT);
    let report = with_timeout(supervisor.run()).await;

    assert!(report.units.is_empty());
    assert!(report.shutdown.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn restart_disabled_units_finish_after_one_run() {
    init_tracing();

    let units = vec![
        sh_unit("ok", "echo hello from ok"),
        sh_unit("bad", "echo failing; exit 7"),
    ];
    let mut h = start(units, RestartPolicy::disabled(), STOP_TIMEOUT);

    let report = with_timeout(h.run).await.unwrap();

    assert!(report.shutdown.is_none());
    let by_name: HashMap<_, _> = report
        .units
        .iter()
        .map(|u| (u.unit.as_str(), u))
        .collect();
    assert_eq!(by_name["ok"].launches, 1);
    assert_eq!(by_name["ok"].last_exit, Some(ExitOutcome::Success));
    assert_eq!(by_name["bad"].launches, 1);
    assert_eq!(by_name["bad"].last_exit, Some(ExitOutcome::Failed(7)));

    assert_eq!(h.sink.lines_for("ok"), vec!["hello from ok"]);
    assert_eq!(h.sink.lines_for("bad"), vec!["failing"]);

    // No Restarting events at all.
    let mut all = Vec::new();
    while let Ok(event) = h.events.try_recv() {
        all.push(event);
    }
    assert!(!all.iter().any(|e| matches!(e, UnitEvent::Restarting { .. })));
    assert_eq!(
        all.iter()
            .filter(|e| matches!(e, UnitEvent::Finished { .. }))
            .count(),
        2
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn restart_enabled_relaunches_after_fixed_backoff_until_shutdown() {
    init_tracing();

    let backoff = Duration::from_millis(150);
    let policy = RestartPolicy::new(RestartMode::AnyExit, backoff);
    let mut h = start(vec![sh_unit("blink", "exit 0")], policy, STOP_TIMEOUT);

    let mut exited_at: Option<Instant> = None;
    let mut gaps = Vec::new();
    let mut launches = 0;
    while launches < 3 {
        match with_timeout(h.events.recv()).await.expect("event stream open") {
            UnitEvent::Exited { .. } => exited_at = Some(Instant::now()),
            UnitEvent::Launched { .. } => {
                launches += 1;
                if let Some(at) = exited_at.take() {
                    gaps.push(at.elapsed());
                }
            }
            UnitEvent::Restarting { delay, .. } => assert_eq!(delay, backoff),
            _ => {}
        }
    }

    assert_eq!(gaps.len(), 2);
    for gap in gaps {
        assert!(gap >= backoff, "relaunched after {gap:?}, before backoff");
    }

    assert!(h.handle.request_shutdown());
    let report = with_timeout(h.run).await.unwrap();

    assert!(report.shutdown.is_some());
    assert_eq!(report.units.len(), 1);
    assert!(report.units[0].launches >= 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn launch_errors_are_retried_until_shutdown() {
    init_tracing();

    let ghost = UnitDescriptor::new(
        "ghost",
        std::env::temp_dir(),
        "fleetrun-definitely-missing-binary",
        ["run", "main.py"],
    );
    let policy = RestartPolicy::new(RestartMode::AnyExit, Duration::from_millis(50));
    let mut h = start(vec![ghost], policy, STOP_TIMEOUT);

    let mut failures = 0;
    let seen = with_timeout(events_until(&mut h.events, |e| {
        if let UnitEvent::LaunchFailed { error, .. } = e {
            assert!(error.contains("not found"));
            failures += 1;
        }
        failures == 3
    }))
    .await;

    assert!(seen.iter().any(|e| matches!(
        e,
        UnitEvent::Exited { outcome: ExitOutcome::LaunchFailed, .. }
    )));

    assert!(h.handle.request_shutdown());
    let report = with_timeout(h.run).await.unwrap();

    let unit = &report.units[0];
    assert_eq!(unit.launches, 0);
    assert_eq!(unit.last_exit, Some(ExitOutcome::LaunchFailed));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_stops_all_units_and_force_kills_stubborn_ones() {
    init_tracing();

    let units = vec![
        sh_unit("one", "echo up; sleep 30"),
        sh_unit("two", "echo up; sleep 30"),
        sh_unit("stubborn", "trap '' TERM; echo up; sleep 30"),
    ];
    let policy = RestartPolicy::new(RestartMode::AnyExit, Duration::from_millis(50));
    let mut h = start(units, policy, Duration::from_millis(500));

    // Wait until every unit has printed, so the trap is installed.
    with_timeout(async {
        while h.sink.lines().len() < 3 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    assert!(h.handle.request_shutdown());
    assert!(!h.handle.request_shutdown(), "second request must be ignored");

    let report = with_timeout(h.run).await.unwrap();
    let summary = report.shutdown.expect("shutdown summary");

    assert_eq!(summary.total(), 3);
    assert_eq!(summary.graceful, 2);
    assert_eq!(summary.force_killed, 1);

    // Restart was enabled, yet nobody was relaunched.
    assert_eq!(report.units.len(), 3);
    for unit in &report.units {
        assert_eq!(unit.launches, 1, "{} relaunched during shutdown", unit.unit);
    }

    let mut rest = Vec::new();
    while let Some(event) = h.events.recv().await {
        rest.push(event);
    }
    assert!(!rest.iter().any(|e| matches!(e, UnitEvent::Restarting { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_during_backoff_skips_relaunch() {
    init_tracing();

    let policy = RestartPolicy::new(RestartMode::AnyExit, Duration::from_secs(60));
    let mut h = start(vec![sh_unit("nap", "exit 1")], policy, STOP_TIMEOUT);

    with_timeout(events_until(&mut h.events, |e| {
        matches!(e, UnitEvent::Restarting { .. })
    }))
    .await;

    let started = Instant::now();
    assert!(h.handle.request_shutdown());
    let report = with_timeout(h.run).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.units[0].launches, 1);
    assert_eq!(report.units[0].last_exit, Some(ExitOutcome::Failed(1)));
    // Nothing was live when shutdown ran.
    assert_eq!(report.shutdown.map(|s| s.total()), Some(0));

    let rest: Vec<_> = std::iter::from_fn(|| h.events.try_recv().ok()).collect();
    assert!(rest.iter().all(|e| !matches!(e, UnitEvent::Launched { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn output_is_drained_before_exit_event() {
    init_tracing();

    let script = "i=1; while [ $i -le 300 ]; do echo n$i; i=$((i+1)); done";
    let mut h = start(
        vec![sh_unit("a", script), sh_unit("b", script)],
        RestartPolicy::disabled(),
        STOP_TIMEOUT,
    );

    let mut exits = 0;
    while exits < 2 {
        if let UnitEvent::Exited { unit, lines, .. } =
            with_timeout(h.events.recv()).await.expect("event stream open")
        {
            assert_eq!(lines, 300);
            assert_eq!(h.sink.lines_for(&unit).len(), 300);
            exits += 1;
        }
    }

    let report = with_timeout(h.run).await.unwrap();
    assert_eq!(report.units.len(), 2);

    // Per-unit order is preserved even though units interleave.
    for unit in ["a", "b"] {
        let lines = h.sink.lines_for(unit);
        let expected: Vec<_> = (1..=300).map(|i| format!("n{i}")).collect();
        assert_eq!(lines, expected);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn a_unit_never_has_two_live_processes() {
    init_tracing();

    let policy = RestartPolicy::new(RestartMode::AnyExit, Duration::from_millis(10));
    let mut h = start(
        vec![sh_unit("x", "exit 0"), sh_unit("y", "sleep 0.05")],
        policy,
        STOP_TIMEOUT,
    );

    let mut seen = Vec::new();
    while count_launches(&seen, "x") < 5 || count_launches(&seen, "y") < 3 {
        seen.push(with_timeout(h.events.recv()).await.expect("event stream open"));
    }

    h.handle.request_shutdown();
    with_timeout(h.run).await.unwrap();
    while let Some(event) = h.events.recv().await {
        seen.push(event);
    }

    // Launched / Exited strictly alternate per unit.
    let mut live: HashMap<String, bool> = HashMap::new();
    for event in &seen {
        match event {
            UnitEvent::Launched { unit, .. } => {
                let was_live = live.insert(unit.clone(), true).unwrap_or(false);
                assert!(!was_live, "{unit} launched while already live");
            }
            UnitEvent::Exited { unit, outcome, .. } if *outcome != ExitOutcome::LaunchFailed => {
                assert_eq!(live.insert(unit.clone(), false), Some(true));
            }
            _ => {}
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_kills_background_processes_of_an_exited_unit() {
    init_tracing();

    // The leader exits at once; its background `sleep` keeps stdout open
    // and ignores SIGTERM.
    let unit = sh_unit("orphaning", "trap '' TERM; echo up; sleep 30 & exit 1");
    let stop_timeout = Duration::from_millis(300);
    let mut h = start(vec![unit], RestartPolicy::disabled(), stop_timeout);

    with_timeout(async {
        while h.sink.lines().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    // Let the leader exit; this stays well inside the drain grace period.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    assert!(!h.handle.is_requested());
    assert!(h.handle.request_shutdown());
    assert!(h.handle.is_requested());

    let report = with_timeout(h.run).await.unwrap();

    assert!(
        started.elapsed() < Duration::from_secs(5),
        "shutdown took {:?}",
        started.elapsed()
    );
    assert_eq!(report.units.len(), 1);
    assert!(matches!(report.units[0].last_exit, Some(ExitOutcome::Failed(_))));

    let rest: Vec<_> = std::iter::from_fn(|| h.events.try_recv().ok()).collect();
    assert!(rest.iter().any(|e| matches!(e, UnitEvent::Exited { .. })));
    assert!(rest.iter().any(|e| matches!(e, UnitEvent::Finished { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn exit_is_reported_while_background_process_holds_output() {
    init_tracing();

    let backoff = Duration::from_millis(100);
    let policy = RestartPolicy::new(RestartMode::AnyExit, backoff);
    let mut h = start(
        vec![sh_unit("leaky", "echo up; sleep 30 & exit 3")],
        policy,
        STOP_TIMEOUT,
    );

    let started = Instant::now();
    let seen = with_timeout(events_until(&mut h.events, |e| {
        matches!(e, UnitEvent::Launched { .. })
    }))
    .await;
    assert_eq!(count_launches(&seen, "leaky"), 1);

    let seen = with_timeout(events_until(&mut h.events, |e| {
        matches!(e, UnitEvent::Launched { .. })
    }))
    .await;
    let relaunched_after = started.elapsed();

    assert!(matches!(
        seen.first(),
        Some(UnitEvent::Exited { outcome: ExitOutcome::Failed(3), lines: 1, .. })
    ));
    assert!(seen
        .iter()
        .any(|e| matches!(e, UnitEvent::Restarting { delay, .. } if *delay == backoff)));
    assert!(
        relaunched_after < OUTPUT_DRAIN_GRACE * 2 + backoff + Duration::from_secs(2),
        "relaunch took {relaunched_after:?}"
    );

    assert!(h.handle.request_shutdown());
    let report = with_timeout(h.run).await.unwrap();
    assert!(report.shutdown.is_some());
    assert!(report.units[0].launches >= 2);
}
